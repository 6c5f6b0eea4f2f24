//! Event-stream decoder benchmarks for tether-protocol.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tether_protocol::EventStreamDecoder;

fn stream_of(events: usize, payload: usize) -> Vec<u8> {
    let data = "x".repeat(payload);
    let mut body = Vec::new();
    for i in 0..events {
        body.extend_from_slice(format!("id: {i}\ndata: {data}\n\n").as_bytes());
    }
    body
}

fn bench_decode_small(c: &mut Criterion) {
    let body = stream_of(1, 64);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_function("small_64B", |b| {
        b.iter(|| {
            let mut decoder = EventStreamDecoder::new();
            let mut buf = BytesMut::from(black_box(&body[..]));
            decoder.decode_from(&mut buf).unwrap()
        })
    });
    group.finish();
}

fn bench_decode_chunked(c: &mut Criterion) {
    let body = stream_of(256, 256);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_function("chunked_256x256B", |b| {
        b.iter(|| {
            let mut decoder = EventStreamDecoder::new();
            let mut buf = BytesMut::new();
            let mut count = 0;
            for chunk in body.chunks(1024) {
                buf.extend_from_slice(chunk);
                while let Some(event) = decoder.decode_from(&mut buf).unwrap() {
                    black_box(event);
                    count += 1;
                }
            }
            count
        })
    });
    group.finish();
}

criterion_group!(benches, bench_decode_small, bench_decode_chunked);
criterion_main!(benches);
