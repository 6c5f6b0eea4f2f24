//! Interactive session: stdin lines go out, received payloads go to stdout.

use anyhow::{Context, Result};
use std::sync::Arc;
use tether_transport::{
    handler, LongPollingTransport, Payload, ReqwestHttpClient, Transport, TransportEvent,
    TransportType,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Build the configured transport.
fn build_transport(config: &Config) -> Result<Box<dyn Transport>> {
    let client = Arc::new(ReqwestHttpClient::new().with_timeout(config.request_timeout()));

    let transport: Box<dyn Transport> = match config.transport {
        TransportType::LongPolling => {
            Box::new(LongPollingTransport::new(client).with_poll_timeout(config.poll_timeout()))
        }
        kind => kind.create(client)?,
    };
    Ok(transport)
}

fn print_payload(payload: &Payload) {
    match payload.as_text() {
        Some(text) => println!("{text}"),
        None => println!("<{} bytes>", payload.len()),
    }
}

/// Run a session until the connection closes, stdin ends, or `shutdown` fires.
///
/// # Errors
///
/// Returns an error if the connection cannot be established or closes with
/// an error.
pub async fn run(config: &Config, shutdown: CancellationToken) -> Result<()> {
    let transport = build_transport(config)?;
    let (handler, mut events) = handler::channel();
    transport.set_handler(handler);

    transport
        .connect(&config.url, &config.query)
        .await
        .with_context(|| format!("Failed to connect to {} via {}", config.url, config.transport))?;

    info!(url = %config.url, transport = transport.name(), "Connected");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let result = loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                info!("Shutting down");
                break Ok(());
            }
            event = events.recv() => match event {
                Some(TransportEvent::Data(payload)) => print_payload(&payload),
                Some(TransportEvent::Closed(None)) | None => {
                    info!("Connection closed");
                    break Ok(());
                }
                Some(TransportEvent::Closed(Some(e))) => {
                    break Err(anyhow::Error::new(e).context("Connection closed"));
                }
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.is_empty() => {}
                Ok(Some(line)) => {
                    if let Err(e) = transport.send(line.into()).await {
                        warn!(error = %e, "Send failed");
                    }
                }
                Ok(None) => {
                    debug!("Input closed");
                    break Ok(());
                }
                Err(e) => break Err(anyhow::Error::new(e).context("Failed to read input")),
            },
        }
    };

    transport.stop();
    result
}
