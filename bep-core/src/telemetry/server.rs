use prometheus::{Encoder, Registry, TextEncoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Serves a single static `/metrics` endpoint in Prometheus text exposition
/// format. A full HTTP framework is unnecessary for one fixed response, so
/// this speaks just enough of HTTP/1.1 to read a request line and write a
/// response (mirrors the LAN beacon's preference for raw `tokio::net` over
/// pulling in a server framework for a narrow job).
pub async fn start_metrics_server(port: u16, registry: Registry, cancel: CancellationToken) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(%port, "metrics server listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let registry = registry.clone();
                tokio::spawn(async move {
                    if let Err(err) = serve_one(stream, &registry).await {
                        warn!(%peer, error = %err, "metrics connection error");
                    }
                });
            }
            _ = cancel.cancelled() => {
                info!("metrics server shutting down");
                return Ok(());
            }
        }
    }
}

async fn serve_one(mut stream: tokio::net::TcpStream, registry: &Registry) -> std::io::Result<()> {
    let mut buf = [0u8; 512];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);
    let path = request.lines().next().and_then(|line| line.split_whitespace().nth(1)).unwrap_or("/");

    let (status, body) = if path == "/metrics" {
        (200, render_metrics(registry))
    } else {
        (404, "not found".to_string())
    };

    let response = format!(
        "HTTP/1.1 {status} {reason}\r\ncontent-type: text/plain; version=0.0.4\r\ncontent-length: {len}\r\nconnection: close\r\n\r\n{body}",
        reason = if status == 200 { "OK" } else { "Not Found" },
        len = body.len(),
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn render_metrics(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buf = Vec::new();
    if encoder.encode(&metric_families, &mut buf).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&buf).to_string()
}
