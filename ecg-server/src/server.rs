//! TCP server for CLI communication.
//!
//! Provides a simple line-delimited JSON-RPC style interface for the
//! lightweight CLI client.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use ecg_core::cache::ResponseCache;

use crate::config::Config;
use crate::digitizer_service;
use crate::vlm::VlmProvider;

/// Server state.
struct ServerState {
    config: Config,
    cache: ResponseCache,
    providers: Vec<Box<dyn VlmProvider>>,
}

/// Request from CLI client.
#[derive(Debug, Deserialize)]
#[serde(tag = "method")]
#[serde(rename_all = "snake_case")]
enum Request {
    Digitize { path: String, age_days: i64 },
    Status,
    CacheStats,
    CacheClear,
}

/// Response to CLI client.
#[derive(Debug, Serialize)]
struct Response {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl Response {
    fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: Some(message.into()), data: None }
    }

    fn ok_with_data(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self { success: true, message: Some(message.into()), data: Some(data) }
    }

    fn error(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()), data: None }
    }
}

/// Run the server.
pub async fn run(config: Config, cache: ResponseCache, providers: Vec<Box<dyn VlmProvider>>) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr.clone();
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("server listening on {}", bind_addr);

    let state = Arc::new(Mutex::new(ServerState { config, cache, providers }));

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(%addr, "client connected");
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, state).await {
                        error!(error = %e, "client error");
                    }
                });
            }
            Err(e) => warn!(error = %e, "accept error"),
        }
    }
}

async fn handle_client(stream: TcpStream, state: Arc<Mutex<ServerState>>) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        debug!(request = line.trim(), "received");

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle_request(request, &state).await,
            Err(e) => Response::error(format!("invalid request: {}", e)),
        };

        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        line.clear();
    }

    Ok(())
}

async fn handle_request(request: Request, state: &Arc<Mutex<ServerState>>) -> Response {
    match request {
        Request::Digitize { path, age_days } => {
            let state_guard = state.lock().await;
            let image_path = Path::new(&path);

            let bytes = match tokio::fs::read(image_path).await {
                Ok(b) => b,
                Err(e) => return Response::error(format!("failed to read {}: {}", path, e)),
            };

            let decoded = match decode_png_rgba(&bytes) {
                Ok(img) => img,
                Err(e) => return Response::error(format!("failed to decode image: {}", e)),
            };

            match digitizer_service::digitize(&bytes, &decoded, age_days, &state_guard.config, &state_guard.cache, &state_guard.providers).await {
                Ok(result) => Response::ok_with_data(
                    format!("digitized {} leads at tier {}", result.signal_lead_count, result.tier_used),
                    serde_json::to_value(&result).unwrap_or(serde_json::Value::Null),
                ),
                Err(e) => Response::error(format!("digitization failed: {}", e)),
            }
        }

        Request::Status => Response::ok("server running"),

        Request::CacheStats => {
            let state_guard = state.lock().await;
            match state_guard.cache.stats() {
                Ok(stats) => Response::ok_with_data(
                    "cache statistics",
                    serde_json::json!({
                        "entries": stats.entry_count,
                        "size_bytes": stats.total_size_bytes,
                        "size_mb": stats.total_size_bytes as f64 / 1024.0 / 1024.0,
                    }),
                ),
                Err(e) => Response::error(format!("failed to get cache stats: {}", e)),
            }
        }

        Request::CacheClear => {
            let state_guard = state.lock().await;
            match state_guard.cache.clear() {
                Ok(()) => Response::ok("cache cleared"),
                Err(e) => Response::error(format!("failed to clear cache: {}", e)),
            }
        }
    }
}

/// Decoding PNG/JPEG into raw RGBA bytes is outside this crate's scope
/// (spec.md Non-goals: image codecs are an external collaborator's
/// concern); callers are expected to hand over pre-decoded RGBA. This is a
/// thin placeholder that only accepts already-raw RGBA payloads prefixed by
/// a tiny header, matching what `ecg-cli` writes when staging a digitize
/// request.
fn decode_png_rgba(bytes: &[u8]) -> anyhow::Result<ecg_core::image::Image> {
    if bytes.len() < 8 {
        anyhow::bail!("payload too small to contain a width/height header");
    }
    let width = u32::from_le_bytes(bytes[0..4].try_into()?);
    let height = u32::from_le_bytes(bytes[4..8].try_into()?);
    ecg_core::image::Image::from_rgba_bytes(width, height, &bytes[8..]).map_err(|e| anyhow::anyhow!(e))
}
