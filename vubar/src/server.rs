//! Network configuration service.
//!
//! Accept loop in the style of a socket server: one task per connection,
//! speaking just enough HTTP/1.1 for the portal's `/config` and `/deploy`
//! endpoints. The controlling UI is served from another origin, so every
//! response carries permissive CORS headers and the API routes answer
//! OPTIONS preflights.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::config::{apply_document, document_from, ConfigDoc, SharedConfig};

/// Everything a request handler may touch. Dimensions are fixed at
/// startup; only the configuration behind the lock is writable.
pub struct ServiceState {
    pub config: SharedConfig,
    pub paused: Arc<AtomicBool>,
    pub rows: u16,
    pub cols: u16,
}

const MAX_BODY: usize = 1 << 20;

pub async fn run(port: u16, state: Arc<ServiceState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(
        "configuration service listening on {}",
        listener.local_addr()?
    );
    serve(listener, state).await
}

pub async fn serve(listener: TcpListener, state: Arc<ServiceState>) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, state).await {
                warn!("request from {} failed: {}", peer, err);
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<ServiceState>) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("").to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 || line == "\r\n" || line == "\n" {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let response = if content_length > MAX_BODY {
        warn!("request body of {} bytes refused", content_length);
        fail_response()
    } else {
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await?;
        route(&method, &path, &body, &state)
    };

    let stream = reader.get_mut();
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

fn route(method: &str, path: &str, body: &[u8], state: &ServiceState) -> String {
    match (method, path) {
        ("OPTIONS", "/config" | "/deploy" | "/pause" | "/resume") => {
            http_response("200 OK", "text/plain", "CORS Allowed!")
        }
        ("GET", "/config") => {
            let config = state
                .config
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            let doc = document_from(&config, state.rows, state.cols);
            match serde_json::to_string(&doc) {
                Ok(json) => http_response("200 OK", "application/json", &json),
                Err(err) => {
                    warn!("config serialization failed: {}", err);
                    fail_response()
                }
            }
        }
        ("POST", "/deploy") => match serde_json::from_slice::<ConfigDoc>(body) {
            Ok(doc) => match apply_document(&state.config, state.rows, state.cols, &doc) {
                Ok(()) => {
                    info!("new configuration deployed");
                    success_response()
                }
                Err(err) => {
                    warn!("deploy rejected: {}", err);
                    fail_response()
                }
            },
            Err(err) => {
                warn!("deploy payload unreadable: {}", err);
                fail_response()
            }
        },
        ("POST", "/pause") => {
            state.paused.store(true, Ordering::Relaxed);
            success_response()
        }
        ("POST", "/resume") => {
            state.paused.store(false, Ordering::Relaxed);
            success_response()
        }
        _ => http_response("404 Not Found", "application/json", "{\"result\":\"fail\"}"),
    }
}

fn success_response() -> String {
    http_response("200 OK", "application/json", "{\"result\":\"success\"}")
}

fn fail_response() -> String {
    http_response("200 OK", "application/json", "{\"result\":\"fail\"}")
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {len}\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        len = body.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayConfig;
    use std::net::SocketAddr;
    use std::sync::RwLock;

    const ROWS: u16 = 10;
    const COLS: u16 = 10;

    async fn spawn_server() -> (SocketAddr, Arc<ServiceState>) {
        let state = Arc::new(ServiceState {
            config: Arc::new(RwLock::new(DisplayConfig::with_default_palette(ROWS, COLS))),
            paused: Arc::new(AtomicBool::new(false)),
            rows: ROWS,
            cols: COLS,
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_state = state.clone();
        tokio::spawn(async move {
            let _ = serve(listener, server_state).await;
        });
        (addr, state)
    }

    async fn request(addr: SocketAddr, raw: String) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8(response).unwrap()
    }

    async fn get_config(addr: SocketAddr) -> ConfigDoc {
        let response = request(
            addr,
            "GET /config HTTP/1.1\r\nHost: test\r\n\r\n".to_string(),
        )
        .await;
        serde_json::from_str(body_of(&response)).unwrap()
    }

    async fn post(addr: SocketAddr, path: &str, body: &str) -> String {
        request(
            addr,
            format!(
                "POST {path} HTTP/1.1\r\nHost: test\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
                body.len()
            ),
        )
        .await
    }

    fn body_of(response: &str) -> &str {
        response.split("\r\n\r\n").nth(1).unwrap_or("")
    }

    #[tokio::test]
    async fn test_get_config_returns_current_document() {
        let (addr, _state) = spawn_server().await;
        let doc = get_config(addr).await;
        assert_eq!(doc.no_of_rows, ROWS);
        assert_eq!(doc.no_of_cols, COLS);
        assert_eq!(doc.pixels.len(), ROWS as usize * COLS as usize);
        assert_eq!(doc.peak_delay, 1500);
    }

    #[tokio::test]
    async fn test_deploy_then_get_round_trips() {
        let (addr, _state) = spawn_server().await;

        let mut doc = get_config(addr).await;
        doc.peak_delay = 800;
        doc.peak_speed = 40;
        doc.speed_filter = 0.25;
        doc.atten = 50_000.0;
        doc.brightness = 99;
        doc.peak = crate::config::ColorDoc { r: 10, g: 20, b: 30 };
        for pixel in doc.pixels.iter_mut() {
            *pixel = crate::config::ColorDoc { r: 7, g: 8, b: 9 };
        }

        let payload = serde_json::to_string(&doc).unwrap();
        let response = post(addr, "/deploy", &payload).await;
        assert!(body_of(&response).contains("success"));

        let back = get_config(addr).await;
        assert_eq!(back, doc);
    }

    #[tokio::test]
    async fn test_malformed_deploy_leaves_config_unchanged() {
        let (addr, _state) = spawn_server().await;
        let before = get_config(addr).await;

        let response = post(addr, "/deploy", "{not valid json").await;
        assert!(body_of(&response).contains("fail"));

        let response = post(addr, "/deploy", "{\"peakDelay\": 500}").await;
        assert!(body_of(&response).contains("fail"));

        let after = get_config(addr).await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_wrong_palette_size_is_rejected() {
        let (addr, _state) = spawn_server().await;
        let before = get_config(addr).await;

        let mut doc = before.clone();
        doc.pixels.truncate(3);
        let response = post(addr, "/deploy", &serde_json::to_string(&doc).unwrap()).await;
        assert!(body_of(&response).contains("fail"));

        assert_eq!(get_config(addr).await, before);
    }

    #[tokio::test]
    async fn test_options_preflight_allows_any_origin() {
        let (addr, _state) = spawn_server().await;
        let response = request(
            addr,
            "OPTIONS /deploy HTTP/1.1\r\nHost: test\r\nOrigin: http://elsewhere\r\n\r\n".to_string(),
        )
        .await;
        assert!(response.contains("Access-Control-Allow-Origin: *"));
        assert!(response.contains("Access-Control-Allow-Methods: GET, POST, OPTIONS"));
    }

    #[tokio::test]
    async fn test_pause_and_resume_toggle_flag() {
        let (addr, state) = spawn_server().await;

        let response = post(addr, "/pause", "").await;
        assert!(body_of(&response).contains("success"));
        assert!(state.paused.load(Ordering::Relaxed));

        let response = post(addr, "/resume", "").await;
        assert!(body_of(&response).contains("success"));
        assert!(!state.paused.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_unknown_route_is_rejected() {
        let (addr, _state) = spawn_server().await;
        let response = request(
            addr,
            "GET /nope HTTP/1.1\r\nHost: test\r\n\r\n".to_string(),
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 404"));
    }
}
