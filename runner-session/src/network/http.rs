//! HTTP Stats Backend
//!
//! `reqwest` implementation of [`StatsBackend`]. One instance per store; the
//! primary and fallback share a client and an identity.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, Url};

use crate::core::stats::StatsSeed;
use crate::network::identity::Identity;
use crate::network::protocol::{
    LoadGameResponse, SaveGameRequest, LOAD_SEGMENTS, SAVE_SEGMENTS, SELECTED_CHILD_HEADER,
};
use crate::network::transport::{StatsBackend, TransportError};

/// A stats store reached over HTTP.
pub struct HttpStatsBackend {
    base: Url,
    identity: Identity,
    client: Client,
}

impl HttpStatsBackend {
    /// Create a backend for the store at `base_url`.
    pub fn new(base_url: &str, identity: Identity, client: Client) -> Result<Self, TransportError> {
        let base = Url::parse(base_url)
            .map_err(|e| TransportError::Endpoint(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(TransportError::Endpoint(base_url.to_string()));
        }

        Ok(Self { base, identity, client })
    }

    /// Base URL of the store.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn with_identity(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, self.identity.bearer())
            .header(SELECTED_CHILD_HEADER, self.identity.selected_subject_id())
    }
}

fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(TransportError::Status(status.as_u16()))
    }
}

#[async_trait]
impl StatsBackend for HttpStatsBackend {
    async fn load_stats(&self, game_name: &str) -> Result<StatsSeed, TransportError> {
        let url = self.endpoint([LOAD_SEGMENTS[0], LOAD_SEGMENTS[1], game_name]);
        let response = self.with_identity(self.client.get(url)).send().await?;
        let body = check_status(response)?.text().await?;

        LoadGameResponse::from_json(&body)
            .map_err(|e| TransportError::Malformed(e.to_string()))?
            .into_seed()
            .map_err(TransportError::Malformed)
    }

    async fn save_stats(&self, request: &SaveGameRequest) -> Result<(), TransportError> {
        let url = self.endpoint(SAVE_SEGMENTS);
        let response = self
            .with_identity(self.client.post(url))
            .json(request)
            .send()
            .await?;
        check_status(response)?;
        Ok(())
    }
}

// =============================================================================
// TEST STUB SERVER
// =============================================================================

/// Minimal HTTP/1.1 responder recording each request it answers.
#[cfg(test)]
pub(crate) mod stub {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub method: String,
        pub path: String,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl Recorded {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    /// Serve `status` and `body` to every request. Returns the base URL.
    pub async fn serve(status: u16, body: &'static str) -> (String, mpsc::UnboundedReceiver<Recorded>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Some(recorded) = answer(stream, status, body).await {
                        let _ = tx.send(recorded);
                    }
                });
            }
        });

        (format!("http://{}", addr), rx)
    }

    async fn answer(mut stream: TcpStream, status: u16, body: &str) -> Option<Recorded> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        let header_end = loop {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let mut lines = head.split("\r\n");
        let mut request_line = lines.next()?.split_whitespace();
        let method = request_line.next()?.to_string();
        let path = request_line.next()?.to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();

        let content_length = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .and_then(|(_, v)| v.parse::<usize>().ok())
            .unwrap_or(0);

        while buf.len() < header_end + content_length {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let request_body = String::from_utf8_lossy(&buf[header_end..]).to_string();

        let response = format!(
            "HTTP/1.1 {} STUB\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.ok()?;
        let _ = stream.shutdown().await;

        Some(Recorded { method, path, headers, body: request_body })
    }
}

// =============================================================================
// TESTS
// =============================================================================
