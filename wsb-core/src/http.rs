//! Blocking HTTP access for the DEM and climate adapters.
//!
//! Wraps an async `reqwest` client with a private current-thread Tokio
//! runtime so the pipelines stay synchronous.

use crate::error::{BasinError, Result};
use reqwest::{Client, StatusCode};

/// Blocking wrapper around a `reqwest` [`Client`].
pub struct BlockingFetcher {
    rt: tokio::runtime::Runtime,
    client: Client,
}

impl BlockingFetcher {
    pub fn new() -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            rt,
            client: Client::new(),
        })
    }

    /// GET a body; `Ok(None)` when the server answers 404.
    ///
    /// Any other non-success status is an error carrying the status and URL.
    pub fn get_bytes(&self, url: &str) -> Result<Option<Vec<u8>>> {
        self.rt.block_on(async {
            let response = self.client.get(url).send().await?;
            match response.status() {
                StatusCode::NOT_FOUND => Ok(None),
                status if status.is_success() => Ok(Some(response.bytes().await?.to_vec())),
                status => {
                    let body = response.text().await.unwrap_or_default();
                    Err(BasinError::ToolFailed {
                        tool: "HTTP".into(),
                        reason: format!("{} returned {}: {}", redact(url), status, body.trim()),
                    })
                }
            }
        })
    }
}

/// Hide query values that look like credentials before a URL reaches logs.
pub fn redact(url: &str) -> String {
    match url.split_once('?') {
        Some((base, query)) => {
            let params: Vec<String> = query
                .split('&')
                .map(|pair| match pair.split_once('=') {
                    Some((key, _)) if key.to_ascii_lowercase().contains("key") => {
                        format!("{}=***", key)
                    }
                    _ => pair.to_string(),
                })
                .collect();
            format!("{}?{}", base, params.join("&"))
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answer one request on a local port with `status` and `body`; returns the base URL.
    fn serve_once(status: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(body).unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_get_bytes_statuses() {
        let fetcher = BlockingFetcher::new().unwrap();

        let url = serve_once("200 OK", b"grid");
        assert_eq!(fetcher.get_bytes(&url).unwrap(), Some(b"grid".to_vec()));

        let url = serve_once("404 Not Found", b"");
        assert_eq!(fetcher.get_bytes(&url).unwrap(), None);

        let url = serve_once("500 Internal Server Error", b"upstream down");
        match fetcher.get_bytes(&format!("{}/a?key=secret", url)).unwrap_err() {
            BasinError::ToolFailed { tool, reason } => {
                assert_eq!(tool, "HTTP");
                assert!(reason.contains("500"));
                assert!(reason.contains("upstream down"));
                assert!(!reason.contains("secret"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_redact_api_key() {
        assert_eq!(
            redact("https://example.org/api?demtype=COP30&API_Key=secret&south=1"),
            "https://example.org/api?demtype=COP30&API_Key=***&south=1"
        );
        assert_eq!(redact("https://example.org/a.tif"), "https://example.org/a.tif");
    }
}
