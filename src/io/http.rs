use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::ReadAt;
use anyhow::{Context, Result, anyhow, bail};

/// Retries per range request before the read is abandoned.
const MAX_RETRY: u32 = 10;

/// HTTP Range reader for source archives hosted remotely.
///
/// Alignment and verification only touch the central directory, the local
/// headers and each entry's payload once, so ranged reads avoid downloading
/// anything twice.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    transferred_bytes: AtomicU64,
}

impl HttpRangeReader {
    /// Probe `url` with a HEAD request for Range support and length.
    pub async fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let resp = client
            .head(&url)
            .send()
            .await
            .with_context(|| format!("HEAD {url}"))?;

        if !resp.status().is_success() {
            bail!("HTTP request failed with status: {}", resp.status());
        }

        let accept_ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");

        if !accept_ranges.contains("bytes") {
            bail!("Remote server does not support Range requests");
        }

        let size = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("Remote server did not return Content-Length"))?;

        log::debug!("{url}: {size} bytes, range requests supported");

        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: AtomicU64::new(0),
        })
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReadAt for HttpRangeReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }

        let end = (offset + buf.len() as u64 - 1).min(self.size - 1);
        let expected_size = (end - offset + 1) as usize;

        let mut received = 0;
        let mut retry_count = 0;

        while received < expected_size {
            let current_start = offset + received as u64;
            let range = format!("bytes={}-{}", current_start, end);

            let result = self
                .client
                .get(&self.url)
                .header("Range", &range)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    if resp.status() != reqwest::StatusCode::PARTIAL_CONTENT {
                        bail!("HTTP request failed with status: {}", resp.status());
                    }

                    let bytes = resp.bytes().await?;
                    if bytes.is_empty() {
                        bail!("Empty response for range {range}");
                    }
                    let chunk_len = bytes.len().min(expected_size - received);
                    buf[received..received + chunk_len].copy_from_slice(&bytes[..chunk_len]);
                    received += chunk_len;

                    self.transferred_bytes
                        .fetch_add(chunk_len as u64, Ordering::Relaxed);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= MAX_RETRY {
                        bail!("Max retries exceeded for range {range}");
                    }
                    log::warn!("Connection error, retry {retry_count}/{MAX_RETRY}: {e}");
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(received)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer HEAD with `len` and range support, and every GET with an
    /// empty 206 body.
    async fn serve_empty_ranges(len: u64) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let response = if request.starts_with(b"HEAD") {
                    format!(
                        "HTTP/1.1 200 OK\r\nAccept-Ranges: bytes\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n"
                    )
                } else {
                    "HTTP/1.1 206 Partial Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        .to_string()
                };
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{addr}/app.apk")
    }

    #[tokio::test]
    async fn head_probe_reads_the_length() {
        let reader = HttpRangeReader::new(serve_empty_ranges(4096).await)
            .await
            .unwrap();

        assert_eq!(reader.size(), 4096);
        assert_eq!(reader.transferred_bytes(), 0);
    }

    #[tokio::test]
    async fn reads_past_the_end_return_nothing() {
        let reader = HttpRangeReader::new(serve_empty_ranges(10).await)
            .await
            .unwrap();
        let mut buf = [0u8; 4];

        assert_eq!(reader.read_at(10, &mut buf).await.unwrap(), 0);
        assert_eq!(reader.read_at(64, &mut buf).await.unwrap(), 0);
        assert_eq!(reader.read_at(0, &mut []).await.unwrap(), 0);
        assert_eq!(reader.transferred_bytes(), 0);
    }

    #[tokio::test]
    async fn empty_range_response_is_an_error() {
        let reader = HttpRangeReader::new(serve_empty_ranges(10).await)
            .await
            .unwrap();
        let mut buf = [0u8; 4];

        let err = reader.read_at(2, &mut buf).await.unwrap_err();
        assert!(err.to_string().contains("Empty response"), "{err:#}");
    }
}
