//! Loopback HTTP/1.1 servers for exercising the reqwest clients.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Reads one request head and its `Content-Length` body.
async fn read_request(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&data[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while data.len() < end + 4 + body_len {
                let n = stream.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&buf[..n]);
            }
            return Ok(());
        }
    }
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

/// Encodes `body` as a single chunk followed by the terminating chunk.
pub fn chunked(body: &str) -> String {
    format!("{:x}\r\n{body}\r\n0\r\n\r\n", body.len())
}

/// Answers one connection with `response` verbatim. Returns the base URL.
pub async fn serve_once(response: String) -> String {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            if read_request(&mut stream).await.is_ok() {
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        }
    });
    url
}

/// Answers one connection with a chunked body that never ends.
pub async fn serve_endless_chunks() -> String {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            if read_request(&mut stream).await.is_err() {
                return;
            }
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nTransfer-Encoding: chunked\r\n\r\n";
            if stream.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            let chunk = format!("400\r\n{}\r\n", "a".repeat(1024));
            while stream.write_all(chunk.as_bytes()).await.is_ok() {}
        }
    });
    url
}
