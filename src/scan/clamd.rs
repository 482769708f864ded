use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{ScanError, ScanGate, ScanVerdict};

/// Size of each INSTREAM frame. clamd's StreamMaxLength caps the whole stream, not a frame.
const CHUNK_SIZE: usize = 64 * 1024;

/// clamd's default `StreamMaxLength`.
pub const CLAMD_DEFAULT_STREAM_MAX: u64 = 25 * 1024 * 1024;

/// Scans uploads with a clamd daemon using the `INSTREAM` command over TCP.
pub struct ClamdScanner {
    address: String,
}

impl ClamdScanner {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl ScanGate for ClamdScanner {
    async fn scan(&self, data: &Bytes) -> Result<ScanVerdict, ScanError> {
        let mut stream = TcpStream::connect(&self.address).await?;

        stream.write_all(b"zINSTREAM\0").await?;
        for chunk in data.chunks(CHUNK_SIZE) {
            stream.write_all(&(chunk.len() as u32).to_be_bytes()).await?;
            stream.write_all(chunk).await?;
        }
        stream.write_all(&0u32.to_be_bytes()).await?;
        stream.flush().await?;

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await?;

        let verdict = parse_reply(&String::from_utf8_lossy(&reply))?;
        tracing::debug!(bytes = data.len(), ?verdict, "clamd scan finished");
        Ok(verdict)
    }
}

/// Parse a clamd reply such as `stream: OK` or `stream: Eicar-Signature FOUND`.
fn parse_reply(reply: &str) -> Result<ScanVerdict, ScanError> {
    let reply = reply.trim_end_matches('\0').trim();
    let body = reply.strip_prefix("stream:").map(str::trim).unwrap_or(reply);

    if body == "OK" {
        return Ok(ScanVerdict::Accept);
    }

    if let Some(signature) = body.strip_suffix("FOUND") {
        let signature = signature.trim();
        let reason = if signature.is_empty() {
            "unknown-signature".to_string()
        } else {
            signature.to_string()
        };
        return Ok(ScanVerdict::Reject(vec![reason]));
    }

    if reply.contains("size limit exceeded") {
        return Err(ScanError::StreamLimit(reply.to_string()));
    }

    Err(ScanError::Protocol(reply.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn parses_clean_reply() {
        assert_eq!(parse_reply("stream: OK\0").unwrap(), ScanVerdict::Accept);
    }

    #[test]
    fn parses_detection() {
        assert_eq!(
            parse_reply("stream: Eicar-Test-Signature FOUND\0").unwrap(),
            ScanVerdict::Reject(vec!["Eicar-Test-Signature".to_string()])
        );
    }

    #[test]
    fn stream_limit_reply_is_reported_as_such() {
        let err = parse_reply("INSTREAM size limit exceeded. ERROR\0").unwrap_err();
        assert!(matches!(err, ScanError::StreamLimit(msg) if msg.contains("size limit")));
    }

    #[test]
    fn other_daemon_errors_are_protocol_errors() {
        let err = parse_reply("UNKNOWN COMMAND\0").unwrap_err();
        assert!(matches!(err, ScanError::Protocol(_)));
    }

    /// Minimal clamd stand-in: reads the INSTREAM frames and flags any payload containing "EICAR".
    async fn fake_clamd() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut command = [0u8; 10];
            socket.read_exact(&mut command).await.unwrap();
            assert_eq!(&command, b"zINSTREAM\0");

            let mut payload = Vec::new();
            loop {
                let len = socket.read_u32().await.unwrap() as usize;
                if len == 0 {
                    break;
                }
                let mut chunk = vec![0u8; len];
                socket.read_exact(&mut chunk).await.unwrap();
                payload.extend_from_slice(&chunk);
            }

            let reply: &[u8] = if String::from_utf8_lossy(&payload).contains("EICAR") {
                b"stream: Eicar-Test-Signature FOUND\0"
            } else {
                b"stream: OK\0"
            };
            socket.write_all(reply).await.unwrap();
        });

        address
    }

    #[tokio::test]
    async fn streams_payload_to_daemon() {
        let scanner = ClamdScanner::new(fake_clamd().await);
        let verdict = scanner.scan(&Bytes::from(vec![b'a'; 200_000])).await.unwrap();
        assert_eq!(verdict, ScanVerdict::Accept);
    }

    #[tokio::test]
    async fn reports_detection_from_daemon() {
        let scanner = ClamdScanner::new(fake_clamd().await);
        let verdict = scanner
            .scan(&Bytes::from_static(b"X5O!P%@AP EICAR-STANDARD-ANTIVIRUS-TEST-FILE"))
            .await
            .unwrap();
        assert_eq!(
            verdict,
            ScanVerdict::Reject(vec!["Eicar-Test-Signature".to_string()])
        );
    }

    #[tokio::test]
    async fn unreachable_daemon_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = ClamdScanner::new(address).scan(&Bytes::from_static(b"x")).await;
        assert!(matches!(result, Err(ScanError::Io(_))));
    }
}
