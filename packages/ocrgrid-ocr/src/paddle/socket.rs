use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, warn};

use crate::engine::{OcrEngine, OcrError, OcrInput, OcrOutput};
use crate::protocol::{OcrRequest, OcrResponse};

use super::args::EngineArgs;

/// An engine reached over TCP.
///
/// Idle connections to the engine server are dropped silently, so a fresh
/// connection is opened for every request.
pub struct SocketEngine {
    host: String,
    port: u16,
    loopback: bool,
    timeout: Duration,
}

async fn resolves_to_loopback(host: &str, port: u16) -> bool {
    match lookup_host((host, port)).await {
        Ok(addrs) => {
            let addrs: Vec<_> = addrs.collect();
            !addrs.is_empty() && addrs.iter().all(|a| a.ip().is_loopback())
        }
        Err(e) => {
            warn!(host, error = %e, "could not tell whether the engine server is local");
            false
        }
    }
}

impl SocketEngine {
    /// Validates `args` and checks that the server accepts connections.
    ///
    /// The server is started with its own flags; `args` are only checked so
    /// that a misconfiguration fails the same way in both engine modes.
    pub async fn connect(
        host: impl Into<String>,
        port: u16,
        args: &EngineArgs,
        timeout: Duration,
    ) -> Result<Self, OcrError> {
        args.to_flags()?;
        let host = host.into();
        let loopback = resolves_to_loopback(&host, port).await;
        debug!(host = %host, port, loopback, "engine server");

        let engine = Self {
            host,
            port,
            loopback,
            timeout,
        };
        engine.open().await?;
        Ok(engine)
    }

    pub fn is_loopback(&self) -> bool {
        self.loopback
    }

    async fn open(&self) -> Result<TcpStream, OcrError> {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        let stream = tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| OcrError::Timeout(self.timeout))?
            .map_err(|e| {
                OcrError::EngineError(format!("cannot reach {}:{}: {e}", self.host, self.port))
            })?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    async fn exchange(&self, request: &OcrRequest) -> Result<OcrResponse, OcrError> {
        let stream = self.open().await?;
        let (reader, mut writer) = stream.into_split();
        writer.write_all(request.to_line()?.as_bytes()).await?;
        writer.flush().await?;
        let line = BufReader::new(reader)
            .lines()
            .next_line()
            .await?
            .ok_or(OcrError::Disconnected)?;
        debug!(response_len = line.len(), "engine answered");
        OcrResponse::parse(&line)
    }
}

#[async_trait]
impl OcrEngine for SocketEngine {
    async fn recognize(&self, input: &OcrInput) -> Result<OcrOutput, OcrError> {
        let request = OcrRequest::from_input(input)?;
        if request.is_path() && !self.loopback {
            warn!(
                host = %self.host,
                "engine server is not local; it may not be able to read the image path"
            );
        }
        tokio::time::timeout(self.timeout, self.exchange(&request))
            .await
            .map_err(|_| OcrError::Timeout(self.timeout))??
            .into_output()
    }
}
