//! Shared probe transport
//!
//! All management protocols in this deployment drive the device's
//! agent through the same line-delimited JSON exchange (see
//! [`crate::sim::wire`]): one fresh TCP connection per call, one
//! request line, one response line. The connection is dropped on every
//! exit path, which closes the transport.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::AdapterError;
use crate::config::{CONNECT_TIMEOUT, EXCHANGE_TIMEOUT};
use crate::models::{DeviceState, Endpoint, VersionInfo};
use crate::sim::wire::{ProbeOp, ProbeRequest, ProbeResponse};

/// One-shot request/response client for a single endpoint address.
pub(crate) struct ProbeTransport {
    host: String,
    port: String,
}

impl ProbeTransport {
    pub(crate) fn new(endpoint: &Endpoint) -> Self {
        Self {
            host: endpoint.host.clone(),
            port: endpoint.port.clone(),
        }
    }

    pub(crate) fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Performs one probe exchange.
    ///
    /// Failure to connect is a `Transport` error; any failure after
    /// the connection is up is a `Protocol` error. Cancellation of
    /// `ctx` aborts promptly at either phase.
    pub(crate) async fn exchange(
        &self,
        ctx: &CancellationToken,
        op: ProbeOp,
    ) -> Result<ProbeResponse, AdapterError> {
        let addr = self.address();

        let stream = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(AdapterError::Cancelled),
            connected = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr.as_str())) => match connected {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    return Err(AdapterError::Transport(format!(
                        "failed to connect to {addr}: {e}"
                    )));
                }
                Err(_) => {
                    return Err(AdapterError::Transport(format!(
                        "connection to {addr} timed out after {}s",
                        CONNECT_TIMEOUT.as_secs()
                    )));
                }
            },
        };

        // transport is up; from here on failures are protocol errors
        let response = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(AdapterError::Cancelled),
            exchanged = timeout(EXCHANGE_TIMEOUT, run_exchange(stream, op)) => match exchanged {
                Ok(result) => result?,
                Err(_) => {
                    return Err(AdapterError::Protocol(format!(
                        "exchange with {addr} timed out after {}s",
                        EXCHANGE_TIMEOUT.as_secs()
                    )));
                }
            },
        };

        if !response.ok {
            let message = response
                .error
                .unwrap_or_else(|| "device reported an unspecified failure".to_string());
            return Err(AdapterError::Protocol(format!("{addr}: {message}")));
        }

        Ok(response)
    }
}

async fn run_exchange(stream: TcpStream, op: ProbeOp) -> Result<ProbeResponse, AdapterError> {
    let (reader, mut writer) = stream.into_split();

    let mut payload = serde_json::to_string(&ProbeRequest::new(op))
        .map_err(|e| AdapterError::Protocol(format!("failed to encode request: {e}")))?;
    payload.push('\n');
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| AdapterError::Protocol(format!("failed to send request: {e}")))?;

    let mut lines = BufReader::new(reader).lines();
    let line = lines
        .next_line()
        .await
        .map_err(|e| AdapterError::Protocol(format!("failed to read response: {e}")))?
        .ok_or_else(|| {
            AdapterError::Protocol("connection closed before a response arrived".to_string())
        })?;

    serde_json::from_str(&line)
        .map_err(|e| AdapterError::Protocol(format!("malformed response: {e}")))
}

/// Decodes a status probe answer.
pub(crate) fn status_from_response(response: &ProbeResponse) -> Result<DeviceState, AdapterError> {
    let raw = response
        .status
        .as_deref()
        .ok_or_else(|| AdapterError::Protocol("response carried no status".to_string()))?;
    raw.parse()
        .map_err(|e: String| AdapterError::Protocol(e))
}

/// Decodes a hardware version answer.
pub(crate) fn hw_from_response(response: &ProbeResponse) -> Result<String, AdapterError> {
    response
        .version
        .clone()
        .ok_or_else(|| AdapterError::Protocol("response carried no version".to_string()))
}

/// Decodes a checksummed software/firmware version answer.
pub(crate) fn version_from_response(
    response: &ProbeResponse,
) -> Result<VersionInfo, AdapterError> {
    let value = response
        .version
        .clone()
        .ok_or_else(|| AdapterError::Protocol("response carried no version".to_string()))?;
    let checksum = response
        .checksum
        .clone()
        .ok_or_else(|| AdapterError::Protocol("response carried no checksum".to_string()))?;
    Ok(VersionInfo { value, checksum })
}
