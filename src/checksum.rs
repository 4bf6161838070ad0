//! Checksum generation
//!
//! The reconciler re-computes a checksum over every version string a
//! device reports and compares it with the checksum the device sent.
//! The generator is a capability so deployments can swap the built-in
//! SHA-256 for an external signing/attestation tool without touching
//! the control loop.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Capability for producing a checksum over raw bytes.
#[async_trait]
pub trait ChecksumGenerator: Send + Sync {
    async fn compute(&self, data: &[u8]) -> Result<String>;
}

/// Deterministic in-process SHA-256 generator. Default in production
/// and the reference implementation for tests.
#[derive(Debug, Clone, Default)]
pub struct Sha256Generator;

#[async_trait]
impl ChecksumGenerator for Sha256Generator {
    async fn compute(&self, data: &[u8]) -> Result<String> {
        Ok(sha256_hex(data))
    }
}

/// Lowercase hex SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Generator that shells out to a configured binary: input on stdin,
/// checksum on stdout, diagnostics on stderr.
pub struct ExternalGenerator {
    binary_path: String,
}

impl ExternalGenerator {
    /// Creates the generator, verifying up front that the binary is
    /// actually there.
    pub fn new(binary_path: impl Into<String>) -> Result<Self> {
        let binary_path = binary_path.into();
        if !Path::new(&binary_path).exists() {
            bail!("checksum binary not found at path {:?}", binary_path);
        }
        Ok(Self { binary_path })
    }
}

#[async_trait]
impl ChecksumGenerator for ExternalGenerator {
    async fn compute(&self, data: &[u8]) -> Result<String> {
        let mut child = Command::new(&self.binary_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start checksum command {}", self.binary_path))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("failed to open stdin pipe to checksum command"))?;
        stdin
            .write_all(data)
            .await
            .context("Failed to write input to checksum command")?;
        // closing stdin signals the generator that the input is complete
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .context("Failed to read checksum command output")?;

        if !output.status.success() {
            bail!(
                "checksum command failed with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let checksum = String::from_utf8(output.stdout)
            .context("Checksum command produced non-UTF-8 output")?;
        Ok(checksum.trim().to_string())
    }
}
