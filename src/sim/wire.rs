//! Device simulator wire format
//!
//! One line-delimited JSON request, one line-delimited JSON response
//! per operation. Every protocol adapter speaks this format to the
//! device's management agent.

use serde::{Deserialize, Serialize};

/// Operations a device's management agent answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOp {
    GetStatus,
    GetHwVersion,
    GetSwVersion,
    GetFwVersion,
}

/// A single probe request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub op: ProbeOp,
}

impl ProbeRequest {
    pub fn new(op: ProbeOp) -> Self {
        Self { op }
    }
}

/// A single probe response.
///
/// `ok == false` carries an `error`; otherwise exactly the fields the
/// requested operation produces are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResponse {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            ok: true,
            status: Some(status.into()),
            ..Self::default()
        }
    }

    pub fn version(version: impl Into<String>) -> Self {
        Self {
            ok: true,
            version: Some(version.into()),
            ..Self::default()
        }
    }

    pub fn checksummed_version(version: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            ok: true,
            version: Some(version.into()),
            checksum: Some(checksum.into()),
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }
}
