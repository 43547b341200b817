//! Wire message types for the recognition protocol.
//!
//! Every message is a newline-free JSON text object with a required
//! `type` string discriminant. Both directions are modelled as
//! exhaustive tagged enums so routing is matched at compile time; the
//! only stringly-typed step left is classifying an inbound `type` we
//! have never heard of, which is a typed error (unknown kinds must not
//! be fatal).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::VisageError;
use crate::snapshot::ImageRecord;

// ── Identity ─────────────────────────────────────────────────────

/// A reference to a registered person.
///
/// The wire convention is an integer index into the `people` list,
/// with `-1` meaning "unknown". Any other negative value is treated
/// as unknown on receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Identity {
    Unknown,
    Known(usize),
}

impl From<i64> for Identity {
    fn from(value: i64) -> Self {
        if value < 0 {
            Identity::Unknown
        } else {
            Identity::Known(value as usize)
        }
    }
}

impl From<Identity> for i64 {
    fn from(value: Identity) -> Self {
        match value {
            Identity::Unknown => -1,
            Identity::Known(idx) => idx as i64,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Unknown => write!(f, "Unknown"),
            Identity::Known(idx) => write!(f, "#{idx}"),
        }
    }
}

// ── Outbound ─────────────────────────────────────────────────────

/// All messages the client sends to the recognition server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    /// RTT calibration probe; the server echoes it back verbatim.
    #[serde(rename = "NULL")]
    Null,

    /// One captured, encoded video frame tagged with the active identity.
    #[serde(rename = "FRAME")]
    Frame {
        #[serde(rename = "dataURL")]
        data_url: String,
        identity: Identity,
    },

    /// Full snapshot sync pushed after calibration completes.
    #[serde(rename = "ALL_STATE")]
    AllState {
        images: Vec<ImageRecord>,
        people: Vec<String>,
        training: bool,
    },

    /// Register a new identity label.
    #[serde(rename = "ADD_PERSON")]
    AddPerson { val: String },

    /// Toggle the training-mode flag.
    #[serde(rename = "TRAINING")]
    Training { val: bool },

    /// Request a certification attempt.
    #[serde(rename = "TRY_CERTIFY")]
    TryCertify { val: bool },

    /// Request a t-SNE visualization artifact.
    #[serde(rename = "REQ_TSNE")]
    ReqTsne { people: Vec<String> },

    /// Relabel a stored image.
    #[serde(rename = "UPDATE_IDENTITY")]
    UpdateIdentity { hash: String, idx: Identity },

    /// Delete a stored image.
    #[serde(rename = "REMOVE_IMAGE")]
    RemoveImage { hash: String },
}

// ── Inbound ──────────────────────────────────────────────────────

/// All messages the server pushes to the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// Echo of a calibration probe.
    #[serde(rename = "NULL")]
    Null,

    /// Acknowledgement that one frame was processed; replenishes a credit.
    #[serde(rename = "PROCESSED")]
    Processed,

    /// A newly stored face crop: raw BGR pixels plus its embedding.
    #[serde(rename = "NEW_IMAGE")]
    NewImage {
        hash: String,
        identity: Identity,
        content: Vec<u8>,
        representation: Vec<f64>,
    },

    /// Identities detected in the most recent frame.
    #[serde(rename = "IDENTITIES")]
    Identities { identities: Vec<Identity> },

    /// An annotated copy of the most recent frame (encoded image).
    #[serde(rename = "ANNOTATED")]
    Annotated { content: String },

    /// A t-SNE visualization artifact (encoded image).
    #[serde(rename = "TSNE_DATA")]
    TsneData { content: String },

    /// Certification attempt succeeded.
    #[serde(rename = "CERTIFIED_SUCCESS")]
    CertifiedSuccess,

    /// Certification attempt failed; `val` 0 = failure, 1 = unregistered.
    #[serde(rename = "CERTIFIED_FAIL")]
    CertifiedFail { val: i64 },
}

impl InboundMessage {
    /// Every discriminant the client understands.
    const KNOWN_TYPES: &'static [&'static str] = &[
        "NULL",
        "PROCESSED",
        "NEW_IMAGE",
        "IDENTITIES",
        "ANNOTATED",
        "TSNE_DATA",
        "CERTIFIED_SUCCESS",
        "CERTIFIED_FAIL",
    ];

    /// Parse one inbound JSON text message.
    ///
    /// Distinguishes an unrecognized `type` value
    /// ([`VisageError::UnknownType`], skipped for forward
    /// compatibility) from a payload that fails to parse
    /// ([`VisageError::Malformed`]).
    pub fn parse(text: &str) -> Result<Self, VisageError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| VisageError::Malformed("missing \"type\" discriminant".to_string()))?;
        if !Self::KNOWN_TYPES.contains(&kind) {
            return Err(VisageError::UnknownType(kind.to_string()));
        }
        serde_json::from_value(value).map_err(|e| VisageError::Malformed(e.to_string()))
    }
}

// ── Tests ────────────────────────────────────────────────────────
