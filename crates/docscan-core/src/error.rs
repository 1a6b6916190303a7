// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Docscan.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Docscan operations.
#[derive(Debug, Error)]
pub enum ScanError {
    // -- Geometry / image errors --
    #[error("image processing failed: {0}")]
    Image(String),

    #[error("degenerate quad: {0}")]
    DegenerateQuad(String),

    #[error("invalid pixel buffer: {0}")]
    InvalidBuffer(String),

    #[error("page not found: {0}")]
    PageNotFound(String),

    // -- PDF errors --
    #[error("PDF encoding failed: {0}")]
    PdfEncoding(String),

    #[error("PDF read failed: {0}")]
    PdfRead(String),

    // -- Worker dispatch --
    /// A job failed inside a worker with an error name this side does not
    /// recognise. The remote name, message and stack are kept verbatim.
    #[error("{name}: {message}")]
    Worker {
        name: String,
        message: String,
        stack: Option<String>,
    },

    #[error("worker transport error: {0}")]
    WorkerTransport(String),

    #[error("job timed out: {0}")]
    Timeout(String),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Wire form of a failed job: `{message, name, stack}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedError {
    pub message: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ScanError {
    /// Stable identifier for the variant, used as the `name` on the wire.
    pub fn name(&self) -> &str {
        match self {
            Self::Image(_) => "ImageError",
            Self::DegenerateQuad(_) => "DegenerateQuadError",
            Self::InvalidBuffer(_) => "InvalidBufferError",
            Self::PageNotFound(_) => "PageNotFoundError",
            Self::PdfEncoding(_) => "PdfEncodingError",
            Self::PdfRead(_) => "PdfReadError",
            Self::Worker { name, .. } => name,
            Self::WorkerTransport(_) => "WorkerTransportError",
            Self::Timeout(_) => "TimeoutError",
            Self::Cancelled(_) => "CancelledError",
            Self::Config(_) => "ConfigError",
            Self::Io(_) => "IoError",
            Self::Serialization(_) => "SerializationError",
        }
    }

    /// The variant's payload without the display prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::Image(d)
            | Self::DegenerateQuad(d)
            | Self::InvalidBuffer(d)
            | Self::PageNotFound(d)
            | Self::PdfEncoding(d)
            | Self::PdfRead(d)
            | Self::WorkerTransport(d)
            | Self::Timeout(d)
            | Self::Cancelled(d)
            | Self::Config(d) => d.clone(),
            Self::Worker { message, .. } => message.clone(),
            Self::Io(err) => err.to_string(),
            Self::Serialization(err) => err.to_string(),
        }
    }

    /// Flatten into the `{message, name, stack}` wire shape.
    pub fn to_serialized(&self, stack: Option<String>) -> SerializedError {
        let stack = match self {
            Self::Worker { stack: Some(s), .. } => Some(s.clone()),
            _ => stack,
        };
        SerializedError {
            message: self.detail(),
            name: self.name().to_string(),
            stack,
        }
    }

    /// Rebuild an error received from a worker.
    ///
    /// Known names map back onto their original variant so a remote failure
    /// looks the same to the caller as a local one. I/O and serde errors
    /// cannot be reconstructed exactly and are carried as `Worker`.
    pub fn from_serialized(err: SerializedError) -> Self {
        let SerializedError {
            message,
            name,
            stack,
        } = err;
        match name.as_str() {
            "ImageError" => Self::Image(message),
            "DegenerateQuadError" => Self::DegenerateQuad(message),
            "InvalidBufferError" => Self::InvalidBuffer(message),
            "PageNotFoundError" => Self::PageNotFound(message),
            "PdfEncodingError" => Self::PdfEncoding(message),
            "PdfReadError" => Self::PdfRead(message),
            "WorkerTransportError" => Self::WorkerTransport(message),
            "TimeoutError" => Self::Timeout(message),
            "CancelledError" => Self::Cancelled(message),
            "ConfigError" => Self::Config(message),
            _ => Self::Worker {
                name,
                message,
                stack,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_variant_survives_wire_round_trip() {
        let original = ScanError::DegenerateQuad("zero area".into());
        let wire = original.to_serialized(None);
        assert_eq!(wire.name, "DegenerateQuadError");
        assert_eq!(wire.message, "zero area");

        let rebuilt = ScanError::from_serialized(wire);
        assert!(matches!(rebuilt, ScanError::DegenerateQuad(ref m) if m == "zero area"));
        assert_eq!(rebuilt.to_string(), original.to_string());
    }

    #[test]
    fn unknown_name_keeps_stack() {
        let wire = SerializedError {
            message: "boom".into(),
            name: "Panic".into(),
            stack: Some("at worker-0".into()),
        };
        let rebuilt = ScanError::from_serialized(wire.clone());
        assert_eq!(rebuilt.name(), "Panic");
        assert_eq!(rebuilt.to_string(), "Panic: boom");
        assert_eq!(rebuilt.to_serialized(None), wire);
    }

    #[test]
    fn serialized_error_omits_missing_stack() {
        let wire = ScanError::Image("bad".into()).to_serialized(None);
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json, serde_json::json!({"message": "bad", "name": "ImageError"}));
    }
}
