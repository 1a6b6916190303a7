// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Worker wire protocol.
//
//   request:  {"id": 7, "msg": {"type": "find-document", ...}, ...extra}
//   response: {"id": 7, "result": {...}, ...extra}
//             {"id": 7, "error": {"message": ..., "name": ..., "stack": ...}, ...extra}
//
// In-process the structs travel over channels as-is, so pixel buffers move
// into the worker and back without being copied. The serde shape is what the
// boundary looks like when it is serialised.

use docscan_core::error::{ScanError, SerializedError};
use docscan_core::{PixelBuffer, Quad};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Correlation identifier. Assigned by the pool, strictly increasing.
pub type RequestId = u64;

/// Pass-through fields carried from a request to its response unchanged.
pub type Extra = Map<String, Value>;

/// Operation requested of a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum WorkerMessage {
    /// Run boundary detection on a frame.
    FindDocument { pixels: PixelBuffer },
    /// Perspective-correct `quad` out of `pixels`.
    ExtractDocument {
        pixels: PixelBuffer,
        quad: Quad,
        target_width: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_height: Option<u32>,
    },
    /// Decode an encoded image file into pixels.
    GetData { bytes: Vec<u8> },
}

impl WorkerMessage {
    /// Wire name of the operation.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::FindDocument { .. } => "find-document",
            Self::ExtractDocument { .. } => "extract-document",
            Self::GetData { .. } => "get-data",
        }
    }
}

/// Successful result of a job. Input buffers are handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WorkerOutput {
    Boundary {
        quad: Option<Quad>,
        pixels: PixelBuffer,
    },
    Extracted {
        page: PixelBuffer,
        source: PixelBuffer,
    },
    Decoded {
        pixels: PixelBuffer,
    },
}

impl WorkerOutput {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Boundary { .. } => "boundary",
            Self::Extracted { .. } => "extracted",
            Self::Decoded { .. } => "decoded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub id: RequestId,
    pub msg: WorkerMessage,
    #[serde(flatten)]
    pub extra: Extra,
}

impl WorkerRequest {
    pub fn new(id: RequestId, msg: WorkerMessage) -> Self {
        Self {
            id,
            msg,
            extra: Extra::new(),
        }
    }
}

/// Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<WorkerOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SerializedError>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl WorkerResponse {
    pub fn success(id: RequestId, result: WorkerOutput, extra: Extra) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
            extra,
        }
    }

    pub fn failure(id: RequestId, error: SerializedError, extra: Extra) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
            extra,
        }
    }

    /// Rebuild the caller-side outcome. Errors come back as the variant the
    /// worker raised.
    pub fn into_result(self) -> Result<(WorkerOutput, Extra), ScanError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(ScanError::from_serialized(error)),
            (Some(result), None) => Ok((result, self.extra)),
            (None, None) => Err(ScanError::WorkerTransport(format!(
                "response {} carries neither result nor error",
                self.id
            ))),
        }
    }
}
