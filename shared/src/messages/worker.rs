//! Line-delimited JSON frames spoken over a pooled worker's stdio
//!
//! Requests go to the worker's stdin as one JSON object per line. Responses
//! come back on stdout carrying the request's correlation id.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{SharedError, SharedResult};
use crate::types::Tier;

/// Action name understood by the CV worker
pub const OPTIMIZE_ACTION: &str = "optimize_cv";

/// Request frame written to a worker's stdin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub id: Uuid,
    pub action: String,
    pub data: Value,
    pub plan: Tier,
}

impl WorkerRequest {
    pub fn optimize(id: Uuid, data: Value, plan: Tier) -> Self {
        Self {
            id,
            action: OPTIMIZE_ACTION.to_string(),
            data,
            plan,
        }
    }

    /// Serialize as a single newline-terminated line
    pub fn to_line(&self) -> SharedResult<Vec<u8>> {
        let mut line = serde_json::to_vec(self).map_err(|e| SharedError::ProtocolError {
            message: format!("failed to encode request {}: {e}", self.id),
        })?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Response frame read from a worker's stdout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerResponse {
    /// Read the correlation id of an arbitrary decoded frame
    pub fn correlation_id(frame: &Value) -> Option<Uuid> {
        frame
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
    }

    /// Split the frame into the worker's result or its reported error
    pub fn into_result(self) -> Result<Value, String> {
        match (self.result, self.error) {
            (Some(result), _) => Ok(result),
            (None, Some(error)) => Err(error),
            (None, None) => Err(format!(
                "response without result (status: {})",
                self.status.as_deref().unwrap_or("none")
            )),
        }
    }
}
