use serde::{Deserialize, Serialize};

/// Handle on a parsing job created on the external parsing service
///
/// The id is opaque: it is only ever sent back to the service, never interpreted.
#[derive(Debug, Clone)]
pub struct ParseJobHandle {
    pub id: String,
}

/// Status of a parsing job, as reported by the external service
///
/// The vocabulary belongs to the service, not to us: we only distinguish the
/// two terminal statuses from everything else. An unknown status means the job
/// is still running and we keep polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseJobStatus {
    Success,
    Error,
    InProgress,
}

impl From<&str> for ParseJobStatus {
    fn from(status: &str) -> Self {
        match status {
            "SUCCESS" => ParseJobStatus::Success,
            "ERROR" => ParseJobStatus::Error,
            _ => ParseJobStatus::InProgress,
        }
    }
}

/// Outcome of a successfully parsed job
///
/// Built once when the job reaches its success terminal status, immutable afterwards.
/// Serialized in camelCase as it is embedded as-is in the persisted record and
/// in the HTTP response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub job_id: String,
    /// Terminal status reported by the service (always its success vocabulary)
    pub status: String,
    /// Rendered content fetched from the service, verbatim
    pub parsed_content: String,
    /// Last job status payload returned by the service
    pub metadata: serde_json::Value,
}
