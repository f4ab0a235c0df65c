use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::parse_job::ParseResult;

/// Record persisted on disk for each parsed document
///
/// Serialized in camelCase, with `parsed_at` as an ISO-8601 timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRecord {
    /// File name received from the user
    pub original_file_name: String,
    pub parsed_at: DateTime<Utc>,
    pub content: ParseResult,
}
