use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::{
    configuration::StorageSettings,
    domain::entities::{parse_job::ParseResult, parsed_record::ParsedRecord},
    helper::error_chain_fmt,
};

/// Stores parsed records as JSON files on the local filesystem
pub struct ParsedRecordFsRepository {
    output_dir: PathBuf,
}

#[derive(thiserror::Error)]
pub enum ParsedRecordFsRepositoryError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    SerializationError(#[from] serde_json::Error),
}

impl std::fmt::Debug for ParsedRecordFsRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ParsedRecordFsRepository {
    pub fn new(settings: &StorageSettings) -> Self {
        Self {
            output_dir: PathBuf::from(&settings.output_dir),
        }
    }

    /// Wraps a parse result into a record and writes it to the storage path
    /// derived from the original file name
    ///
    /// The output directory is created if it does not exist yet. An existing
    /// record at the same path is overwritten: re-parsing a file with the same
    /// name keeps the last result only.
    ///
    /// # Returns
    /// The path the record was written to.
    #[tracing::instrument(name = "Saving parsed record", skip(self, result))]
    pub async fn save_record(
        &self,
        original_file_name: &str,
        result: ParseResult,
    ) -> Result<PathBuf, ParsedRecordFsRepositoryError> {
        let record = ParsedRecord {
            original_file_name: original_file_name.to_owned(),
            parsed_at: Utc::now(),
            content: result,
        };

        let output_path = self.storage_path(original_file_name);

        tokio::fs::create_dir_all(&self.output_dir).await?;
        tokio::fs::write(&output_path, serde_json::to_string_pretty(&record)?).await?;

        info!(output_path = %output_path.display(), "Saved parsed record");
        Ok(output_path)
    }

    /// Derives the storage path of a record from the original file name:
    /// final extension stripped, `parsed_` prefix, `.json` extension
    ///
    /// Only the file name component of the original name is used, so a name
    /// containing path separators can never escape the output directory.
    fn storage_path(&self, original_file_name: &str) -> PathBuf {
        let original_name = Path::new(original_file_name);
        let stem = original_name
            .file_stem()
            .or_else(|| original_name.file_name())
            .unwrap_or_default()
            .to_string_lossy();

        self.output_dir.join(format!("parsed_{}.json", stem))
    }
}
