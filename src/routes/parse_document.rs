use std::path::{Path, PathBuf};

use actix_multipart::form::{tempfile::TempFile, MultipartForm};
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{web::Data, HttpResponse, ResponseError};
use serde_json::json;
use tracing::{info, warn};

use crate::domain::entities::parse_job::ParseResult;
use crate::helper::error_chain_fmt;
use crate::repositories::parse_job_http_repository::{
    ParseJobHttpRepository, ParseJobHttpRepositoryError,
};
use crate::repositories::parsed_record_fs_repository::{
    ParsedRecordFsRepository, ParsedRecordFsRepositoryError,
};

#[derive(Debug, MultipartForm)]
pub struct UploadForm {
    #[multipart(rename = "file")]
    files: Vec<TempFile>,
}

/// Relays an uploaded document to the parsing service and persists the result
///
/// One linear flow per request: upload the file to the service, poll the
/// created job until terminal, fetch the content, save the record. The first
/// `file` part of the form is used; extra parts are ignored.
#[tracing::instrument(name = "Parse document handler", skip_all)]
pub async fn parse_document(
    MultipartForm(form): MultipartForm<UploadForm>,
    parse_job_repository: Data<ParseJobHttpRepository>,
    parsed_record_repository: Data<ParsedRecordFsRepository>,
) -> Result<HttpResponse, ParseDocumentError> {
    let uploaded_file = form
        .files
        .into_iter()
        .next()
        .ok_or(ParseDocumentError::NoFileProvided)?;

    let original_file_name = uploaded_file
        .file_name
        .clone()
        .unwrap_or_else(|| "unnamed".to_owned());

    info!(original_file_name, "Received file to parse");

    // The workflow outcome is captured before touching the buffered upload,
    // so the temporary file is removed on every exit path
    let outcome = relay_and_persist(
        uploaded_file.file.path(),
        &original_file_name,
        &parse_job_repository,
        &parsed_record_repository,
    )
    .await;

    if let Err(error) = uploaded_file.file.close() {
        warn!(?error, "Failed to remove the buffered upload");
    }

    let (output_path, result) = outcome?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Document parsed successfully",
        "outputFile": output_path.display().to_string(),
        "data": result,
    })))
}

async fn relay_and_persist(
    buffered_file_path: &Path,
    original_file_name: &str,
    parse_job_repository: &ParseJobHttpRepository,
    parsed_record_repository: &ParsedRecordFsRepository,
) -> Result<(PathBuf, ParseResult), ParseDocumentError> {
    let job = parse_job_repository
        .submit_file(buffered_file_path, original_file_name)
        .await?;

    let result = parse_job_repository
        .await_result(&job.id, parse_job_repository.max_poll_attempts())
        .await?;

    let output_path = parsed_record_repository
        .save_record(original_file_name, result.clone())
        .await?;

    Ok((output_path, result))
}

#[derive(thiserror::Error)]
pub enum ParseDocumentError {
    #[error("No file uploaded")]
    NoFileProvided,
    #[error(transparent)]
    ParseJobError(#[from] ParseJobHttpRepositoryError),
    #[error("Failed to persist the parsed record: {0}")]
    PersistenceError(#[from] ParsedRecordFsRepositoryError),
}

impl std::fmt::Debug for ParseDocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for ParseDocumentError {
    fn status_code(&self) -> StatusCode {
        match self {
            ParseDocumentError::NoFileProvided => StatusCode::BAD_REQUEST,
            ParseDocumentError::ParseJobError(_) | ParseDocumentError::PersistenceError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    #[tracing::instrument(name = "Response error from parse_document handler", skip(self), fields(error = %self))]
    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(json!({ "error": self.to_string() }))
    }
}
