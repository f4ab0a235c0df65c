use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, Secret};
use tracing::info;

use crate::{
    configuration::ParserSettings,
    domain::entities::parse_job::{ParseJobHandle, ParseJobStatus, ParseResult},
    helper::error_chain_fmt,
};

/// Client to the external document-parsing service
///
/// Owns the three calls of a job lifecycle: the multipart upload creating the
/// job, the status checks, and the final content fetch. All state transitions
/// are observed from the service, never driven locally.
pub struct ParseJobHttpRepository {
    client: reqwest::Client,
    base_url: String,
    // To keep the credentials secret and avoid leaks in logs, we use Secret<String>
    // and only expose the token when building a request
    api_key: Secret<String>,
    parsing_instruction: String,
    poll_interval: Duration,
    max_poll_attempts: usize,
}

#[derive(thiserror::Error)]
pub enum ParseJobHttpRepositoryError {
    #[error("Upstream parsing service returned {status_code} {status_text}")]
    UpstreamUnavailable { status_code: u16, status_text: String },
    #[error("Malformed response from the parsing service: {0}")]
    MalformedResponse(String),
    #[error("Parsing failed: {0}")]
    ParsingFailed(String),
    #[error("Parsing timed out")]
    ParsingTimeout,
    #[error(transparent)]
    RequestError(#[from] reqwest::Error),
    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

impl std::fmt::Debug for ParseJobHttpRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ParseJobHttpRepository {
    pub fn new(settings: &ParserSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
            api_key: settings.api_key.to_owned(),
            parsing_instruction: settings.parsing_instruction.to_owned(),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            max_poll_attempts: settings.max_poll_attempts,
        }
    }

    /// Configured attempt budget of the poll loop
    pub fn max_poll_attempts(&self) -> usize {
        self.max_poll_attempts
    }

    /// Uploads a file to the parsing service, creating a parsing job
    ///
    /// The file is the one buffered on disk while handling the multipart request;
    /// it is read exactly once. `original_file_name` is the name received from
    /// the user, forwarded so the service can infer the document type.
    ///
    /// # Returns
    /// A handle on the created job, from the id found in the service response.
    #[tracing::instrument(name = "Uploading file to the parsing service", skip(self, file_path))]
    pub async fn submit_file(
        &self,
        file_path: &Path,
        original_file_name: &str,
    ) -> Result<ParseJobHandle, ParseJobHttpRepositoryError> {
        let file_content = tokio::fs::read(file_path).await?;

        let file_part = reqwest::multipart::Part::bytes(file_content)
            .file_name(original_file_name.to_owned());
        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("parsing_instruction", self.parsing_instruction.clone());

        let response = self
            .client
            .post(format!("{}/api/parsing/upload", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::upstream_unavailable(response.status()));
        }

        let body: serde_json::Value = response.json().await?;
        let job_id = body
            .get("id")
            .and_then(|id| id.as_str())
            .ok_or_else(|| {
                ParseJobHttpRepositoryError::MalformedResponse(
                    "no `id` field in the upload response".to_owned(),
                )
            })?
            .to_owned();

        info!(job_id, "Created parsing job");
        Ok(ParseJobHandle { id: job_id })
    }

    /// Polls the parsing service until the job reaches a terminal status,
    /// then fetches and returns the parsed content
    ///
    /// At most `max_attempts` status checks are made, with a fixed pause between
    /// two checks. All-or-nothing: no partial result is ever returned.
    ///
    /// # Errors
    /// - `ParsingFailed` when the service reports the job in error
    /// - `ParsingTimeout` when `max_attempts` checks were made without reaching a terminal status
    /// - `UpstreamUnavailable` when any of the calls themselves fail
    #[tracing::instrument(name = "Waiting for parsing job result", skip(self))]
    pub async fn await_result(
        &self,
        job_id: &str,
        max_attempts: usize,
    ) -> Result<ParseResult, ParseJobHttpRepositoryError> {
        for attempt in 1..=max_attempts {
            let status_payload = self.get_job_status(job_id).await?;

            // The vocabulary belongs to the service: a missing or unknown status
            // only means the job is not terminal yet
            let reported_status = status_payload
                .get("status")
                .and_then(|status| status.as_str())
                .unwrap_or_default()
                .to_owned();

            info!(attempt, status = reported_status, "Checked job status");

            match ParseJobStatus::from(reported_status.as_str()) {
                ParseJobStatus::Success => {
                    let parsed_content = self.fetch_parsed_content(job_id).await?;

                    return Ok(ParseResult {
                        job_id: job_id.to_owned(),
                        status: reported_status,
                        parsed_content,
                        metadata: status_payload,
                    });
                }
                ParseJobStatus::Error => {
                    let message = status_payload
                        .get("error")
                        .and_then(|error| error.as_str())
                        .unwrap_or("Unknown error")
                        .to_owned();

                    return Err(ParseJobHttpRepositoryError::ParsingFailed(message));
                }
                ParseJobStatus::InProgress => {
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        Err(ParseJobHttpRepositoryError::ParsingTimeout)
    }

    /// One authenticated status check, returning the raw status payload
    async fn get_job_status(
        &self,
        job_id: &str,
    ) -> Result<serde_json::Value, ParseJobHttpRepositoryError> {
        let response = self
            .client
            .get(format!("{}/api/parsing/job/{}", self.base_url, job_id))
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::upstream_unavailable(response.status()));
        }

        Ok(response.json().await?)
    }

    /// Fetches the rendered content of a successfully parsed job, verbatim
    async fn fetch_parsed_content(
        &self,
        job_id: &str,
    ) -> Result<String, ParseJobHttpRepositoryError> {
        let response = self
            .client
            .get(format!(
                "{}/api/parsing/job/{}/result/markdown",
                self.base_url, job_id
            ))
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::upstream_unavailable(response.status()));
        }

        Ok(response.text().await?)
    }

    fn upstream_unavailable(status: StatusCode) -> ParseJobHttpRepositoryError {
        ParseJobHttpRepositoryError::UpstreamUnavailable {
            status_code: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
        }
    }
}
