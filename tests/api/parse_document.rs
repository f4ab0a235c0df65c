use chrono::{DateTime, Utc};

use crate::helpers::{spawn_app, MockParserScenario};

#[tokio::test]
async fn parse_document_returns_a_400_and_calls_nothing_upstream_when_no_file_is_provided() {
    // Arrange
    let app = spawn_app(MockParserScenario::SucceedAfter {
        pending_polls: 0,
        content: "unused".to_string(),
    })
    .await;

    // Act
    let response = app.post_without_file().await;

    // Assert
    assert_eq!(400, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "error": "No file uploaded" }));

    assert_eq!(0, app.mock_parser.upload_count());
    assert_eq!(0, app.mock_parser.poll_count());
}

#[tokio::test]
async fn parse_document_persists_the_fetched_content_on_upstream_success() {
    // Arrange
    let parsed_content = "# Quarterly report\n\nRevenue went up.\n";
    let app = spawn_app(MockParserScenario::SucceedAfter {
        pending_polls: 2,
        content: parsed_content.to_string(),
    })
    .await;

    // Act
    let response = app.post_file("report.pdf", "%PDF-1.4 fake content").await;

    // Assert
    assert_eq!(200, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Document parsed successfully");
    assert_eq!(body["data"]["jobId"], app.mock_parser.job_id);
    assert_eq!(body["data"]["status"], "SUCCESS");
    assert_eq!(body["data"]["parsedContent"], parsed_content);

    // The record is persisted at a path derived from the original file name
    let output_path = app.output_dir.path().join("parsed_report.json");
    assert_eq!(body["outputFile"], output_path.display().to_string());

    let record: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output_path).unwrap()).unwrap();
    assert_eq!(record["originalFileName"], "report.pdf");
    assert_eq!(record["content"]["jobId"], app.mock_parser.job_id);
    assert_eq!(record["content"]["parsedContent"], parsed_content);
    record["parsedAt"]
        .as_str()
        .unwrap()
        .parse::<DateTime<Utc>>()
        .expect("parsedAt is not a valid ISO-8601 timestamp");

    // 2 pending polls + 1 successful one
    assert_eq!(3, app.mock_parser.poll_count());
}

#[tokio::test]
async fn parse_document_fails_with_the_upstream_message_when_parsing_fails() {
    // Arrange
    let app = spawn_app(MockParserScenario::FailWith {
        error: Some("bad scan".to_string()),
    })
    .await;

    // Act
    let response = app.post_file("report.pdf", "%PDF-1.4 fake content").await;

    // Assert
    assert_eq!(500, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "error": "Parsing failed: bad scan" }));
}

#[tokio::test]
async fn parse_document_fails_with_a_generic_message_when_upstream_gives_no_details() {
    // Arrange
    let app = spawn_app(MockParserScenario::FailWith { error: None }).await;

    // Act
    let response = app.post_file("report.pdf", "%PDF-1.4 fake content").await;

    // Assert
    assert_eq!(500, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "error": "Parsing failed: Unknown error" })
    );
}

#[tokio::test]
async fn parse_document_times_out_and_persists_nothing_when_the_job_never_terminates() {
    // Arrange
    let app = spawn_app(MockParserScenario::NeverTerminal).await;

    // Act
    let response = app.post_file("report.pdf", "%PDF-1.4 fake content").await;

    // Assert
    assert_eq!(500, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "error": "Parsing timed out" }));

    // The attempt budget bounds the loop (5 in the test configuration)
    assert_eq!(5, app.mock_parser.poll_count());

    // No record was persisted
    let nb_records = std::fs::read_dir(app.output_dir.path()).unwrap().count();
    assert_eq!(0, nb_records);
}

#[tokio::test]
async fn parse_document_fails_when_the_upload_response_carries_no_job_id() {
    // Arrange
    let app = spawn_app(MockParserScenario::MalformedUploadResponse).await;

    // Act
    let response = app.post_file("report.pdf", "%PDF-1.4 fake content").await;

    // Assert
    assert_eq!(500, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "error": "Malformed response from the parsing service: no `id` field in the upload response" })
    );

    // No job id to poll with
    assert_eq!(0, app.mock_parser.poll_count());
}

#[tokio::test]
async fn the_buffered_upload_is_removed_after_a_successful_request() {
    // Arrange
    let app = spawn_app(MockParserScenario::SucceedAfter {
        pending_polls: 0,
        content: "# Parsed\n".to_string(),
    })
    .await;

    // Act
    let response = app.post_file("report.pdf", "%PDF-1.4 fake content").await;

    // Assert
    assert_eq!(200, response.status().as_u16());

    let nb_buffered_uploads = std::fs::read_dir(app.upload_dir.path()).unwrap().count();
    assert_eq!(0, nb_buffered_uploads);
}

#[tokio::test]
async fn the_buffered_upload_is_removed_after_a_failed_request() {
    // Arrange
    let app = spawn_app(MockParserScenario::FailWith {
        error: Some("bad scan".to_string()),
    })
    .await;

    // Act
    let response = app.post_file("report.pdf", "%PDF-1.4 fake content").await;

    // Assert
    assert_eq!(500, response.status().as_u16());

    let nb_buffered_uploads = std::fs::read_dir(app.upload_dir.path()).unwrap().count();
    assert_eq!(0, nb_buffered_uploads);
}

#[tokio::test]
async fn parse_document_surfaces_upstream_unavailability_when_the_upload_is_rejected() {
    // Arrange
    let app = spawn_app(MockParserScenario::RejectUpload { status_code: 503 }).await;

    // Act
    let response = app.post_file("report.pdf", "%PDF-1.4 fake content").await;

    // Assert
    assert_eq!(500, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "error": "Upstream parsing service returned 503 Service Unavailable" })
    );

    // The job was never created: no status check could happen
    assert_eq!(0, app.mock_parser.poll_count());
}

#[tokio::test]
async fn parsing_the_same_file_name_twice_overwrites_the_record() {
    // Arrange
    let app = spawn_app(MockParserScenario::SucceedAfter {
        pending_polls: 0,
        content: "# Parsed\n".to_string(),
    })
    .await;
    let output_path = app.output_dir.path().join("parsed_report.json");

    // Act
    let first_response = app.post_file("report.pdf", "first upload").await;
    assert_eq!(200, first_response.status().as_u16());
    let first_record: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output_path).unwrap()).unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let second_response = app.post_file("report.pdf", "second upload").await;
    assert_eq!(200, second_response.status().as_u16());
    let second_record: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output_path).unwrap()).unwrap();

    // Assert: same path, one record, last writer wins
    let nb_records = std::fs::read_dir(app.output_dir.path()).unwrap().count();
    assert_eq!(1, nb_records);

    let first_parsed_at: DateTime<Utc> = first_record["parsedAt"].as_str().unwrap().parse().unwrap();
    let second_parsed_at: DateTime<Utc> =
        second_record["parsedAt"].as_str().unwrap().parse().unwrap();
    assert!(second_parsed_at > first_parsed_at);
}
