use tracing::info;

use crate::client::D3Client;
use crate::error::{D3Error, Result};
use crate::models::{
    Notes, Operation, OperationRequest, SupportedOperation, SupportedOperationQuery,
};

/// Compression level sent when the caller does not pick one
pub const DEFAULT_COMPRESSION: &str = "recommended";

impl D3Client {
    /// Check whether an action is supported for a file extension
    pub async fn check_supported_operation(
        &self,
        query: &SupportedOperationQuery,
    ) -> Result<SupportedOperation> {
        if query.ext.trim().is_empty() {
            return Err(D3Error::validation("extension (ext) is required"));
        }

        self.post_json(
            "/supported-operation",
            query,
            "failed to check supported operation",
        )
        .await
    }

    /// Submit an operation over uploaded files
    ///
    /// # Errors
    ///
    /// - `D3Error::Validation` if the action or the file key list is empty
    /// - `D3Error::Api` if the service rejects the request
    pub async fn create_operation(&self, request: &OperationRequest) -> Result<Operation> {
        if request.action.trim().is_empty() {
            return Err(D3Error::validation("action is required"));
        }
        if request.file_keys.is_empty() {
            return Err(D3Error::validation("at least one file key is required"));
        }

        let operation: Operation = self
            .post_json("/do", request, "failed to create operation")
            .await?;

        info!(
            "Created '{}' operation over {} file(s): task {}",
            request.action,
            request.file_keys.len(),
            operation.main_task_id
        );

        Ok(operation)
    }

    /// Convert files to another format, e.g. `"png"`
    pub async fn convert(
        &self,
        file_keys: impl IntoIterator<Item = impl Into<String>>,
        convert_to: &str,
        notes: Option<Notes>,
    ) -> Result<Operation> {
        let request = OperationRequest::new("convert", file_keys)
            .parameter("convert_to", convert_to)
            .notes(notes);
        self.create_operation(&request).await
    }

    /// Compress files; `None` uses the service's recommended level
    pub async fn compress(
        &self,
        file_keys: impl IntoIterator<Item = impl Into<String>>,
        compression_value: Option<&str>,
        notes: Option<Notes>,
    ) -> Result<Operation> {
        let level = compression_value
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_COMPRESSION);
        let request = OperationRequest::new("compress", file_keys)
            .parameter("compression_value", level)
            .notes(notes);
        self.create_operation(&request).await
    }

    pub async fn merge(
        &self,
        file_keys: impl IntoIterator<Item = impl Into<String>>,
        notes: Option<Notes>,
    ) -> Result<Operation> {
        let request = OperationRequest::new("merge", file_keys).notes(notes);
        self.create_operation(&request).await
    }

    /// Bundle files into a ZIP archive
    pub async fn zip(
        &self,
        file_keys: impl IntoIterator<Item = impl Into<String>>,
        notes: Option<Notes>,
    ) -> Result<Operation> {
        let request = OperationRequest::new("zip", file_keys).notes(notes);
        self.create_operation(&request).await
    }

    /// Generate shareable links
    pub async fn share(
        &self,
        file_keys: impl IntoIterator<Item = impl Into<String>>,
        notes: Option<Notes>,
    ) -> Result<Operation> {
        let request = OperationRequest::new("share", file_keys).notes(notes);
        self.create_operation(&request).await
    }

    pub async fn lock_pdf(
        &self,
        file_keys: impl IntoIterator<Item = impl Into<String>>,
        password: &str,
        notes: Option<Notes>,
    ) -> Result<Operation> {
        let request = OperationRequest::new("lock", file_keys)
            .parameter("password", password)
            .notes(notes);
        self.create_operation(&request).await
    }

    pub async fn unlock_pdf(
        &self,
        file_keys: impl IntoIterator<Item = impl Into<String>>,
        password: &str,
        notes: Option<Notes>,
    ) -> Result<Operation> {
        let request = OperationRequest::new("unlock", file_keys)
            .parameter("password", password)
            .notes(notes);
        self.create_operation(&request).await
    }

    pub async fn reset_pdf_password(
        &self,
        file_keys: impl IntoIterator<Item = impl Into<String>>,
        old_password: &str,
        new_password: &str,
        notes: Option<Notes>,
    ) -> Result<Operation> {
        let request = OperationRequest::new("reset_password", file_keys)
            .parameter("old_password", old_password)
            .parameter("new_password", new_password)
            .notes(notes);
        self.create_operation(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_client(mock_url: &str) -> D3Client {
        D3Client::new(ClientConfig::new("test-key").base_url(mock_url)).unwrap()
    }

    async fn mount_do(mock_server: &MockServer, expected_body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/v1/biz/do"))
            .and(body_json(expected_body))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": { "main_task_id": "task-123" } })),
            )
            .expect(1)
            .mount(mock_server)
            .await;
    }

    #[tokio::test]
    async fn test_convert_sends_parameters() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        mount_do(
            &mock_server,
            json!({
                "action": "convert",
                "file_keys": ["file-key-123"],
                "parameters": { "convert_to": "png" }
            }),
        )
        .await;

        let operation = client.convert(["file-key-123"], "png", None).await.unwrap();
        assert_eq!(operation.main_task_id, "task-123");
    }

    #[tokio::test]
    async fn test_compress_defaults_to_recommended() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        mount_do(
            &mock_server,
            json!({
                "action": "compress",
                "file_keys": ["a", "b"],
                "parameters": { "compression_value": "recommended" },
                "notes": { "source": "test" }
            }),
        )
        .await;

        let notes = Notes::from([("source".to_string(), "test".to_string())]);
        let operation = client
            .compress(vec!["a".to_string(), "b".to_string()], None, Some(notes))
            .await
            .unwrap();
        assert_eq!(operation.main_task_id, "task-123");
    }

    #[tokio::test]
    async fn test_reset_password_parameters() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        mount_do(
            &mock_server,
            json!({
                "action": "reset_password",
                "file_keys": ["pdf-1"],
                "parameters": { "old_password": "old", "new_password": "new" }
            }),
        )
        .await;

        client
            .reset_pdf_password(["pdf-1"], "old", "new", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_merge_sends_no_parameters() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        mount_do(
            &mock_server,
            json!({ "action": "merge", "file_keys": ["a", "b", "c"] }),
        )
        .await;

        client.merge(["a", "b", "c"], None).await.unwrap();
    }

    #[tokio::test]
    async fn test_camel_case_task_id_is_accepted() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/v1/biz/do"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": { "mainTaskId": "task-9" } })),
            )
            .mount(&mock_server)
            .await;

        let operation = client.zip(["a"], None).await.unwrap();
        assert_eq!(operation.main_task_id, "task-9");
    }

    #[tokio::test]
    async fn test_create_operation_validation() {
        let client = create_test_client("http://127.0.0.1:1");

        let err = client
            .create_operation(&OperationRequest::new("", ["a"]))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.message(), "action is required");

        let err = client
            .create_operation(&OperationRequest::new("convert", Vec::<String>::new()))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.message(), "at least one file key is required");
    }

    #[tokio::test]
    async fn test_create_operation_api_error() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/v1/biz/do"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "message": "file key not found" })),
            )
            .mount(&mock_server)
            .await;

        let err = client.share(["missing"], None).await.unwrap_err();
        assert!(err.is_api());
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.message(), "failed to create operation: file key not found");
    }

    #[tokio::test]
    async fn test_check_supported_operation() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/v1/biz/supported-operation"))
            .and(body_json(json!({ "ext": "pdf" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "supported": true,
                    "ext": "pdf",
                    "available_actions": ["convert", "compress", "merge"]
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client
            .check_supported_operation(&SupportedOperationQuery::new("pdf"))
            .await
            .unwrap();

        assert!(result.supported);
        assert_eq!(result.ext, "pdf");
        assert_eq!(
            result.available_actions,
            Some(vec![
                "convert".to_string(),
                "compress".to_string(),
                "merge".to_string()
            ])
        );
    }

    #[tokio::test]
    async fn test_check_supported_operation_requires_ext() {
        let client = create_test_client("http://127.0.0.1:1");
        let err = client
            .check_supported_operation(&SupportedOperationQuery::new(" "))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
