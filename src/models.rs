//! Request and response shapes of the D3 API.
//!
//! The wire uses snake_case. Responses also deserialize from camelCase, and
//! [`camel_case_view`] renders any of them with camelCase keys, so there is a
//! single in-memory value behind both spellings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form operation parameters, e.g. `{"convert_to": "png"}`
pub type Parameters = Map<String, Value>;

/// Notes attached to an operation
pub type Notes = HashMap<String, String>;

/// Upload session issued by the initiate call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    #[serde(alias = "fileKey")]
    pub file_key: String,
    #[serde(alias = "uploadId", default)]
    pub upload_id: String,
    #[serde(alias = "presignedUrls", default)]
    pub presigned_urls: Vec<String>,
    #[serde(alias = "objectName", default)]
    pub object_name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct InitiateUploadRequest<'a> {
    pub file_name: &'a str,
    pub size: u64,
    pub mime_type: &'a str,
    pub parts: u32,
}

/// One uploaded part, as reported to the complete call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedPart {
    pub etag: String,
    pub part_number: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct CompleteUploadRequest<'a> {
    pub file_key: &'a str,
    pub upload_id: &'a str,
    pub object_name: &'a str,
    pub parts: &'a [UploadedPart],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteUploadResponse {
    #[serde(default)]
    pub message: String,
    #[serde(alias = "fileKey", default)]
    pub file_key: String,
}

/// Query for the supported-operation check
#[derive(Debug, Clone, Default, Serialize)]
pub struct SupportedOperationQuery {
    pub ext: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
}

impl SupportedOperationQuery {
    pub fn new(ext: impl Into<String>) -> Self {
        Self {
            ext: ext.into(),
            ..Self::default()
        }
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedOperation {
    pub supported: bool,
    #[serde(default)]
    pub ext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(
        alias = "availableActions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub available_actions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
}

/// Request body for `POST /do`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationRequest {
    pub action: String,
    pub file_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Notes>,
}

impl OperationRequest {
    pub fn new(
        action: impl Into<String>,
        file_keys: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            action: action.into(),
            file_keys: file_keys.into_iter().map(Into::into).collect(),
            parameters: None,
            notes: None,
        }
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters
            .get_or_insert_with(Parameters::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn notes(mut self, notes: Option<Notes>) -> Self {
        self.notes = notes;
        self
    }
}

/// Handle of a submitted operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(alias = "mainTaskId")]
    pub main_task_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Queued,
    Running,
    Completed,
    Failed,
    /// Any status this client does not know; treated as still in progress
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Per-file result inside a task status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    #[serde(alias = "fileKey")]
    pub file_key: String,
    pub status: String,
    #[serde(
        alias = "downloadLink",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub download_link: Option<String>,
    #[serde(alias = "errorCode", default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(
        alias = "errorMessage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error_message: Option<String>,
}

/// Snapshot of an operation's status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(alias = "operationStatus")]
    pub operation_status: OperationStatus,
    #[serde(alias = "filesData", default)]
    pub files_data: Vec<FileResult>,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        self.operation_status.is_terminal()
    }

    /// Download links of every file that produced one, in order
    pub fn download_links(&self) -> impl Iterator<Item = &str> {
        self.files_data
            .iter()
            .filter_map(|f| f.download_link.as_deref())
    }
}

/// Selects which task to query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusQuery {
    pub main_task_id: String,
    pub file_task_id: Option<String>,
}

impl StatusQuery {
    pub fn new(main_task_id: impl Into<String>) -> Self {
        Self {
            main_task_id: main_task_id.into(),
            file_task_id: None,
        }
    }

    pub fn file_task(mut self, file_task_id: impl Into<String>) -> Self {
        self.file_task_id = Some(file_task_id.into());
        self
    }
}

/// Serialize `value` with every object key converted to camelCase
pub fn camel_case_view<T: Serialize>(value: &T) -> serde_json::Result<Value> {
    serde_json::to_value(value).map(camelize)
}

fn camelize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (snake_to_camel(&k), camelize(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(camelize).collect()),
        other => other,
    }
}

fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_status_accepts_both_casings() {
        let snake: TaskStatus = serde_json::from_value(json!({
            "operation_status": "completed",
            "files_data": [{
                "file_key": "k1",
                "status": "completed",
                "download_link": "https://files.example.com/out.png"
            }]
        }))
        .unwrap();

        let camel: TaskStatus = serde_json::from_value(json!({
            "operationStatus": "completed",
            "filesData": [{
                "fileKey": "k1",
                "status": "completed",
                "downloadLink": "https://files.example.com/out.png"
            }]
        }))
        .unwrap();

        assert_eq!(snake, camel);
        assert!(snake.is_terminal());
        assert_eq!(
            snake.download_links().collect::<Vec<_>>(),
            vec!["https://files.example.com/out.png"]
        );
    }

    #[test]
    fn test_unknown_operation_status_is_not_terminal() {
        let status: TaskStatus =
            serde_json::from_value(json!({ "operation_status": "throttled" })).unwrap();
        assert_eq!(status.operation_status, OperationStatus::Unknown);
        assert!(!status.is_terminal());
        assert!(status.files_data.is_empty());
    }

    #[test]
    fn test_camel_case_view_mirrors_values() {
        let status = TaskStatus {
            operation_status: OperationStatus::Failed,
            files_data: vec![FileResult {
                file_key: "k1".to_string(),
                status: "failed".to_string(),
                download_link: None,
                error_code: Some("E_PASSWORD".to_string()),
                error_message: Some("wrong password".to_string()),
            }],
        };

        let view = camel_case_view(&status).unwrap();
        assert_eq!(
            view,
            json!({
                "operationStatus": "failed",
                "filesData": [{
                    "fileKey": "k1",
                    "status": "failed",
                    "errorCode": "E_PASSWORD",
                    "errorMessage": "wrong password"
                }]
            })
        );
    }

    #[test]
    fn test_snake_to_camel() {
        assert_eq!(snake_to_camel("main_task_id"), "mainTaskId");
        assert_eq!(snake_to_camel("ext"), "ext");
        assert_eq!(snake_to_camel("_private"), "private");
    }

    #[test]
    fn test_operation_request_serialization_skips_unset_fields() {
        let request = OperationRequest::new("merge", ["a", "b"]);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "action": "merge", "file_keys": ["a", "b"] })
        );

        let request = OperationRequest::new("convert", ["a"]).parameter("convert_to", "png");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "action": "convert",
                "file_keys": ["a"],
                "parameters": { "convert_to": "png" }
            })
        );
    }
}
