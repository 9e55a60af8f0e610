use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Errors returned by the D3 client
///
/// Every variant exposes the same base shape through [`D3Error::message`],
/// [`D3Error::status_code`], [`D3Error::code`] and [`D3Error::details`].
#[derive(Error, Debug)]
pub enum D3Error {
    /// A local precondition failed before any network call was made
    #[error("{message}")]
    Validation { message: String },

    /// The API answered with a non-success response or an error envelope
    #[error("{message}")]
    Api {
        message: String,
        status: Option<u16>,
        code: Option<i64>,
        details: Option<Value>,
    },

    /// The multipart upload protocol failed
    #[error("{message}")]
    Upload {
        message: String,
        part_number: Option<u32>,
        status: Option<u16>,
        code: Option<i64>,
        details: Option<Value>,
    },

    /// Status polling hit its deadline before a terminal state was observed
    #[error("polling timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

impl D3Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn api(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Api {
            message: message.into(),
            status,
            code: None,
            details: None,
        }
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload {
            message: message.into(),
            part_number: None,
            status: None,
            code: None,
            details: None,
        }
    }

    /// Upload error attributed to a single part
    pub fn upload_part(part_number: u32, message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Upload {
            message: message.into(),
            part_number: Some(part_number),
            status,
            code: None,
            details: None,
        }
    }

    /// Re-tag an error raised by an upload handshake call as an upload error
    ///
    /// Message, status, code and details are kept as they are.
    pub(crate) fn into_upload(self) -> Self {
        match self {
            Self::Api {
                message,
                status,
                code,
                details,
            } => Self::Upload {
                message,
                part_number: None,
                status,
                code,
                details,
            },
            other => other,
        }
    }

    /// Record the server-side upload id in the error details
    ///
    /// Details sent by the API are kept; the id is added next to them.
    pub(crate) fn with_upload_id(mut self, upload_id: &str) -> Self {
        if let Self::Api { details, .. } | Self::Upload { details, .. } = &mut self {
            match details {
                Some(Value::Object(map)) => {
                    map.entry("upload_id")
                        .or_insert_with(|| Value::String(upload_id.to_string()));
                }
                Some(_) => {}
                None => *details = Some(serde_json::json!({ "upload_id": upload_id })),
            }
        }
        self
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// HTTP status associated with the error
    ///
    /// Validation errors report 400, mirroring what the service would answer.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Validation { .. } => Some(400),
            Self::Api { status, .. } | Self::Upload { status, .. } => *status,
            Self::Timeout { .. } => None,
        }
    }

    /// Service-specific numeric error code, when the API sent one
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Api { code, .. } | Self::Upload { code, .. } => *code,
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Api { details, .. } | Self::Upload { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Part number that failed, for per-part upload errors
    pub fn part_number(&self) -> Option<u32> {
        match self {
            Self::Upload { part_number, .. } => *part_number,
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    pub fn is_upload(&self) -> bool {
        matches!(self, Self::Upload { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Api {
                message,
                status: Some(status),
                ..
            } => format!("API Error ({}): {}", status, message),
            Self::Upload {
                message,
                details: Some(details),
                ..
            } => match details.get("upload_id").and_then(Value::as_str) {
                Some(upload_id) => format!(
                    "{}\n\nThe server-side upload '{}' was left incomplete and will not be resumed.",
                    message, upload_id
                ),
                None => message.clone(),
            },
            _ => self.to_string(),
        }
    }
}

/// Result type for D3 client operations
pub type Result<T> = std::result::Result<T, D3Error>;

/// Describe a failed HTTP request without its URL
///
/// reqwest's own text is only "error sending request"; the cause chain and
/// the failure kind are appended so timeouts and refused connections can be
/// told apart.
pub(crate) fn describe_request_error(e: reqwest::Error) -> String {
    let kind = if e.is_timeout() {
        Some("timed out")
    } else if e.is_connect() {
        Some("connection failed")
    } else {
        None
    };

    let e = e.without_url();
    let mut message = e.to_string();
    let mut source = std::error::Error::source(&e);
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = std::error::Error::source(cause);
    }

    match kind {
        Some(kind) => format!("{} ({})", message, kind),
        None => message,
    }
}
