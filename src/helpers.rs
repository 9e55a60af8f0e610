use std::path::Path;

use serde_json::Value;

use crate::models::Parameters;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Resolve the Content-Type used for an upload
///
/// Order: explicit override, the system MIME table keyed on the declared
/// file name's extension, the built-in table, then `application/octet-stream`.
pub fn resolve_mime_type(file_name: &str, mime_override: Option<&str>) -> String {
    if let Some(mime) = mime_override.map(str::trim).filter(|m| !m.is_empty()) {
        return mime.to_string();
    }

    if let Some(mime) = mime_guess::from_path(file_name).first() {
        return mime.to_string();
    }

    detect_content_type(Path::new(file_name))
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

/// Built-in fallback for the formats the service handles
pub fn detect_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        // Document formats
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain",

        // Image formats
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",

        // Archive formats
        "zip" => "application/zip",

        // Media formats
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",

        _ => return None,
    };
    Some(mime)
}

/// Parse operation parameters from a `key1=value1,key2=value2` string
///
/// Values that parse as JSON scalars (numbers, booleans) keep their type;
/// everything else is sent as a string. Malformed pairs are skipped.
///
/// # Examples
///
/// ```
/// let params = d3_client::helpers::parse_parameters("convert_to=png,quality=90");
/// assert_eq!(params["convert_to"], "png");
/// assert_eq!(params["quality"], 90);
/// ```
pub fn parse_parameters(params_str: &str) -> Parameters {
    params_str
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            let value = value.trim();

            if key.is_empty() || value.is_empty() {
                None
            } else {
                Some((key.to_string(), parse_scalar(value)))
            }
        })
        .collect()
}

fn parse_scalar(value: &str) -> Value {
    match serde_json::from_str::<Value>(value) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) => v,
        _ => Value::String(value.to_string()),
    }
}
