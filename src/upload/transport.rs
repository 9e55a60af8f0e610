use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, ETAG, HeaderMap};
use tracing::debug;

use crate::error::{D3Error, Result, describe_request_error};

/// Uploads single parts to presigned URLs
///
/// Uses its own HTTP client without the API credential: presigned URLs carry
/// their authorization in the query string and reject a second one.
///
/// Only connecting is time-limited. Once connected, a part transfer runs to
/// completion or failure however long it takes.
#[derive(Debug, Clone)]
pub struct PartTransport {
    client: reqwest::Client,
}

impl PartTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| D3Error::validation(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// PUT one part and return its ETag with surrounding quotes removed
    pub async fn put_part(
        &self,
        url: &str,
        part_number: u32,
        mime_type: &str,
        body: Vec<u8>,
    ) -> Result<String> {
        let len = body.len();
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, mime_type)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                D3Error::upload_part(
                    part_number,
                    format!(
                        "failed to upload part {}: {}",
                        part_number,
                        describe_request_error(e)
                    ),
                    None,
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(D3Error::upload_part(
                part_number,
                format!(
                    "failed to upload part {}: status {}",
                    part_number,
                    status.as_u16()
                ),
                Some(status.as_u16()),
            ));
        }

        let etag = extract_etag(response.headers()).ok_or_else(|| {
            D3Error::upload_part(
                part_number,
                format!("failed to get ETag for part {}", part_number),
                Some(status.as_u16()),
            )
        })?;

        debug!("Uploaded part {} ({} bytes), etag {}", part_number, len, etag);

        Ok(etag)
    }
}

/// ETag header value without surrounding quotes, `None` if missing or empty
///
/// Header lookup is case-insensitive.
pub fn extract_etag(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(ETAG)?.to_str().ok()?;
    let etag = raw.trim().trim_matches('"');
    (!etag.is_empty()).then(|| etag.to_string())
}
