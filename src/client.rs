use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{D3Error, Result, describe_request_error};
use crate::upload::PartTransport;

/// Path prefix of every API endpoint
pub const API_PREFIX: &str = "/v1/biz";

/// Client for the D3 file-processing API
///
/// Configuration is fixed at construction. The client is cheap to clone and
/// independent calls may run concurrently.
#[derive(Clone)]
pub struct D3Client {
    http: reqwest::Client,
    transport: PartTransport,
    base_url: String,
    timeout: Duration,
}

impl std::fmt::Debug for D3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // the credential lives inside the default headers and is never printed
        f.debug_struct("D3Client")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl D3Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api_key = config.resolved_api_key()?;
        let base_url = config.resolved_base_url()?;
        let timeout = config.resolved_timeout();
        let headers = build_headers(api_key, &config)?;

        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| D3Error::validation(format!("failed to build HTTP client: {}", e)))?;

        // only the connect phase of a part PUT is bounded
        let transport = PartTransport::new(timeout)?;

        debug!("D3 client configured for {}", base_url);

        Ok(Self {
            http,
            transport,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn transport(&self) -> &PartTransport {
        &self.transport
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    /// Endpoint URL with every segment percent-encoded
    ///
    /// A `/`, `?` or `#` inside a segment stays part of that segment.
    pub(crate) fn endpoint_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint("")).map_err(|e| {
            D3Error::validation(format!("base URL '{}' is not a valid URL: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| D3Error::validation(format!("base URL '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B, context: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.post(self.endpoint(path)).json(body);
        self.send(request, &format!("{}{}", API_PREFIX, path), context)
            .await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        context: &str,
    ) -> Result<T> {
        let url = self.endpoint_url(segments)?;
        let path = url.path().to_string();
        self.send(self.http.get(url), &path, context).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
        context: &str,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| D3Error::api(format!("{}: {}", context, describe_request_error(e)), None))?;

        debug!("{} -> {}", path, response.status().as_u16());

        decode_envelope(response, context).await
    }
}

fn build_headers(api_key: &str, config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
        .map_err(|_| D3Error::validation("API key contains characters not allowed in a header"))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);

    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| D3Error::validation(format!("invalid header name '{}'", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| D3Error::validation(format!("invalid value for header '{}'", name)))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

/// Unwrap the `{"data": ...}` envelope, mapping failures to API errors
async fn decode_envelope<T: DeserializeOwned>(response: Response, context: &str) -> Result<T> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| D3Error::api(format!("{}: {}", context, e), Some(status.as_u16())))?;

    if !status.is_success() {
        return Err(error_from_body(status, &bytes, context));
    }

    let mut body: Value = serde_json::from_slice(&bytes).map_err(|e| {
        D3Error::api(
            format!("{}: invalid JSON response: {}", context, e),
            Some(status.as_u16()),
        )
    })?;

    match body.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => serde_json::from_value(data).map_err(|e| {
            D3Error::api(
                format!("{}: unexpected response shape: {}", context, e),
                Some(status.as_u16()),
            )
        }),
        _ => Err(error_from_body(status, &bytes, context)),
    }
}

fn error_from_body(status: StatusCode, bytes: &[u8], context: &str) -> D3Error {
    let body: Option<Value> = serde_json::from_slice(bytes).ok();
    let field = |names: &[&str]| -> Option<Value> {
        let body = body.as_ref()?;
        names
            .iter()
            .find_map(|n| body.get(*n).filter(|v| !v.is_null()).cloned())
    };

    let message = field(&["message", "error"])
        .and_then(|v| v.as_str().map(str::to_string))
        .or_else(|| {
            if status.is_success() {
                Some("response did not contain data".to_string())
            } else {
                status.canonical_reason().map(str::to_string)
            }
        })
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    D3Error::Api {
        message: format!("{}: {}", context, message),
        status: Some(status.as_u16()),
        code: field(&["code"]).and_then(|v| v.as_i64()),
        details: field(&["details", "errors"]),
    }
}
