//! Response envelope codec.
//!
//! # Design
//! The backend answers in one of four shapes: a wrapped success
//! (`{wasSuccessful: true, data}`), a wrapped or generic failure, a bare JSON
//! value, or a non-JSON body such as a file. `decode` picks the shape from the
//! `content-type` header first and the presence of `wasSuccessful` second,
//! then either unwraps the payload or produces a `ClassifiedError` whose
//! message is safe to show to a user.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ApiError, ClassifiedError};
use crate::http::HttpResponse;

/// Longest body excerpt appended to a synthesized error message.
pub const EXCERPT_LIMIT: usize = 200;

const JSON_MEDIA_TYPE: &str = "application/json";
const NOT_SUCCESSFUL: &str = "Request was not successful";

/// A decoded response.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// JSON payload, already unwrapped from its envelope.
    Data { status: u16, value: Value },
    /// Non-JSON success response, returned untouched.
    Raw(HttpResponse),
}

impl ApiResponse {
    /// Deserialize the JSON payload into `T`.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            ApiResponse::Data { status, value } => {
                serde_json::from_value(value).map_err(|e| ApiError::MalformedResponse {
                    status,
                    reason: e.to_string(),
                })
            }
            ApiResponse::Raw(response) => Err(unexpected_raw(&response)),
        }
    }

    pub fn into_value(self) -> Result<Value, ApiError> {
        match self {
            ApiResponse::Data { value, .. } => Ok(value),
            ApiResponse::Raw(response) => Err(unexpected_raw(&response)),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            ApiResponse::Data { status, .. } => *status,
            ApiResponse::Raw(response) => response.status,
        }
    }

    /// The untouched response, or `None` if the body was JSON.
    pub fn into_raw(self) -> Option<HttpResponse> {
        match self {
            ApiResponse::Raw(response) => Some(response),
            ApiResponse::Data { .. } => None,
        }
    }
}

fn unexpected_raw(response: &HttpResponse) -> ApiError {
    ApiError::MalformedResponse {
        status: response.status,
        reason: format!(
            "expected a JSON payload, got content-type {:?}",
            response.content_type().unwrap_or("")
        ),
    }
}

/// Classify a raw response into data or an error.
pub fn decode(response: HttpResponse) -> Result<ApiResponse, ApiError> {
    let is_json = response
        .content_type()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains(JSON_MEDIA_TYPE));

    if is_json {
        decode_json(response)
    } else if response.is_success() {
        Ok(ApiResponse::Raw(response))
    } else {
        Err(classify_text_failure(&response).into())
    }
}

fn decode_json(response: HttpResponse) -> Result<ApiResponse, ApiError> {
    if !response.is_success() {
        return Err(classify_text_failure(&response).into());
    }

    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ApiResponse::Data {
            status: response.status,
            value: Value::Null,
        });
    }

    let body: Value =
        serde_json::from_slice(&response.body).map_err(|e| ApiError::MalformedResponse {
            status: response.status,
            reason: e.to_string(),
        })?;

    let status = response.status;
    unwrap_envelope(body, status).map(|value| ApiResponse::Data { status, value })
}

/// Strip a `{wasSuccessful, data}` wrapper when present.
fn unwrap_envelope(body: Value, status: u16) -> Result<Value, ApiError> {
    let Value::Object(mut map) = body else {
        return Ok(body);
    };

    match map.get("wasSuccessful").and_then(Value::as_bool) {
        Some(true) if map.contains_key("data") => Ok(map.remove("data").unwrap_or(Value::Null)),
        Some(false) => {
            let message = pick_message(&map).unwrap_or_else(|| NOT_SUCCESSFUL.to_string());
            Err(build_error(message, &map, status).into())
        }
        _ => Ok(Value::Object(map)),
    }
}

/// Build the error for a non-2xx response, whatever its content type.
fn classify_text_failure(response: &HttpResponse) -> ClassifiedError {
    let status = response.status;
    let text = response.text();

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text) {
        let message = pick_message(&map).unwrap_or_else(|| server_error(response));
        return build_error(message, &map, status);
    }

    let mut message = server_error(response);
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        message.push_str(": ");
        message.push_str(&excerpt(trimmed, EXCERPT_LIMIT));
    }
    ClassifiedError::new(message, Some(status))
}

fn build_error(message: String, body: &Map<String, Value>, status: u16) -> ClassifiedError {
    let mut err = ClassifiedError::new(message, Some(status));
    if let Some(details) = body.get("errors").filter(|v| !v.is_null()) {
        let summary = summarize_validation(details);
        if !summary.is_empty() {
            err.message = format!("{} ({summary})", err.message);
        }
        err.validation_details = Some(details.clone());
    }
    err
}

/// First non-empty string among `message`, `title`, `error`.
fn pick_message(body: &Map<String, Value>) -> Option<String> {
    ["message", "title", "error"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn server_error(response: &HttpResponse) -> String {
    format!("Server error: {} {}", response.status, response.status_text())
        .trim_end()
        .to_string()
}

/// Render `{"Name": ["required"], "Age": ["too low", "not a number"]}` as
/// `Name: required; Age: too low, not a number`.
fn summarize_validation(details: &Value) -> String {
    match details {
        Value::Object(fields) => fields
            .iter()
            .map(|(field, value)| format!("{field}: {}", render_field(value)))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

fn render_field(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truncate to at most `limit` characters, marking the cut with `...`.
pub(crate) fn excerpt(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
