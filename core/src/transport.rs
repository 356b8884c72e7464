//! The HTTP fetch primitive.
//!
//! `Transport` executes one `HttpRequest` and returns the `HttpResponse`
//! whatever its status; only a failure to get any response at all is an
//! error. `ReqwestTransport` is the default implementation.

use std::future::Future;

use thiserror::Error;

use crate::http::{HttpRequest, HttpResponse};

/// No response was received.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use reqwest::multipart::{Form, Part as FormPart};

    use super::{Transport, TransportError};
    use crate::http::{HttpMethod, HttpRequest, HttpResponse, Part, RequestBody};

    /// `Transport` backed by a shared `reqwest::Client`.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    fn form(parts: Vec<Part>) -> Result<Form, TransportError> {
        parts.into_iter().try_fold(Form::new(), |form, part| match part {
            Part::Text { name, value } => Ok(form.text(name, value)),
            Part::File {
                name,
                file_name,
                mime_type,
                bytes,
            } => {
                let part = FormPart::bytes(bytes.to_vec())
                    .file_name(file_name)
                    .mime_str(&mime_type)
                    .map_err(|e| TransportError::new(format!("invalid mime type {mime_type:?}: {e}")))?;
                Ok(form.part(name, part))
            }
        })
    }

    impl Transport for ReqwestTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let mut builder = self.client.request(method(request.method), &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            builder = match request.body {
                RequestBody::Empty => builder,
                RequestBody::Json(body) => builder.body(body),
                RequestBody::Multipart(multipart) => builder.multipart(form(multipart.into_parts())?),
            };

            let response = builder
                .send()
                .await
                .map_err(|e| TransportError::new(e.to_string()))?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::new(e.to_string()))?;

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}
