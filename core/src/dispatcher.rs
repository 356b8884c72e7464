//! Authenticated request dispatcher.
//!
//! # Design
//! Each call is split the same way the transport types are: `build_*`
//! produces a plain `HttpRequest` (credential headers attached, no I/O beyond
//! the credential read) and `request_*` sends it through the `Transport` and
//! hands the response to the envelope codec. Calls are single-shot and
//! independent; the dispatcher holds no per-request state.
//!
//! Header precedence, lowest to highest: the JSON content type, the caller's
//! headers, then the session headers. Upload requests never carry a
//! `Content-Type` so the transport can choose the multipart boundary.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::credentials::CredentialStore;
use crate::envelope::{self, ApiResponse};
use crate::error::ApiError;
use crate::http::{
    remove_header, set_header, HttpMethod, HttpRequest, HttpResponse, MultipartForm, RequestBody,
};
use crate::logging::Logger;
use crate::storage::Storage;
use crate::transport::Transport;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const AUTHORIZATION: &str = "Authorization";
/// Carries the logged-in user's id for server-side audit.
pub const LOGGED_IN_USER: &str = "LOGGED_IN_USER";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Per-call options for `Dispatcher::request_json`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: HttpMethod,
    /// Pre-serialized JSON body.
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Overrides the dispatcher's default deadline.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self::default().with_method(HttpMethod::Post)
    }

    /// A POST whose body is `body` serialized as JSON.
    pub fn post_json<B: Serialize + ?Sized>(body: &B) -> Result<Self, ApiError> {
        let body = serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(Self::post().with_body(body))
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Sends authenticated requests and decodes the server's envelope.
#[derive(Debug)]
pub struct Dispatcher<T, S> {
    transport: T,
    credentials: Arc<CredentialStore<S>>,
    logger: Logger,
    default_timeout: Option<Duration>,
}

impl<T: Transport, S: Storage> Dispatcher<T, S> {
    pub fn new(transport: T, credentials: Arc<CredentialStore<S>>, logger: Logger) -> Self {
        Self {
            transport,
            credentials,
            logger,
            default_timeout: None,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn credentials(&self) -> &Arc<CredentialStore<S>> {
        &self.credentials
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub async fn build_json_request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<HttpRequest, ApiError> {
        validate_endpoint(endpoint)?;
        let mut headers = vec![(CONTENT_TYPE.to_string(), JSON_CONTENT_TYPE.to_string())];
        for (name, value) in options.headers {
            set_header(&mut headers, &name, value);
        }
        self.attach_session(&mut headers).await;

        Ok(HttpRequest {
            method: options.method,
            url: endpoint.to_string(),
            headers,
            body: options.body.map_or(RequestBody::Empty, RequestBody::Json),
        })
    }

    /// Always a POST; `options.method` and `options.body` are ignored.
    pub async fn build_upload_request(
        &self,
        endpoint: &str,
        form: MultipartForm,
        options: RequestOptions,
    ) -> Result<HttpRequest, ApiError> {
        validate_endpoint(endpoint)?;
        let mut headers = Vec::new();
        for (name, value) in options.headers {
            set_header(&mut headers, &name, value);
        }
        if headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(CONTENT_TYPE)) {
            self.logger.debug("dropping caller Content-Type on multipart upload");
            remove_header(&mut headers, CONTENT_TYPE);
        }
        self.attach_session(&mut headers).await;

        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: endpoint.to_string(),
            headers,
            body: RequestBody::Multipart(form),
        })
    }

    pub async fn request_json(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let timeout = options.timeout.or(self.default_timeout);
        let request = self.build_json_request(endpoint, options).await?;
        self.dispatch(request, timeout).await
    }

    pub async fn request_upload(
        &self,
        endpoint: &str,
        form: MultipartForm,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let timeout = options.timeout.or(self.default_timeout);
        let request = self.build_upload_request(endpoint, form, options).await?;
        self.dispatch(request, timeout).await
    }

    /// GET `endpoint` and deserialize the unwrapped payload.
    pub async fn get_json<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R, ApiError> {
        self.request_json(endpoint, RequestOptions::get())
            .await?
            .into_data()
    }

    /// POST `body` as JSON and deserialize the unwrapped payload.
    pub async fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.request_json(endpoint, RequestOptions::post_json(body)?)
            .await?
            .into_data()
    }

    async fn attach_session(&self, headers: &mut Vec<(String, String)>) {
        let Some(credential) = self.credentials.credential().await else {
            return;
        };
        if !credential.token.is_empty() {
            set_header(headers, AUTHORIZATION, format!("Bearer {}", credential.token));
        }
        if let Some(user_id) = credential.user_id().filter(|id| *id != 0) {
            set_header(headers, LOGGED_IN_USER, user_id.to_string());
        }
    }

    async fn dispatch(
        &self,
        request: HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<ApiResponse, ApiError> {
        let endpoint = request.url.clone();
        self.logger
            .api_request(&endpoint, request.method.as_str(), &request.headers);

        let result = self.send(request, timeout).await.and_then(|response| {
            self.logger
                .api_response(&endpoint, response.status, response.status_text());
            envelope::decode(response)
        });

        if let Err(e) = &result {
            self.logger.api_failure(&endpoint, e);
        }
        result
    }

    async fn send(
        &self,
        request: HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, ApiError> {
        let call = self.transport.execute(request);
        let outcome = match timeout {
            Some(after) => tokio::time::timeout(after, call)
                .await
                .map_err(|_| ApiError::Timeout { after })?,
            None => call.await,
        };
        outcome.map_err(|e| ApiError::Network { message: e.message })
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), ApiError> {
    url::Url::parse(endpoint)
        .map(|_| ())
        .map_err(|e| ApiError::InvalidEndpoint(format!("{endpoint}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;
    use serde_json::{json, Value};

    use super::*;
    use crate::credentials::UserProfile;
    use crate::logging::LogMode;
    use crate::storage::MemoryStorage;
    use crate::transport::TransportError;

    const ENDPOINT: &str = "http://localhost:3000/api/student/StudentDashboard/NavigateToTab";

    /// Records every request and replies with a canned response.
    struct FakeTransport {
        reply: Result<HttpResponse, TransportError>,
        delay: Option<Duration>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl FakeTransport {
        fn replying(reply: HttpResponse) -> Self {
            Self {
                reply: Ok(reply),
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(TransportError::new(message)),
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn last(&self) -> HttpRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl Transport for FakeTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone()
        }
    }

    fn json_reply(status: u16, body: Value) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Bytes::from(body.to_string()),
        }
    }

    fn dispatcher(transport: FakeTransport) -> Dispatcher<FakeTransport, MemoryStorage> {
        let store = Arc::new(CredentialStore::new(MemoryStorage::new()));
        Dispatcher::new(transport, store, Logger::new(LogMode::Production, false))
    }

    async fn logged_in(transport: FakeTransport) -> Dispatcher<FakeTransport, MemoryStorage> {
        let d = dispatcher(transport);
        d.credentials()
            .store_credentials("abc.def.ghi", UserProfile::new(json!({"userId": 17})))
            .await;
        d
    }

    #[tokio::test]
    async fn wrapped_success_resolves_to_data() {
        let d = dispatcher(FakeTransport::replying(json_reply(
            200,
            json!({"wasSuccessful": true, "data": {"foo": 1}}),
        )));
        let value = d
            .request_json(ENDPOINT, RequestOptions::get())
            .await
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(value, json!({"foo": 1}));
    }

    #[tokio::test]
    async fn unauthorized_rejects_with_server_message() {
        let d = dispatcher(FakeTransport::replying(json_reply(
            401,
            json!({"message": "Invalid token"}),
        )));
        let err = d.request_json(ENDPOINT, RequestOptions::get()).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid token");
        assert!(err.is_status(401));
    }

    #[tokio::test]
    async fn binary_success_resolves_to_raw_response() {
        let reply = HttpResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/octet-stream".to_string())],
            body: Bytes::from_static(&[0, 1, 2, 3]),
        };
        let d = dispatcher(FakeTransport::replying(reply.clone()));
        let decoded = d.request_json(ENDPOINT, RequestOptions::get()).await.unwrap();
        assert_eq!(decoded.into_raw(), Some(reply));
    }

    #[tokio::test]
    async fn no_session_means_no_auth_headers() {
        let d = dispatcher(FakeTransport::replying(json_reply(200, json!({}))));
        d.request_json(ENDPOINT, RequestOptions::get()).await.unwrap();

        let sent = d.transport().last();
        assert_eq!(sent.header(AUTHORIZATION), None);
        assert_eq!(sent.header(LOGGED_IN_USER), None);
        assert_eq!(sent.header(CONTENT_TYPE), Some("application/json"));
    }

    #[tokio::test]
    async fn session_headers_are_attached_exactly() {
        let d = logged_in(FakeTransport::replying(json_reply(200, json!({})))).await;
        d.request_json(ENDPOINT, RequestOptions::get()).await.unwrap();

        let sent = d.transport().last();
        assert_eq!(sent.header(AUTHORIZATION), Some("Bearer abc.def.ghi"));
        assert_eq!(sent.header(LOGGED_IN_USER), Some("17"));
        assert_eq!(sent.method, HttpMethod::Get);
        assert!(matches!(sent.body, RequestBody::Empty));
    }

    #[tokio::test]
    async fn profile_without_id_sends_token_only() {
        let d = dispatcher(FakeTransport::replying(json_reply(200, json!({}))));
        d.credentials()
            .store_credentials("tok-12345", UserProfile::new(json!({"username": "admin"})))
            .await;
        d.request_json(ENDPOINT, RequestOptions::get()).await.unwrap();

        let sent = d.transport().last();
        assert_eq!(sent.header(AUTHORIZATION), Some("Bearer tok-12345"));
        assert_eq!(sent.header(LOGGED_IN_USER), None);
    }

    #[tokio::test]
    async fn zero_user_id_is_not_sent() {
        let d = dispatcher(FakeTransport::replying(json_reply(200, json!({}))));
        d.credentials()
            .store_credentials("tok-12345", UserProfile::new(json!({"userId": 0})))
            .await;
        d.request_json(ENDPOINT, RequestOptions::get()).await.unwrap();

        let sent = d.transport().last();
        assert_eq!(sent.header(AUTHORIZATION), Some("Bearer tok-12345"));
        assert_eq!(sent.header(LOGGED_IN_USER), None);
    }

    #[tokio::test]
    async fn caller_headers_merge_but_session_wins() {
        let d = logged_in(FakeTransport::replying(json_reply(200, json!({})))).await;
        let options = RequestOptions::post()
            .with_body(r#"{"courseId":3}"#)
            .with_header("content-type", "application/json; charset=utf-8")
            .with_header("X-Trace", "1")
            .with_header("authorization", "Basic forged");
        d.request_json(ENDPOINT, options).await.unwrap();

        let sent = d.transport().last();
        assert_eq!(sent.header(CONTENT_TYPE), Some("application/json; charset=utf-8"));
        assert_eq!(sent.header("x-trace"), Some("1"));
        assert_eq!(sent.header(AUTHORIZATION), Some("Bearer abc.def.ghi"));
        assert_eq!(
            sent.headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case(CONTENT_TYPE)).count(),
            1
        );
        assert!(matches!(&sent.body, RequestBody::Json(b) if b == r#"{"courseId":3}"#));
        assert_eq!(sent.method, HttpMethod::Post);
    }

    #[tokio::test]
    async fn upload_omits_content_type_and_forces_post() {
        let d = logged_in(FakeTransport::replying(json_reply(
            200,
            json!({"wasSuccessful": true, "data": {"saved": true}}),
        )))
        .await;
        let form = MultipartForm::new()
            .text("assignmentId", 9)
            .file("file", "essay.pdf", "application/pdf", vec![1u8, 2]);
        let options = RequestOptions::get().with_header("Content-Type", "multipart/form-data");

        let value = d
            .request_upload(ENDPOINT, form.clone(), options)
            .await
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(value, json!({"saved": true}));

        let sent = d.transport().last();
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.header(CONTENT_TYPE), None);
        assert_eq!(sent.header(AUTHORIZATION), Some("Bearer abc.def.ghi"));
        assert!(matches!(&sent.body, RequestBody::Multipart(f) if f == &form));
    }

    #[tokio::test]
    async fn upload_validation_failure_prefers_message_then_title() {
        let d = dispatcher(FakeTransport::replying(json_reply(
            400,
            json!({"title": "One or more validation errors occurred.", "errors": {"File": ["Required"]}}),
        )));
        let err = d
            .request_upload(ENDPOINT, MultipartForm::new(), RequestOptions::default())
            .await
            .unwrap_err();
        let classified = err.as_classified().unwrap();
        assert_eq!(classified.message, "One or more validation errors occurred. (File: Required)");
        assert_eq!(classified.validation_details, Some(json!({"File": ["Required"]})));
    }

    #[tokio::test]
    async fn transport_failure_is_network_error() {
        let d = dispatcher(FakeTransport::failing("connection refused"));
        let err = d.request_json(ENDPOINT, RequestOptions::get()).await.unwrap_err();
        assert!(matches!(err, ApiError::Network { ref message } if message == "connection refused"));
        assert_eq!(err.status_code(), None);
    }

    #[tokio::test]
    async fn invalid_endpoint_is_rejected_before_sending() {
        let d = dispatcher(FakeTransport::replying(json_reply(200, json!({}))));
        let err = d.request_json("not a url", RequestOptions::get()).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidEndpoint(_)));
        assert!(d.transport().seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_elapses_as_timeout() {
        let mut transport = FakeTransport::replying(json_reply(200, json!({})));
        transport.delay = Some(Duration::from_secs(30));
        let d = dispatcher(transport).with_default_timeout(Some(Duration::from_secs(5)));

        let err = d.request_json(ENDPOINT, RequestOptions::get()).await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout { after } if after == Duration::from_secs(5)));

        let ok = d
            .request_json(ENDPOINT, RequestOptions::get().with_timeout(Duration::from_secs(60)))
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn typed_helpers_deserialize_payload() {
        #[derive(serde::Deserialize)]
        struct Fee {
            amount: u32,
        }
        let d = dispatcher(FakeTransport::replying(json_reply(
            200,
            json!({"wasSuccessful": true, "data": [{"amount": 1500}]}),
        )));
        let fees: Vec<Fee> = d.get_json(ENDPOINT).await.unwrap();
        assert_eq!(fees[0].amount, 1500);

        let fees: Vec<Fee> = d.post_json(ENDPOINT, &json!({"tab": "Fees"})).await.unwrap();
        assert_eq!(fees.len(), 1);
        let sent = d.transport().last();
        assert!(matches!(&sent.body, RequestBody::Json(b) if b == r#"{"tab":"Fees"}"#));
    }
}
