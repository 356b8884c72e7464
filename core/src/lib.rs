//! Authenticated API client core for the tutoring backend.
//!
//! # Overview
//! Screens hand the `Dispatcher` an endpoint and a JSON body or multipart
//! form. The dispatcher attaches the stored session's credentials, sends the
//! request through a `Transport`, and the envelope codec turns the response
//! into either unwrapped data or an `ApiError` whose message is ready to show.
//!
//! # Design
//! - Requests and responses are plain data (`http` module); only a
//!   `Transport` performs I/O, so everything else is testable without a
//!   network.
//! - The session lives in an explicit `CredentialStore` shared via `Arc`,
//!   not a global. Token and profile are persisted as one record.
//! - Errors are typed: `Network`/`Timeout` when nothing came back,
//!   `Classified` when the server said no, `MalformedResponse` when a success
//!   body did not parse.
//! - Logging goes through `tracing`, with credentials masked before emission.

pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod http;
pub mod logging;
pub mod session;
pub mod storage;
pub mod transport;
pub mod types;

pub use config::ClientConfig;
pub use credentials::{Credential, CredentialStore, UserProfile};
pub use dispatcher::{Dispatcher, RequestOptions};
pub use endpoints::{DashboardTab, Endpoints};
pub use envelope::{decode, ApiResponse};
pub use error::{ApiError, ClassifiedError, StorageError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, MultipartForm, Part, RequestBody};
pub use logging::{LogMode, Logger};
pub use session::{SessionError, SessionService};
pub use storage::{FileStorage, MemoryStorage, Storage};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{Transport, TransportError};
pub use types::{AuthenticatedUser, Role};
