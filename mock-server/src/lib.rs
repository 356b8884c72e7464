use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const LOGIN_PATH: &str = "/api/Authenticate/ValidateUserInformation";
pub const DASHBOARD_PATH: &str = "/api/student/StudentDashboard/NavigateToTab";

pub const DASHBOARD_TABS: [&str; 4] = ["Attendance", "Fees", "Course Content", "Submission"];

/// A seeded account.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub user_id: i64,
    pub username: String,
    #[serde(skip)]
    pub password: String,
    pub is_active: bool,
    pub role: String,
}

pub fn seed_accounts() -> Vec<Account> {
    [
        (17, "student1", "student-pass", true, "Student"),
        (5, "faculty1", "faculty-pass", true, "Faculty"),
        (99, "inactive", "inactive-pass", false, "Student"),
    ]
    .into_iter()
    .map(|(user_id, username, password, is_active, role)| Account {
        user_id,
        username: username.to_string(),
        password: password.to_string(),
        is_active,
        role: role.to_string(),
    })
    .collect()
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    pub tab_constant: Option<String>,
}

#[derive(Default)]
pub struct Backend {
    accounts: Vec<Account>,
    /// Issued bearer token -> user id.
    sessions: HashMap<String, i64>,
}

pub type Db = Arc<RwLock<Backend>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Backend {
        accounts: seed_accounts(),
        sessions: HashMap::new(),
    }));
    Router::new()
        .route(LOGIN_PATH, post(login))
        .route(DASHBOARD_PATH, get(dashboard))
        .route("/api/echo/headers", post(echo_headers))
        .route("/api/uploads", post(upload))
        .route("/api/files/{name}", get(download))
        .route("/api/fail/text", get(fail_text))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn wrapped(data: Value, message: &str) -> Json<Value> {
    Json(json!({"wasSuccessful": true, "message": message, "data": data}))
}

fn error_body(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

async fn login(State(db): State<Db>, Json(input): Json<LoginRequest>) -> Response {
    let mut backend = db.write().await;
    let Some(account) = backend
        .accounts
        .iter()
        .find(|a| a.username == input.username && a.password == input.password)
        .cloned()
    else {
        return error_body(
            StatusCode::UNAUTHORIZED,
            json!({"message": "Invalid username or password"}),
        );
    };

    let token = Uuid::new_v4().simple().to_string();
    backend.sessions.insert(token.clone(), account.user_id);
    let data = json!({
        "token": token,
        "userDto": {
            "userId": account.user_id,
            "username": account.username,
            "isActive": account.is_active,
            "selectedRoleDto": {"roleName": account.role},
        }
    });
    wrapped(data, "Login successful").into_response()
}

/// Resolve the caller from `Authorization` and `LOGGED_IN_USER`.
async fn authorize(db: &Db, headers: &HeaderMap) -> Result<i64, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let backend = db.read().await;
    let Some(user_id) = token.and_then(|t| backend.sessions.get(t)).copied() else {
        return Err(error_body(
            StatusCode::UNAUTHORIZED,
            json!({"message": "Invalid token"}),
        ));
    };

    let claimed = headers
        .get("LOGGED_IN_USER")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok());
    if claimed != Some(user_id) {
        return Err(error_body(
            StatusCode::FORBIDDEN,
            json!({"title": "Forbidden", "error": "LOGGED_IN_USER does not match token"}),
        ));
    }
    Ok(user_id)
}

async fn dashboard(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let user_id = match authorize(&db, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let tab = query.tab_constant.unwrap_or_default();
    if !DASHBOARD_TABS.contains(&tab.as_str()) {
        return error_body(
            StatusCode::BAD_REQUEST,
            json!({
                "title": "One or more validation errors occurred.",
                "errors": {"tabConstant": [format!("Unknown tab '{tab}'.")]}
            }),
        );
    }
    wrapped(json!({"tab": tab, "userId": user_id, "items": []}), "OK").into_response()
}

async fn echo_headers(headers: HeaderMap) -> Json<Value> {
    let echoed: serde_json::Map<String, Value> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
        })
        .collect();
    Json(Value::Object(echoed))
}

async fn upload(State(db): State<Db>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    let user_id = match authorize(&db, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let mut fields = serde_json::Map::new();
    let mut files = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return error_body(StatusCode::BAD_REQUEST, json!({"title": e.body_text()}));
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return error_body(StatusCode::BAD_REQUEST, json!({"title": e.body_text()}));
            }
        };
        match file_name {
            Some(file_name) => files.push(json!({
                "field": name,
                "fileName": file_name,
                "contentType": content_type,
                "size": bytes.len(),
            })),
            None => {
                fields.insert(name, Value::String(String::from_utf8_lossy(&bytes).into_owned()));
            }
        }
    }

    if files.is_empty() {
        return error_body(
            StatusCode::BAD_REQUEST,
            json!({
                "title": "One or more validation errors occurred.",
                "errors": {"File": ["The File field is required."]}
            }),
        );
    }

    let request_content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    wrapped(
        json!({
            "uploadedBy": user_id,
            "fields": fields,
            "files": files,
            "requestContentType": request_content_type,
        }),
        "Uploaded",
    )
    .into_response()
}

async fn download(Path(name): Path<String>) -> Response {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        format!("file:{name}").into_bytes(),
    )
        .into_response()
}

async fn fail_text() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain")],
        "database unavailable",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_serializes_without_password() {
        let account = seed_accounts().remove(0);
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["userId"], 17);
        assert_eq!(json["isActive"], true);
        assert!(json.get("password").is_none());
    }

    #[test]
    fn seeded_accounts_have_unique_ids() {
        let accounts = seed_accounts();
        let mut ids: Vec<_> = accounts.iter().map(|a| a.user_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), accounts.len());
    }

    #[test]
    fn login_request_rejects_missing_password() {
        let result: Result<LoginRequest, _> = serde_json::from_str(r#"{"username":"student1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn dashboard_query_reads_tab_constant() {
        let query: DashboardQuery = serde_json::from_str(r#"{"tabConstant":"Fees"}"#).unwrap();
        assert_eq!(query.tab_constant.as_deref(), Some("Fees"));
    }
}
