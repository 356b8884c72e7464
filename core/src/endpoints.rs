//! Endpoint catalog for the tutoring backend.
//!
//! Paths are resolved against a configurable base URL. Anything not listed
//! here goes through `resolve`.

use std::fmt;

use url::Url;

use crate::error::ApiError;

pub const LOGIN_PATH: &str = "api/Authenticate/ValidateUserInformation";
pub const DASHBOARD_PATH: &str = "api/student/StudentDashboard/NavigateToTab";

/// Tabs served by the dashboard endpoint via `tabConstant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardTab {
    Attendance,
    Fees,
    CourseContent,
    Submission,
}

impl DashboardTab {
    pub fn as_str(self) -> &'static str {
        match self {
            DashboardTab::Attendance => "Attendance",
            DashboardTab::Fees => "Fees",
            DashboardTab::CourseContent => "Course Content",
            DashboardTab::Submission => "Submission",
        }
    }
}

impl fmt::Display for DashboardTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    /// `base_url` gains a trailing `/` if missing, so relative paths append
    /// rather than replace its last segment.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base = Url::parse(&normalized)
            .map_err(|e| ApiError::InvalidEndpoint(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidEndpoint(format!("{base_url}: not a base URL")));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &str {
        self.base.as_str()
    }

    pub fn resolve(&self, path: &str) -> Result<String, ApiError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map(String::from)
            .map_err(|e| ApiError::InvalidEndpoint(format!("{path}: {e}")))
    }

    /// Like `resolve`, with query parameters appended in order.
    pub fn resolve_with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<String, ApiError> {
        let mut url = Url::parse(&self.resolve(path)?)
            .map_err(|e| ApiError::InvalidEndpoint(e.to_string()))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.into())
    }

    pub fn login(&self) -> Result<String, ApiError> {
        self.resolve(LOGIN_PATH)
    }

    pub fn dashboard(&self, tab: DashboardTab) -> Result<String, ApiError> {
        self.resolve_with_query(DASHBOARD_PATH, &[("tabConstant", tab.as_str())])
    }
}
