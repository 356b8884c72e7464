//! Wire DTOs for the authentication endpoint.
//!
//! # Design
//! Field names follow the backend's camelCase JSON. Only the fields the
//! client acts on are typed; the full `userDto` is also kept verbatim as the
//! stored `UserProfile` so screens can read anything else they need.

use serde::{Deserialize, Serialize};

/// Body of the login request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Payload under `data` in a successful login envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub token: String,
    pub user_dto: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub user_id: i64,
    pub username: String,
    /// Absent counts as inactive.
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub selected_role_dto: Option<RoleDto>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub role_dto_list: Vec<RoleDto>,
    #[serde(default)]
    pub faculty_dto: Option<serde_json::Value>,
    #[serde(default)]
    pub student_registration_dto: Option<serde_json::Value>,
}

impl UserDto {
    /// The dashboard role, resolved in order: the selected role, the first
    /// active Faculty then Student entry in `roleDtoList`, then which of
    /// `facultyDto` / `studentRegistrationDto` is present.
    pub fn resolve_role(&self) -> Option<Role> {
        if let Some(name) = self
            .selected_role_dto
            .as_ref()
            .and_then(|r| r.role_name.as_deref())
            .filter(|n| !n.trim().is_empty())
        {
            return Some(Role::from_name(name));
        }

        let active: Vec<Role> = self
            .role_dto_list
            .iter()
            .filter(|r| r.is_active)
            .filter_map(|r| r.role_name.as_deref().map(Role::from_name))
            .collect();
        for wanted in [Role::Faculty, Role::Student] {
            if active.contains(&wanted) {
                return Some(wanted);
            }
        }

        if self.faculty_dto.is_some() {
            Some(Role::Faculty)
        } else if self.student_registration_dto.is_some() {
            Some(Role::Student)
        } else {
            None
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<RoleDto>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<RoleDto>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDto {
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

/// Which dashboard a user belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Student,
    Faculty,
    Admin,
    Other(String),
}

impl Role {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "student" => Role::Student,
            "faculty" | "tutor" => Role::Faculty,
            "admin" => Role::Admin,
            _ => Role::Other(name.trim().to_string()),
        }
    }
}

/// The signed-in user as seen by the rest of the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub username: String,
    pub role: Option<Role>,
}

impl From<UserDto> for AuthenticatedUser {
    fn from(dto: UserDto) -> Self {
        let role = dto.resolve_role();
        Self {
            user_id: dto.user_id,
            username: dto.username,
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_dto_reads_backend_shape() {
        let dto: UserDto = serde_json::from_str(
            r#"{"userId":5,"username":"F240201","isActive":true,"selectedRoleDto":{"roleName":"Faculty"},"email":null}"#,
        )
        .unwrap();
        let user = AuthenticatedUser::from(dto);
        assert_eq!(user.user_id, 5);
        assert_eq!(user.role, Some(Role::Faculty));
    }

    #[test]
    fn missing_is_active_means_inactive() {
        let dto: UserDto = serde_json::from_str(r#"{"userId":1,"username":"admin"}"#).unwrap();
        assert!(!dto.is_active);
        assert!(dto.selected_role_dto.is_none());
        assert!(dto.role_dto_list.is_empty());
        assert_eq!(dto.resolve_role(), None);
    }

    #[test]
    fn role_names_are_case_insensitive() {
        assert_eq!(Role::from_name("STUDENT"), Role::Student);
        assert_eq!(Role::from_name(" admin "), Role::Admin);
        assert_eq!(Role::from_name("Tutor"), Role::Faculty);
        assert_eq!(Role::from_name("Parent"), Role::Other("Parent".to_string()));
    }

    fn dto(extra: serde_json::Value) -> UserDto {
        let mut value = serde_json::json!({"userId": 3, "username": "u", "isActive": true});
        for (k, v) in extra.as_object().unwrap() {
            value[k] = v.clone();
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn role_falls_back_to_active_role_list_entries() {
        let user = dto(serde_json::json!({
            "selectedRoleDto": null,
            "roleDtoList": [
                {"roleName": "Student", "isActive": true},
                {"roleName": "Faculty", "isActive": true}
            ]
        }));
        assert_eq!(user.resolve_role(), Some(Role::Faculty));

        let user = dto(serde_json::json!({
            "roleDtoList": [
                {"roleName": "Faculty", "isActive": false},
                {"roleName": "Student", "isActive": true}
            ]
        }));
        assert_eq!(user.resolve_role(), Some(Role::Student));
    }

    #[test]
    fn blank_selected_role_is_ignored() {
        let user = dto(serde_json::json!({
            "selectedRoleDto": {"roleName": ""},
            "roleDtoList": [{"roleName": "Student", "isActive": true}]
        }));
        assert_eq!(user.resolve_role(), Some(Role::Student));
    }

    #[test]
    fn role_falls_back_to_profile_dtos() {
        let user = dto(serde_json::json!({
            "roleDtoList": null,
            "facultyDto": {"facultyId": 2},
            "studentRegistrationDto": {"id": 8}
        }));
        assert_eq!(user.resolve_role(), Some(Role::Faculty));

        let user = dto(serde_json::json!({"facultyDto": null, "studentRegistrationDto": {"id": 8}}));
        assert_eq!(user.resolve_role(), Some(Role::Student));

        let user = dto(serde_json::json!({"roleDtoList": [{"roleName": "Admin", "isActive": true}]}));
        assert_eq!(user.resolve_role(), None);
    }

    #[test]
    fn selected_role_wins_over_everything_else() {
        let user = dto(serde_json::json!({
            "selectedRoleDto": {"roleName": "Tutor"},
            "roleDtoList": [{"roleName": "Student", "isActive": true}],
            "studentRegistrationDto": {"id": 8}
        }));
        assert_eq!(AuthenticatedUser::from(user).role, Some(Role::Faculty));
    }
}
