use serde::{Deserialize, Serialize};
use validator::Validate;

use super::repo_types::User;
use crate::auth::roles::Role;

/// Body shared by `POST /auth/register` and `POST /users`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "userName must not be empty"))]
    pub user_name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, message = "userName must not be empty"))]
    pub user_name: Option<String>,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct DeleteUserResponse {
    pub message: String,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_validates_fields() {
        let ok: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "userName": "ann", "email": "a@x.com", "password": "secret1"
        }))
        .unwrap();
        assert!(ok.validate().is_ok());
        assert_eq!(ok.role, None);

        let bad = CreateUserRequest {
            user_name: String::new(),
            email: "nope".into(),
            password: "123".into(),
            role: None,
        };
        let errs = bad.validate().unwrap_err();
        let fields = errs.field_errors();
        assert!(fields.contains_key("user_name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn unknown_role_fails_to_deserialize() {
        let res = serde_json::from_value::<CreateUserRequest>(serde_json::json!({
            "userName": "ann", "email": "a@x.com", "password": "secret1", "role": "root"
        }));
        assert!(res.is_err());
    }

    #[test]
    fn update_request_only_checks_present_fields() {
        assert!(UpdateUserRequest::default().validate().is_ok());
        let short = UpdateUserRequest {
            password: Some("123".into()),
            ..Default::default()
        };
        assert!(short.validate().is_err());
    }

    #[test]
    fn user_serialization_hides_password_hash() {
        let now = time::OffsetDateTime::now_utc();
        let user = User {
            id: uuid::Uuid::new_v4(),
            user_name: "ann".into(),
            email: "a@x.com".into(),
            password_hash: "$argon2id$secret-hash".into(),
            role: Role::User,
            expenses: vec![],
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("secret-hash"));
        assert_eq!(json["userName"], "ann");
        assert_eq!(json["role"], "user");
    }
}
