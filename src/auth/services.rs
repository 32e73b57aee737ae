use std::sync::Arc;

use tracing::{info, warn};

use super::{
    dto::{LoginRequest, LoginResponse, RegisterResponse},
    jwt::JwtKeys,
    password::PasswordHasher,
    policy,
    roles::Role,
};
use crate::{
    error::{AppError, AppResult},
    users::{dto::CreateUserRequest, repo::UserRepo, repo_types::NewUser},
    validation::normalize_email,
};

/// Registration and login.
pub struct AuthService {
    users: Arc<dyn UserRepo>,
    hasher: Arc<PasswordHasher>,
    keys: Arc<JwtKeys>,
    // verified against when the email is unknown, so both login failures cost the same
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepo>,
        hasher: Arc<PasswordHasher>,
        keys: Arc<JwtKeys>,
    ) -> anyhow::Result<Self> {
        let dummy_hash = hasher.hash("spendwise-unknown-account")?;
        Ok(Self {
            users,
            hasher,
            keys,
            dummy_hash,
        })
    }

    pub async fn register(&self, req: CreateUserRequest) -> AppResult<RegisterResponse> {
        let email = normalize_email(&req.email);
        let role = req.role.unwrap_or_default();
        policy::authorize_role_assignment(None, role, None)?;

        if self.users.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AppError::DuplicateEmail(email));
        }

        let password_hash = self.hasher.hash(&req.password)?;
        let user = self
            .users
            .create(NewUser {
                user_name: req.user_name.trim().to_owned(),
                email,
                password_hash,
                role: Role::User,
            })
            .await?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(RegisterResponse {
            message: "User registered successfully".into(),
            user_id: user.id,
        })
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<LoginResponse> {
        let email = normalize_email(&req.email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            let _ = self.hasher.verify(&req.password, &self.dummy_hash);
            warn!(email = %email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !self.hasher.verify(&req.password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let access_token = self.keys.issue(user.id, &user.email, user.role)?;
        info!(user_id = %user.id, ttl_secs = self.keys.ttl().as_secs(), "user logged in");
        Ok(LoginResponse {
            message: "Login successful".into(),
            access_token,
        })
    }
}
