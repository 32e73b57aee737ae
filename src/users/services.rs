use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, DeleteUserResponse, UpdateUserRequest},
    repo::UserRepo,
    repo_types::{NewUser, User, UserChanges},
};
use crate::{
    auth::{
        claims::Principal,
        password::PasswordHasher,
        policy::{self, Route},
        roles::Role,
    },
    config::AdminSeed,
    error::{AppError, AppResult},
    expenses::repo::ExpenseRepo,
    validation::{normalize_email, parse_id},
};

pub struct UserService {
    users: Arc<dyn UserRepo>,
    expenses: Arc<dyn ExpenseRepo>,
    hasher: Arc<PasswordHasher>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepo>,
        expenses: Arc<dyn ExpenseRepo>,
        hasher: Arc<PasswordHasher>,
    ) -> Self {
        Self {
            users,
            expenses,
            hasher,
        }
    }

    /// Admin-provisioned account.
    pub async fn create(&self, actor: &Principal, req: CreateUserRequest) -> AppResult<User> {
        policy::authorize(actor, Route::CreateUser, None)?;
        let role = req.role.unwrap_or_default();
        policy::authorize_role_assignment(Some(actor), role, None)?;

        let email = normalize_email(&req.email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::DuplicateEmail(email));
        }
        let password_hash = self.hasher.hash(&req.password)?;
        let user = self
            .users
            .create(NewUser {
                user_name: req.user_name.trim().to_owned(),
                email,
                password_hash,
                role,
            })
            .await?;
        info!(user_id = %user.id, created_by = %actor.id, "user created");
        Ok(user)
    }

    pub async fn list(&self, actor: &Principal) -> AppResult<Vec<User>> {
        policy::authorize(actor, Route::ListUsers, None)?;
        Ok(self.users.list().await?)
    }

    pub async fn get(&self, actor: &Principal, raw_id: &str) -> AppResult<User> {
        let user = self.fetch(raw_id).await?;
        policy::authorize(actor, Route::GetUser, Some(user.id))?;
        Ok(user)
    }

    pub async fn me(&self, actor: &Principal) -> AppResult<User> {
        self.users
            .find_by_id(actor.id)
            .await?
            .ok_or_else(|| AppError::not_found("User", actor.id))
    }

    pub async fn update(
        &self,
        actor: &Principal,
        raw_id: &str,
        req: UpdateUserRequest,
    ) -> AppResult<User> {
        let user = self.fetch(raw_id).await?;
        policy::authorize(actor, Route::UpdateUser, Some(user.id))?;
        if let Some(role) = req.role {
            policy::authorize_role_assignment(Some(actor), role, Some(user.role))?;
        }

        let email = req.email.as_deref().map(normalize_email);
        if let Some(email) = &email {
            if let Some(other) = self.users.find_by_email(email).await? {
                if other.id != user.id {
                    return Err(AppError::DuplicateEmail(email.clone()));
                }
            }
        }
        let password_hash = match &req.password {
            Some(p) => Some(self.hasher.hash(p)?),
            None => None,
        };

        let changes = UserChanges {
            user_name: req.user_name.map(|n| n.trim().to_owned()),
            email,
            password_hash,
            role: req.role,
        };
        let updated = self
            .users
            .update(user.id, changes)
            .await?
            .ok_or_else(|| AppError::not_found("User", user.id))?;
        info!(user_id = %updated.id, updated_by = %actor.id, "user updated");
        Ok(updated)
    }

    /// Hard delete. The user's expenses go with it.
    pub async fn delete(&self, actor: &Principal, raw_id: &str) -> AppResult<DeleteUserResponse> {
        let user = self.fetch(raw_id).await?;
        policy::authorize(actor, Route::DeleteUser, Some(user.id))?;

        let removed = self.expenses.delete_by_owner(user.id).await?;
        let deleted = self
            .users
            .delete(user.id)
            .await?
            .ok_or_else(|| AppError::not_found("User", user.id))?;
        info!(user_id = %deleted.id, deleted_by = %actor.id, expenses = removed, "user deleted");
        Ok(DeleteUserResponse {
            message: "User deleted successfully".into(),
            user: deleted,
        })
    }

    /// Creates the configured administrator, or promotes the existing
    /// account with that email. Runs once at startup, outside any request.
    pub async fn seed_admin(&self, seed: &AdminSeed) -> anyhow::Result<Uuid> {
        let email = normalize_email(&seed.email);
        if let Some(existing) = self.users.find_by_email(&email).await? {
            if existing.role != Role::Admin {
                let changes = UserChanges {
                    role: Some(Role::Admin),
                    ..Default::default()
                };
                self.users.update(existing.id, changes).await?;
                warn!(user_id = %existing.id, "existing account promoted to admin");
            }
            return Ok(existing.id);
        }
        let password_hash = self.hasher.hash(&seed.password)?;
        let admin = self
            .users
            .create(NewUser {
                user_name: seed.user_name.clone(),
                email,
                password_hash,
                role: Role::Admin,
            })
            .await?;
        info!(user_id = %admin.id, "admin account seeded");
        Ok(admin.id)
    }

    async fn fetch(&self, raw_id: &str) -> AppResult<User> {
        let id = parse_id(raw_id)?;
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("User", id))
    }
}
