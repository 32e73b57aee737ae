use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo_types::{NewUser, User, UserChanges, UserRow};
use crate::error::{RepoError, RepoResult};

/// Credential store. Emails are expected to be normalized by the caller.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn list(&self) -> RepoResult<Vec<User>>;
    async fn create(&self, new: NewUser) -> RepoResult<User>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>>;
    async fn delete(&self, id: Uuid) -> RepoResult<Option<User>>;
    /// Appends to the owned-expense list. `false` if the user is gone.
    async fn push_expense(&self, user_id: Uuid, expense_id: Uuid) -> RepoResult<bool>;
    async fn pull_expense(&self, user_id: Uuid, expense_id: Uuid) -> RepoResult<()>;
}

const USER_COLUMNS: &str =
    "id, user_name, email, password_hash, role, expense_ids, created_at, updated_at";

pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_user(row: UserRow) -> RepoResult<User> {
    User::try_from(row).map_err(RepoError::Backend)
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn list(&self) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(into_user).collect()
    }

    async fn create(&self, new: NewUser) -> RepoResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, user_name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.user_name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .fetch_one(&self.db)
        .await?;
        into_user(row)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET user_name     = COALESCE($2, user_name),
                   email         = COALESCE($3, email),
                   password_hash = COALESCE($4, password_hash),
                   role          = COALESCE($5, role),
                   updated_at    = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.user_name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.role.map(|r| r.as_str()))
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn delete(&self, id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn push_expense(&self, user_id: Uuid, expense_id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET expense_ids = array_append(expense_ids, $2),
                   updated_at  = now()
             WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(expense_id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn pull_expense(&self, user_id: Uuid, expense_id: Uuid) -> RepoResult<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET expense_ids = array_remove(expense_ids, $2),
                   updated_at  = now()
             WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(expense_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct InMemoryUserRepo {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list(&self) -> RepoResult<Vec<User>> {
        let mut all: Vec<User> = self.users.read().await.values().cloned().collect();
        all.sort_by_key(|u| u.created_at);
        Ok(all)
    }

    async fn create(&self, new: NewUser) -> RepoResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new.email) {
            return Err(RepoError::Duplicate("email"));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            user_name: new.user_name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            expenses: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>> {
        let mut users = self.users.write().await;
        if let Some(email) = &changes.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(RepoError::Duplicate("email"));
            }
        }
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = changes.user_name {
            user.user_name = v;
        }
        if let Some(v) = changes.email {
            user.email = v;
        }
        if let Some(v) = changes.password_hash {
            user.password_hash = v;
        }
        if let Some(v) = changes.role {
            user.role = v;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.users.write().await.remove(&id))
    }

    async fn push_expense(&self, user_id: Uuid, expense_id: Uuid) -> RepoResult<bool> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&user_id) else {
            return Ok(false);
        };
        user.expenses.push(expense_id);
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn pull_expense(&self, user_id: Uuid, expense_id: Uuid) -> RepoResult<()> {
        if let Some(user) = self.users.write().await.get_mut(&user_id) {
            user.expenses.retain(|e| *e != expense_id);
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            user_name: "tester".into(),
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let repo = InMemoryUserRepo::new();
        repo.create(new_user("a@x.com")).await.unwrap();
        let err = repo.create(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, RepoError::Duplicate("email")));
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_is_partial_and_keeps_email_unique() {
        let repo = InMemoryUserRepo::new();
        let a = repo.create(new_user("a@x.com")).await.unwrap();
        repo.create(new_user("b@x.com")).await.unwrap();

        let updated = repo
            .update(a.id, UserChanges { user_name: Some("renamed".into()), ..Default::default() })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.user_name, "renamed");
        assert_eq!(updated.email, "a@x.com");

        let clash = UserChanges { email: Some("b@x.com".into()), ..Default::default() };
        assert!(matches!(repo.update(a.id, clash).await, Err(RepoError::Duplicate(_))));
        assert!(repo.update(Uuid::new_v4(), UserChanges::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn push_and_pull_expense_ids_in_order() {
        let repo = InMemoryUserRepo::new();
        let u = repo.create(new_user("a@x.com")).await.unwrap();
        let (e1, e2) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(repo.push_expense(u.id, e1).await.unwrap());
        assert!(repo.push_expense(u.id, e2).await.unwrap());
        assert_eq!(repo.find_by_id(u.id).await.unwrap().unwrap().expenses, vec![e1, e2]);

        repo.pull_expense(u.id, e1).await.unwrap();
        assert_eq!(repo.find_by_id(u.id).await.unwrap().unwrap().expenses, vec![e2]);
        assert!(!repo.push_expense(Uuid::new_v4(), e1).await.unwrap());
    }
}
