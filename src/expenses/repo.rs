use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo_types::{Expense, ExpenseChanges, NewExpense};
use crate::error::RepoResult;

#[async_trait]
pub trait ExpenseRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Expense>>;
    async fn list(&self) -> RepoResult<Vec<Expense>>;
    async fn create(&self, new: NewExpense) -> RepoResult<Expense>;
    async fn update(&self, id: Uuid, changes: ExpenseChanges) -> RepoResult<Option<Expense>>;
    async fn delete(&self, id: Uuid) -> RepoResult<Option<Expense>>;
    /// Removes every expense owned by `user_id`, returning how many went.
    async fn delete_by_owner(&self, user_id: Uuid) -> RepoResult<u64>;
}

pub struct PgExpenseRepo {
    db: PgPool,
}

impl PgExpenseRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExpenseRepo for PgExpenseRepo {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Expense>> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, title, amount, category, user_id, created_at, updated_at
            FROM expenses
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(expense)
    }

    async fn list(&self) -> RepoResult<Vec<Expense>> {
        let rows = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, title, amount, category, user_id, created_at, updated_at
            FROM expenses
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn create(&self, new: NewExpense) -> RepoResult<Expense> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            INSERT INTO expenses (id, title, amount, category, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, amount, category, user_id, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(new.amount)
        .bind(&new.category)
        .bind(new.user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(expense)
    }

    async fn update(&self, id: Uuid, changes: ExpenseChanges) -> RepoResult<Option<Expense>> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            UPDATE expenses
               SET title      = COALESCE($2, title),
                   amount     = COALESCE($3, amount),
                   category   = COALESCE($4, category),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, title, amount, category, user_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.amount)
        .bind(changes.category)
        .fetch_optional(&self.db)
        .await?;
        Ok(expense)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<Option<Expense>> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            DELETE FROM expenses
             WHERE id = $1
            RETURNING id, title, amount, category, user_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(expense)
    }

    async fn delete_by_owner(&self, user_id: Uuid) -> RepoResult<u64> {
        let res = sqlx::query("DELETE FROM expenses WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }
}

#[derive(Default)]
pub struct InMemoryExpenseRepo {
    expenses: RwLock<HashMap<Uuid, Expense>>,
}

impl InMemoryExpenseRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExpenseRepo for InMemoryExpenseRepo {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Expense>> {
        Ok(self.expenses.read().await.get(&id).cloned())
    }

    async fn list(&self) -> RepoResult<Vec<Expense>> {
        let mut all: Vec<Expense> = self.expenses.read().await.values().cloned().collect();
        all.sort_by_key(|e| e.created_at);
        Ok(all)
    }

    async fn create(&self, new: NewExpense) -> RepoResult<Expense> {
        let now = OffsetDateTime::now_utc();
        let expense = Expense {
            id: Uuid::new_v4(),
            title: new.title,
            amount: new.amount,
            category: new.category,
            user_id: new.user_id,
            created_at: now,
            updated_at: now,
        };
        self.expenses.write().await.insert(expense.id, expense.clone());
        Ok(expense)
    }

    async fn update(&self, id: Uuid, changes: ExpenseChanges) -> RepoResult<Option<Expense>> {
        let mut expenses = self.expenses.write().await;
        let Some(expense) = expenses.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = changes.title {
            expense.title = v;
        }
        if let Some(v) = changes.amount {
            expense.amount = v;
        }
        if let Some(v) = changes.category {
            expense.category = v;
        }
        expense.updated_at = OffsetDateTime::now_utc();
        Ok(Some(expense.clone()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<Option<Expense>> {
        Ok(self.expenses.write().await.remove(&id))
    }

    async fn delete_by_owner(&self, user_id: Uuid) -> RepoResult<u64> {
        let mut expenses = self.expenses.write().await;
        let before = expenses.len();
        expenses.retain(|_, e| e.user_id != user_id);
        Ok((before - expenses.len()) as u64)
    }
}
