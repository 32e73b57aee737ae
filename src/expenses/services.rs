use std::sync::Arc;

use tracing::{error, info, warn};

use super::{
    dto::{CreateExpenseRequest, DeleteExpenseResponse, UpdateExpenseRequest},
    repo::ExpenseRepo,
    repo_types::{Expense, ExpenseChanges, NewExpense},
};
use crate::{
    auth::{
        claims::Principal,
        policy::{self, Route},
    },
    error::{AppError, AppResult},
    users::repo::UserRepo,
    validation::parse_id,
};

pub struct ExpenseService {
    expenses: Arc<dyn ExpenseRepo>,
    users: Arc<dyn UserRepo>,
}

fn check_amount(amount: f64) -> AppResult<()> {
    if amount.is_finite() {
        Ok(())
    } else {
        Err(AppError::Validation("amount must be a finite number".into()))
    }
}

impl ExpenseService {
    pub fn new(expenses: Arc<dyn ExpenseRepo>, users: Arc<dyn UserRepo>) -> Self {
        Self { expenses, users }
    }

    /// Stores the expense and links it into the owner's list. If linking
    /// fails the stored record is removed again.
    pub async fn create(&self, actor: &Principal, req: CreateExpenseRequest) -> AppResult<Expense> {
        check_amount(req.amount)?;
        let owner_id = parse_id(&req.user)?;
        let owner = self
            .users
            .find_by_id(owner_id)
            .await?
            .ok_or_else(|| AppError::not_found("User", owner_id))?;
        policy::authorize(actor, Route::CreateExpense, Some(owner.id))?;

        let expense = self
            .expenses
            .create(NewExpense {
                title: req.title.trim().to_owned(),
                amount: req.amount,
                category: req.category.trim().to_owned(),
                user_id: owner.id,
            })
            .await?;

        let linked = match self.users.push_expense(owner.id, expense.id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::not_found("User", owner.id)),
            Err(e) => Err(AppError::from(e)),
        };
        if let Err(err) = linked {
            if let Err(e) = self.expenses.delete(expense.id).await {
                error!(expense_id = %expense.id, error = %e, "compensating delete failed");
            }
            return Err(err);
        }

        info!(expense_id = %expense.id, owner = %owner.id, "expense created");
        Ok(expense)
    }

    pub async fn list(&self, actor: &Principal) -> AppResult<Vec<Expense>> {
        policy::authorize(actor, Route::ListExpenses, None)?;
        Ok(self.expenses.list().await?)
    }

    pub async fn get(&self, actor: &Principal, raw_id: &str) -> AppResult<Expense> {
        let expense = self.fetch(raw_id).await?;
        policy::authorize(actor, Route::GetExpense, Some(expense.user_id))?;
        Ok(expense)
    }

    pub async fn update(
        &self,
        actor: &Principal,
        raw_id: &str,
        req: UpdateExpenseRequest,
    ) -> AppResult<Expense> {
        let expense = self.fetch(raw_id).await?;
        policy::authorize(actor, Route::UpdateExpense, Some(expense.user_id))?;
        if let Some(amount) = req.amount {
            check_amount(amount)?;
        }

        let changes = ExpenseChanges {
            title: req.title.map(|t| t.trim().to_owned()),
            amount: req.amount,
            category: req.category.map(|c| c.trim().to_owned()),
        };
        let updated = self
            .expenses
            .update(expense.id, changes)
            .await?
            .ok_or_else(|| AppError::not_found("Expense", expense.id))?;
        info!(expense_id = %updated.id, "expense updated");
        Ok(updated)
    }

    pub async fn delete(&self, actor: &Principal, raw_id: &str) -> AppResult<DeleteExpenseResponse> {
        let expense = self.fetch(raw_id).await?;
        policy::authorize(actor, Route::DeleteExpense, Some(expense.user_id))?;

        let deleted = self
            .expenses
            .delete(expense.id)
            .await?
            .ok_or_else(|| AppError::not_found("Expense", expense.id))?;
        // the record is gone either way; a stale id in the owner's list is only logged
        if let Err(e) = self.users.pull_expense(deleted.user_id, deleted.id).await {
            warn!(expense_id = %deleted.id, owner = %deleted.user_id, error = %e, "failed to unlink expense");
        }
        info!(expense_id = %deleted.id, "expense deleted");
        Ok(DeleteExpenseResponse {
            message: "Expense deleted successfully".into(),
            expense: deleted,
        })
    }

    async fn fetch(&self, raw_id: &str) -> AppResult<Expense> {
        let id = parse_id(raw_id)?;
        self.expenses
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Expense", id))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::{
        auth::roles::Role,
        error::{RepoError, RepoResult},
        expenses::repo::InMemoryExpenseRepo,
        users::{
            repo::InMemoryUserRepo,
            repo_types::{NewUser, User, UserChanges},
        },
    };

    /// Delegates to the in-memory store but refuses to link expenses.
    struct UnlinkableUsers(InMemoryUserRepo);

    #[async_trait]
    impl UserRepo for UnlinkableUsers {
        async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
            self.0.find_by_id(id).await
        }
        async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
            self.0.find_by_email(email).await
        }
        async fn list(&self) -> RepoResult<Vec<User>> {
            self.0.list().await
        }
        async fn create(&self, new: NewUser) -> RepoResult<User> {
            self.0.create(new).await
        }
        async fn update(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>> {
            self.0.update(id, changes).await
        }
        async fn delete(&self, id: Uuid) -> RepoResult<Option<User>> {
            self.0.delete(id).await
        }
        async fn push_expense(&self, _user_id: Uuid, _expense_id: Uuid) -> RepoResult<bool> {
            Err(RepoError::Backend(anyhow::anyhow!("connection reset")))
        }
        async fn pull_expense(&self, user_id: Uuid, expense_id: Uuid) -> RepoResult<()> {
            self.0.pull_expense(user_id, expense_id).await
        }
    }

    async fn account(users: &dyn UserRepo, email: &str, role: Role) -> Principal {
        let u = users
            .create(NewUser {
                user_name: "someone".into(),
                email: email.into(),
                password_hash: "not-a-real-hash".into(),
                role,
            })
            .await
            .unwrap();
        Principal { id: u.id, email: u.email, role: u.role }
    }

    fn lunch(owner: Uuid) -> CreateExpenseRequest {
        CreateExpenseRequest {
            title: "Lunch".into(),
            amount: 12.5,
            category: "Food".into(),
            user: owner.to_string(),
        }
    }

    fn service() -> (ExpenseService, Arc<InMemoryUserRepo>, Arc<InMemoryExpenseRepo>) {
        let users = Arc::new(InMemoryUserRepo::new());
        let expenses = Arc::new(InMemoryExpenseRepo::new());
        (ExpenseService::new(expenses.clone(), users.clone()), users, expenses)
    }

    #[tokio::test]
    async fn create_links_expense_to_owner() {
        let (svc, users, _) = service();
        let me = account(users.as_ref(), "me@x.com", Role::User).await;
        let e = svc.create(&me, lunch(me.id)).await.unwrap();
        assert_eq!(e.user_id, me.id);
        let owner = users.find_by_id(me.id).await.unwrap().unwrap();
        assert_eq!(owner.expenses, vec![e.id]);
    }

    #[tokio::test]
    async fn user_cannot_create_for_someone_else() {
        let (svc, users, expenses) = service();
        let me = account(users.as_ref(), "me@x.com", Role::User).await;
        let other = account(users.as_ref(), "o@x.com", Role::User).await;
        let err = svc.create(&me, lunch(other.id)).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(expenses.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn admin_creates_for_any_user() {
        let (svc, users, _) = service();
        let admin = account(users.as_ref(), "root@x.com", Role::Admin).await;
        let other = account(users.as_ref(), "o@x.com", Role::User).await;
        let e = svc.create(&admin, lunch(other.id)).await.unwrap();
        assert_eq!(e.user_id, other.id);
    }

    #[tokio::test]
    async fn create_rejects_bad_owner_and_amount() {
        let (svc, users, _) = service();
        let me = account(users.as_ref(), "me@x.com", Role::User).await;

        let mut req = lunch(me.id);
        req.user = "not-an-id".into();
        assert!(matches!(svc.create(&me, req).await, Err(AppError::InvalidIdentifier(_))));

        assert!(matches!(
            svc.create(&me, lunch(Uuid::new_v4())).await,
            Err(AppError::NotFound(_))
        ));

        let mut req = lunch(me.id);
        req.amount = f64::NAN;
        assert!(matches!(svc.create(&me, req).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn failed_link_removes_created_expense() {
        let users = Arc::new(UnlinkableUsers(InMemoryUserRepo::new()));
        let expenses = Arc::new(InMemoryExpenseRepo::new());
        let svc = ExpenseService::new(expenses.clone(), users.clone());
        let me = account(users.as_ref(), "me@x.com", Role::User).await;

        let err = svc.create(&me, lunch(me.id)).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(expenses.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ownership_gates_read_update_delete() {
        let (svc, users, _) = service();
        let me = account(users.as_ref(), "me@x.com", Role::User).await;
        let other = account(users.as_ref(), "o@x.com", Role::User).await;
        let e = svc.create(&me, lunch(me.id)).await.unwrap();
        let id = e.id.to_string();

        assert!(matches!(svc.get(&other, &id).await, Err(AppError::Forbidden(_))));
        assert!(matches!(
            svc.update(&other, &id, UpdateExpenseRequest::default()).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(svc.delete(&other, &id).await, Err(AppError::Forbidden(_))));
        assert_eq!(svc.get(&me, &id).await.unwrap().id, e.id);
    }

    #[tokio::test]
    async fn update_is_partial() {
        let (svc, users, _) = service();
        let me = account(users.as_ref(), "me@x.com", Role::User).await;
        let e = svc.create(&me, lunch(me.id)).await.unwrap();
        let req = UpdateExpenseRequest { amount: Some(20.0), ..Default::default() };
        let updated = svc.update(&me, &e.id.to_string(), req).await.unwrap();
        assert_eq!(updated.amount, 20.0);
        assert_eq!(updated.title, "Lunch");
        assert_eq!(updated.user_id, me.id);

        let req = UpdateExpenseRequest { amount: Some(f64::INFINITY), ..Default::default() };
        assert!(matches!(
            svc.update(&me, &e.id.to_string(), req).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn delete_unlinks_from_owner() {
        let (svc, users, expenses) = service();
        let me = account(users.as_ref(), "me@x.com", Role::User).await;
        let e = svc.create(&me, lunch(me.id)).await.unwrap();
        let res = svc.delete(&me, &e.id.to_string()).await.unwrap();
        assert_eq!(res.expense.id, e.id);
        assert!(expenses.find_by_id(e.id).await.unwrap().is_none());
        assert!(users.find_by_id(me.id).await.unwrap().unwrap().expenses.is_empty());
        assert!(matches!(
            svc.delete(&me, &e.id.to_string()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_is_admin_only() {
        let (svc, users, _) = service();
        let me = account(users.as_ref(), "me@x.com", Role::User).await;
        let admin = account(users.as_ref(), "root@x.com", Role::Admin).await;
        assert!(matches!(svc.list(&me).await, Err(AppError::Forbidden(_))));
        assert!(svc.list(&admin).await.unwrap().is_empty());
        svc.create(&me, lunch(me.id)).await.unwrap();
        assert_eq!(svc.list(&admin).await.unwrap().len(), 1);
    }
}
