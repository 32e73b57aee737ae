use crate::auth::{jwt::JwtKeys, password::PasswordHasher, services::AuthService};
use crate::config::AppConfig;
use crate::expenses::{
    repo::{ExpenseRepo, InMemoryExpenseRepo, PgExpenseRepo},
    services::ExpenseService,
};
use crate::users::{
    repo::{InMemoryUserRepo, PgUserRepo, UserRepo},
    services::UserService,
};
use axum::extract::FromRef;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: Arc<JwtKeys>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub expenses: Arc<ExpenseService>,
}

impl FromRef<AppState> for Arc<JwtKeys> {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl AppState {
    /// Connects to Postgres and runs migrations when `DATABASE_URL` is set,
    /// otherwise falls back to the in-memory stores.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let Some(url) = config.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL not set; using in-memory stores, data is not persisted");
            return Self::in_memory(config);
        };

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        sqlx::migrate!("./migrations").run(&db).await?;
        tracing::info!("database ready");

        let users = Arc::new(PgUserRepo::new(db.clone())) as Arc<dyn UserRepo>;
        let expenses = Arc::new(PgExpenseRepo::new(db)) as Arc<dyn ExpenseRepo>;
        Self::from_parts(config, users, expenses)
    }

    pub fn in_memory(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let users = Arc::new(InMemoryUserRepo::new()) as Arc<dyn UserRepo>;
        let expenses = Arc::new(InMemoryExpenseRepo::new()) as Arc<dyn ExpenseRepo>;
        Self::from_parts(config, users, expenses)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        expenses: Arc<dyn ExpenseRepo>,
    ) -> anyhow::Result<Self> {
        let keys = Arc::new(JwtKeys::new(&config.jwt));
        let hasher = Arc::new(PasswordHasher::new(&config.password)?);

        let auth = AuthService::new(users.clone(), hasher.clone(), keys.clone())?;
        let user_service = UserService::new(users.clone(), expenses.clone(), hasher);
        let expense_service = ExpenseService::new(expenses, users);

        Ok(Self {
            config,
            keys,
            auth: Arc::new(auth),
            users: Arc::new(user_service),
            expenses: Arc::new(expense_service),
        })
    }
}
