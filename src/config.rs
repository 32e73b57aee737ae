use serde::Deserialize;

/// Argon2 iteration count used when `PASSWORD_HASH_COST` is unset or unusable.
pub const DEFAULT_HASH_COST: u32 = 3;
/// Argon2 memory cost in KiB (argon2's own default, 19 MiB).
pub const DEFAULT_HASH_MEMORY_KIB: u32 = 19 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub cost: u32,
    pub memory_kib: u32,
}

/// Credentials for the administrator account created at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminSeed {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs the service on the in-memory stores.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub admin_seed: Option<AdminSeed>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "spendwise".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "spendwise-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(60),
        };
        anyhow::ensure!(!jwt.secret.is_empty(), "JWT_SECRET must not be empty");

        let password = PasswordConfig {
            cost: parse_cost(std::env::var("PASSWORD_HASH_COST").ok().as_deref()),
            memory_kib: std::env::var("PASSWORD_HASH_MEMORY_KIB")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_HASH_MEMORY_KIB),
        };

        let admin_seed = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(AdminSeed {
                user_name: std::env::var("ADMIN_USER_NAME").unwrap_or_else(|_| "admin".into()),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("APP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(8080),
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            jwt,
            password,
            admin_seed,
        })
    }
}

/// Unset, non-numeric and zero values all fall back to [`DEFAULT_HASH_COST`].
pub fn parse_cost(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_HASH_COST)
}
