use serde::Deserialize;

/// Application settings, loaded once at startup from the environment
/// (optionally seeded from a `.env` file). Read-only after load.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    #[serde(default = "default_pool_size")]
    pub database_pool_size: u32,
    /// Statement timeout in milliseconds applied to every pooled
    /// connection. Zero disables the timeout.
    #[serde(default)]
    pub database_statement_timeout_ms: u64,
    pub jwt_secret: String,
    #[serde(default = "default_jwt_algorithm")]
    pub jwt_algorithm: String,
    #[serde(default = "default_jwt_expiration_minutes")]
    pub jwt_expiration_minutes: i64,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Comma-separated list of allowed CORS origins. Empty means none.
    #[serde(default)]
    pub allow_origins: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_pool_size() -> u32 {
    10
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_jwt_expiration_minutes() -> i64 {
    60
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Signing secrets that must never reach production. Matching one of these
/// aborts startup even when the length requirement is met.
const WEAK_SECRETS: &[&str] = &[
    "secret",
    "changeme",
    "change-me",
    "password",
    "jwt-secret",
    "dev-secret",
    "default",
    "insecure",
    "00000000000000000000000000000000",
];

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let settings: Settings = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Fail-fast checks on secrets and knobs before any listener opens.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.jwt_secret.len() < 32 {
            return Err(config::ConfigError::Message(
                "JWT_SECRET must be at least 32 bytes".to_string(),
            ));
        }
        if WEAK_SECRETS.contains(&self.jwt_secret.to_lowercase().as_str()) {
            return Err(config::ConfigError::Message(
                "JWT_SECRET is a well-known default and must be replaced".to_string(),
            ));
        }
        if self.database_pool_size == 0 {
            return Err(config::ConfigError::Message(
                "DATABASE_POOL_SIZE must be positive".to_string(),
            ));
        }
        if self.jwt_expiration_minutes <= 0 {
            return Err(config::ConfigError::Message(
                "JWT_EXPIRATION_MINUTES must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed CORS origin list.
    pub fn allowed_origins(&self) -> Vec<String> {
        self.allow_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
