use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub payments: PaymentsConfig,
    pub uploads: UploadsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
    pub default_page_limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Payment provider secret key. When absent the API runs in dev mode
    /// and checkout grants the purchase immediately.
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub provider_base_url: String,
    pub currency: String,
    /// Share of each sale credited to the seller, in percent.
    pub seller_share_percent: u8,
    pub min_payout_cents: i64,
    /// Public base URL used for checkout redirect targets.
    pub app_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    pub dir: String,
    pub max_file_bytes: usize,
    pub allowed_extensions: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging =
                v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes =
                v.parse().unwrap_or(self.api.max_request_size_bytes);
        }
        if let Ok(v) = env::var("API_DEFAULT_PAGE_LIMIT") {
            self.api.default_page_limit = v.parse().unwrap_or(self.api.default_page_limit);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours =
                v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }

        // Payments overrides
        if let Ok(v) = env::var("STRIPE_SECRET_KEY") {
            if !v.is_empty() {
                self.payments.secret_key = Some(v);
            }
        }
        if let Ok(v) = env::var("STRIPE_WEBHOOK_SECRET") {
            if !v.is_empty() {
                self.payments.webhook_secret = Some(v);
            }
        }
        if let Ok(v) = env::var("PAYMENTS_PROVIDER_BASE_URL") {
            self.payments.provider_base_url = v;
        }
        if let Ok(v) = env::var("PAYMENTS_CURRENCY") {
            self.payments.currency = v;
        }
        if let Ok(v) = env::var("PAYMENTS_SELLER_SHARE_PERCENT") {
            self.payments.seller_share_percent =
                v.parse().unwrap_or(self.payments.seller_share_percent);
        }
        if let Ok(v) = env::var("PAYMENTS_MIN_PAYOUT_CENTS") {
            self.payments.min_payout_cents =
                v.parse().unwrap_or(self.payments.min_payout_cents);
        }
        if let Ok(v) = env::var("APP_URL") {
            self.payments.app_url = v;
        }

        // Uploads overrides
        if let Ok(v) = env::var("UPLOADS_DIR") {
            self.uploads.dir = v;
        }
        if let Ok(v) = env::var("UPLOADS_MAX_FILE_BYTES") {
            self.uploads.max_file_bytes = v.parse().unwrap_or(self.uploads.max_file_bytes);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                enable_query_logging: true,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
                default_page_limit: 50,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
                jwt_secret: "devsecret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                bcrypt_cost: 10,
            },
            payments: PaymentsConfig {
                secret_key: None,
                webhook_secret: None,
                provider_base_url: "https://api.stripe.com".to_string(),
                currency: "usd".to_string(),
                seller_share_percent: 85,
                min_payout_cents: 1000,
                app_url: "http://localhost:8000".to_string(),
            },
            uploads: UploadsConfig {
                dir: "static/uploads".to_string(),
                max_file_bytes: 5 * 1024 * 1024, // 5MB
                allowed_extensions: default_image_extensions(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                enable_query_logging: true,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
                default_page_limit: 50,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                bcrypt_cost: 12,
            },
            payments: PaymentsConfig {
                secret_key: None,
                webhook_secret: None,
                provider_base_url: "https://api.stripe.com".to_string(),
                currency: "usd".to_string(),
                seller_share_percent: 85,
                min_payout_cents: 1000,
                app_url: "https://staging.example.com".to_string(),
            },
            uploads: UploadsConfig {
                dir: "static/uploads".to_string(),
                max_file_bytes: 5 * 1024 * 1024,
                allowed_extensions: default_image_extensions(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
                default_page_limit: 25,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                bcrypt_cost: 12,
            },
            payments: PaymentsConfig {
                secret_key: None,
                webhook_secret: None,
                provider_base_url: "https://api.stripe.com".to_string(),
                currency: "usd".to_string(),
                seller_share_percent: 85,
                min_payout_cents: 1000,
                app_url: "https://app.example.com".to_string(),
            },
            uploads: UploadsConfig {
                dir: "static/uploads".to_string(),
                max_file_bytes: 5 * 1024 * 1024,
                allowed_extensions: default_image_extensions(),
            },
        }
    }
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "webp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.security.jwt_secret, "devsecret");
        assert_eq!(config.security.jwt_expiry_hours, 24 * 7);
        assert_eq!(config.payments.seller_share_percent, 85);
        assert!(config.payments.secret_key.is_none());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.security.jwt_secret.is_empty());
        assert!(!config.api.enable_request_logging);
        assert_eq!(config.security.bcrypt_cost, 12);
    }

    #[test]
    fn test_upload_extension_allowlist() {
        let config = AppConfig::development();
        assert!(config.uploads.allowed_extensions.iter().any(|e| e == "png"));
        assert!(!config.uploads.allowed_extensions.iter().any(|e| e == "exe"));
    }
}
