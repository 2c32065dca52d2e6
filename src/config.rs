// src/config.rs
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_host")]
    pub database_host: String,
    #[serde(default = "default_database_name")]
    pub database_name: String,
    #[serde(default = "default_database_user")]
    pub database_user: String,
    #[serde(default)]
    pub database_password: String,
    #[serde(default = "default_database_port")]
    pub database_port: u16,

    /// Set by the hosting platform; its presence switches error messages to
    /// the production policy.
    pub render_service_name: Option<String>,

    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: u64,

    pub stripe_secret_key: Option<String>,
    pub stripe_price_id: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    #[serde(default = "default_stripe_api_url")]
    pub stripe_api_url: String,

    #[serde(default = "default_app_url")]
    pub app_url: String,

    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,

    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_database_host() -> String {
    "localhost".to_string()
}

fn default_database_name() -> String {
    "stories_db".to_string()
}

fn default_database_user() -> String {
    "root".to_string()
}

fn default_database_port() -> u16 {
    5432
}

fn default_secret_key() -> String {
    "change-me-in-production".to_string()
}

fn default_session_ttl_minutes() -> u64 {
    24 * 60
}

fn default_stripe_api_url() -> String {
    "https://api.stripe.com/v1".to_string()
}

fn default_app_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_admin_email() -> String {
    "admin@yourdomain.com".to_string()
}

fn default_admin_password() -> String {
    "admin123".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn is_production(&self) -> bool {
        self.render_service_name.is_some()
    }

    /// Connection string without the password, safe to log.
    pub fn redacted_dsn(&self) -> String {
        format!(
            "postgres://{}@{}:{}/{}",
            self.database_user, self.database_host, self.database_port, self.database_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        envy::from_iter(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn every_setting_has_a_default() {
        let config = from_pairs(&[]);
        assert_eq!(config.database_host, "localhost");
        assert_eq!(config.database_name, "stories_db");
        assert_eq!(config.database_user, "root");
        assert_eq!(config.database_password, "");
        assert_eq!(config.database_port, 5432);
        assert!(!config.is_production());
        assert!(config.stripe_secret_key.is_none());
        assert_eq!(config.port, 5000);
    }

    #[test]
    fn settings_default_independently() {
        let config = from_pairs(&[("DATABASE_HOST", "db.internal"), ("DATABASE_PORT", "6543")]);
        assert_eq!(config.database_host, "db.internal");
        assert_eq!(config.database_port, 6543);
        assert_eq!(config.database_name, "stories_db");
        assert_eq!(config.database_user, "root");
    }

    #[test]
    fn platform_variable_marks_production() {
        let config = from_pairs(&[("RENDER_SERVICE_NAME", "stories")]);
        assert!(config.is_production());
    }

    #[test]
    fn redacted_dsn_omits_password() {
        let config = from_pairs(&[("DATABASE_PASSWORD", "hunter2")]);
        let dsn = config.redacted_dsn();
        assert_eq!(dsn, "postgres://root@localhost:5432/stories_db");
        assert!(!dsn.contains("hunter2"));
    }
}
