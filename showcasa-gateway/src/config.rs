use serde::Deserialize;

/// How a socket's user identity is established at connect time.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Trust the `userId` query parameter as sent by the client.
    Asserted,
    /// Require a `token` query parameter whose subject equals `userId`.
    Token,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_auth_mode")]
    pub auth_mode: AuthMode,
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    // Broker resubscription
    #[serde(default = "default_initial_backoff_ms")]
    pub resubscribe_initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub resubscribe_max_backoff_ms: u64,
}

fn default_port() -> u16 { 4000 }
fn default_redis_url() -> String { "redis://localhost:6379".into() }
fn default_auth_mode() -> AuthMode { AuthMode::Asserted }
fn default_jwt_secret() -> String { "development-secret-change-in-production".into() }
fn default_initial_backoff_ms() -> u64 { 500 }
fn default_max_backoff_ms() -> u64 { 30_000 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            redis_url: default_redis_url(),
            auth_mode: default_auth_mode(),
            jwt_secret: default_jwt_secret(),
            resubscribe_initial_backoff_ms: default_initial_backoff_ms(),
            resubscribe_max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("SHOWCASA_GATEWAY").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_trust_asserted_identity() {
        let config: AppConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.port, 4000);
        assert_eq!(config.auth_mode, AuthMode::Asserted);
        assert_eq!(config.resubscribe_initial_backoff_ms, 500);
        assert_eq!(config.resubscribe_max_backoff_ms, 30_000);
    }

    #[test]
    fn test_token_mode_override() {
        let config: AppConfig = config::Config::builder()
            .set_override("auth_mode", "token")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.auth_mode, AuthMode::Token);
    }
}
