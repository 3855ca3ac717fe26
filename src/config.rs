use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff =
            self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis((backoff as u64).min(self.max_backoff_ms))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 5000,
            max_backoff_ms: 20_000,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Applied when a profile declares no heartBeatTimer, in seconds.
    pub default_timer: u32,
    pub grace_period: Duration,
    pub check_interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            default_timer: 30,
            grace_period: Duration::from_secs(10),
            check_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub retry: RetryConfig,
    /// Per-attempt bound on the callback request.
    pub timeout: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    Memory,
    Mongo { uri: String, db_name: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Advertised base URL used in subject URIs and Location headers.
    pub base_url: String,
    pub storage: StorageConfig,
    pub heartbeat: HeartbeatConfig,
    pub notification: NotificationConfig,
    /// Cache validity advertised with discovery results, in seconds.
    pub discovery_validity_secs: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_url: "http://127.0.0.1:8080".to_string(),
            storage: StorageConfig::Memory,
            heartbeat: HeartbeatConfig::default(),
            notification: NotificationConfig::default(),
            discovery_validity_secs: 3600,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        let host = env::var("NRF_HOST").unwrap_or(defaults.host);

        let port: u16 = env::var("NRF_PORT")
            .unwrap_or_else(|_| defaults.port.to_string())
            .parse()?;

        let base_url = env::var("NRF_BASE_URL")
            .unwrap_or_else(|_| format!("http://127.0.0.1:{port}"));

        let storage = match env::var("DATABASE_TYPE").as_deref() {
            Ok("mongodb") => StorageConfig::Mongo {
                uri: env::var("MONGODB_URI")
                    .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
                db_name: env::var("MONGODB_DB_NAME").unwrap_or_else(|_| "nrf".to_string()),
            },
            _ => StorageConfig::Memory,
        };

        let heartbeat = HeartbeatConfig {
            default_timer: env_parse("HEARTBEAT_DEFAULT_TIMER", defaults.heartbeat.default_timer),
            grace_period: Duration::from_secs(env_parse(
                "HEARTBEAT_GRACE_PERIOD",
                defaults.heartbeat.grace_period.as_secs(),
            )),
            check_interval: Duration::from_secs(env_parse(
                "HEARTBEAT_CHECK_INTERVAL",
                defaults.heartbeat.check_interval.as_secs(),
            )),
        };

        let notification = NotificationConfig {
            retry: RetryConfig {
                max_attempts: env_parse(
                    "NOTIFICATION_RETRY_ATTEMPTS",
                    defaults.notification.retry.max_attempts,
                ),
                initial_backoff_ms: env_parse(
                    "NOTIFICATION_RETRY_DELAY_MS",
                    defaults.notification.retry.initial_backoff_ms,
                ),
                max_backoff_ms: env_parse(
                    "NOTIFICATION_RETRY_MAX_DELAY_MS",
                    defaults.notification.retry.max_backoff_ms,
                ),
                backoff_multiplier: env_parse(
                    "NOTIFICATION_RETRY_MULTIPLIER",
                    defaults.notification.retry.backoff_multiplier,
                ),
            },
            timeout: Duration::from_millis(env_parse(
                "NOTIFICATION_TIMEOUT_MS",
                defaults.notification.timeout.as_millis() as u64,
            )),
        };

        let discovery_validity_secs = env_parse(
            "DISCOVERY_VALIDITY_PERIOD",
            defaults.discovery_validity_secs,
        );

        Ok(Self {
            host,
            port,
            base_url,
            storage,
            heartbeat,
            notification,
            discovery_validity_secs,
        })
    }

    pub fn nf_instance_uri(&self, nf_instance_id: &str) -> String {
        format!("{}/nnrf-nfm/v1/nf-instances/{nf_instance_id}", self.base_url)
    }

    pub fn subscription_uri(&self, subscription_id: &str) -> String {
        format!("{}/nnrf-nfm/v1/subscriptions/{subscription_id}", self.base_url)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
