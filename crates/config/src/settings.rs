use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub object_store: ObjectStoreSettings,
    pub engine: EngineSettings,
    pub pricing: PricingSettings,
    pub retention: RetentionSettings,
    pub alerts: AlertSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_ttl_secs: u64,
    pub issuer: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObjectStoreSettings {
    pub endpoint: String,
    pub api_key: String,
    pub bucket: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    pub base_url: String,
    pub api_key: String,
    pub webhook_secret: String,
    /// Upper bound on a single engine call. Large media files take a while,
    /// so this defaults to 10 minutes; elapsing it counts as a transient
    /// failure.
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingSettings {
    pub transcription_per_minute_usd: f64,
    pub summarization_usd: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetentionSettings {
    pub retention_days: i64,
    pub sweep_cron: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertSettings {
    pub high_cost_threshold_usd: f64,
    pub lookback_hours: i64,
    pub cooldown_hours: i64,
    pub monitor_cron: String,
    pub reconcile_cron: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("MEDIASCRIBE"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "mediascribe")?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.access_token_ttl_secs", 3600)?
            .set_default("jwt.issuer", "mediascribe")?
            .set_default("object_store.endpoint", "http://localhost:9000")?
            .set_default("object_store.api_key", "")?
            .set_default("object_store.bucket", "mediascribe")?
            .set_default("engine.base_url", "http://localhost:8100")?
            .set_default("engine.api_key", "")?
            .set_default("engine.webhook_secret", "change-me-in-production")?
            .set_default("engine.request_timeout_secs", 600)?
            .set_default("engine.max_retries", 3)?
            .set_default("pricing.transcription_per_minute_usd", 0.006)?
            .set_default("pricing.summarization_usd", 0.01)?
            .set_default("retention.retention_days", 30)?
            .set_default("retention.sweep_cron", "0 0 3 * * *")?
            .set_default("alerts.high_cost_threshold_usd", 50.0)?
            .set_default("alerts.lookback_hours", 24)?
            .set_default("alerts.cooldown_hours", 24)?
            .set_default("alerts.monitor_cron", "0 0 * * * *")?
            .set_default("alerts.reconcile_cron", "0 30 4 * * *")?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
