use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub kafka: KafkaSettings,
    pub application: ApplicationSettings,
    pub cache: CacheSettings,
    pub idempotency: IdempotencySettings,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisSettings {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaSettings {
    pub brokers: String,
    pub topic_prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    pub port: u16,
    pub log_level: String,
}

/// Settings for the Redis-backed balance cache.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub balance_ttl_secs: u64,
    pub key_prefix: String,
}

/// Settings for the idempotency store. `ttl_seconds` bounds how long a
/// stored response stays eligible for replay before lazy expiry drops it.
#[derive(Debug, Deserialize, Clone)]
pub struct IdempotencySettings {
    pub ttl_seconds: i64,
    pub key_prefix: String,
}

/// Settings for the per-client request rate limiter sitting in front of the
/// transfer endpoint. The limiter itself lives outside this crate; these
/// fields only give it somewhere to read its knobs from.
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitSettings {
    pub per_minute: u32,
    pub per_hour: u32,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }
}
