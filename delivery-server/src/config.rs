//! Environment-driven configuration
//!
//! Every section has working defaults so the server boots in a development
//! docker-compose setup without any variables set.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub logger: LoggerConfig,
    pub geocoding: GeocodingConfig,
    pub pricing: PricingConfig,
    pub analytics: AnalyticsConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Budget for draining in-flight requests on shutdown
    pub shutdown_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.dbname, self.ssl_mode
        )
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: u8,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db
            )
        }
    }
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub group_id: String,
    pub topics: KafkaTopics,
}

/// Topic per event family.
#[derive(Debug, Clone)]
pub struct KafkaTopics {
    pub orders: String,
    pub couriers: String,
    pub locations: String,
}

impl KafkaTopics {
    pub fn all(&self) -> Vec<String> {
        vec![
            self.orders.clone(),
            self.couriers.clone(),
            self.locations.clone(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub level: String,
    pub format: String,
    /// Directory for daily-rolling log files; stdout only when unset
    pub dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeocodingConfig {
    /// `offline` | `yandex`
    pub provider: String,
    pub api_key: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct PricingConfig {
    pub base_fare: f64,
    pub per_km: f64,
    pub min_fare: f64,
}

#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub cache_ttl_minutes: u64,
    pub max_range_days: i64,
    pub default_group_by: String,
    pub default_top_limit: i64,
    pub default_courier_limit: i64,
    pub timeout_seconds: u64,
}

impl AnalyticsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes.max(1) * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(if self.timeout_seconds > 0 {
            self.timeout_seconds
        } else {
            5
        })
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests: i64,
    pub window_seconds: u64,
    pub key_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env_or("SERVER_HOST", "0.0.0.0"),
                port: parse_or("SERVER_PORT", 8080),
                shutdown_timeout_seconds: parse_or("SERVER_SHUTDOWN_TIMEOUT", 30),
            },
            database: DatabaseConfig {
                host: env_or("DB_HOST", "localhost"),
                port: parse_or("DB_PORT", 5432),
                user: env_or("DB_USER", "delivery_user"),
                password: env_or("DB_PASSWORD", "delivery_pass"),
                dbname: env_or("DB_NAME", "delivery_system"),
                ssl_mode: env_or("DB_SSL_MODE", "disable"),
                max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            },
            redis: RedisConfig {
                host: env_or("REDIS_HOST", "localhost"),
                port: parse_or("REDIS_PORT", 6379),
                password: env_or("REDIS_PASSWORD", ""),
                db: parse_or("REDIS_DB", 0),
            },
            kafka: KafkaConfig {
                brokers: env_or("KAFKA_BROKERS", "localhost:9092")
                    .split(',')
                    .map(|b| b.trim().to_string())
                    .filter(|b| !b.is_empty())
                    .collect(),
                group_id: env_or("KAFKA_GROUP_ID", "delivery-system"),
                topics: KafkaTopics {
                    orders: env_or("KAFKA_TOPIC_ORDERS", "orders"),
                    couriers: env_or("KAFKA_TOPIC_COURIERS", "couriers"),
                    locations: env_or("KAFKA_TOPIC_LOCATIONS", "locations"),
                },
            },
            logger: LoggerConfig {
                level: env_or("LOG_LEVEL", "info"),
                format: env_or("LOG_FORMAT", "text"),
                dir: env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            },
            geocoding: GeocodingConfig {
                provider: env_or("GEOCODER_PROVIDER", "offline"),
                api_key: env_or("GEOCODER_API_KEY", ""),
                base_url: env_or("GEOCODER_BASE_URL", "https://geocode-maps.yandex.ru/1.x"),
                timeout_seconds: parse_or("GEOCODER_TIMEOUT_SECONDS", 5),
            },
            pricing: PricingConfig {
                base_fare: parse_or("PRICING_BASE_FARE", 100.0),
                per_km: parse_or("PRICING_PER_KM", 20.0),
                min_fare: parse_or("PRICING_MIN_FARE", 150.0),
            },
            analytics: AnalyticsConfig {
                cache_ttl_minutes: parse_or("ANALYTICS_CACHE_TTL_MINUTES", 10),
                max_range_days: parse_or("ANALYTICS_MAX_RANGE_DAYS", 365),
                default_group_by: env_or("ANALYTICS_DEFAULT_GROUP_BY", "none"),
                default_top_limit: parse_or("ANALYTICS_DEFAULT_TOP_LIMIT", 5),
                default_courier_limit: parse_or("ANALYTICS_DEFAULT_COURIER_LIMIT", 50),
                timeout_seconds: parse_or("ANALYTICS_TIMEOUT_SECONDS", 5),
            },
            rate_limit: RateLimitConfig {
                enabled: parse_or("RATE_LIMIT_ENABLED", false),
                requests: parse_or("RATE_LIMIT_REQUESTS", 100),
                window_seconds: parse_or("RATE_LIMIT_WINDOW_SECONDS", 60),
                key_prefix: env_or("RATE_LIMIT_PREFIX", "ratelimit"),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        // Only read keys that are unlikely to be set in a test environment.
        let config = Config::from_env();
        assert_eq!(config.pricing.min_fare, 150.0);
        assert_eq!(config.analytics.max_range_days, 365);
        assert_eq!(config.rate_limit.key_prefix, "ratelimit");
        assert_eq!(config.kafka.topics.all().len(), 3);
    }

    #[test]
    fn database_url_includes_ssl_mode() {
        let db = DatabaseConfig {
            host: "db".into(),
            port: 5432,
            user: "u".into(),
            password: "p".into(),
            dbname: "delivery".into(),
            ssl_mode: "disable".into(),
            max_connections: 10,
        };
        assert_eq!(db.url(), "postgres://u:p@db:5432/delivery?sslmode=disable");
    }

    #[test]
    fn redis_url_with_and_without_password() {
        let mut redis = RedisConfig {
            host: "cache".into(),
            port: 6379,
            password: String::new(),
            db: 2,
        };
        assert_eq!(redis.url(), "redis://cache:6379/2");
        redis.password = "secret".into();
        assert_eq!(redis.url(), "redis://:secret@cache:6379/2");
    }
}
