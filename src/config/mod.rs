//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Parser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const ENV_PREFIX: &str = "MOORAGE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;

/// Command-line arguments for the Moorage binary.
#[derive(Debug, Parser)]
#[command(name = "moorage", version, about = "Moorage classifieds backend")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MOORAGE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CliOverrides {
    /// Bind host for the HTTP server.
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Bind port for the HTTP server.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Postgres connection URL.
    #[arg(long = "database-url", env = "MOORAGE_DATABASE_URL", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid setting `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub secret_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub signing_secret: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub gateway: GatewaySettings,
    pub webhook: WebhookSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Default)]
struct RawSettings {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    database: RawDatabase,
    #[serde(default)]
    gateway: RawGateway,
    #[serde(default)]
    webhook: RawWebhook,
    #[serde(default)]
    logging: RawLogging,
}

#[derive(Debug, Deserialize, Default)]
struct RawServer {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct RawDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct RawGateway {
    base_url: Option<String>,
    secret_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawWebhook {
    signing_secret: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl Settings {
    pub fn load(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false));

        if let Some(path) = &args.config_file {
            builder = builder.add_source(File::from(path.clone()).required(true));
        }

        let raw: RawSettings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        Self::from_raw(raw, &args.overrides)
    }

    fn from_raw(raw: RawSettings, overrides: &CliOverrides) -> Result<Self, ConfigError> {
        let host = overrides
            .host
            .clone()
            .or(raw.server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let host: IpAddr = host.parse().map_err(|err| ConfigError::Invalid {
            key: "server.host",
            message: format!("{err}"),
        })?;
        let port = overrides.port.or(raw.server.port).unwrap_or(DEFAULT_PORT);

        let url = overrides
            .database_url
            .clone()
            .or(raw.database.url)
            .ok_or(ConfigError::Invalid {
                key: "database.url",
                message: "a Postgres connection URL is required".to_string(),
            })?;

        let secret_key = raw.gateway.secret_key.ok_or(ConfigError::Invalid {
            key: "gateway.secret_key",
            message: "the provider secret key is required".to_string(),
        })?;
        let signing_secret = raw.webhook.signing_secret.ok_or(ConfigError::Invalid {
            key: "webhook.signing_secret",
            message: "the callback signing secret is required".to_string(),
        })?;

        let level = match raw.logging.level {
            Some(value) => LevelFilter::from_str(&value).map_err(|err| ConfigError::Invalid {
                key: "logging.level",
                message: format!("{err}"),
            })?,
            None => LevelFilter::INFO,
        };

        Ok(Settings {
            server: ServerSettings {
                addr: SocketAddr::new(host, port),
            },
            database: DatabaseSettings {
                url,
                max_connections: raw
                    .database
                    .max_connections
                    .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
            },
            gateway: GatewaySettings {
                base_url: raw
                    .gateway
                    .base_url
                    .unwrap_or_else(|| DEFAULT_GATEWAY_BASE_URL.to_string()),
                secret_key,
                timeout: Duration::from_secs(
                    raw.gateway.timeout_secs.unwrap_or(DEFAULT_GATEWAY_TIMEOUT_SECS),
                ),
            },
            webhook: WebhookSettings { signing_secret },
            logging: LoggingSettings {
                level,
                format: raw.logging.format.unwrap_or(LogFormat::Compact),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with_required() -> RawSettings {
        RawSettings {
            database: RawDatabase {
                url: Some("postgres://localhost/moorage".to_string()),
                max_connections: None,
            },
            gateway: RawGateway {
                secret_key: Some("sk_test".to_string()),
                ..RawGateway::default()
            },
            webhook: RawWebhook {
                signing_secret: Some("whsec_test".to_string()),
            },
            ..RawSettings::default()
        }
    }

    #[test]
    fn defaults_fill_in() {
        let settings =
            Settings::from_raw(raw_with_required(), &CliOverrides::default()).expect("settings");
        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert_eq!(settings.database.max_connections, DEFAULT_DB_MAX_CONNECTIONS);
        assert_eq!(settings.gateway.base_url, DEFAULT_GATEWAY_BASE_URL);
        assert_eq!(settings.logging.level, LevelFilter::INFO);
        assert_eq!(settings.logging.format, LogFormat::Compact);
    }

    #[test]
    fn cli_overrides_win() {
        let overrides = CliOverrides {
            host: Some("0.0.0.0".to_string()),
            port: Some(8080),
            database_url: Some("postgres://db/override".to_string()),
        };
        let settings = Settings::from_raw(raw_with_required(), &overrides).expect("settings");
        assert_eq!(settings.server.addr.to_string(), "0.0.0.0:8080");
        assert_eq!(settings.database.url, "postgres://db/override");
    }

    #[test]
    fn missing_database_url_is_rejected() {
        let mut raw = raw_with_required();
        raw.database.url = None;
        let err = Settings::from_raw(raw, &CliOverrides::default()).expect_err("missing url");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "database.url",
                ..
            }
        ));
    }
}
