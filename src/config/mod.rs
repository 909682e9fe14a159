//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, builder::BoolishValueParser};
use config::{Config, Environment as EnvSource, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;


const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vetrina";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CACHE_FRESH_SECS: u64 = 5 * 60;
const DEFAULT_CACHE_EVICT_SECS: u64 = 10 * 60;
const DEFAULT_LANGUAGE_CODE: &str = "en";

/// Command-line arguments for the Vetrina binary.
#[derive(Debug, Parser)]
#[command(name = "vetrina", version, about = "Vetrina content-delivery server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VETRINA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the deployment environment (development|production).
    #[arg(long = "site-environment", value_name = "ENV")]
    pub site_environment: Option<String>,

    /// Override the configured public base URL.
    #[arg(long = "site-public-url", value_name = "URL")]
    pub site_public_url: Option<String>,

    /// Toggle the SEO feature flag gating dynamic sitemap generation.
    #[arg(
        long = "site-enable-seo",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub site_enable_seo: Option<bool>,

    /// Override the pages directory scanned for dynamic routes.
    #[arg(long = "site-pages-dir", value_name = "PATH")]
    pub site_pages_dir: Option<PathBuf>,

    /// Override the page-settings API endpoint.
    #[arg(long = "site-settings-api-url", value_name = "URL")]
    pub site_settings_api_url: Option<String>,

    /// Override the cache freshness window in seconds.
    #[arg(long = "cache-fresh-seconds", value_name = "SECONDS")]
    pub cache_fresh_seconds: Option<u64>,

    /// Override the cache eviction window in seconds.
    #[arg(long = "cache-evict-seconds", value_name = "SECONDS")]
    pub cache_evict_seconds: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub site: SiteSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Deployment environment, driving base-URL resolution for the sitemap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub environment: Environment,
    pub public_url: Option<Url>,
    pub enable_seo: bool,
    pub languages: Vec<String>,
    pub default_language: String,
    pub pages_dir: Option<PathBuf>,
    pub settings_api_url: Option<Url>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            public_url: None,
            enable_seo: false,
            languages: vec![DEFAULT_LANGUAGE_CODE.to_string()],
            default_language: DEFAULT_LANGUAGE_CODE.to_string(),
            pages_dir: None,
            settings_api_url: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub fresh_for: Duration,
    pub evict_after: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Parse the CLI and load settings with the configured precedence.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(EnvSource::with_prefix("VETRINA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    site: RawSiteSettings,
    cache: RawCacheSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    public_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    environment: Option<String>,
    public_url: Option<String>,
    enable_seo: Option<bool>,
    languages: Option<Vec<String>>,
    default_language: Option<String>,
    pages_dir: Option<PathBuf>,
    settings_api_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    fresh_seconds: Option<u64>,
    evict_seconds: Option<u64>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(environment) = overrides.site_environment.as_ref() {
            self.site.environment = Some(environment.clone());
        }
        if let Some(url) = overrides.site_public_url.as_ref() {
            self.site.public_url = Some(url.clone());
        }
        if let Some(enabled) = overrides.site_enable_seo {
            self.site.enable_seo = Some(enabled);
        }
        if let Some(dir) = overrides.site_pages_dir.as_ref() {
            self.site.pages_dir = Some(dir.clone());
        }
        if let Some(url) = overrides.site_settings_api_url.as_ref() {
            self.site.settings_api_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.cache_fresh_seconds {
            self.cache.fresh_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.cache_evict_seconds {
            self.cache.evict_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            site,
            cache,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let site = build_site_settings(site)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self {
            server,
            logging,
            site,
            cache,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let environment = match site.environment {
        Some(value) => Environment::from_str(&value)
            .map_err(|reason| LoadError::invalid("site.environment", reason))?,
        None => Environment::Development,
    };

    let public_url = site
        .public_url
        .map(|value| {
            Url::parse(value.trim())
                .map_err(|err| LoadError::invalid("site.public_url", err.to_string()))
        })
        .transpose()?;

    if environment == Environment::Production && public_url.is_none() {
        return Err(LoadError::invalid(
            "site.public_url",
            "required when site.environment is production",
        ));
    }

    let languages: Vec<String> = site
        .languages
        .unwrap_or_else(|| vec![DEFAULT_LANGUAGE_CODE.to_string()])
        .into_iter()
        .map(|code| code.trim().to_ascii_lowercase())
        .filter(|code| !code.is_empty())
        .collect();
    if languages.is_empty() {
        return Err(LoadError::invalid(
            "site.languages",
            "at least one language code is required",
        ));
    }

    let default_language = site
        .default_language
        .map(|code| code.trim().to_ascii_lowercase())
        .unwrap_or_else(|| languages[0].clone());
    if !languages.contains(&default_language) {
        return Err(LoadError::invalid(
            "site.default_language",
            format!("`{default_language}` is not in site.languages"),
        ));
    }

    let settings_api_url = site
        .settings_api_url
        .map(|value| {
            Url::parse(value.trim())
                .map_err(|err| LoadError::invalid("site.settings_api_url", err.to_string()))
        })
        .transpose()?;

    Ok(SiteSettings {
        environment,
        public_url,
        enable_seo: site.enable_seo.unwrap_or(false),
        languages,
        default_language,
        pages_dir: site.pages_dir,
        settings_api_url,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let fresh_secs = cache.fresh_seconds.unwrap_or(DEFAULT_CACHE_FRESH_SECS);
    if fresh_secs == 0 {
        return Err(LoadError::invalid(
            "cache.fresh_seconds",
            "must be greater than zero",
        ));
    }

    let evict_secs = cache.evict_seconds.unwrap_or(DEFAULT_CACHE_EVICT_SECS);
    if evict_secs < fresh_secs {
        return Err(LoadError::invalid(
            "cache.evict_seconds",
            "must not be shorter than cache.fresh_seconds",
        ));
    }

    Ok(CacheSettings {
        fresh_for: Duration::from_secs(fresh_secs),
        evict_after: Duration::from_secs(evict_secs),
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    format!("{host}:{port}")
        .parse()
        .map_err(|err| format!("failed to parse `{host}:{port}`: {err}"))
}
