//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::cache::Section;
use crate::presentation::views::{BODY_TEMPLATE, HEADER_TEMPLATE};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "catalog-fragments";
const ENV_PREFIX: &str = "CATALOG_FRAGMENTS";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CACHE_CAPACITY: usize = 500;
const DEFAULT_CATALOG_DOMAINS: [&str; 3] = ["media", "price", "text"];
const DEFAULT_STOCK_URL: &str = "http://127.0.0.1:3000/catalog/stock";
const DEFAULT_LOCALE: &str = "en";
const DEFAULT_CATALOG_FILE: &str = "catalog.json";

/// Command-line arguments for the catalog fragment binary.
#[derive(Debug, Parser)]
#[command(
    name = "catalog-fragments",
    version,
    about = "Cached catalog product list fragments"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "CATALOG_FRAGMENTS_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve the fragments over HTTP.
    Serve(ServeArgs),
    /// Render one fragment to stdout.
    Render(RenderArgs),
}

/// Overrides shared by every command.
#[derive(Debug, Args, Default, Clone)]
pub struct RuntimeOverrides {
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

    /// Override the JSON product catalog file.
    #[arg(long = "catalog-file", value_name = "PATH")]
    pub catalog_file: Option<PathBuf>,

    /// Replace the configured product codes; repeat to list several.
    #[arg(long = "product-code", value_name = "CODE")]
    pub product_codes: Vec<String>,

    /// Render without the fragment cache.
    #[arg(long = "no-cache", action = clap::ArgAction::SetTrue)]
    pub no_cache: bool,

    /// Override the locale used for error messages.
    #[arg(long = "locale", value_name = "LOCALE")]
    pub locale: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,

    /// Fragment section to render (body|header).
    #[arg(long, value_name = "SECTION", default_value = "body")]
    pub section: Section,

    /// Widget instance identifier.
    #[arg(long, value_name = "UID", default_value = "")]
    pub uid: String,

    /// Extra request parameter as KEY=VALUE; repeatable.
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,
}

fn parse_param(value: &str) -> Result<(String, String), String> {
    let (key, val) = value
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{value}`"))?;
    if key.is_empty() {
        return Err(format!("parameter name must not be empty in `{value}`"));
    }
    Ok((key.to_string(), val.to_string()))
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub catalog: CatalogSettings,
    pub i18n: I18nSettings,
    pub source: SourceSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
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

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: usize,
    pub tag_all: bool,
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Data domains loaded for every catalog widget.
    pub domains: Vec<String>,
    pub stock_url: Url,
    pub product: ProductSettings,
}

#[derive(Debug, Clone)]
pub struct ProductSettings {
    /// Replaces `catalog.domains` for the product list when set.
    pub domains: Option<Vec<String>>,
    pub codes: Vec<String>,
    pub stock_enabled: bool,
    pub basket_add: bool,
    pub subparts: Vec<String>,
    pub template_body: String,
    pub template_header: String,
}

#[derive(Debug, Clone)]
pub struct I18nSettings {
    pub locale: String,
    pub translations: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub catalog_file: PathBuf,
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

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("catalog.domains")
            .with_list_parse_key("catalog.product.domains")
            .with_list_parse_key("catalog.product.codes")
            .with_list_parse_key("catalog.product.subparts")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(args),
        Some(Command::Render(args)) => raw.apply_runtime_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeArgs::default()),
    }

    Settings::from_raw(raw)
}

/// Parse the process arguments and load settings from them.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    catalog: RawCatalogSettings,
    i18n: RawI18nSettings,
    source: RawSourceSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, args: &ServeArgs) {
        if let Some(host) = args.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = args.server_port {
            self.server.port = Some(port);
        }

        self.apply_runtime_overrides(&args.overrides);
    }

    fn apply_runtime_overrides(&mut self, overrides: &RuntimeOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(path) = overrides.catalog_file.as_ref() {
            self.source.catalog_file = Some(path.clone());
        }
        if !overrides.product_codes.is_empty() {
            self.catalog.product.codes = Some(overrides.product_codes.clone());
        }
        if overrides.no_cache {
            self.cache.enabled = Some(false);
        }
        if let Some(locale) = overrides.locale.as_ref() {
            self.i18n.locale = Some(locale.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            catalog,
            i18n,
            source,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            catalog: build_catalog_settings(catalog)?,
            i18n: build_i18n_settings(i18n)?,
            source: build_source_settings(source)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

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
        addr,
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

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity = cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
    if capacity == 0 {
        return Err(LoadError::invalid(
            "cache.capacity",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity,
        tag_all: cache.tag_all.unwrap_or(true),
    })
}

fn build_catalog_settings(catalog: RawCatalogSettings) -> Result<CatalogSettings, LoadError> {
    let domains = catalog.domains.unwrap_or_else(|| {
        DEFAULT_CATALOG_DOMAINS
            .iter()
            .map(|domain| domain.to_string())
            .collect()
    });
    let domains = non_empty_entries(domains, "catalog.domains")?;

    let stock_url = catalog
        .stock_url
        .unwrap_or_else(|| DEFAULT_STOCK_URL.to_string());
    let stock_url = Url::parse(stock_url.trim())
        .map_err(|err| LoadError::invalid("catalog.stock_url", format!("invalid URL: {err}")))?;

    let product = catalog.product;
    let product_domains = product
        .domains
        .map(|domains| non_empty_entries(domains, "catalog.product.domains"))
        .transpose()?;
    let codes = non_empty_entries(product.codes.unwrap_or_default(), "catalog.product.codes")?;

    let template_body = product
        .template_body
        .unwrap_or_else(|| BODY_TEMPLATE.to_string());
    if template_body.trim().is_empty() {
        return Err(LoadError::invalid(
            "catalog.product.template_body",
            "template must not be empty",
        ));
    }
    let template_header = product
        .template_header
        .unwrap_or_else(|| HEADER_TEMPLATE.to_string());
    if template_header.trim().is_empty() {
        return Err(LoadError::invalid(
            "catalog.product.template_header",
            "template must not be empty",
        ));
    }

    Ok(CatalogSettings {
        domains,
        stock_url,
        product: ProductSettings {
            domains: product_domains,
            codes,
            stock_enabled: product.stock_enabled.unwrap_or(true),
            basket_add: product.basket_add.unwrap_or(false),
            subparts: product.subparts.unwrap_or_default(),
            template_body,
            template_header,
        },
    })
}

fn build_i18n_settings(i18n: RawI18nSettings) -> Result<I18nSettings, LoadError> {
    let locale = i18n.locale.unwrap_or_else(|| DEFAULT_LOCALE.to_string());
    let locale = locale.trim().to_string();
    if locale.is_empty() {
        return Err(LoadError::invalid("i18n.locale", "locale must not be empty"));
    }

    let translations = i18n
        .translations
        .filter(|path| !path.as_os_str().is_empty());

    Ok(I18nSettings {
        locale,
        translations,
    })
}

fn build_source_settings(source: RawSourceSettings) -> Result<SourceSettings, LoadError> {
    let catalog_file = source
        .catalog_file
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_FILE));
    if catalog_file.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "source.catalog_file",
            "path must not be empty",
        ));
    }

    Ok(SourceSettings { catalog_file })
}

fn non_empty_entries(values: Vec<String>, key: &'static str) -> Result<Vec<String>, LoadError> {
    let values: Vec<String> = values
        .into_iter()
        .map(|value| value.trim().to_string())
        .collect();
    if values.iter().any(String::is_empty) {
        return Err(LoadError::invalid(key, "entries must not be empty"));
    }
    Ok(values)
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse::<SocketAddr>()
        .map_err(|err| format!("`{candidate}` is not a valid socket address: {err}"))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
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
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
    tag_all: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCatalogSettings {
    domains: Option<Vec<String>>,
    stock_url: Option<String>,
    product: RawProductSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawProductSettings {
    domains: Option<Vec<String>>,
    codes: Option<Vec<String>>,
    stock_enabled: Option<bool>,
    basket_add: Option<bool>,
    subparts: Option<Vec<String>>,
    template_body: Option<String>,
    template_header: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawI18nSettings {
    locale: Option<String>,
    translations: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSourceSettings {
    catalog_file: Option<PathBuf>,
}
