//! Application options, environment and resolved configuration.
//!
//! Callers hand the factory a partial [`AppOptions`] record. The factory turns it
//! into an immutable [`AppConfig`] with [`AppConfig::resolve`], filling every
//! missing field with a default that may depend on the [`Environment`].

use std::str::FromStr;

use axum::http::{HeaderName, HeaderValue, Method};
use serde::Deserialize;
use strum::{Display, EnumString};

use crate::error::ConfigError;

/// Default request body limit (100 KiB).
pub const DEFAULT_BODY_LIMIT: usize = 100 * 1024;

/// Default header carrying the request id.
pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";

/// Runtime environment the application is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Environment {
    /// Local development.
    #[default]
    #[strum(to_string = "development", serialize = "dev")]
    Development,
    /// Automated tests.
    #[strum(to_string = "test")]
    Test,
    /// Pre-production.
    #[strum(to_string = "staging")]
    Staging,
    /// Production.
    #[strum(to_string = "production", serialize = "prod")]
    Production,
}

impl Environment {
    /// Whether this is the test environment.
    pub fn is_test(&self) -> bool {
        matches!(self, Environment::Test)
    }

    /// Parse an environment name.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        Self::from_str(name.trim()).map_err(|_| ConfigError::InvalidEnvironment(name.to_string()))
    }

    /// Read the environment from `APP_ENV` (.env file included), defaulting to
    /// development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        match std::env::var("APP_ENV") {
            Ok(value) => Self::parse(&value),
            Err(_) => Ok(Self::default()),
        }
    }
}

/// Request log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Deserialize)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Apache combined log format.
    Combined,
    /// Apache common log format.
    Common,
    /// Compact, developer oriented.
    Dev,
    /// Shorter than common, includes response time.
    Short,
    /// Minimal.
    Tiny,
    /// Structured fields only.
    Json,
}

impl LogFormat {
    /// Default format for an environment.
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => LogFormat::Dev,
            Environment::Test => LogFormat::Tiny,
            Environment::Staging | Environment::Production => LogFormat::Combined,
        }
    }
}

// === Partial options ===

/// Caller supplied options. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppOptions {
    /// Application name reported by `/ping`.
    pub name: Option<String>,
    /// Application version reported by `/ping`.
    pub version: Option<String>,
    /// CORS policy.
    pub cors: CorsOptions,
    /// Request tracing.
    pub trace: TraceOptions,
    /// Request logging.
    pub logging: LogOptions,
    /// Body parser toggles.
    pub body_parser: BodyParserOptions,
    /// Security headers.
    pub security: SecurityOptions,
}

/// Partial CORS policy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorsOptions {
    /// Allowed origins. Empty or `"*"` allows any origin.
    pub origins: Option<Vec<String>>,
    /// Allowed methods.
    pub methods: Option<Vec<String>>,
    /// Allowed request headers. Empty mirrors the preflight request.
    pub allowed_headers: Option<Vec<String>>,
    /// Response headers exposed to the browser.
    pub exposed_headers: Option<Vec<String>>,
    /// Allow credentials.
    pub credentials: Option<bool>,
    /// Preflight cache duration in seconds.
    pub max_age_secs: Option<u64>,
}

/// Partial request tracing options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TraceOptions {
    /// Header carrying the request id.
    pub request_id_header: Option<String>,
    /// Keep request ids sent by the client.
    pub trust_incoming: Option<bool>,
}

/// Partial request logging options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogOptions {
    /// Log line format.
    pub format: Option<LogFormat>,
    /// Paths that are never logged.
    pub ignore_paths: Option<Vec<String>>,
}

/// Partial body parser options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BodyParserOptions {
    /// Parse `application/json` bodies.
    pub json: Option<bool>,
    /// Parse `application/x-www-form-urlencoded` bodies.
    pub url_encoded: Option<bool>,
    /// Maximum buffered body size in bytes.
    pub limit_bytes: Option<usize>,
}

/// Partial security header options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityOptions {
    /// Send `Strict-Transport-Security`.
    pub hsts: Option<bool>,
}

/// Flat view of `APP_*` environment variables.
#[derive(Debug, Default, Deserialize)]
struct EnvOptions {
    name: Option<String>,
    version: Option<String>,
    cors_origins: Option<Vec<String>>,
    cors_credentials: Option<bool>,
    body_parser_json: Option<bool>,
    body_parser_url_encoded: Option<bool>,
    body_parser_limit: Option<usize>,
    log_format: Option<String>,
    request_id_header: Option<String>,
    hsts: Option<bool>,
}

impl EnvOptions {
    fn into_options(self) -> Result<AppOptions, ConfigError> {
        let format = self
            .log_format
            .map(|raw| LogFormat::from_str(raw.trim()).map_err(|_| ConfigError::InvalidLogFormat(raw)))
            .transpose()?;

        Ok(AppOptions {
            name: self.name,
            version: self.version,
            cors: CorsOptions {
                origins: self.cors_origins,
                credentials: self.cors_credentials,
                ..Default::default()
            },
            trace: TraceOptions {
                request_id_header: self.request_id_header,
                trust_incoming: None,
            },
            logging: LogOptions {
                format,
                ignore_paths: None,
            },
            body_parser: BodyParserOptions {
                json: self.body_parser_json,
                url_encoded: self.body_parser_url_encoded,
                limit_bytes: self.body_parser_limit,
            },
            security: SecurityOptions { hsts: self.hsts },
        })
    }
}

impl AppOptions {
    /// Load options from `APP_*` environment variables, reading .env file first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        envy::prefixed("APP_").from_env::<EnvOptions>()?.into_options()
    }

    /// Load options from an explicit set of `APP_*` variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed("APP_")
            .from_iter::<_, EnvOptions>(vars)?
            .into_options()
    }
}

// === Resolved configuration ===

/// Fully resolved application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment the configuration was resolved for.
    pub environment: Environment,
    /// CORS policy.
    pub cors: CorsConfig,
    /// Request tracing.
    pub trace: TraceConfig,
    /// Request logging.
    pub logging: LogConfig,
    /// Body parsing.
    pub body_parser: BodyParserConfig,
    /// Security headers.
    pub security: SecurityConfig,
}

/// Resolved CORS policy.
#[derive(Debug, Clone, PartialEq)]
pub struct CorsConfig {
    /// Allowed origins. Empty allows any origin.
    pub origins: Vec<HeaderValue>,
    /// Allowed methods.
    pub methods: Vec<Method>,
    /// Allowed request headers. Empty mirrors the preflight request.
    pub allowed_headers: Vec<HeaderName>,
    /// Exposed response headers.
    pub exposed_headers: Vec<HeaderName>,
    /// Allow credentials.
    pub credentials: bool,
    /// Preflight cache duration in seconds.
    pub max_age_secs: Option<u64>,
}

/// Resolved request tracing options.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceConfig {
    /// Header carrying the request id.
    pub request_id_header: HeaderName,
    /// Keep request ids sent by the client.
    pub trust_incoming: bool,
}

/// Resolved request logging options.
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Log line format.
    pub format: LogFormat,
    /// Paths that are never logged.
    pub ignore_paths: Vec<String>,
}

/// Resolved body parser options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyParserConfig {
    /// Parse JSON bodies.
    pub json: bool,
    /// Parse URL-encoded bodies.
    pub url_encoded: bool,
    /// Maximum buffered body size in bytes.
    pub limit_bytes: usize,
}

/// Resolved security header options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecurityConfig {
    /// Send `Strict-Transport-Security`.
    pub hsts: bool,
}

fn default_methods() -> Vec<Method> {
    vec![
        Method::GET,
        Method::HEAD,
        Method::PUT,
        Method::PATCH,
        Method::POST,
        Method::DELETE,
    ]
}

fn parse_header_names(names: Vec<String>) -> Result<Vec<HeaderName>, ConfigError> {
    names
        .into_iter()
        .map(|name| {
            HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|_| ConfigError::InvalidHeader(name))
        })
        .collect()
}

impl CorsConfig {
    fn resolve(options: CorsOptions) -> Result<Self, ConfigError> {
        let mut origins = Vec::new();
        for origin in options.origins.unwrap_or_default() {
            let trimmed = origin.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed == "*" {
                origins.clear();
                break;
            }
            let value = trimmed
                .parse::<HeaderValue>()
                .map_err(|_| ConfigError::InvalidOrigin(origin.clone()))?;
            origins.push(value);
        }

        let methods = match options.methods {
            Some(methods) => methods
                .into_iter()
                .map(|m| {
                    Method::from_bytes(m.trim().to_uppercase().as_bytes())
                        .map_err(|_| ConfigError::InvalidMethod(m))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => default_methods(),
        };

        let credentials = options.credentials.unwrap_or(false);
        if credentials && origins.is_empty() {
            return Err(ConfigError::CredentialsWithWildcard);
        }

        Ok(Self {
            origins,
            methods,
            allowed_headers: parse_header_names(options.allowed_headers.unwrap_or_default())?,
            exposed_headers: parse_header_names(options.exposed_headers.unwrap_or_default())?,
            credentials,
            max_age_secs: options.max_age_secs,
        })
    }

    /// Whether any origin is allowed.
    pub fn allows_any_origin(&self) -> bool {
        self.origins.is_empty()
    }
}

impl AppConfig {
    /// Merge caller options with environment dependent defaults.
    ///
    /// Pure: the same inputs always produce the same configuration.
    pub fn resolve(options: AppOptions, environment: Environment) -> Result<Self, ConfigError> {
        let request_id_header = match options.trace.request_id_header {
            Some(name) => HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|_| ConfigError::InvalidHeader(name))?,
            None => HeaderName::from_static(DEFAULT_REQUEST_ID_HEADER),
        };

        let limit_bytes = options.body_parser.limit_bytes.unwrap_or(DEFAULT_BODY_LIMIT);
        if limit_bytes == 0 {
            return Err(ConfigError::InvalidBodyLimit);
        }

        Ok(Self {
            name: options.name.unwrap_or_else(|| "app".to_string()),
            version: options
                .version
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            environment,
            cors: CorsConfig::resolve(options.cors)?,
            trace: TraceConfig {
                request_id_header,
                trust_incoming: options.trace.trust_incoming.unwrap_or(true),
            },
            logging: LogConfig {
                format: options
                    .logging
                    .format
                    .unwrap_or_else(|| LogFormat::for_environment(environment)),
                ignore_paths: options.logging.ignore_paths.unwrap_or_default(),
            },
            body_parser: BodyParserConfig {
                json: options.body_parser.json.unwrap_or(true),
                url_encoded: options.body_parser.url_encoded.unwrap_or(true),
                limit_bytes,
            },
            security: SecurityConfig {
                hsts: options
                    .security
                    .hsts
                    .unwrap_or(environment == Environment::Production),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn environment_reads_app_env() {
        std::env::set_var("APP_ENV", "prod");
        assert_eq!(Environment::from_env().unwrap(), Environment::Production);

        std::env::remove_var("APP_ENV");
        assert_eq!(Environment::from_env().unwrap(), Environment::Development);
    }

    #[test]
    fn environment_parses_aliases() {
        assert_eq!(Environment::parse("test").unwrap(), Environment::Test);
        assert_eq!(Environment::parse("PROD").unwrap(), Environment::Production);
        assert_eq!(Environment::parse("dev").unwrap(), Environment::Development);
        assert_eq!(Environment::Production.to_string(), "production");
        assert!(Environment::parse("moon").is_err());
    }

    #[test]
    fn defaults_depend_on_environment() {
        let dev = AppConfig::resolve(AppOptions::default(), Environment::Development).unwrap();
        let prod = AppConfig::resolve(AppOptions::default(), Environment::Production).unwrap();

        assert_eq!(dev.logging.format, LogFormat::Dev);
        assert_eq!(prod.logging.format, LogFormat::Combined);
        assert!(!dev.security.hsts);
        assert!(prod.security.hsts);
        assert!(dev.body_parser.json);
        assert!(dev.body_parser.url_encoded);
        assert_eq!(dev.body_parser.limit_bytes, DEFAULT_BODY_LIMIT);
        assert_eq!(dev.trace.request_id_header, DEFAULT_REQUEST_ID_HEADER);
        assert!(dev.cors.allows_any_origin());
    }

    #[test]
    fn resolve_is_deterministic() {
        let options = AppOptions {
            name: Some("svc".to_string()),
            ..Default::default()
        };
        let a = AppConfig::resolve(options.clone(), Environment::Staging).unwrap();
        let b = AppConfig::resolve(options, Environment::Staging).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn wildcard_origin_clears_list() {
        let options = AppOptions {
            cors: CorsOptions {
                origins: Some(vec!["https://a.example".to_string(), "*".to_string()]),
                ..Default::default()
            },
            ..Default::default()
        };
        let config = AppConfig::resolve(options, Environment::Test).unwrap();
        assert!(config.cors.allows_any_origin());
    }

    #[test]
    fn credentials_require_explicit_origins() {
        let options = AppOptions {
            cors: CorsOptions {
                credentials: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            AppConfig::resolve(options, Environment::Test),
            Err(ConfigError::CredentialsWithWildcard)
        ));
    }

    #[test]
    fn rejects_invalid_values() {
        let bad_method = AppOptions {
            cors: CorsOptions {
                methods: Some(vec!["GE T".to_string()]),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            AppConfig::resolve(bad_method, Environment::Test),
            Err(ConfigError::InvalidMethod(_))
        ));

        let bad_header = AppOptions {
            trace: TraceOptions {
                request_id_header: Some("bad header".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            AppConfig::resolve(bad_header, Environment::Test),
            Err(ConfigError::InvalidHeader(_))
        ));

        let zero_limit = AppOptions {
            body_parser: BodyParserOptions {
                limit_bytes: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            AppConfig::resolve(zero_limit, Environment::Test),
            Err(ConfigError::InvalidBodyLimit)
        ));
    }

    #[test]
    fn options_load_from_prefixed_vars() {
        let options = AppOptions::from_vars(vars(&[
            ("APP_NAME", "billing"),
            ("APP_CORS_ORIGINS", "https://a.example,https://b.example"),
            ("APP_BODY_PARSER_JSON", "false"),
            ("APP_LOG_FORMAT", "json"),
            ("UNRELATED", "x"),
        ]))
        .unwrap();

        assert_eq!(options.name.as_deref(), Some("billing"));
        assert_eq!(options.cors.origins.as_ref().map(Vec::len), Some(2));
        assert_eq!(options.body_parser.json, Some(false));
        assert_eq!(options.body_parser.url_encoded, None);
        assert_eq!(options.logging.format, Some(LogFormat::Json));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let result = AppOptions::from_vars(vars(&[("APP_LOG_FORMAT", "fancy")]));
        assert!(matches!(result, Err(ConfigError::InvalidLogFormat(_))));
    }
}
