//! Configuration for the OIDC demo relying party.
//!
//! Everything is read from the process environment once at startup and then
//! shared read-only with the request handlers.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default values and fixed names.
pub mod defaults {
    use std::time::Duration;

    /// Service name, used for the log and PID file names.
    pub const SERVICE_NAME: &str = "oidc_demo";

    /// Log directory when `OIDC_LOG_PATH` is unset.
    pub const LOG_PATH: &str = "/tmp";

    /// HTTPS listen port.
    pub const LISTEN_PORT: u16 = 443;

    /// Timeout for each call to the identity provider.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection timeout for the identity provider.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// How long an issued login state stays redeemable (10 minutes).
    pub const STATE_TTL: Duration = Duration::from_secs(600);

    /// Upper bound on outstanding login states.
    pub const STATE_MAX_ENTRIES: u64 = 10_000;

    /// Retries for the discovery request on transient failures.
    pub const DISCOVERY_RETRIES: u32 = 3;

    /// Paths served by this process besides the callback.
    pub const RESERVED_PATHS: &[&str] = &["/", "/health"];
}

/// Environment variable names.
pub mod env {
    pub const PROVIDER_URL: &str = "OIDC_PROVIDER_URL";
    pub const CLIENT_ID: &str = "OIDC_CLIENT_ID";
    pub const CLIENT_SECRET: &str = "OIDC_CLIENT_SECRET";
    pub const CALLBACK_PATTERN: &str = "OIDC_CALLBACK_PATTERN";
    pub const HOST: &str = "OIDC_HOST";
    pub const SCOPES: &str = "OIDC_SCOPES";
    pub const CERT_FILE: &str = "OIDC_HOST_CERT_FILE";
    pub const KEY_FILE: &str = "OIDC_HOST_KEY_FILE";
    pub const LOG_PATH: &str = "OIDC_LOG_PATH";
    pub const LISTEN_PORT: &str = "OIDC_LISTEN_PORT";
    pub const HTTP_TIMEOUT_SECS: &str = "OIDC_HTTP_TIMEOUT_SECS";

    /// Variables that must be present and non-empty.
    pub const REQUIRED: &[&str] = &[
        PROVIDER_URL,
        CLIENT_ID,
        CLIENT_SECRET,
        CALLBACK_PATTERN,
        HOST,
        SCOPES,
        CERT_FILE,
        KEY_FILE,
    ];
}

/// Relying-party configuration.
#[derive(Clone)]
pub struct Config {
    /// Identity provider base URL; discovery is served below it.
    pub provider_url: String,

    /// OAuth2 client identifier.
    pub client_id: String,

    /// OAuth2 client secret.
    pub client_secret: String,

    /// Path of the callback route, e.g. `/callback`.
    pub callback_pattern: String,

    /// Public hostname used to build the redirect URI.
    pub host: String,

    /// Requested scopes, in configured order.
    pub scopes: Vec<String>,

    /// `https://{host}{callback_pattern}`.
    pub callback_url: String,

    /// PEM certificate served by the HTTPS listener.
    pub cert_file: PathBuf,

    /// PEM private key for `cert_file`.
    pub key_file: PathBuf,

    /// Directory for the log and PID files.
    pub log_path: PathBuf,

    /// Listen port.
    pub listen_port: u16,

    /// Per-request timeout for provider calls.
    pub request_timeout: Duration,

    /// Connection timeout for provider calls.
    pub connect_timeout: Duration,

    /// Lifetime of an issued login state.
    pub state_ttl: Duration,

    /// Retries for the discovery request.
    pub discovery_retries: u32,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming the first required variable that
    /// is unset or empty, or [`ConfigError::Invalid`] for malformed values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// `from_env` is this with `std::env::var`; tests pass a map instead.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing { var: name })
        };

        let provider_url = required(env::PROVIDER_URL)?;
        let client_id = required(env::CLIENT_ID)?;
        let client_secret = required(env::CLIENT_SECRET)?;
        let callback_pattern = required(env::CALLBACK_PATTERN)?;
        let host = required(env::HOST)?;
        let scopes = parse_scopes(&required(env::SCOPES)?)?;
        let cert_file = PathBuf::from(required(env::CERT_FILE)?);
        let key_file = PathBuf::from(required(env::KEY_FILE)?);

        if !callback_pattern.starts_with('/') {
            return Err(ConfigError::invalid(env::CALLBACK_PATTERN, "must start with '/'"));
        }
        if callback_pattern.contains(['{', '}', '*'])
            || callback_pattern.split('/').any(|segment| segment.starts_with(':'))
        {
            return Err(ConfigError::invalid(env::CALLBACK_PATTERN, "must be a literal path"));
        }
        if defaults::RESERVED_PATHS.contains(&callback_pattern.as_str()) {
            return Err(ConfigError::invalid(
                env::CALLBACK_PATTERN,
                format!("'{callback_pattern}' is already routed"),
            ));
        }

        let log_path = lookup(env::LOG_PATH)
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| PathBuf::from(defaults::LOG_PATH), PathBuf::from);

        let listen_port = match lookup(env::LISTEN_PORT).filter(|v| !v.trim().is_empty()) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid(env::LISTEN_PORT, e.to_string()))?,
            None => defaults::LISTEN_PORT,
        };

        let request_timeout = match lookup(env::HTTP_TIMEOUT_SECS).filter(|v| !v.trim().is_empty())
        {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => {
                    return Err(ConfigError::invalid(env::HTTP_TIMEOUT_SECS, "must be positive"));
                }
                Ok(secs) => Duration::from_secs(secs),
                Err(e) => return Err(ConfigError::invalid(env::HTTP_TIMEOUT_SECS, e.to_string())),
            },
            None => defaults::REQUEST_TIMEOUT,
        };

        let callback_url = format!("https://{host}{callback_pattern}");

        Ok(Self {
            provider_url,
            client_id,
            client_secret,
            callback_pattern,
            host,
            scopes,
            callback_url,
            cert_file,
            key_file,
            log_path,
            listen_port,
            request_timeout,
            connect_timeout: defaults::CONNECT_TIMEOUT.min(request_timeout),
            state_ttl: defaults::STATE_TTL,
            discovery_retries: defaults::DISCOVERY_RETRIES,
        })
    }

    /// Create a test configuration pointing at a mock provider.
    #[must_use]
    pub fn for_testing(provider_url: &str) -> Self {
        Self {
            provider_url: provider_url.to_string(),
            client_id: "demo-client".to_string(),
            client_secret: "demo-secret".to_string(),
            callback_pattern: "/callback".to_string(),
            host: "rp.example.com".to_string(),
            scopes: vec!["openid".to_string(), "profile".to_string()],
            callback_url: "https://rp.example.com/callback".to_string(),
            cert_file: PathBuf::from("cert.pem"),
            key_file: PathBuf::from("key.pem"),
            log_path: PathBuf::from(defaults::LOG_PATH),
            listen_port: 8443,
            request_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
            state_ttl: defaults::STATE_TTL,
            discovery_retries: 0,
        }
    }

    /// `{log_path}/oidc_demo.log`
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.log_path.join(format!("{}.log", defaults::SERVICE_NAME))
    }

    /// `{log_path}/oidc_demo.pid`
    #[must_use]
    pub fn pid_file(&self) -> PathBuf {
        self.log_path.join(format!("{}.pid", defaults::SERVICE_NAME))
    }

    /// Scopes joined the way they appear in the authorization request.
    #[must_use]
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("provider_url", &self.provider_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("callback_url", &self.callback_url)
            .field("scopes", &self.scopes)
            .field("cert_file", &self.cert_file)
            .field("key_file", &self.key_file)
            .field("log_path", &self.log_path)
            .field("listen_port", &self.listen_port)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Split a comma-separated scope list, dropping blanks.
fn parse_scopes(raw: &str) -> Result<Vec<String>, ConfigError> {
    let scopes: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect();

    if scopes.is_empty() {
        return Err(ConfigError::invalid(env::SCOPES, "no scopes listed"));
    }
    Ok(scopes)
}
