pub use chrono_tz::Tz;
use thiserror::Error;
use url::Url;

pub const DEFAULT_STORE_ID: &str = "satx";

pub const DASHBOARD_URL_ENV: &str = "DASHBOARD_URL";
pub const FRIDAY_API_URL_ENV: &str = "FRIDAY_API_URL";
pub const FRIDAY_API_KEY_ENV: &str = "FRIDAY_API_KEY";
pub const EMAIL_API_URL_ENV: &str = "EMAIL_API_URL";
pub const EMAIL_API_KEY_ENV: &str = "EMAIL_API_KEY";
pub const STORE_TIMEZONE_ENV: &str = "STORE_TIMEZONE";
pub const DEFAULT_STORE_ID_ENV: &str = "DEFAULT_STORE_ID";

/// Upstream service a tool is routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Service {
    Dashboard,
    Context,
    Email,
}

impl Service {
    pub fn as_str(self) -> &'static str {
        match self {
            Service::Dashboard => "dashboard",
            Service::Context => "context",
            Service::Email => "email",
        }
    }

    /// Human-facing name used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            Service::Dashboard => "Dashboard",
            Service::Context => "Friday",
            Service::Email => "Email",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// Sent as `x-api-key` on every request when present.
    pub api_key: Option<String>,
}

impl ServiceEndpoint {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be set")]
    Missing { var: &'static str },
    #[error("{present} is set but {missing} is not; configure both or neither")]
    Incomplete {
        present: &'static str,
        missing: &'static str,
    },
    #[error("{var} is not a valid http(s) URL: {value}")]
    InvalidUrl { var: &'static str, value: String },
    #[error("STORE_TIMEZONE is not a known IANA timezone: {value}")]
    InvalidTimezone { value: String },
}

/// Upstream configuration, resolved once at startup and shared read-only.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub dashboard: ServiceEndpoint,
    pub context: Option<ServiceEndpoint>,
    pub email: Option<ServiceEndpoint>,
    /// Zone used to compute the default `date` argument.
    pub timezone: Tz,
    pub default_store_id: String,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Empty values count
    /// as unset. There are no baked-in URLs or keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let dashboard_url = get(DASHBOARD_URL_ENV).ok_or(ConfigError::Missing {
            var: DASHBOARD_URL_ENV,
        })?;
        let dashboard = ServiceEndpoint::new(&validate_url(DASHBOARD_URL_ENV, dashboard_url)?, None);

        let context = keyed_endpoint(
            FRIDAY_API_URL_ENV,
            get(FRIDAY_API_URL_ENV),
            FRIDAY_API_KEY_ENV,
            get(FRIDAY_API_KEY_ENV),
        )?;
        let email = keyed_endpoint(
            EMAIL_API_URL_ENV,
            get(EMAIL_API_URL_ENV),
            EMAIL_API_KEY_ENV,
            get(EMAIL_API_KEY_ENV),
        )?;

        let timezone = match get(STORE_TIMEZONE_ENV) {
            None => Tz::UTC,
            Some(value) => value
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidTimezone { value })?,
        };

        Ok(Self {
            dashboard,
            context,
            email,
            timezone,
            default_store_id: get(DEFAULT_STORE_ID_ENV)
                .unwrap_or_else(|| DEFAULT_STORE_ID.to_string()),
        })
    }

    pub fn endpoint(&self, service: Service) -> Option<&ServiceEndpoint> {
        match service {
            Service::Dashboard => Some(&self.dashboard),
            Service::Context => self.context.as_ref(),
            Service::Email => self.email.as_ref(),
        }
    }

    pub fn is_enabled(&self, service: Service) -> bool {
        self.endpoint(service).is_some()
    }
}

fn keyed_endpoint(
    url_var: &'static str,
    url: Option<String>,
    key_var: &'static str,
    key: Option<String>,
) -> Result<Option<ServiceEndpoint>, ConfigError> {
    match (url, key) {
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::Incomplete {
            present: url_var,
            missing: key_var,
        }),
        (None, Some(_)) => Err(ConfigError::Incomplete {
            present: key_var,
            missing: url_var,
        }),
        (Some(url), Some(key)) => Ok(Some(ServiceEndpoint::new(
            &validate_url(url_var, url)?,
            Some(key),
        ))),
    }
}

fn validate_url(var: &'static str, value: String) -> Result<String, ConfigError> {
    match Url::parse(&value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(value),
        _ => Err(ConfigError::InvalidUrl { var, value }),
    }
}
