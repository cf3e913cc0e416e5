//! # Environment & Variables
//!
//! Harness configuration is read from `BOOKER_*` environment variables so the
//! same suites run against a local stub or a shared deployment. Request paths
//! may carry `{{variable}}` placeholders resolved from layered variable sets.

use std::collections::HashMap;
use std::time::Duration;

use crate::auth::Credentials;
use crate::error::HarnessError;
use crate::http::request::StatusSet;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_AUTH_PATH: &str = "/auth";

/// Environment keys read by [`HarnessConfig::from_env`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEnv {
    BaseUrl,
    Username,
    Password,
    TimeoutMs,
    AuthPath,
    DeleteSuccess,
    AuthMalformed,
}

impl HarnessEnv {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BaseUrl => "BOOKER_BASE_URL",
            Self::Username => "BOOKER_USERNAME",
            Self::Password => "BOOKER_PASSWORD",
            Self::TimeoutMs => "BOOKER_TIMEOUT_MS",
            Self::AuthPath => "BOOKER_AUTH_PATH",
            Self::DeleteSuccess => "BOOKER_DELETE_SUCCESS",
            Self::AuthMalformed => "BOOKER_AUTH_MALFORMED",
        }
    }
}

/// Everything the harness needs to know about the target service.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub base_url: String,
    pub credentials: Option<Credentials>,
    pub default_timeout: Duration,
    pub auth_path: String,
    /// Statuses that, together with a `token` field, mean authentication succeeded.
    pub auth_success: StatusSet,
    /// The booking API reports a successful delete with 201, not 204.
    pub delete_success: StatusSet,
    /// Statuses accepted when the auth body is malformed; the API is not consistent here.
    pub auth_malformed: StatusSet,
}

impl HarnessConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: None,
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            auth_path: DEFAULT_AUTH_PATH.to_string(),
            auth_success: StatusSet::single(200),
            delete_success: StatusSet::single(201),
            auth_malformed: StatusSet::of([400, 500]),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::from_lookup(read_env_strict)
    }

    /// Loads configuration from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HarnessError>
    where
        F: Fn(&str) -> Result<Option<String>, HarnessError>,
    {
        let read = |key: HarnessEnv| -> Result<Option<String>, HarnessError> {
            match lookup(key.as_str())? {
                Some(value) if value.trim().is_empty() => Err(HarnessError::Config(format!(
                    "{} must not be empty",
                    key.as_str()
                ))),
                Some(value) => Ok(Some(value.trim().to_string())),
                None => Ok(None),
            }
        };

        let base_url = read(HarnessEnv::BaseUrl)?.ok_or_else(|| {
            HarnessError::Config(format!("{} is required", HarnessEnv::BaseUrl.as_str()))
        })?;
        let mut config = Self::new(base_url);

        match (read(HarnessEnv::Username)?, read(HarnessEnv::Password)?) {
            (Some(username), Some(password)) => {
                config.credentials = Some(Credentials::new(username, password));
            }
            (None, None) => {}
            _ => {
                return Err(HarnessError::Config(format!(
                    "{} and {} must be set together",
                    HarnessEnv::Username.as_str(),
                    HarnessEnv::Password.as_str()
                )));
            }
        }

        if let Some(raw) = read(HarnessEnv::TimeoutMs)? {
            config.default_timeout = parse_timeout_ms(HarnessEnv::TimeoutMs.as_str(), &raw)?;
        }
        if let Some(path) = read(HarnessEnv::AuthPath)? {
            config.auth_path = path;
        }
        if let Some(raw) = read(HarnessEnv::DeleteSuccess)? {
            config.delete_success = parse_status_list(HarnessEnv::DeleteSuccess.as_str(), &raw)?;
        }
        if let Some(raw) = read(HarnessEnv::AuthMalformed)? {
            config.auth_malformed = parse_status_list(HarnessEnv::AuthMalformed.as_str(), &raw)?;
        }

        Ok(config)
    }
}

/// Reads an environment variable, rejecting values that are not valid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, HarnessError> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string()
            .map(Some)
            .map_err(|_| HarnessError::Config(format!("{name} must be valid UTF-8")))
    })
}

fn parse_timeout_ms(name: &str, raw: &str) -> Result<Duration, HarnessError> {
    let millis: u64 = raw.parse().map_err(|_| {
        HarnessError::Config(format!("{name} must be a positive integer number of milliseconds"))
    })?;
    if millis == 0 {
        return Err(HarnessError::Config(format!("{name} must be greater than zero")));
    }
    Ok(Duration::from_millis(millis))
}

fn parse_status_list(name: &str, raw: &str) -> Result<StatusSet, HarnessError> {
    StatusSet::parse_list(raw).map_err(|err| HarnessError::Config(format!("{name}: {err}")))
}

/// Layered `{{name}}` substitutions for request paths and bodies.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: HashMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        let key = key.into();
        if !key.is_empty() {
            self.values.insert(key, value.to_string());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns a copy where `overrides` win over `self`.
    pub fn layered(&self, overrides: &Variables) -> Variables {
        let mut values = self.values.clone();
        for (key, value) in &overrides.values {
            values.insert(key.clone(), value.clone());
        }
        Variables { values }
    }

    /// Replaces known placeholders; unknown ones are left in place.
    pub fn interpolate(&self, input: &str) -> String {
        let mut result = input.to_string();
        for (key, value) in &self.values {
            result = result.replace(&format!("{{{{{key}}}}}"), value);
        }
        result
    }
}
