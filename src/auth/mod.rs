//! # Authentication
//!
//! A [`Session`] owns the auth token for one test flow. The token is only ever
//! written by a successful [`Session::authenticate`] call; every other path can
//! read or clear it. Requests that need authorization get either the token
//! cookie or, when no token is held, an explicit basic-auth header.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::environment::HarnessConfig;
use crate::error::HarnessError;
use crate::http::client::Executor;
use crate::http::request::{RequestSpec, StatusSet};
use crate::http::response::ResponseOutcome;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The credential header attached to authorized requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthHeader {
    TokenCookie(String),
    Basic(String),
}

impl AuthHeader {
    pub fn basic(credentials: &Credentials) -> Self {
        let raw = format!("{}:{}", credentials.username, credentials.password);
        AuthHeader::Basic(STANDARD.encode(raw))
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthHeader::TokenCookie(_) => "Cookie",
            AuthHeader::Basic(_) => "Authorization",
        }
    }

    pub fn value(&self) -> String {
        match self {
            AuthHeader::TokenCookie(token) => format!("token={token}"),
            AuthHeader::Basic(encoded) => format!("Basic {encoded}"),
        }
    }
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize, Default)]
struct AuthResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Base URL, credentials and token for one logical test flow.
///
/// Flows that run in parallel must each own a `Session`.
#[derive(Debug, Clone)]
pub struct Session {
    executor: Executor,
    auth_path: String,
    auth_success: StatusSet,
    default_credentials: Option<Credentials>,
    basic: Option<Credentials>,
    token: Option<String>,
}

impl Session {
    pub fn new(executor: Executor) -> Self {
        Self {
            executor,
            auth_path: "/auth".to_string(),
            auth_success: StatusSet::single(200),
            default_credentials: None,
            basic: None,
            token: None,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Result<Self, HarnessError> {
        let mut session = Self::new(Executor::from_config(config)?);
        session.auth_path = config.auth_path.clone();
        session.auth_success = config.auth_success.clone();
        session.default_credentials = config.credentials.clone();
        Ok(session)
    }

    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.auth_path = path.into();
        self
    }

    /// Statuses that count as a successful auth call. Defaults to `{200}`.
    pub fn with_auth_success(mut self, statuses: StatusSet) -> Self {
        self.auth_success = statuses;
        self
    }

    pub fn with_basic_credentials(mut self, credentials: Credentials) -> Self {
        self.basic = Some(credentials);
        self
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn sign_out(&mut self) {
        self.token = None;
    }

    /// Authenticates with the credentials the session was configured with.
    pub async fn authenticate_default(&mut self) -> Result<String, HarnessError> {
        let credentials = self.default_credentials.clone().ok_or_else(|| {
            HarnessError::Config("no default credentials configured".to_string())
        })?;
        self.authenticate(&credentials.username, &credentials.password)
            .await
    }

    /// Posts the credentials to the auth endpoint. Success requires both an
    /// accepted status and a non-empty `token` in the body; anything else
    /// leaves the session unauthenticated.
    pub async fn authenticate(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<String, HarnessError> {
        self.token = None;

        let spec = RequestSpec::post(self.auth_path.clone())
            .header("Accept", "application/json")
            .json(&AuthRequest { username, password })?
            .expect(self.auth_success.clone());
        let outcome = self.executor.execute(&spec).await?;

        match self.token_from(&outcome) {
            Ok(token) => {
                info!(status = outcome.status, "authenticated");
                self.token = Some(token.clone());
                Ok(token)
            }
            Err(err) => {
                warn!(status = outcome.status, error = %err, "authentication rejected");
                Err(err)
            }
        }
    }

    fn token_from(&self, outcome: &ResponseOutcome) -> Result<String, HarnessError> {
        let parsed: AuthResponse = outcome.json().unwrap_or_default();
        let accepted = self.auth_success.contains(outcome.status);

        match parsed.token {
            Some(token) if accepted && !token.is_empty() => Ok(token),
            _ => Err(HarnessError::AuthFailure {
                status: outcome.status,
                reason: parsed.reason.unwrap_or_else(|| {
                    if outcome.body.is_empty() {
                        "no token in response".to_string()
                    } else {
                        outcome.body_preview()
                    }
                }),
            }),
        }
    }

    /// The header an authorized request should carry. The token wins over
    /// basic credentials.
    pub fn auth_header(&self) -> Result<AuthHeader, HarnessError> {
        self.credential_for("authorization header")
    }

    /// Returns `spec` with the credential header attached.
    pub fn authorize(&self, spec: RequestSpec) -> Result<RequestSpec, HarnessError> {
        let header = self.credential_for(&spec.describe())?;
        Ok(spec.header(header.name(), header.value()))
    }

    fn credential_for(&self, request: &str) -> Result<AuthHeader, HarnessError> {
        if let Some(token) = &self.token {
            return Ok(AuthHeader::TokenCookie(token.clone()));
        }
        if let Some(credentials) = &self.basic {
            return Ok(AuthHeader::basic(credentials));
        }
        Err(HarnessError::NotAuthenticated {
            request: request.to_string(),
        })
    }
}
