use std::collections::HashMap;
use std::error::Error as _;
use std::time::{Duration, Instant};

use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::environment::HarnessConfig;
use crate::error::{HarnessError, TransportKind};

use super::request::{RequestBody, RequestSpec};
use super::response::ResponseOutcome;
use super::retry::RetryPolicy;

/// Issues [`RequestSpec`]s against one base URL and records [`ResponseOutcome`]s.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Executor {
    client: Client,
    base_url: Url,
    default_timeout: Duration,
}

impl Executor {
    pub fn new(base_url: &str, default_timeout: Duration) -> Result<Self, HarnessError> {
        let base_url = parse_base_url(base_url)?;

        let mut builder = Client::builder().redirect(reqwest::redirect::Policy::limited(10));
        if !default_timeout.is_zero() {
            builder = builder.timeout(default_timeout);
        }
        let client = builder
            .build()
            .map_err(|err| HarnessError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url,
            default_timeout,
        })
    }

    pub fn from_config(config: &HarnessConfig) -> Result<Self, HarnessError> {
        Self::new(&config.base_url, config.default_timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Resolves the spec's path and query against the base URL. The base URL's
    /// own path is kept as a prefix.
    pub fn url_for(&self, spec: &RequestSpec) -> Result<Url, HarnessError> {
        let path = spec.path();
        if path.contains(['?', '#']) {
            return Err(HarnessError::InvalidRequest(format!(
                "Path `{path}` must not carry a query or fragment; use query pairs"
            )));
        }

        let mut url = self.base_url.clone();
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);

        if !spec.query_pairs().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in spec.query_pairs() {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Performs one exchange. A non-2xx status is an outcome, not an error.
    pub async fn execute(&self, spec: &RequestSpec) -> Result<ResponseOutcome, HarnessError> {
        self.send(spec, 1).await
    }

    /// Re-attempts transport failures per `policy`, sleeping its delay between tries.
    pub async fn execute_with_retry(
        &self,
        spec: &RequestSpec,
        policy: &RetryPolicy,
    ) -> Result<ResponseOutcome, HarnessError> {
        let mut attempt = 1;
        loop {
            match self.send(spec, attempt).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if policy.should_retry(attempt, &err) => {
                    warn!(
                        request = %spec.describe(),
                        attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = policy.delay().as_millis() as u64,
                        error = %err,
                        "transport failure, retrying"
                    );
                    tokio::time::sleep(policy.delay()).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Puts every spec in flight at once on the calling task and returns the
    /// results in input order, whatever order the responses arrive in.
    pub async fn execute_concurrent(
        &self,
        specs: &[RequestSpec],
    ) -> Vec<Result<ResponseOutcome, HarnessError>> {
        debug!(count = specs.len(), "dispatching concurrent batch");
        join_all(specs.iter().map(|spec| self.execute(spec))).await
    }

    /// Races the exchange against a timer. When the timer wins the in-flight
    /// request is dropped locally; the remote side may still have applied it.
    pub async fn execute_with_timeout(
        &self,
        spec: &RequestSpec,
        limit: Duration,
    ) -> Result<ResponseOutcome, HarnessError> {
        tokio::select! {
            result = self.execute(spec) => result,
            () = tokio::time::sleep(limit) => {
                warn!(
                    request = %spec.describe(),
                    limit_ms = limit.as_millis() as u64,
                    "request abandoned after client-side timeout"
                );
                Err(HarnessError::TimeoutFailure {
                    request: spec.describe(),
                    limit,
                })
            }
        }
    }

    async fn send(&self, spec: &RequestSpec, attempt: u32) -> Result<ResponseOutcome, HarnessError> {
        let url = self.url_for(spec)?;
        let headers = build_headers(spec.headers())?;

        let mut request = self
            .client
            .request(spec.method().into(), url.clone())
            .headers(headers);

        if spec.method().carries_body() {
            match spec.body() {
                Some(RequestBody::Json(value)) => request = request.json(value),
                Some(RequestBody::Text(text)) => request = request.body(text.clone()),
                None => {}
            }
        }

        debug!(method = %spec.method(), %url, attempt, "dispatching request");
        let started = Instant::now();

        let response = request
            .send()
            .await
            .map_err(|err| self.transport_error(spec, &err, attempt))?;

        let status = response.status().as_u16();
        let response_headers = collect_headers(response.headers());

        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(spec, &err, attempt))?;
        let elapsed = started.elapsed();

        debug!(
            request = %spec.describe(),
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            "response received"
        );

        Ok(ResponseOutcome {
            status,
            headers: response_headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
            elapsed,
            request: spec.clone(),
        })
    }

    fn transport_error(&self, spec: &RequestSpec, err: &reqwest::Error, attempts: u32) -> HarnessError {
        if err.is_timeout() {
            return HarnessError::TimeoutFailure {
                request: spec.describe(),
                limit: self.default_timeout,
            };
        }

        HarnessError::NetworkFailure {
            request: spec.describe(),
            kind: classify_transport_error(err.is_connect(), &cause_chain(err)),
            attempts,
            message: error_chain(err),
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, HarnessError> {
    let url = Url::parse(raw.trim())
        .map_err(|err| HarnessError::Config(format!("Invalid base URL `{raw}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(HarnessError::Config(format!(
            "Base URL `{raw}` must be an absolute http(s) URL"
        )));
    }
    Ok(url)
}

pub fn build_headers(input: &[(String, String)]) -> Result<HeaderMap, HarnessError> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        if key.is_empty() {
            continue;
        }

        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
            HarnessError::InvalidRequest(format!("Invalid header name `{key}`: {err}"))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            HarnessError::InvalidRequest(format!("Invalid header value for `{key}`: {err}"))
        })?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

/// Flattens response headers; repeated names are joined with `, `.
fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut collected: HashMap<String, String> = HashMap::new();
    for (key, value) in headers {
        let value = value.to_str().unwrap_or_default();
        collected
            .entry(key.to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    collected
}

fn error_chain(err: &reqwest::Error) -> String {
    let causes = cause_chain(err);
    if causes.is_empty() {
        err.to_string()
    } else {
        format!("{err}: {causes}")
    }
}

/// Messages of the underlying causes only. reqwest's own message embeds the
/// request URL, so a hostname never reaches the classifier.
fn cause_chain(err: &reqwest::Error) -> String {
    let mut causes = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    causes.join(": ")
}

fn classify_transport_error(is_connect: bool, causes: &str) -> TransportKind {
    let causes = causes.to_ascii_lowercase();
    if causes.contains("dns") || causes.contains("failed to lookup address") {
        return TransportKind::Dns;
    }
    if causes.contains("tls") || causes.contains("ssl") || causes.contains("certificate") {
        return TransportKind::Tls;
    }
    if is_connect {
        return TransportKind::Connect;
    }

    TransportKind::Read
}
