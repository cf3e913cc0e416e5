use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::ops::RangeInclusive;

use serde::Serialize;
use serde_json::Value;

use crate::error::HarnessError;

use super::method::HttpMethod;

/// An ordered set of acceptable HTTP status codes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusSet(BTreeSet<u16>);

const SUCCESS_CLASS: RangeInclusive<u16> = 200..=299;

impl StatusSet {
    pub fn of(codes: impl IntoIterator<Item = u16>) -> Self {
        Self(codes.into_iter().collect())
    }

    pub fn single(code: u16) -> Self {
        Self::of([code])
    }

    /// The 2xx class.
    pub fn successful() -> Self {
        Self::of(SUCCESS_CLASS)
    }

    /// Parses a comma-separated list such as `"400, 500"`.
    pub fn parse_list(raw: &str) -> Result<Self, String> {
        let mut codes = BTreeSet::new();
        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let code: u16 = part
                .parse()
                .map_err(|_| format!("`{part}` is not a status code"))?;
            if !(100..=599).contains(&code) {
                return Err(format!("`{code}` is outside the 100-599 status range"));
            }
            codes.insert(code);
        }
        if codes.is_empty() {
            return Err("status list cannot be empty".to_string());
        }
        Ok(Self(codes))
    }

    pub fn contains(&self, status: u16) -> bool {
        self.0.contains(&status)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }

    pub fn union(&self, other: &StatusSet) -> StatusSet {
        Self(self.0.union(&other.0).copied().collect())
    }

    fn is_success_class(&self) -> bool {
        self.0.len() == SUCCESS_CLASS.len()
            && self.0.first() == Some(SUCCESS_CLASS.start())
            && self.0.last() == Some(SUCCESS_CLASS.end())
    }
}

impl Display for StatusSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success_class() {
            return write!(f, "{{2xx}}");
        }
        let codes: Vec<String> = self.0.iter().map(u16::to_string).collect();
        write!(f, "{{{}}}", codes.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Text(String),
}

/// Immutable description of one HTTP exchange against the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    method: HttpMethod,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<RequestBody>,
    expected: StatusSet,
    label: Option<String>,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            expected: StatusSet::successful(),
            label: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds a header. A later header with the same name replaces the earlier one.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn json_value(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn json<T: Serialize>(self, body: &T) -> Result<Self, HarnessError> {
        let value = serde_json::to_value(body)
            .map_err(|err| HarnessError::InvalidRequest(format!("Unserializable body: {err}")))?;
        Ok(self.json_value(value))
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    pub fn expect(mut self, expected: StatusSet) -> Self {
        self.expected = expected;
        self
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub fn expected(&self) -> &StatusSet {
        &self.expected
    }

    /// Human-readable identity used in logs and failure messages.
    pub fn describe(&self) -> String {
        match &self.label {
            Some(label) => format!("{label} ({} {})", self.method, self.path),
            None => format!("{} {}", self.method, self.path),
        }
    }
}
