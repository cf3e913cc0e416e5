use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::HarnessError;

use super::request::RequestSpec;

const BODY_PREVIEW_CHARS: usize = 512;

/// The recorded result of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct ResponseOutcome {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub elapsed: Duration,
    pub request: RequestSpec,
}

impl ResponseOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json_value(&self) -> Result<Value, HarnessError> {
        serde_json::from_str(&self.body).map_err(|err| self.decode_error(err))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HarnessError> {
        serde_json::from_str(&self.body).map_err(|err| self.decode_error(err))
    }

    /// Body text capped for failure messages.
    pub fn body_preview(&self) -> String {
        if self.body.chars().count() <= BODY_PREVIEW_CHARS {
            return self.body.clone();
        }
        let mut preview: String = self.body.chars().take(BODY_PREVIEW_CHARS).collect();
        preview.push('…');
        preview
    }

    fn decode_error(&self, err: serde_json::Error) -> HarnessError {
        HarnessError::Decode {
            request: self.request.describe(),
            message: err.to_string(),
        }
    }
}
