//! # Assertions
//!
//! Pure checks over [`ResponseOutcome`]s. Each returns the first violation it
//! finds for one outcome; the batch helpers collect every violation so one bad
//! response never hides another.
//!
//! Field paths are dotted, with numeric segments indexing arrays:
//! `booking.bookingdates.checkin`, `0.bookingid`.

use std::time::Duration;

use serde_json::Value;

use crate::error::{AssertionFailure, FailureReport, HarnessError};
use crate::http::request::StatusSet;
use crate::http::response::ResponseOutcome;

pub fn assert_status_in(outcome: &ResponseOutcome, allowed: &StatusSet) -> Result<(), AssertionFailure> {
    if allowed.contains(outcome.status) {
        return Ok(());
    }
    Err(AssertionFailure::UnexpectedStatus {
        request: outcome.request.describe(),
        status: outcome.status,
        allowed: allowed.clone(),
        body: outcome.body_preview(),
    })
}

/// Checks the status against the set declared on the request itself.
pub fn assert_expected_status(outcome: &ResponseOutcome) -> Result<(), AssertionFailure> {
    assert_status_in(outcome, outcome.request.expected())
}

pub fn assert_within_latency(outcome: &ResponseOutcome, bound: Duration) -> Result<(), AssertionFailure> {
    if outcome.elapsed <= bound {
        return Ok(());
    }
    Err(AssertionFailure::LatencyExceeded {
        request: outcome.request.describe(),
        elapsed: outcome.elapsed,
        bound,
    })
}

pub fn assert_body_has_field(outcome: &ResponseOutcome, field_path: &str) -> Result<(), AssertionFailure> {
    let body = decoded_body(outcome)?;
    match lookup(&body, field_path) {
        Some(_) => Ok(()),
        None => Err(mismatch(outcome, field_path, "a value", "<missing>")),
    }
}

pub fn assert_body_field_equals(
    outcome: &ResponseOutcome,
    field_path: &str,
    expected: &Value,
) -> Result<(), AssertionFailure> {
    let body = decoded_body(outcome)?;
    match lookup(&body, field_path) {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(mismatch(outcome, field_path, &expected.to_string(), &actual.to_string())),
        None => Err(mismatch(outcome, field_path, &expected.to_string(), "<missing>")),
    }
}

/// Compares the whole decoded body, reporting the first differing path.
pub fn assert_body_equals(outcome: &ResponseOutcome, expected: &Value) -> Result<(), AssertionFailure> {
    let body = decoded_body(outcome)?;
    match first_difference(expected, &body, String::new()) {
        None => Ok(()),
        Some((path, expected, actual)) => Err(mismatch(outcome, &path, &expected, &actual)),
    }
}

/// Applies [`assert_status_in`] to every outcome and reports all violations.
pub fn assert_all_succeed(
    outcomes: &[ResponseOutcome],
    allowed: &StatusSet,
) -> Result<(), FailureReport<AssertionFailure>> {
    let mut report = FailureReport::new(outcomes.len());
    for (index, outcome) in outcomes.iter().enumerate() {
        if let Err(failure) = assert_status_in(outcome, allowed) {
            report.push(index, failure);
        }
    }
    report.into_result()
}

/// Splits a concurrent batch into its outcomes, or reports every harness failure by index.
pub fn collect_outcomes(
    results: Vec<Result<ResponseOutcome, HarnessError>>,
) -> Result<Vec<ResponseOutcome>, FailureReport<HarnessError>> {
    let mut report = FailureReport::new(results.len());
    let mut outcomes = Vec::with_capacity(results.len());
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => report.push(index, err),
        }
    }
    report.into_result().map(|()| outcomes)
}

/// Resolves a dotted field path inside a JSON value.
pub fn lookup<'a>(value: &'a Value, field_path: &str) -> Option<&'a Value> {
    if field_path.is_empty() {
        return Some(value);
    }
    field_path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    })
}

fn decoded_body(outcome: &ResponseOutcome) -> Result<Value, AssertionFailure> {
    serde_json::from_str(&outcome.body)
        .map_err(|_| mismatch(outcome, "", "a JSON body", &format!("{:?}", outcome.body_preview())))
}

fn mismatch(outcome: &ResponseOutcome, path: &str, expected: &str, actual: &str) -> AssertionFailure {
    AssertionFailure::BodyMismatch {
        request: outcome.request.describe(),
        path: if path.is_empty() { "<root>".to_string() } else { path.to_string() },
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

fn first_difference(expected: &Value, actual: &Value, path: String) -> Option<(String, String, String)> {
    match (expected, actual) {
        (Value::Object(want), Value::Object(got)) => {
            for (key, want_value) in want {
                let child = join_path(&path, key);
                match got.get(key) {
                    Some(got_value) => {
                        if let Some(diff) = first_difference(want_value, got_value, child) {
                            return Some(diff);
                        }
                    }
                    None => return Some((child, want_value.to_string(), "<missing>".to_string())),
                }
            }
            got.iter()
                .find(|(key, _)| !want.contains_key(*key))
                .map(|(key, value)| (join_path(&path, key), "<absent>".to_string(), value.to_string()))
        }
        (Value::Array(want), Value::Array(got)) => {
            if want.len() != got.len() {
                return Some((
                    path,
                    format!("{} element(s)", want.len()),
                    format!("{} element(s)", got.len()),
                ));
            }
            want.iter()
                .zip(got)
                .enumerate()
                .find_map(|(idx, (w, g))| first_difference(w, g, join_path(&path, &idx.to_string())))
        }
        _ if expected == actual => None,
        _ => Some((path, expected.to_string(), actual.to_string())),
    }
}
