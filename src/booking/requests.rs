//! Request builders for the booking endpoints. Pure; nothing here touches the network.

use serde_json::Value;

use crate::environment::Variables;
use crate::error::HarnessError;
use crate::http::request::{RequestSpec, StatusSet};

use super::{Booking, BookingFilter};

const PING_PATH: &str = "/ping";
const BOOKING_PATH: &str = "/booking";
const BOOKING_BY_ID: &str = "/booking/{{id}}";

fn booking_path(id: u64) -> String {
    let mut vars = Variables::new();
    vars.set("id", id);
    vars.interpolate(BOOKING_BY_ID)
}

fn accepting_json(spec: RequestSpec) -> RequestSpec {
    spec.header("Accept", "application/json")
}

/// Health check. The service answers 201 when it is up.
pub fn ping() -> RequestSpec {
    RequestSpec::get(PING_PATH)
        .expect(StatusSet::single(201))
        .labelled("health check")
}

pub fn list(filter: &BookingFilter) -> RequestSpec {
    filter
        .pairs()
        .into_iter()
        .fold(accepting_json(RequestSpec::get(BOOKING_PATH)), |spec, (key, value)| {
            spec.query(key, value)
        })
        .expect(StatusSet::single(200))
}

pub fn get(id: u64) -> RequestSpec {
    accepting_json(RequestSpec::get(booking_path(id))).expect(StatusSet::single(200))
}

pub fn create(booking: &Booking) -> Result<RequestSpec, HarnessError> {
    Ok(accepting_json(RequestSpec::post(BOOKING_PATH))
        .json(booking)?
        .expect(StatusSet::single(200)))
}

/// Full replacement. Needs a credential header; see [`Session::authorize`].
///
/// [`Session::authorize`]: crate::auth::Session::authorize
pub fn update(id: u64, booking: &Booking) -> Result<RequestSpec, HarnessError> {
    Ok(accepting_json(RequestSpec::put(booking_path(id)))
        .json(booking)?
        .expect(StatusSet::single(200)))
}

/// Changes only the fields present in `fields`. Needs a credential header.
pub fn partial_update(id: u64, fields: Value) -> RequestSpec {
    accepting_json(RequestSpec::patch(booking_path(id)))
        .json_value(fields)
        .expect(StatusSet::single(200))
}

/// Needs a credential header. `success` is the status the service uses for a
/// completed delete.
pub fn delete(id: u64, success: &StatusSet) -> RequestSpec {
    RequestSpec::delete(booking_path(id)).expect(success.clone())
}
