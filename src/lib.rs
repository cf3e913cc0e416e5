//! Contract-test harness for a booking REST API.
//!
//! A [`Session`] holds the base URL, credentials and auth token for one test
//! flow. Its [`Executor`] turns [`RequestSpec`]s into [`ResponseOutcome`]s,
//! optionally with retries, a client-side timeout, or many at once. The
//! [`testing`] helpers check outcomes against the contract.

pub mod auth;
pub mod booking;
pub mod environment;
pub mod error;
pub mod http;
pub mod load;
pub mod testing;

pub use auth::{AuthHeader, Credentials, Session};
pub use booking::{Booking, BookingApi, BookingDates, BookingFilter, BookingSummary, CreatedBooking};
pub use environment::{HarnessConfig, Variables};
pub use error::{AssertionFailure, FailureReport, HarnessError, TransportKind};
pub use http::client::Executor;
pub use http::method::HttpMethod;
pub use http::request::{RequestBody, RequestSpec, StatusSet};
pub use http::response::ResponseOutcome;
pub use http::retry::RetryPolicy;
