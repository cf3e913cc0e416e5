//! # Booking API
//!
//! Typed model of the booking service's resources, request builders for its
//! endpoints, and [`BookingApi`], which runs them through a [`Session`].
//!
//! [`Session`]: crate::auth::Session

mod api;
pub mod requests;

pub use api::BookingApi;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDates {
    pub checkin: String,
    pub checkout: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub firstname: String,
    pub lastname: String,
    pub totalprice: i64,
    pub depositpaid: bool,
    pub bookingdates: BookingDates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additionalneeds: Option<String>,
}

impl Booking {
    pub fn new(
        firstname: impl Into<String>,
        lastname: impl Into<String>,
        totalprice: i64,
        depositpaid: bool,
        checkin: impl Into<String>,
        checkout: impl Into<String>,
    ) -> Self {
        Self {
            firstname: firstname.into(),
            lastname: lastname.into(),
            totalprice,
            depositpaid,
            bookingdates: BookingDates {
                checkin: checkin.into(),
                checkout: checkout.into(),
            },
            additionalneeds: None,
        }
    }

    pub fn with_additional_needs(mut self, needs: impl Into<String>) -> Self {
        self.additionalneeds = Some(needs.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSummary {
    pub bookingid: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedBooking {
    pub bookingid: u64,
    pub booking: Booking,
}

/// Optional query filters for listing bookings. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub checkin: Option<String>,
    pub checkout: Option<String>,
}

impl BookingFilter {
    pub fn by_name(firstname: impl Into<String>, lastname: impl Into<String>) -> Self {
        Self {
            firstname: Some(firstname.into()),
            lastname: Some(lastname.into()),
            ..Self::default()
        }
    }

    pub fn by_dates(checkin: impl Into<String>, checkout: impl Into<String>) -> Self {
        Self {
            checkin: Some(checkin.into()),
            checkout: Some(checkout.into()),
            ..Self::default()
        }
    }

    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("firstname", &self.firstname),
            ("lastname", &self.lastname),
            ("checkin", &self.checkin),
            ("checkout", &self.checkout),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|value| (key, value)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn booking_serializes_without_absent_needs() {
        let booking = Booking::new("Jane", "Smith", 100, false, "2024-01-01", "2024-01-02");
        assert_eq!(
            serde_json::to_value(&booking).unwrap(),
            json!({
                "firstname": "Jane",
                "lastname": "Smith",
                "totalprice": 100,
                "depositpaid": false,
                "bookingdates": { "checkin": "2024-01-01", "checkout": "2024-01-02" }
            })
        );
    }

    #[test]
    fn created_booking_decodes() {
        let created: CreatedBooking = serde_json::from_value(json!({
            "bookingid": 5,
            "booking": {
                "firstname": "Jim",
                "lastname": "Brown",
                "totalprice": 111,
                "depositpaid": true,
                "bookingdates": { "checkin": "2018-01-01", "checkout": "2019-01-01" },
                "additionalneeds": "Breakfast"
            }
        }))
        .unwrap();
        assert_eq!(created.bookingid, 5);
        assert_eq!(created.booking.additionalneeds.as_deref(), Some("Breakfast"));
    }

    #[test]
    fn filter_pairs_skip_unset_fields() {
        assert!(BookingFilter::default().pairs().is_empty());
        assert_eq!(
            BookingFilter::by_dates("2024-01-01", "2024-02-01").pairs(),
            vec![("checkin", "2024-01-01"), ("checkout", "2024-02-01")]
        );
    }
}
