use serde_json::Value;

use crate::auth::Session;
use crate::environment::HarnessConfig;
use crate::error::HarnessError;
use crate::http::request::StatusSet;
use crate::http::response::ResponseOutcome;

use super::{Booking, BookingFilter, requests};

/// Booking endpoints bound to one [`Session`].
#[derive(Debug, Clone)]
pub struct BookingApi {
    session: Session,
    delete_success: StatusSet,
}

impl BookingApi {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            delete_success: StatusSet::single(201),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Result<Self, HarnessError> {
        Ok(Self {
            session: Session::from_config(config)?,
            delete_success: config.delete_success.clone(),
        })
    }

    /// Statuses that mark a delete as done. The default is the target API's `201`.
    pub fn with_delete_success(mut self, statuses: StatusSet) -> Self {
        self.delete_success = statuses;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn delete_success(&self) -> &StatusSet {
        &self.delete_success
    }

    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<String, HarnessError> {
        self.session.authenticate(username, password).await
    }

    pub async fn ping(&self) -> Result<ResponseOutcome, HarnessError> {
        self.session.executor().execute(&requests::ping()).await
    }

    pub async fn list(&self, filter: &BookingFilter) -> Result<ResponseOutcome, HarnessError> {
        self.session.executor().execute(&requests::list(filter)).await
    }

    pub async fn get(&self, id: u64) -> Result<ResponseOutcome, HarnessError> {
        self.session.executor().execute(&requests::get(id)).await
    }

    pub async fn create(&self, booking: &Booking) -> Result<ResponseOutcome, HarnessError> {
        self.session.executor().execute(&requests::create(booking)?).await
    }

    pub async fn update(&self, id: u64, booking: &Booking) -> Result<ResponseOutcome, HarnessError> {
        let spec = self.session.authorize(requests::update(id, booking)?)?;
        self.session.executor().execute(&spec).await
    }

    pub async fn partial_update(&self, id: u64, fields: Value) -> Result<ResponseOutcome, HarnessError> {
        let spec = self.session.authorize(requests::partial_update(id, fields))?;
        self.session.executor().execute(&spec).await
    }

    pub async fn delete(&self, id: u64) -> Result<ResponseOutcome, HarnessError> {
        let spec = self
            .session
            .authorize(requests::delete(id, &self.delete_success))?;
        self.session.executor().execute(&spec).await
    }
}
