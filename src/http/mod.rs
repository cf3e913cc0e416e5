pub mod client;
pub mod method;
pub mod request;
pub mod response;
pub mod retry;
