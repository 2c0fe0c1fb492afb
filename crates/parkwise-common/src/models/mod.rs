pub mod auth;
pub mod parking;
