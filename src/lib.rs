pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod expenses;
pub mod state;
pub mod users;
pub mod validation;
