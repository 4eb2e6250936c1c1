pub mod health;
pub mod http;
pub mod requests;
pub mod validation;
pub mod ws;
