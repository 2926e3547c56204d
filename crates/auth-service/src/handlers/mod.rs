pub mod auth_handler;
pub mod health;
pub mod users_handler;

pub use health::health_check;
