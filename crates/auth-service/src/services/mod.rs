pub mod auth_service;
pub mod user_admin_service;
pub mod validation;

pub use auth_service::AuthService;
pub use user_admin_service::UserAdminService;
