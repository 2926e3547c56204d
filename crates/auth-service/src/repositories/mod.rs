pub mod token_store;
pub mod users;

pub use token_store::{Bindings, RedisTokenStore, TokenNamespace, TokenStore};
pub use users::{PgUserRepository, UserRepository};
