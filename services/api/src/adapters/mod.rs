pub mod auth;
pub mod db;

pub use auth::PasswordAuthAdapter;
pub use db::DbAdapter;
