pub mod auth;
pub mod events;
pub mod lesson_driver;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers the binary needs to build the web server router.
pub use middleware::require_auth;
pub use rest::{get_profile_handler, list_units_handler};
pub use ws_handler::ws_handler;
