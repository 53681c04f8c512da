mod config;
mod errors;
mod main;
mod types;

pub use config::{CookieConfig, SESSION_COOKIE_NAME, SameSite, SessionConfig};
pub use errors::SessionError;
pub use main::{Session, SessionManager, header_set_cookie};
pub use types::{CookieCommand, SessionKey};
