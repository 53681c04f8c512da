mod cookie;
mod manager;
mod session;

pub use cookie::header_set_cookie;
pub use manager::SessionManager;
pub use session::Session;
