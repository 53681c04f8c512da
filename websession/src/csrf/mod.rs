mod config;
mod errors;
mod guard;

pub use config::{CSRF_FORM_FIELD, CSRF_HEADER_NAME, CsrfConfig, ExecutionMode, PROTECTED_METHODS};
pub use errors::CsrfError;
pub use guard::{CsrfGuard, CsrfRequest, Rejection, Verdict};
