use http::StatusCode;

use crate::session::Session;
use crate::utils::redact;

use super::config::{CsrfConfig, ExecutionMode, PROTECTED_METHODS};
use super::errors::CsrfError;

/// The parts of an inbound request the guard looks at.
pub trait CsrfRequest {
    fn method(&self) -> &str;
    fn path(&self) -> &str;
    /// A field of the parsed request body.
    fn body_field(&self, name: &str) -> Option<&str>;
    /// A request header; lookup is case-insensitive.
    fn header(&self, name: &str) -> Option<&str>;
}

/// Response that ends the request without reaching the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Protection does not apply to this request.
    Bypassed,
    /// The submitted token was consumed; `token` is its replacement.
    Validated { token: String },
    Rejected(Rejection),
}

#[derive(Debug, Clone, Default)]
pub struct CsrfGuard {
    config: CsrfConfig,
}

impl CsrfGuard {
    pub fn new(config: CsrfConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    /// Whether the request must carry a valid token.
    pub fn applies_to(&self, request: &impl CsrfRequest) -> bool {
        let method = request.method();
        PROTECTED_METHODS
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
            && !self.config.is_excluded(request.path())
    }

    /// Token from the body field, falling back to the header. Empty values
    /// count as absent.
    pub fn extract_token<'a>(&self, request: &'a impl CsrfRequest) -> Option<&'a str> {
        request
            .body_field(&self.config.field_name)
            .filter(|t| !t.is_empty())
            .or_else(|| {
                request
                    .header(&self.config.header_name)
                    .filter(|t| !t.is_empty())
            })
    }

    /// Runs the check for one request.
    ///
    /// On success the submitted token is consumed, expired tokens are pruned and
    /// a replacement is issued. A failure becomes `Verdict::Rejected` in
    /// production and an error otherwise.
    #[tracing::instrument(skip_all, fields(method = request.method(), path = request.path()))]
    pub fn check(
        &self,
        session: &mut Session,
        request: &impl CsrfRequest,
    ) -> Result<Verdict, CsrfError> {
        if !self.applies_to(request) {
            return Ok(Verdict::Bypassed);
        }

        let Some(candidate) = self.extract_token(request) else {
            tracing::warn!("CSRF token missing");
            return self.fail(CsrfError::TokenMissing);
        };

        if !session.validate_token(candidate) {
            tracing::warn!("CSRF token rejected: {}", redact(candidate));
            return self.fail(CsrfError::TokenInvalid);
        }

        session.prune_expired_tokens();
        let token = session.token()?;
        tracing::debug!("CSRF token validated");
        Ok(Verdict::Validated { token })
    }

    fn fail(&self, err: CsrfError) -> Result<Verdict, CsrfError> {
        match self.config.mode {
            ExecutionMode::Production => Ok(Verdict::Rejected(Rejection {
                status: StatusCode::FORBIDDEN,
                body: "Forbidden".to_string(),
            })),
            ExecutionMode::Development => Err(err),
        }
    }
}
