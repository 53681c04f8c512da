use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

use super::errors::CsrfError;

/// Body field carrying the token.
pub const CSRF_FORM_FIELD: &str = "_token";

/// Header consulted when the body has no token.
pub const CSRF_HEADER_NAME: &str = "X-CSRF-TOKEN";

/// Methods that require a valid token.
pub const PROTECTED_METHODS: [&str; 4] = ["POST", "PUT", "DELETE", "PATCH"];

/// Comma-separated path patterns exempt from CSRF checks, e.g. `^/api/webhook`.
pub(crate) static CSRF_EXCLUDED_PATHS: LazyLock<Vec<String>> = LazyLock::new(|| {
    std::env::var("CSRF_EXCLUDED_PATHS")
        .map(|s| parse_pattern_list(&s))
        .unwrap_or_default()
});

pub(crate) static APP_ENV: LazyLock<ExecutionMode> = LazyLock::new(|| {
    std::env::var("APP_ENV")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
});

fn parse_pattern_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// How a failed check is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Failures become a 403 response.
    #[default]
    Production,
    /// Failures surface as errors with a diagnostic message.
    Development,
}

impl FromStr for ExecutionMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("production") || s.eq_ignore_ascii_case("prod") {
            Ok(Self::Production)
        } else {
            Ok(Self::Development)
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsrfConfig {
    pub(crate) exclusions: Vec<Regex>,
    pub mode: ExecutionMode,
    pub field_name: String,
    pub header_name: String,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self::new(ExecutionMode::default())
    }
}

impl CsrfConfig {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            exclusions: Vec::new(),
            mode,
            field_name: CSRF_FORM_FIELD.to_string(),
            header_name: CSRF_HEADER_NAME.to_string(),
        }
    }

    /// Adds a path pattern that bypasses the check. Patterns are tried in the
    /// order they were added.
    pub fn exclude(mut self, pattern: &str) -> Result<Self, CsrfError> {
        let regex = Regex::new(pattern)
            .map_err(|e| CsrfError::Config(format!("Invalid exclusion pattern '{pattern}': {e}")))?;
        self.exclusions.push(regex);
        Ok(self)
    }

    /// Configuration from `APP_ENV` and `CSRF_EXCLUDED_PATHS`.
    pub fn from_env() -> Result<Self, CsrfError> {
        CSRF_EXCLUDED_PATHS
            .iter()
            .try_fold(Self::new(*APP_ENV), |config, pattern| config.exclude(pattern))
    }

    pub fn exclusions(&self) -> impl Iterator<Item = &str> {
        self.exclusions.iter().map(Regex::as_str)
    }

    pub(crate) fn is_excluded(&self, path: &str) -> bool {
        self.exclusions.iter().any(|re| re.is_match(path))
    }
}
