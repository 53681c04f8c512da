use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::utils::env_flag;

pub static SESSION_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SESSION_COOKIE_NAME")
        .ok()
        .unwrap_or("SessionId".to_string())
});

/// Cookie lifetime in seconds. 0 keeps the cookie for the browser session only.
pub(crate) static SESSION_COOKIE_LIFETIME: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("SESSION_COOKIE_LIFETIME")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
});

pub(crate) static SESSION_COOKIE_PATH: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SESSION_COOKIE_PATH")
        .ok()
        .unwrap_or("/".to_string())
});

pub(crate) static SESSION_COOKIE_DOMAIN: LazyLock<Option<String>> = LazyLock::new(|| {
    std::env::var("SESSION_COOKIE_DOMAIN")
        .ok()
        .filter(|s| !s.is_empty())
});

pub(crate) static SESSION_COOKIE_SECURE: LazyLock<bool> =
    LazyLock::new(|| env_flag("SESSION_COOKIE_SECURE", true));

pub(crate) static SESSION_COOKIE_HTTPONLY: LazyLock<bool> =
    LazyLock::new(|| env_flag("SESSION_COOKIE_HTTPONLY", true));

pub(crate) static SESSION_COOKIE_SAMESITE: LazyLock<SameSite> = LazyLock::new(|| {
    std::env::var("SESSION_COOKIE_SAMESITE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
});

/// Seconds a stored session survives without being written. Default: 1440 (24 minutes)
pub(crate) static SESSION_GC_MAXLIFETIME: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("SESSION_GC_MAXLIFETIME")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1440)
});

/// Lifetime of an issued CSRF token in seconds. Default: 3600 (1 hour)
pub(crate) static CSRF_TOKEN_LIFETIME: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("CSRF_TOKEN_LIFETIME")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3600)
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lax" => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            "none" => Ok(Self::None),
            other => Err(format!("Invalid SameSite value: {other}")),
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        };
        f.write_str(value)
    }
}

/// Attributes of the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieConfig {
    pub name: String,
    /// Max-Age in seconds; 0 means a session cookie.
    pub lifetime: u64,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: SESSION_COOKIE_NAME.clone(),
            lifetime: *SESSION_COOKIE_LIFETIME,
            path: SESSION_COOKIE_PATH.clone(),
            domain: SESSION_COOKIE_DOMAIN.clone(),
            secure: *SESSION_COOKIE_SECURE,
            http_only: *SESSION_COOKIE_HTTPONLY,
            same_site: *SESSION_COOKIE_SAMESITE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie: CookieConfig,
    /// Backend TTL and garbage-collection horizon, in seconds.
    pub gc_max_lifetime: u64,
    /// Lifetime of CSRF tokens issued by `Session::token`, in seconds.
    pub token_lifetime: u64,
    /// Lets `SessionManager::start` proceed after output has begun.
    /// Only test harnesses should set this.
    pub allow_start_after_output: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie: CookieConfig::default(),
            gc_max_lifetime: *SESSION_GC_MAXLIFETIME,
            token_lifetime: *CSRF_TOKEN_LIFETIME,
            allow_start_after_output: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Helper function to set an environment variable for the duration of the test
    /// and restore the original value afterward.
    fn with_env_var<F, R>(key: &str, value: Option<&str>, test: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();

        match value {
            Some(val) => unsafe { env::set_var(key, val) },
            None => unsafe { env::remove_var(key) },
        }

        let result = test();

        match original {
            Some(val) => unsafe { env::set_var(key, val) },
            None => unsafe { env::remove_var(key) },
        }

        result
    }

    #[test]
    fn test_same_site_parsing() {
        assert_eq!("lax".parse::<SameSite>().unwrap(), SameSite::Lax);
        assert_eq!("Strict".parse::<SameSite>().unwrap(), SameSite::Strict);
        assert_eq!("NONE".parse::<SameSite>().unwrap(), SameSite::None);
        assert!("sometimes".parse::<SameSite>().is_err());
        assert_eq!(SameSite::default(), SameSite::Lax);
        assert_eq!(SameSite::Strict.to_string(), "Strict");
    }

    #[test]
    #[serial]
    fn test_parse_cookie_lifetime() {
        let parse = || {
            env::var("SESSION_COOKIE_LIFETIME")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0)
        };

        with_env_var("SESSION_COOKIE_LIFETIME", None, || assert_eq!(parse(), 0));
        with_env_var("SESSION_COOKIE_LIFETIME", Some("1800"), || {
            assert_eq!(parse(), 1800)
        });
        with_env_var("SESSION_COOKIE_LIFETIME", Some("invalid"), || {
            assert_eq!(parse(), 0)
        });
    }

    #[test]
    #[serial]
    fn test_parse_cookie_domain_ignores_empty() {
        let parse = || {
            env::var("SESSION_COOKIE_DOMAIN")
                .ok()
                .filter(|s| !s.is_empty())
        };

        with_env_var("SESSION_COOKIE_DOMAIN", Some(""), || assert_eq!(parse(), None));
        with_env_var("SESSION_COOKIE_DOMAIN", Some("example.com"), || {
            assert_eq!(parse().as_deref(), Some("example.com"))
        });
    }

    #[test]
    fn test_session_config_default_does_not_allow_late_start() {
        let config = SessionConfig::default();
        assert!(!config.allow_start_after_output);
        assert!(config.token_lifetime > 0);
    }
}
