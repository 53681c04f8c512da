use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use ring::rand::SecureRandom;
use thiserror::Error;

/// Shortest identifier accepted from a client (16 random bytes, base64url).
const MIN_SESSION_ID_LEN: usize = 22;
const MAX_SESSION_ID_LEN: usize = 128;

/// Longest lifetime honoured for keys, tokens, cookies and stored blobs
/// (about a thousand years). Larger values are capped to it.
pub(crate) const MAX_LIFETIME_SECS: u64 = 1_000 * 365 * 24 * 60 * 60;

fn capped_delta(secs: u64) -> Option<TimeDelta> {
    i64::try_from(secs.min(MAX_LIFETIME_SECS))
        .ok()
        .and_then(TimeDelta::try_seconds)
}

/// The instant `secs` seconds after `now`, saturating instead of overflowing.
pub(crate) fn time_after(now: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    capped_delta(secs)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// The instant `secs` seconds before `now`, saturating instead of overflowing.
pub(crate) fn time_before(now: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    capped_delta(secs)
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub(crate) fn base64url_encode(input: Vec<u8>) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

/// Generates `len` bytes from the system CSPRNG and returns them base64url encoded.
pub(crate) fn gen_random_string(len: usize) -> Result<String, UtilError> {
    let rng = ring::rand::SystemRandom::new();
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf)
        .map_err(|_| UtilError::Crypto("Failed to generate random string".to_string()))?;
    Ok(base64url_encode(buf))
}

/// Checks that a client-supplied session identifier could have been issued by us.
///
/// Identifiers end up in file names and cache keys, so anything outside the
/// base64url alphabet is refused before it reaches a backend.
pub(crate) fn is_valid_session_id(id: &str) -> bool {
    (MIN_SESSION_ID_LEN..=MAX_SESSION_ID_LEN).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Shortened form of a secret for log lines.
pub(crate) fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(6).collect();
    format!("{prefix}...")
}

pub(crate) fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|val| val.to_lowercase() != "false")
        .unwrap_or(default)
}

#[derive(Debug, Error, Clone)]
pub enum UtilError {
    #[error("Crypto error: {0}")]
    Crypto(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_env_var<F: FnOnce()>(key: &str, value: Option<&str>, f: F) {
        let original = std::env::var(key).ok();
        unsafe {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
        f();
        unsafe {
            match original {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }

    #[test]
    fn test_gen_random_string_length() {
        // 32 bytes of entropy encode to 43 base64url characters without padding
        let value = gen_random_string(32).unwrap();
        assert_eq!(value.len(), 43);
        assert!(is_valid_session_id(&value));
    }

    #[test]
    fn test_gen_random_string_unique() {
        let a = gen_random_string(32).unwrap();
        let b = gen_random_string(32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_is_valid_session_id_rejects_path_characters() {
        assert!(!is_valid_session_id("../../../../etc/passwd-aaaaaaaaaaaa"));
        assert!(!is_valid_session_id("abc def ghi jkl mno pqr stu"));
        assert!(!is_valid_session_id("short"));
        assert!(!is_valid_session_id(&"a".repeat(129)));
        assert!(is_valid_session_id("abcdefghijklmnopqrstuvwxyz_-0123"));
    }

    #[test]
    fn test_redact_keeps_prefix_only() {
        assert_eq!(redact("abcdefghijklmnop"), "abcdef...");
        assert_eq!(redact("abc"), "abc...");
    }

    #[test]
    #[serial]
    fn test_env_flag_parsing() {
        const VAR: &str = "WEBSESSION_TEST_FLAG";

        // Any value other than "false" (case-insensitive) is treated as true
        with_env_var(VAR, None, || {
            assert!(env_flag(VAR, true));
            assert!(!env_flag(VAR, false));
        });
        with_env_var(VAR, Some("FALSE"), || assert!(!env_flag(VAR, true)));
        with_env_var(VAR, Some("false"), || assert!(!env_flag(VAR, true)));
        with_env_var(VAR, Some("yes"), || assert!(env_flag(VAR, false)));
        with_env_var(VAR, Some("0"), || assert!(env_flag(VAR, false)));
    }

    #[test]
    fn test_time_after_is_capped() {
        let now = Utc::now();
        assert_eq!(time_after(now, 60), now + TimeDelta::seconds(60));

        let far = time_after(now, MAX_LIFETIME_SECS);
        assert!(far > now);
        assert_eq!(time_after(now, u64::MAX), far);
        assert_eq!(time_after(now, 1 << 62), far);
    }

    #[test]
    fn test_time_after_saturates_at_max() {
        let near_end = DateTime::<Utc>::MAX_UTC - TimeDelta::seconds(10);
        assert_eq!(time_after(near_end, 3600), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_time_before_never_panics() {
        let now = Utc::now();
        assert_eq!(time_before(now, 60), now - TimeDelta::seconds(60));
        assert!(time_before(now, u64::MAX) < now);

        let near_start = DateTime::<Utc>::MIN_UTC + TimeDelta::seconds(10);
        assert_eq!(time_before(near_start, 3600), DateTime::<Utc>::MIN_UTC);
    }
}
