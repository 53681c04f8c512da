//! Session persistence configuration

use std::path::PathBuf;
use std::{env, sync::LazyLock};

/// Handler selected by `SessionManager::from_env`. Default: "files"
pub(crate) static SESSION_HANDLER_TYPE: LazyLock<String> =
    LazyLock::new(|| env::var("SESSION_HANDLER_TYPE").unwrap_or_else(|_| "files".to_string()));

/// Connection URL (database, redis) or directory (files) for the handler.
pub(crate) static SESSION_HANDLER_URL: LazyLock<Option<String>> =
    LazyLock::new(|| env::var("SESSION_HANDLER_URL").ok());

/// Directory used by the files handler when no save path is given.
pub(crate) static SESSION_SAVE_PATH: LazyLock<PathBuf> = LazyLock::new(|| {
    env::var("SESSION_SAVE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("websession"))
});

/// Sessions table name
pub(crate) static DB_TABLE_SESSIONS: LazyLock<String> =
    LazyLock::new(|| env::var("DB_TABLE_SESSIONS").unwrap_or_else(|_| "sessions".to_string()));

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use std::env;

    // Helper struct to safely manage environment variables during tests
    struct EnvVarGuard {
        key: String,
        original_value: Option<String>,
    }

    impl EnvVarGuard {
        fn new(key: &str, value: Option<&str>) -> Self {
            let original_value = env::var(key).ok();
            unsafe {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
            Self {
                key: key.to_string(),
                original_value,
            }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            unsafe {
                match &self.original_value {
                    Some(value) => env::set_var(&self.key, value),
                    None => env::remove_var(&self.key),
                }
            }
        }
    }

    // The statics are initialized once per process, so these tests exercise the
    // same parsing logic directly.

    #[test]
    #[serial]
    fn test_handler_type_default() {
        let _guard = EnvVarGuard::new("SESSION_HANDLER_TYPE", None);
        let handler = env::var("SESSION_HANDLER_TYPE").unwrap_or_else(|_| "files".to_string());
        assert_eq!(handler, "files");
    }

    #[test]
    #[serial]
    fn test_handler_type_custom() {
        let _guard = EnvVarGuard::new("SESSION_HANDLER_TYPE", Some("redis"));
        let handler = env::var("SESSION_HANDLER_TYPE").unwrap_or_else(|_| "files".to_string());
        assert_eq!(handler, "redis");
    }

    #[test]
    #[serial]
    fn test_table_name_default() {
        let _guard = EnvVarGuard::new("DB_TABLE_SESSIONS", None);
        let table = env::var("DB_TABLE_SESSIONS").unwrap_or_else(|_| "sessions".to_string());
        assert_eq!(table, "sessions");
    }
}
