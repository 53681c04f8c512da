use std::sync::LazyLock;

/// Echo the replacement CSRF token in an `X-CSRF-TOKEN` response header.
/// Default: true
pub static WEBSESSION_RESPOND_WITH_X_CSRF_TOKEN: LazyLock<bool> = LazyLock::new(|| {
    std::env::var("WEBSESSION_RESPOND_WITH_X_CSRF_TOKEN")
        .map(|val| val.to_lowercase() != "false")
        .unwrap_or(true)
});

/// Largest request body, in bytes, buffered to look for a CSRF token.
/// Default: 2 MiB
pub(crate) static CSRF_BODY_LIMIT: LazyLock<usize> = LazyLock::new(|| {
    std::env::var("CSRF_BODY_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(2 * 1024 * 1024)
});
