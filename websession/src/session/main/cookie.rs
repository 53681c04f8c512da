use chrono::Utc;
use http::header::{HeaderMap, SET_COOKIE};

use crate::session::config::CookieConfig;
use crate::session::errors::SessionError;
use crate::session::types::CookieCommand;
use crate::utils::time_after;

const EXPIRED_COOKIE_VALUE: &str = "deleted";
const EXPIRED_COOKIE_DATE: &str = "Thu, 01 Jan 1970 00:00:01 GMT";

/// Appends the `Set-Cookie` header that `command` calls for. `Keep` adds nothing.
pub fn header_set_cookie(
    headers: &mut HeaderMap,
    config: &CookieConfig,
    command: &CookieCommand,
) -> Result<(), SessionError> {
    let cookie = match command {
        CookieCommand::Keep => return Ok(()),
        CookieCommand::Set(id) => {
            let mut cookie = format!("{}={}", config.name, id);
            if config.lifetime > 0 {
                let expires_at = time_after(Utc::now(), config.lifetime);
                cookie.push_str(&format!(
                    "; Max-Age={}; Expires={}",
                    config.lifetime,
                    expires_at.format("%a, %d %b %Y %H:%M:%S GMT")
                ));
            }
            cookie
        }
        CookieCommand::Expire => format!(
            "{}={EXPIRED_COOKIE_VALUE}; Max-Age=0; Expires={EXPIRED_COOKIE_DATE}",
            config.name
        ),
    };

    let cookie = format!("{cookie}{}", attributes(config));
    tracing::debug!("Cookie: {:#?}", cookie);
    headers.append(
        SET_COOKIE,
        cookie
            .parse()
            .map_err(|_| SessionError::Cookie("Failed to parse cookie".to_string()))?,
    );
    Ok(())
}

fn attributes(config: &CookieConfig) -> String {
    let mut attrs = format!("; Path={}", config.path);
    if let Some(domain) = &config.domain {
        attrs.push_str(&format!("; Domain={domain}"));
    }
    if config.secure {
        attrs.push_str("; Secure");
    }
    if config.http_only {
        attrs.push_str("; HttpOnly");
    }
    attrs.push_str(&format!("; SameSite={}", config.same_site));
    attrs
}
