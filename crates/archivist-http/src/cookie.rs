//! Manual `Cookie`/`Set-Cookie` handling:
//! `session_id` is the only value ever transmitted. No cookie crate is
//! pulled in for this — the attribute set is fixed and small enough that
//! the teacher's own `auth.rs` pattern of building header values by hand
//! (`format!` + `HeaderValue::from_str`, see `WWW-Authenticate` in
//! `AlrikOlson-codescope::server::auth`) covers it without adding a
//! dependency.

use archivist_core::config::Settings;
use axum::http::{HeaderMap, HeaderValue};

pub const COOKIE_NAME: &str = "session_id";

/// Finds `session_id` in the `Cookie` request header, if present.
pub fn read_session_id(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == COOKIE_NAME).then(|| value.trim().to_string())
    })
}

/// Builds the `Set-Cookie` header for a freshly created session.
pub fn set_cookie(session_id: &str, settings: &Settings) -> HeaderValue {
    let mut value = format!("{COOKIE_NAME}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}", settings.session_ttl_s);
    if settings.session_cookie_secure {
        value.push_str("; Secure");
    }
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Expires the cookie immediately.
pub fn clear_cookie(settings: &Settings) -> HeaderValue {
    let mut value = format!("{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if settings.session_cookie_secure {
        value.push_str("; Secure");
    }
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_session_id_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::COOKIE, HeaderValue::from_static("foo=bar; session_id=abc123; baz=qux"));
        assert_eq!(read_session_id(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn missing_cookie_header_is_none() {
        assert_eq!(read_session_id(&HeaderMap::new()), None);
    }

    #[test]
    fn set_cookie_carries_required_attributes() {
        let settings = Settings { session_cookie_secure: true, session_ttl_s: 3600, ..Settings::default() };
        let value = set_cookie("abc", &settings).to_str().unwrap().to_string();
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Secure"));
        assert!(value.contains("Max-Age=3600"));
        assert!(value.contains("Path=/"));
    }
}
