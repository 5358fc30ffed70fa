//! Token cookies. Tokens travel only here, never in response bodies.

use axum::http::{header, HeaderMap};

use crate::config::HttpConfig;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Read a cookie value from the request's `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_string())
        })
}

/// `Set-Cookie` value carrying a token for `max_age_seconds`
pub fn token_cookie(http: &HttpConfig, name: &str, token: &str, max_age_seconds: i64) -> String {
    let mut cookie = format!(
        "{name}={token}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        max_age_seconds.max(0)
    );
    if http.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that makes the browser drop the cookie
pub fn expired_cookie(http: &HttpConfig, name: &str) -> String {
    let mut cookie = format!(
        "{name}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax"
    );
    if http.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; access_token=abc.def.ghi; refresh_token="),
        );

        assert_eq!(
            read_cookie(&headers, ACCESS_COOKIE).as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(read_cookie(&headers, REFRESH_COOKIE), None);
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let mut http = HttpConfig::default();
        let cookie = token_cookie(&http, ACCESS_COOKIE, "tok", 900);
        assert_eq!(
            cookie,
            "access_token=tok; Path=/; Max-Age=900; HttpOnly; SameSite=Lax"
        );

        http.cookie_secure = true;
        assert!(token_cookie(&http, ACCESS_COOKIE, "tok", 900).ends_with("; Secure"));
        assert!(expired_cookie(&http, REFRESH_COOKIE).starts_with("refresh_token=; Path=/; Max-Age=0"));
    }
}
