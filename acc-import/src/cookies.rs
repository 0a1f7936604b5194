use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

pub const SESSION_COOKIE: &str = "acc_session";
pub const STATE_COOKIE: &str = "acc_oauth_state";

const STATE_MAX_AGE: Duration = Duration::minutes(5);
const SESSION_MAX_AGE: Duration = Duration::days(15);

fn secured(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Anti-forgery state for one authorization round trip.
pub fn state_cookie(state: &str, secure: bool) -> Cookie<'static> {
    secured(STATE_COOKIE, state.to_string(), STATE_MAX_AGE, secure)
}

pub fn clear_state_cookie(secure: bool) -> Cookie<'static> {
    secured(STATE_COOKIE, String::new(), Duration::ZERO, secure)
}

pub fn session_cookie(session_id: &str, secure: bool) -> Cookie<'static> {
    secured(SESSION_COOKIE, session_id.to_string(), SESSION_MAX_AGE, secure)
}

pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    secured(SESSION_COOKIE, String::new(), Duration::ZERO, secure)
}

/// Non-empty session id from the jar.
pub fn session_id(jar: &CookieJar) -> Option<String> {
    non_empty(jar, SESSION_COOKIE)
}

pub fn oauth_state(jar: &CookieJar) -> Option<String> {
    non_empty(jar, STATE_COOKIE)
}

fn non_empty(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cookie_flags() {
        let cookie = state_cookie("abc", true);
        assert_eq!(cookie.name(), STATE_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::minutes(5)));
    }

    #[test]
    fn test_session_cookie_lives_fifteen_days() {
        let cookie = session_cookie("sid", false);
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.max_age(), Some(Duration::days(15)));
        assert_eq!(clear_session_cookie(false).max_age(), Some(Duration::ZERO));
    }

    #[test]
    fn test_empty_values_read_as_missing() {
        let jar = CookieJar::new()
            .add(Cookie::new(SESSION_COOKIE, ""))
            .add(Cookie::new(STATE_COOKIE, "xyz"));
        assert_eq!(session_id(&jar), None);
        assert_eq!(oauth_state(&jar).as_deref(), Some("xyz"));
    }
}
