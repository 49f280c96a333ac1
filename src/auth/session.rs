use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Generate a cryptographically secure random session token.
pub fn generate_session_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Expiry timestamp for a session created now, in the stored timestamp format.
#[must_use]
pub fn session_expiry(ttl: Duration) -> String {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(1));
    (Utc::now() + ttl).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_session_token() {
        let token1 = generate_session_token();
        let token2 = generate_session_token();

        assert_eq!(token1.len(), 64);
        assert_eq!(token2.len(), 64);
        assert_ne!(token1, token2);
        assert!(token1.chars().all(|c| c.is_alphanumeric()));
    }

    #[test]
    fn test_session_expiry_is_in_future() {
        let now = crate::db::now_timestamp();
        let expiry = session_expiry(Duration::from_secs(3600));
        assert!(expiry > now);
        assert!(expiry.ends_with('Z'));
    }
}
