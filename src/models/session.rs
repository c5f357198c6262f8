//! Authenticated session handed out by a session provider.

use chrono::{DateTime, Duration, Utc};

/// Bearer credentials for the storage browser backend.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub access_token: String,

    /// `None` when the token does not advertise an expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    pub fn expiring_at(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: Some(expires_at),
        }
    }

    /// True if the token is expired, or expires within `skew`, at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => now + skew >= expires_at,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_with_skew() {
        let now = Utc::now();
        let session = Session::expiring_at("t", now + Duration::seconds(20));

        assert!(!session.is_expired_at(now, Duration::seconds(10)));
        assert!(session.is_expired_at(now, Duration::seconds(30)));
        assert!(!Session::new("t").is_expired_at(now, Duration::seconds(30)));
    }
}
