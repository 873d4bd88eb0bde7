//! Session creation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use paygate_core::{now_millis, RequesterId};

use crate::credential::SessionCredential;
use crate::error::{Result, SessionError};

/// Configuration for session creation.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Default TTL in minutes.
    pub ttl_minutes: u32,
    /// Upper bound on any requested TTL.
    pub max_ttl_minutes: u32,
    /// Domain tag mixed into every challenge.
    pub domain: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 10,
            max_ttl_minutes: 30,
            domain: "paygate".to_string(),
        }
    }
}

/// Issues session credentials and tracks how many are alive.
#[derive(Clone, Debug)]
pub struct SessionAuthorizer {
    config: SessionConfig,
    active: Arc<AtomicUsize>,
}

impl SessionAuthorizer {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create an unsigned credential for `requester` valid for `ttl_minutes`.
    ///
    /// Fails if the requester has no resolvable principal or the TTL is
    /// outside `1..=max_ttl_minutes`.
    pub fn create(&self, requester: &RequesterId, ttl_minutes: u32) -> Result<SessionCredential> {
        if ttl_minutes == 0 || ttl_minutes > self.config.max_ttl_minutes {
            return Err(SessionError::InvalidTtl {
                ttl_minutes,
                max_minutes: self.config.max_ttl_minutes,
            });
        }
        let principal = requester.principal()?;

        let credential = SessionCredential::new(
            self.config.domain.clone(),
            requester.clone(),
            principal,
            now_millis(),
            ttl_minutes,
            Arc::clone(&self.active),
        );
        tracing::debug!(requester = %requester, ttl_minutes, "session credential created");
        Ok(credential)
    }

    /// Create a credential with the configured default TTL.
    pub fn create_default(&self, requester: &RequesterId) -> Result<SessionCredential> {
        self.create(requester, self.config.ttl_minutes)
    }

    /// Number of credentials currently alive.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paygate_core::Keypair;

    #[test]
    fn test_create_uses_default_ttl() {
        let authorizer = SessionAuthorizer::new(SessionConfig::default());
        let wallet = Keypair::generate();

        let credential = authorizer.create_default(&wallet.requester_id()).unwrap();

        assert_eq!(credential.ttl_minutes(), 10);
        assert_eq!(credential.requester(), &wallet.requester_id());
        assert!(!credential.is_signed());
    }

    #[test]
    fn test_ttl_bounds() {
        let authorizer = SessionAuthorizer::new(SessionConfig::default());
        let requester = Keypair::generate().requester_id();

        assert!(matches!(
            authorizer.create(&requester, 0),
            Err(SessionError::InvalidTtl { ttl_minutes: 0, .. })
        ));
        assert!(matches!(
            authorizer.create(&requester, 31),
            Err(SessionError::InvalidTtl { max_minutes: 30, .. })
        ));
        assert!(authorizer.create(&requester, 30).is_ok());
        assert!(authorizer.create(&requester, 1).is_ok());
    }

    #[test]
    fn test_unresolvable_requester() {
        let authorizer = SessionAuthorizer::new(SessionConfig::default());

        let result = authorizer.create(&RequesterId::from("alice"), 10);

        assert!(matches!(result, Err(SessionError::Unresolvable(_))));
        assert_eq!(authorizer.active_sessions(), 0);
    }

    #[test]
    fn test_active_sessions_tracks_drops() {
        let authorizer = SessionAuthorizer::new(SessionConfig::default());
        let requester = Keypair::generate().requester_id();

        let a = authorizer.create_default(&requester).unwrap();
        let b = authorizer.create_default(&requester).unwrap();
        assert_eq!(authorizer.active_sessions(), 2);

        drop(a);
        assert_eq!(authorizer.active_sessions(), 1);
        drop(b);
        assert_eq!(authorizer.active_sessions(), 0);
    }

    #[test]
    fn test_clones_share_counter() {
        let authorizer = SessionAuthorizer::new(SessionConfig::default());
        let other = authorizer.clone();
        let requester = Keypair::generate().requester_id();

        let _credential = other.create_default(&requester).unwrap();

        assert_eq!(authorizer.active_sessions(), 1);
    }
}
