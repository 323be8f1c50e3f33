//! Uniform session lifecycle over backends that may or may not have one.
//!
//! A backend advertises session support through [`DataSourcePath::session`].
//! [`SessionCapability::of`] picks the matching variant once; callers never
//! branch on the concrete backend type.

use crate::error::SessionError;
use crate::ingest::types::{Credentials, DataSourcePath};

/// Lifecycle hooks implemented by session-aware backends.
pub trait SessionAware: Send + Sync {
    fn init_session(&self, consumer: &Credentials, user: &Credentials) -> Result<(), SessionError>;
    fn end_session(&self);
    fn is_session_active(&self) -> bool;
    fn is_auth_required(&self) -> bool;
}

#[derive(Clone, Copy)]
pub enum SessionCapability<'a> {
    Sessionless,
    Sessionful(&'a dyn SessionAware),
}

impl<'a> SessionCapability<'a> {
    pub fn of(path: &'a dyn DataSourcePath) -> Self {
        match path.session() {
            Some(s) => SessionCapability::Sessionful(s),
            None => SessionCapability::Sessionless,
        }
    }

    pub fn is_auth_required(&self) -> bool {
        match self {
            SessionCapability::Sessionless => false,
            SessionCapability::Sessionful(s) => s.is_auth_required(),
        }
    }

    pub fn is_session_active(&self) -> bool {
        match self {
            SessionCapability::Sessionless => false,
            SessionCapability::Sessionful(s) => s.is_session_active(),
        }
    }

    pub fn init_session(&self, consumer: &Credentials, user: &Credentials) -> Result<(), SessionError> {
        match self {
            SessionCapability::Sessionless => Ok(()),
            SessionCapability::Sessionful(s) => s.init_session(consumer, user),
        }
    }

    /// Tears down only an active session; safe to call repeatedly.
    pub fn end_session(&self) {
        if let SessionCapability::Sessionful(s) = self {
            if s.is_session_active() {
                s.end_session();
            }
        }
    }

    /// Initialise a session and hand back a guard that ends it on drop.
    pub fn open(self, consumer: &Credentials, user: &Credentials) -> Result<SessionGuard<'a>, SessionError> {
        self.init_session(consumer, user)?;
        tracing::debug!(
            target: "poller",
            consumer = !consumer.token.is_empty(),
            user = !user.token.is_empty(),
            "session opened"
        );
        Ok(SessionGuard { cap: self })
    }
}

/// Ends the session when the owning cycle/request finishes, on every exit path.
pub struct SessionGuard<'a> {
    cap: SessionCapability<'a>,
}

impl SessionGuard<'_> {
    pub fn is_active(&self) -> bool {
        self.cap.is_session_active()
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.cap.end_session();
        tracing::debug!(target: "poller", "session closed");
    }
}
