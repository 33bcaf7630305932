//! Remote session collaborator
//!
//! The dispatcher only ever sees sessions through [`Session`] and obtains
//! them lazily through a [`SessionProvider`]. Every session a provider
//! hands out while a run is live is tracked by a [`ShutdownRegistry`] so an
//! interrupt can quit it.

pub mod webdriver;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;

use crate::common::Result;
use crate::integrator::Target;

pub use webdriver::WebDriverProvider;

/// A live remote automation handle
#[async_trait]
pub trait Session: Send + Sync {
    /// Transport-assigned identifier
    fn id(&self) -> &str;

    /// End the remote session
    async fn quit(&self) -> Result<()>;
}

/// Shared session handle as seen by actions
pub type SessionHandle = Arc<dyn Session>;

impl fmt::Debug for dyn Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session({})", self.id())
    }
}

/// Acquires one fresh session per target; no pooling or reuse
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Start a session for the fully merged target
    async fn acquire(&self, target: &Target) -> Result<SessionHandle>;
}

/// Ticket returned by [`ShutdownRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Process-wide set of sessions to quit on interrupt
///
/// Each registered session is quit at most once: whichever of
/// [`unregister`](Self::unregister) or [`shutdown`](Self::shutdown) takes it
/// out of the registry first owns its cleanup.
#[derive(Default)]
pub struct ShutdownRegistry {
    next: AtomicU64,
    live: Mutex<BTreeMap<Ticket, SessionHandle>>,
}

impl ShutdownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process
    pub fn global() -> Arc<ShutdownRegistry> {
        static GLOBAL: OnceLock<Arc<ShutdownRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ShutdownRegistry::new())).clone()
    }

    /// Track a session until it is unregistered or shut down
    pub fn register(&self, session: SessionHandle) -> Ticket {
        let ticket = Ticket(self.next.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(ticket, session);
        ticket
    }

    /// Stop tracking a session, returning it if it was still tracked
    pub fn unregister(&self, ticket: Ticket) -> Option<SessionHandle> {
        self.lock().remove(&ticket)
    }

    /// Number of sessions still tracked
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Quit every tracked session, best-effort
    ///
    /// Returns how many sessions were asked to quit. Calling it again only
    /// touches sessions registered since the previous call.
    pub async fn shutdown(&self) -> usize {
        let drained: Vec<SessionHandle> = std::mem::take(&mut *self.lock()).into_values().collect();
        let count = drained.len();
        for session in drained {
            match session.quit().await {
                Ok(()) => tracing::info!(session = session.id(), "Session quit on shutdown"),
                Err(e) => {
                    tracing::warn!(session = session.id(), error = %e, "Failed to quit session")
                }
            }
        }
        count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<Ticket, SessionHandle>> {
        // A panic while holding the lock leaves the map itself consistent
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Quit registered sessions when the process receives Ctrl-C
///
/// Does not cancel in-flight dispatches.
pub fn install_signal_handler(registry: Arc<ShutdownRegistry>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(sessions = registry.len(), "Interrupted, quitting live sessions");
            registry.shutdown().await;
        }
    });
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// In-memory session counting its quits
    pub(crate) struct FakeSession {
        pub id: String,
        pub quits: AtomicUsize,
    }

    impl FakeSession {
        pub(crate) fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                quits: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Session for FakeSession {
        fn id(&self) -> &str {
            &self.id
        }

        async fn quit(&self) -> Result<()> {
            self.quits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_quits_each_session_once() {
        let registry = ShutdownRegistry::new();
        let a = FakeSession::new("a");
        let b = FakeSession::new("b");
        registry.register(a.clone());
        registry.register(b.clone());

        assert_eq!(registry.shutdown().await, 2);
        assert_eq!(registry.shutdown().await, 0);
        assert_eq!(a.quits.load(Ordering::SeqCst), 1);
        assert_eq!(b.quits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unregistered_session_is_not_quit() {
        let registry = ShutdownRegistry::new();
        let a = FakeSession::new("a");
        let ticket = registry.register(a.clone());
        assert!(registry.unregister(ticket).is_some());
        assert!(registry.unregister(ticket).is_none());
        assert!(registry.is_empty());

        registry.shutdown().await;
        assert_eq!(a.quits.load(Ordering::SeqCst), 0);
    }
}
