//! Live Handler Registry: the single slot holding the current
//! request handler.
//!
//! Read-heavy, written once per successful store. The read guard is
//! held for the entire duration of the installed handler's
//! processing, so a pending install waits for in-flight GETs and new
//! GETs wait for a pending install; fairness between the two is
//! whatever `tokio::sync::RwLock` provides. The slot starts at a
//! built-in not-found behavior, so it is never empty.

use tokio::sync::RwLock;

use super::protocol::{ProtocolError, WireRequest, WireResponse};
use super::resolver::InstalledHandler;

enum CurrentHandler {
    /// No module has ever been installed; the front door renders the
    /// default not-found response.
    NotFound,
    Installed(InstalledHandler),
}

pub struct HandlerRegistry {
    current: RwLock<CurrentHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(CurrentHandler::NotFound),
        }
    }

    /// Dispatch a request to the current handler under the read lock.
    ///
    /// `Ok(None)` means no handler has ever been installed. The guard
    /// is held across the handler's full round trip: a swap that
    /// happens mid-flight does not affect this request, and the next
    /// dispatch after a swap always observes the new handler.
    pub async fn dispatch(
        &self,
        req: &WireRequest,
    ) -> Result<Option<WireResponse>, ProtocolError> {
        let current = self.current.read().await;
        match &*current {
            CurrentHandler::NotFound => Ok(None),
            CurrentHandler::Installed(handler) => handler.handle(req).await.map(Some),
        }
    }

    /// Swap in a new handler. The write lock is held only across the
    /// slot assignment; the replaced handler (and its module process)
    /// is dropped as the guard releases.
    pub async fn install(&self, handler: InstalledHandler) {
        let mut current = self.current.write().await;
        *current = CurrentHandler::Installed(handler);
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_request() -> WireRequest {
        WireRequest {
            method: "GET".to_string(),
            path: "/plugins".to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    #[tokio::test]
    async fn registry_starts_with_no_installed_handler() {
        let registry = HandlerRegistry::new();
        let outcome = registry.dispatch(&probe_request()).await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn concurrent_reads_share_the_lock() {
        let registry = std::sync::Arc::new(HandlerRegistry::new());
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = std::sync::Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.dispatch(&probe_request()).await.unwrap().is_none()
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }
    }
}
