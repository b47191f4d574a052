//! Backend session lifecycle for a single inspector panel.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{CallTarget, CapabilityKind, CloseSessionRequest, Session};
use crate::core::backend::{BackendError, InspectorBackend};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("Failed to open session for {target}: {source}")]
    Open {
        target: String,
        #[source]
        source: BackendError,
    },
    #[error("Backend returned a session without an id")]
    MissingId,
    #[error("No session is open for {0}; reselect the server to retry")]
    Missing(String),
}

struct HeldSession {
    target: CallTarget,
    session: Session,
}

/// Holds at most one session, keyed by its [`CallTarget`].
#[derive(Default)]
pub struct SessionManager {
    held: Option<HeldSession>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Session> {
        self.held.as_ref().map(|held| &held.session)
    }

    /// The held session, if it was opened for exactly `target`.
    pub fn session_for(&self, target: &CallTarget) -> Option<&Session> {
        self.held
            .as_ref()
            .filter(|held| held.target == *target)
            .map(|held| &held.session)
    }

    pub async fn ensure_session(
        &mut self,
        backend: &Arc<dyn InspectorBackend>,
        kind: CapabilityKind,
        target: &CallTarget,
    ) -> Result<Option<Session>, SessionError> {
        if !kind.requires_session() {
            self.teardown(backend);
            return Ok(None);
        }

        if let Some(session) = self.session_for(target) {
            return Ok(Some(session.clone()));
        }

        if let Some(previous) = self.held.take() {
            let request = CloseSessionRequest {
                session_id: previous.session.session_id.clone(),
            };
            if let Err(err) = backend.close_session(&request).await {
                warn!(
                    session_id = %previous.session.session_id,
                    "Failed to close superseded session: {err}"
                );
            }
        }

        let session = backend
            .open_session(target)
            .await
            .map_err(|source| SessionError::Open {
                target: target.label(),
                source,
            })?;
        if session.session_id.trim().is_empty() {
            return Err(SessionError::MissingId);
        }

        info!(
            session_id = %session.session_id,
            server_id = %session.server_id,
            target = %target.label(),
            "Opened inspector session"
        );
        self.held = Some(HeldSession {
            target: target.clone(),
            session: session.clone(),
        });
        Ok(Some(session))
    }

    /// Closes the held session and waits for the backend to acknowledge.
    /// For drivers that are about to exit; panels use [`Self::teardown`].
    pub async fn close(&mut self, backend: &Arc<dyn InspectorBackend>) -> Result<(), BackendError> {
        let Some(held) = self.held.take() else {
            return Ok(());
        };
        let request = CloseSessionRequest {
            session_id: held.session.session_id,
        };
        backend.close_session(&request).await?;
        debug!(session_id = %request.session_id, "Closed inspector session");
        Ok(())
    }

    /// Releases the held session without waiting for the backend.
    ///
    /// The close request runs on a spawned task; its failure is only logged.
    pub fn teardown(&mut self, backend: &Arc<dyn InspectorBackend>) {
        let Some(held) = self.held.take() else {
            return;
        };
        let session_id = held.session.session_id;

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(session_id = %session_id, "No runtime available to close session");
            return;
        };

        let backend = Arc::clone(backend);
        runtime.spawn(async move {
            let request = CloseSessionRequest {
                session_id: session_id.clone(),
            };
            match backend.close_session(&request).await {
                Ok(()) => debug!(session_id = %session_id, "Closed inspector session"),
                Err(err) => warn!(session_id = %session_id, "Failed to close session: {err}"),
            }
        });
    }
}
