use std::sync::Arc;

use homefind_core::webhook::WebhookVerifier;
use homefind_core::Capabilities;

use crate::auth::SessionVerifier;

/// Shared application state, passed to all handlers via Axum's `State` extractor.
/// Wrapped in `Arc` so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    caps: Capabilities,
    sessions: SessionVerifier,
    webhooks: Option<WebhookVerifier>,
}

impl AppState {
    pub fn new(
        caps: Capabilities,
        sessions: SessionVerifier,
        webhooks: Option<WebhookVerifier>,
    ) -> Self {
        Self {
            inner: Arc::new(InnerState {
                caps,
                sessions,
                webhooks,
            }),
        }
    }

    pub fn caps(&self) -> &Capabilities {
        &self.inner.caps
    }

    pub fn sessions(&self) -> &SessionVerifier {
        &self.inner.sessions
    }

    /// `None` when no webhook secret is configured.
    pub fn webhooks(&self) -> Option<&WebhookVerifier> {
        self.inner.webhooks.as_ref()
    }
}
