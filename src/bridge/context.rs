use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use serde_json::Value;
use url::Url;

use super::error::BridgeError;
use super::stylesheet::StylesheetError;
use super::Shared;
use crate::protocol::{OutboundMessage, SessionToken};

/// Surface the guest renders into.
#[derive(Debug, Default)]
pub struct MountRoot {
    markup: RefCell<String>,
}

impl MountRoot {
    pub fn replace(&self, html: impl Into<String>) {
        *self.markup.borrow_mut() = html.into();
    }

    pub fn markup(&self) -> String {
        self.markup.borrow().clone()
    }
}

/// Handle passed to the guest's entry point.
///
/// Cloning is cheap; every clone talks to the same bridge.
#[derive(Clone)]
pub struct WidgetContext {
    shared: Rc<Shared>,
}

impl WidgetContext {
    pub(crate) fn new(shared: Rc<Shared>) -> Self {
        Self { shared }
    }

    pub fn root(&self) -> &MountRoot {
        &self.shared.root
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.shared.session.borrow().token().cloned()
    }

    /// Register the single handler for `name`. Events already queued behind
    /// it are delivered before this returns.
    pub fn handle_event<F>(&self, name: &str, callback: F) -> Result<(), BridgeError>
    where
        F: Fn(Value) -> anyhow::Result<()> + 'static,
    {
        self.shared.channel.register(name, callback)
    }

    /// Send an event to the host without waiting for any acknowledgement.
    pub fn push_event(&self, name: &str, payload: Option<Value>) {
        self.shared.post(OutboundMessage::Event {
            event: name.to_string(),
            payload,
        });
    }

    /// Resolve `reference` against the installed document base.
    pub fn resolve(&self, reference: &str) -> Result<Url, BridgeError> {
        self.shared.resolve(reference)
    }

    /// Load a stylesheet; the returned future completes once it has loaded.
    pub fn import_css(&self, url: &str) -> impl Future<Output = Result<(), BridgeError>> + 'static {
        let shared = Rc::clone(&self.shared);
        let resolved = self.resolve(url);
        async move {
            let url = resolved?;
            let load = shared.stylesheets.load(url.clone());
            let outcome = match shared.config.stylesheet_timeout() {
                Some(after) => tokio::time::timeout(after, load)
                    .await
                    .unwrap_or_else(|_| {
                        Err(StylesheetError::Timeout {
                            url: url.clone(),
                            after,
                        })
                    }),
                None => load.await,
            };
            outcome?;
            tracing::debug!(target: "bridge", url = %url, "stylesheet imported");
            shared.session.borrow_mut().record_stylesheet(url);
            Ok(())
        }
    }
}
