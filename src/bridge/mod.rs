//! Guest-side half of the widget bridge.
//!
//! A [`Bridge`] announces itself to the host, binds the session token from the
//! host's `readyReply`, imports the guest module, and invokes its entry point
//! on `init`. All state lives behind one `Rc` and is touched only from the
//! task driving [`Bridge::run`], so everything here is single-threaded and
//! must run inside a [`tokio::task::LocalSet`].

pub mod context;
pub mod error;
pub mod events;
pub mod forwarder;
pub mod loader;
pub mod session;
pub mod stylesheet;

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::BridgeConfig;
use crate::protocol::{Envelope, InboundFrame, InboundMessage, OutboundMessage, SessionToken};
use crate::transport::HostPort;

use context::{MountRoot, WidgetContext};
use error::BridgeError;
use events::{Delivery, EventChannel};
use forwarder::{DomForwarder, DomObservation};
use loader::{module_url, LoadError, ModuleLoader};
use session::{BridgeState, Session};
use stylesheet::StylesheetLoader;

/// One unit of work for the bridge's message listener.
#[derive(Debug, Clone)]
pub enum BridgeInput {
    Frame(InboundFrame),
    Dom(DomObservation),
}

/// Result of handling one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Wrong origin or undecodable data; nothing changed.
    Ignored,
    /// Token bound and module import started.
    Bound,
    /// Guest entry point ran.
    Initialized,
    Dispatched,
    Queued,
}

pub(crate) struct Shared {
    pub(crate) config: BridgeConfig,
    pub(crate) session: RefCell<Session>,
    pub(crate) channel: EventChannel,
    pub(crate) root: MountRoot,
    pub(crate) stylesheets: Rc<dyn StylesheetLoader>,
    forwarder: RefCell<DomForwarder>,
    modules: Rc<dyn ModuleLoader>,
    port: Rc<dyn HostPort>,
}

impl Shared {
    /// Stamp `message` with the current token and hand it to the host port.
    pub(crate) fn post(&self, message: OutboundMessage) {
        let token = self.session.borrow().token().cloned();
        self.port.post(Envelope::stamp(message, token.as_ref()));
    }

    pub(crate) fn resolve(&self, reference: &str) -> Result<Url, BridgeError> {
        let session = self.session.borrow();
        let resolved = match session.document_base() {
            Some(base) => base.join(reference),
            None => Url::parse(reference),
        };
        resolved.map_err(|err| BridgeError::InvalidUrl {
            reference: reference.to_string(),
            reason: err.to_string(),
        })
    }
}

pub struct Bridge {
    shared: Rc<Shared>,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        modules: Rc<dyn ModuleLoader>,
        stylesheets: Rc<dyn StylesheetLoader>,
        port: Rc<dyn HostPort>,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                config,
                session: RefCell::new(Session::new()),
                channel: EventChannel::new(),
                root: MountRoot::default(),
                stylesheets,
                forwarder: RefCell::new(DomForwarder::new()),
                modules,
                port,
            }),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.shared.session.borrow().state()
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.shared.session.borrow().token().cloned()
    }

    pub fn document_base(&self) -> Option<Url> {
        self.shared.session.borrow().document_base().cloned()
    }

    pub fn stylesheets(&self) -> Vec<Url> {
        self.shared.session.borrow().stylesheets().to_vec()
    }

    pub fn root(&self) -> &MountRoot {
        &self.shared.root
    }

    pub fn pending_events(&self) -> usize {
        self.shared.channel.pending_len()
    }

    /// Announce the bridge to the host. The first `ready` carries no token.
    pub fn start(&self) -> Result<(), BridgeError> {
        self.shared.session.borrow_mut().begin()?;
        self.shared.post(OutboundMessage::Ready);
        debug!(target: "bridge", "announced ready; awaiting token");
        Ok(())
    }

    /// Process one inbound frame.
    ///
    /// Frames from any origin other than the configured host are a no-op.
    /// `init` suspends until the guest module import has resolved.
    pub async fn handle_frame(&self, frame: InboundFrame) -> Result<FrameOutcome, BridgeError> {
        let expected = self.shared.config.expected_origin();
        if frame.origin != expected {
            debug!(
                target: "bridge",
                origin = %frame.origin,
                expected = %expected,
                "ignoring frame from foreign origin"
            );
            return Ok(FrameOutcome::Ignored);
        }

        let message = match frame.decode() {
            Ok(message) => message,
            Err(err) => {
                warn!(target: "bridge", error = %err, "ignoring undecodable frame");
                return Ok(FrameOutcome::Ignored);
            }
        };

        match message {
            InboundMessage::ReadyReply {
                token,
                base_url,
                js_path,
            } => self.on_ready_reply(token, base_url, js_path),
            InboundMessage::Init { data } => self.on_init(data).await,
            InboundMessage::Event { event, payload } => {
                Ok(match self.shared.channel.deliver(event, payload) {
                    Delivery::Dispatched => FrameOutcome::Dispatched,
                    Delivery::Queued { .. } => FrameOutcome::Queued,
                })
            }
        }
    }

    /// Forward a local DOM observation to the host. Returns whether a message
    /// was posted.
    pub fn observe(&self, observation: DomObservation) -> bool {
        let message = self.shared.forwarder.borrow().translate(observation);
        match message {
            Some(message) => {
                self.shared.post(message);
                true
            }
            None => false,
        }
    }

    /// Announce readiness, then process inputs in arrival order until the
    /// channel closes or a fatal error occurs.
    pub async fn run(&self, mut inputs: mpsc::UnboundedReceiver<BridgeInput>) -> Result<(), BridgeError> {
        self.start()?;
        while let Some(input) = inputs.recv().await {
            match input {
                BridgeInput::Frame(frame) => match self.handle_frame(frame).await {
                    Ok(_) => {}
                    Err(err) if err.is_fatal() => {
                        error!(target: "bridge", error = %err, "bridge stopped");
                        return Err(err);
                    }
                    Err(err) => {
                        warn!(target: "bridge", error = %err, "rejected inbound frame");
                    }
                },
                BridgeInput::Dom(observation) => {
                    self.observe(observation);
                }
            }
        }
        debug!(target: "bridge", "input channel closed");
        Ok(())
    }

    fn on_ready_reply(
        &self,
        token: SessionToken,
        base_url: String,
        js_path: String,
    ) -> Result<FrameOutcome, BridgeError> {
        self.shared
            .session
            .borrow_mut()
            .bind(token.clone())?;

        let task = tokio::task::spawn_local(import_module(
            Rc::clone(&self.shared),
            base_url.clone(),
            js_path.clone(),
        ));
        self.shared.session.borrow_mut().attach_import(task);
        self.shared.forwarder.borrow_mut().activate();

        info!(
            target: "bridge",
            token = %token,
            base_url = %base_url,
            js_path = %js_path,
            "session bound; importing guest module"
        );
        Ok(FrameOutcome::Bound)
    }

    async fn on_init(&self, data: Value) -> Result<FrameOutcome, BridgeError> {
        let task = self.shared.session.borrow_mut().take_import()?;

        let module = match task.await {
            Ok(Ok(module)) => module,
            Ok(Err(err)) => {
                self.shared.session.borrow_mut().mark_errored();
                return Err(err.into());
            }
            Err(join) => {
                self.shared.session.borrow_mut().mark_errored();
                return Err(LoadError::Aborted(join.to_string()).into());
            }
        };

        let entry_name = self.shared.config.entry_point();
        let Some(entry) = module.entry_point(entry_name) else {
            self.shared.session.borrow_mut().mark_errored();
            return Err(BridgeError::ContractViolation {
                entry_point: entry_name.to_string(),
                exports: module.export_names(),
            });
        };

        let context = WidgetContext::new(Rc::clone(&self.shared));
        if let Err(err) = entry(&context, data) {
            self.shared.session.borrow_mut().mark_errored();
            return Err(BridgeError::Guest(format!("{err:#}")));
        }

        self.shared.session.borrow_mut().mark_initialized();
        info!(target: "bridge", entry_point = %entry_name, "guest initialized");
        Ok(FrameOutcome::Initialized)
    }
}

/// Import `base_url + js_path`, then install `base_url` as the document base.
async fn import_module(
    shared: Rc<Shared>,
    base_url: String,
    js_path: String,
) -> Result<Rc<loader::GuestModule>, LoadError> {
    let url = module_url(&base_url, &js_path)?;
    let import = shared.modules.import(url.clone());
    let module = match shared.config.import_timeout() {
        Some(after) => tokio::time::timeout(after, import)
            .await
            .map_err(|_| LoadError::Timeout {
                url: url.to_string(),
                after,
            })??,
        None => import.await?,
    };

    match Url::parse(&base_url) {
        Ok(base) => shared.session.borrow_mut().install_base(base),
        Err(err) => {
            warn!(target: "loader", base_url = %base_url, error = %err, "base URL is not absolute; document base unchanged");
        }
    }
    debug!(target: "loader", url = %url, exports = ?module.export_names(), "guest module loaded");
    Ok(module)
}
