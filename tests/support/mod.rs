#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use url::Url;
use widget_bridge::{
    Bridge, BridgeConfig, ChannelPort, Envelope, GuestModule, InboundFrame, InboundMessage,
    LoadError, ModuleLoader, ModuleRegistry, SessionToken, StylesheetError, StylesheetLoader,
};

pub const HOST: &str = "https://h";

pub fn config() -> BridgeConfig {
    BridgeConfig::default().with_host_origin(Url::parse("https://h/").unwrap())
}

pub fn bridge_with(
    config: BridgeConfig,
    modules: Rc<dyn ModuleLoader>,
    stylesheets: Rc<dyn StylesheetLoader>,
) -> (Bridge, mpsc::UnboundedReceiver<Envelope>) {
    let (port, rx) = ChannelPort::new();
    (Bridge::new(config, modules, stylesheets, Rc::new(port)), rx)
}

/// Bridge serving `module` at `https://h/w.js`.
pub fn bridge_serving(module: GuestModule) -> (Bridge, mpsc::UnboundedReceiver<Envelope>) {
    let registry = ModuleRegistry::new();
    registry.register(&Url::parse("https://h/w.js").unwrap(), module);
    bridge_with(
        config(),
        Rc::new(registry),
        Rc::new(InstantStylesheets::default()),
    )
}

pub fn frame(message: InboundMessage) -> InboundFrame {
    InboundFrame::from_message(HOST, &message).unwrap()
}

pub fn ready_reply(token: &str) -> InboundFrame {
    frame(InboundMessage::ReadyReply {
        token: SessionToken::new(token),
        base_url: "https://h/".to_string(),
        js_path: "w.js".to_string(),
    })
}

pub fn init(data: Value) -> InboundFrame {
    frame(InboundMessage::Init { data })
}

pub fn event(name: &str, payload: Value) -> InboundFrame {
    frame(InboundMessage::Event {
        event: name.to_string(),
        payload,
    })
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Vec<Envelope> {
    let mut collected = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        collected.push(envelope);
    }
    collected
}

pub type CallLog = Rc<RefCell<Vec<(String, Value)>>>;

pub fn recorder(log: &CallLog, name: &'static str) -> impl Fn(Value) -> anyhow::Result<()> {
    let log = Rc::clone(log);
    move |payload| {
        log.borrow_mut().push((name.to_string(), payload));
        Ok(())
    }
}

/// Stylesheet loader whose loads complete immediately and are recorded.
#[derive(Default)]
pub struct InstantStylesheets {
    pub loaded: RefCell<Vec<Url>>,
}

impl StylesheetLoader for InstantStylesheets {
    fn load(&self, url: Url) -> LocalBoxFuture<'static, Result<(), StylesheetError>> {
        self.loaded.borrow_mut().push(url);
        async { Ok(()) }.boxed_local()
    }
}

/// Stylesheet loader whose loads never complete.
pub struct HangingStylesheets;

impl StylesheetLoader for HangingStylesheets {
    fn load(&self, _url: Url) -> LocalBoxFuture<'static, Result<(), StylesheetError>> {
        futures_util::future::pending().boxed_local()
    }
}

/// Loader whose single import resolves only when the test releases it.
pub struct GatedLoader {
    gate: RefCell<Option<oneshot::Receiver<GuestModule>>>,
    pub requested: RefCell<Vec<Url>>,
}

impl GatedLoader {
    pub fn new() -> (Self, oneshot::Sender<GuestModule>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                gate: RefCell::new(Some(rx)),
                requested: RefCell::new(Vec::new()),
            },
            tx,
        )
    }
}

impl ModuleLoader for GatedLoader {
    fn import(&self, url: Url) -> LocalBoxFuture<'static, Result<Rc<GuestModule>, LoadError>> {
        self.requested.borrow_mut().push(url.clone());
        let gate = self.gate.borrow_mut().take();
        async move {
            let gate = gate.ok_or_else(|| LoadError::Aborted("imported twice".into()))?;
            gate.await
                .map(Rc::new)
                .map_err(|_| LoadError::Aborted("gate dropped".into()))
        }
        .boxed_local()
    }
}
