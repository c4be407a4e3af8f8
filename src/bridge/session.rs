use std::rc::Rc;

use tokio::task::JoinHandle;
use url::Url;

use super::error::BridgeError;
use super::loader::{GuestModule, LoadError};
use crate::protocol::SessionToken;

pub type ImportTask = JoinHandle<Result<Rc<GuestModule>, LoadError>>;

/// Handshake progress of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    AwaitingToken,
    Loading,
    Initialized,
    Errored,
}

enum ImportSlot {
    Unset,
    Pending(ImportTask),
    Taken,
}

/// Per-document session record. The token is bound once and never reset.
pub struct Session {
    state: BridgeState,
    token: Option<SessionToken>,
    document_base: Option<Url>,
    import: ImportSlot,
    stylesheets: Vec<Url>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: BridgeState::Uninitialized,
            token: None,
            document_base: None,
            import: ImportSlot::Unset,
            stylesheets: Vec::new(),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    /// Resolution root for relative references, once the import resolved.
    pub fn document_base(&self) -> Option<&Url> {
        self.document_base.as_ref()
    }

    pub fn stylesheets(&self) -> &[Url] {
        &self.stylesheets
    }

    pub(crate) fn begin(&mut self) -> Result<(), BridgeError> {
        if self.state != BridgeState::Uninitialized {
            return Err(BridgeError::ProtocolViolation(
                "bridge already started".to_string(),
            ));
        }
        self.state = BridgeState::AwaitingToken;
        Ok(())
    }

    pub(crate) fn bind(&mut self, token: SessionToken) -> Result<(), BridgeError> {
        match self.state {
            BridgeState::AwaitingToken => {
                self.token = Some(token);
                Ok(())
            }
            BridgeState::Uninitialized => Err(BridgeError::ProtocolViolation(
                "readyReply received before the bridge announced ready".to_string(),
            )),
            _ => Err(BridgeError::ProtocolViolation(
                "readyReply received twice".to_string(),
            )),
        }
    }

    pub(crate) fn attach_import(&mut self, task: ImportTask) {
        self.import = ImportSlot::Pending(task);
        self.state = BridgeState::Loading;
    }

    pub(crate) fn take_import(&mut self) -> Result<ImportTask, BridgeError> {
        match std::mem::replace(&mut self.import, ImportSlot::Taken) {
            ImportSlot::Pending(task) => Ok(task),
            ImportSlot::Unset => {
                self.import = ImportSlot::Unset;
                Err(BridgeError::ProtocolViolation(
                    "init received before readyReply".to_string(),
                ))
            }
            ImportSlot::Taken => Err(BridgeError::ProtocolViolation(
                "init received twice".to_string(),
            )),
        }
    }

    pub(crate) fn install_base(&mut self, base: Url) {
        self.document_base = Some(base);
    }

    pub(crate) fn record_stylesheet(&mut self, url: Url) {
        self.stylesheets.push(url);
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.state = BridgeState::Initialized;
    }

    pub(crate) fn mark_errored(&mut self) {
        self.state = BridgeState::Errored;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_token_once() {
        let mut session = Session::new();
        session.begin().unwrap();
        session
            .bind(SessionToken::new("t1"))
            .unwrap();
        assert_eq!(session.token().and_then(SessionToken::as_str), Some("t1"));

        let err = session
            .bind(SessionToken::new("t2"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::ProtocolViolation(_)));
        assert_eq!(session.token().and_then(SessionToken::as_str), Some("t1"));
    }

    #[test]
    fn bind_before_begin_is_rejected() {
        let mut session = Session::new();
        let err = session
            .bind(SessionToken::new("t1"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::ProtocolViolation(_)));
        assert!(session.token().is_none());
    }

    #[test]
    fn take_import_without_bind_is_rejected() {
        let mut session = Session::new();
        session.begin().unwrap();
        let err = session.take_import().unwrap_err();
        assert!(
            matches!(err, BridgeError::ProtocolViolation(ref reason) if reason.contains("before readyReply"))
        );
        assert_eq!(session.state(), BridgeState::AwaitingToken);

        // A later attach still works: the slot was not consumed.
        assert!(matches!(session.import, ImportSlot::Unset));
    }

    #[test]
    fn begin_twice_is_rejected() {
        let mut session = Session::new();
        session.begin().unwrap();
        assert!(session.begin().is_err());
    }
}
