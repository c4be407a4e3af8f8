use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::protocol::{DomEventDescription, KeyProps, OutboundMessage};

/// Input types that do not accept typed text; everything else on an
/// `<input>` keeps its keystrokes inside the guest.
const NON_TEXT_INPUT_TYPES: &[&str] = &[
    "button", "checkbox", "color", "file", "hidden", "image", "radio", "range", "reset", "submit",
];

/// Element that received a key-down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyTarget {
    pub tag_name: String,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub content_editable: bool,
}

impl KeyTarget {
    pub fn element(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            ..Self::default()
        }
    }

    pub fn input(input_type: impl Into<String>) -> Self {
        Self {
            tag_name: "input".to_string(),
            input_type: Some(input_type.into()),
            content_editable: false,
        }
    }

    pub fn content_editable(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            input_type: None,
            content_editable: true,
        }
    }

    /// Whether keystrokes on this element are text entry for the guest.
    pub fn accepts_text(&self) -> bool {
        if self.content_editable || self.tag_name.eq_ignore_ascii_case("textarea") {
            return true;
        }
        if !self.tag_name.eq_ignore_ascii_case("input") {
            return false;
        }
        match self.input_type.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(kind) => !NON_TEXT_INPUT_TYPES
                .iter()
                .any(|other| kind.eq_ignore_ascii_case(other)),
        }
    }
}

/// A local document change the forwarder may report to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DomObservation {
    #[serde(rename_all = "camelCase")]
    BodyResized { content_height: f64 },
    PointerDown,
    FocusIn,
    KeyDown { target: KeyTarget, props: KeyProps },
}

/// Turns DOM observations into outbound messages once the host has replied.
#[derive(Debug, Default)]
pub struct DomForwarder {
    active: bool,
}

impl DomForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn translate(&self, observation: DomObservation) -> Option<OutboundMessage> {
        if !self.active {
            trace!(target: "forwarder", ?observation, "forwarder inactive; dropping observation");
            return None;
        }

        match observation {
            DomObservation::BodyResized { content_height } => Some(OutboundMessage::Resize {
                height: content_height,
            }),
            DomObservation::PointerDown => Some(OutboundMessage::DomEvent {
                event: DomEventDescription::mouse_down(),
            }),
            DomObservation::FocusIn => Some(OutboundMessage::DomEvent {
                event: DomEventDescription::focus(),
            }),
            DomObservation::KeyDown { target, props } => {
                if target.accepts_text() {
                    trace!(target: "forwarder", tag = %target.tag_name, "keydown kept inside guest");
                    return None;
                }
                Some(OutboundMessage::DomEvent {
                    event: DomEventDescription::key_down(props),
                })
            }
        }
    }
}
