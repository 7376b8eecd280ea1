use serde::{Deserialize, Serialize};

use crate::range_ref::RangeRef;

pub type DialogId = u64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDialogState {
    pub url: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDialogState {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// What the host UI is asked to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dialog", rename_all = "kebab-case")]
pub enum DialogRequest {
    Link(LinkDialogState),
    Image(ImageDialogState),
}

/// What the host UI answers with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "kebab-case")]
pub enum DialogResponse {
    Link {
        url: String,
        label: String,
    },
    Image {
        url: String,
        width: Option<u32>,
        height: Option<u32>,
    },
    Cancelled,
}

/// A request waiting for its response, with the selection it was opened
/// on kept current while the host UI has focus.
#[derive(Debug)]
pub(crate) struct PendingDialog {
    pub id: DialogId,
    pub request: DialogRequest,
    pub at: RangeRef,
}
