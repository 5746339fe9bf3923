use serde::{Deserialize, Serialize};

/// Body the API sends alongside any non-success status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl ApiErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: Some(msg.into()),
        }
    }
}
