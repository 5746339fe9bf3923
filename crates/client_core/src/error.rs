use thiserror::Error;

use crate::state::PreconditionGap;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The API answered with a non-success status.
    #[error("api error status={status}: {}", msg.as_deref().unwrap_or("<no message>"))]
    Api { status: u16, msg: Option<String> },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Text for the user-facing banner: the server's `msg` when it sent
    /// one, otherwise a description of what went wrong on the wire.
    pub fn alert_message(&self) -> String {
        match self {
            GatewayError::Api {
                msg: Some(msg), ..
            } => msg.clone(),
            GatewayError::Api { status, msg: None } => {
                format!("Request failed with status code {status}")
            }
            GatewayError::Transport(description) | GatewayError::Decode(description) => {
                description.clone()
            }
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Precondition(#[from] PreconditionGap),
}

impl ClientError {
    pub fn alert_message(&self) -> String {
        match self {
            ClientError::Gateway(err) => err.alert_message(),
            ClientError::Precondition(gap) => gap.to_string(),
        }
    }
}
