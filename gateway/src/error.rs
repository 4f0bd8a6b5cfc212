use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("API returned {status}")]
    UpstreamStatus { status: u16, body: String },

    #[error("API returned a non-JSON body")]
    Decode,

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl ProxyError {
    /// Status relayed to the caller: the backend's own status when it
    /// answered, otherwise a gateway-side failure.
    pub fn status(&self) -> u16 {
        match self {
            ProxyError::UpstreamStatus { status, .. } => *status,
            ProxyError::Decode => 502,
            ProxyError::Transport(_) => 500,
        }
    }
}
