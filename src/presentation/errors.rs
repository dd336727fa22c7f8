use thiserror::Error;

#[derive(Debug, Error)]
pub enum PresentationError {
    #[error("Presentation error: {0} is not available on this host")]
    Unavailable(&'static str),
    #[error("Presentation error: permission for {0} was denied")]
    PermissionDenied(&'static str),
    #[error("Presentation error: {channel} failed: {reason}")]
    Failed {
        channel: &'static str,
        reason: String
    },
    #[error("Presentation error: {0}")]
    Io(#[from] std::io::Error)
}

impl PresentationError {
    /// Whether trying again could succeed. A missing capability or a denied permission stays that way.
    pub fn is_transient(&self) -> bool {
        matches!(self, PresentationError::Failed { .. } | PresentationError::Io(_))
    }
}
