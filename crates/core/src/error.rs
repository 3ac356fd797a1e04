use std::fmt;

/// Result alias that carries the custom [`VisualiserError`] type.
pub type Result<T> = std::result::Result<T, VisualiserError>;

/// Host component a capability check was run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Source,
    Surface,
    PlaybackContext,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::Source => "signal source",
            Component::Surface => "drawing surface",
            Component::PlaybackContext => "playback context",
        };
        f.write_str(name)
    }
}

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum VisualiserError {
    /// A host-supplied collaborator cannot do something the engine relies on.
    #[error("{component} is missing the `{capability}` capability")]
    MissingCapability {
        component: Component,
        capability: &'static str,
    },
    #[error("visualiser is already running; stop it before starting again")]
    AlreadyRunning,
    #[error("visualiser has been destroyed")]
    Destroyed,
    /// An analyser was asked to fill a buffer sized for a different FFT size.
    #[error("snapshot buffer holds {actual} values but the analyser produces {expected}")]
    SnapshotLength { expected: usize, actual: usize },
    #[error("fft failed: {0}")]
    Fft(#[from] realfft::FftError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}

impl VisualiserError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn missing(component: Component, capability: &'static str) -> Self {
        Self::MissingCapability {
            component,
            capability,
        }
    }
}
