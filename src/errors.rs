use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operator-fixable configuration problems: missing or rejected API key,
    /// an unusable mod loader id, a pack that cannot be downloaded automatically.
    #[error("configuration error: {0}")]
    Config(String),

    /// The modpack input itself is unusable (bad archive, bad manifest).
    #[error("invalid modpack: {0}")]
    InvalidPack(String),

    /// A CurseForge API request failed with an HTTP status. Kept separate from
    /// `Http` so callers can react to specific statuses (403 in particular).
    #[error("CurseForge API returned HTTP {status} for {message}")]
    Registry { status: u16, message: String },

    #[error("{0}")]
    Custom(String),
}

impl AppError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AppError::Registry { status: 403, .. })
    }
}
