/// Core error type for the shopping-list bot.
///
/// Adapter crates map their specific errors into this type so handlers can
/// tell a cancelled request apart from a failed one.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Wiring or configuration defect. Fatal: stops startup or the affected path.
    #[error("config error: {0}")]
    Config(String),

    /// A gateway update could not be turned into a command.
    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    /// The inference gate could not turn text into a list.
    #[error("failed to parse the shopping list: {0}")]
    ParseFailed(#[source] Box<Error>),

    #[error("operation cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
