/// Core error type for the relay.
///
/// Adapter crates should map their specific errors into this type so the core
/// can handle failures consistently (startup-fatal vs request-local).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("login error: {0}")]
    Auth(String),

    #[error("gateway error: {0}")]
    Gateway(String),
}

pub type Result<T> = std::result::Result<T, Error>;
