use std::path::PathBuf;

/// Basic Result alias with [`enum@Error`]
pub type Result<T = (), E = Error> = std::result::Result<T, E>;

use thiserror::Error;
/// Error type used across the precache codebase
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Glob directory {} does not exist or is not a directory", .0.display())]
    MissingGlobDirectory(PathBuf),
    #[error(transparent)]
    Glob(#[from] globset::Error),
    #[error(transparent)]
    Regex(#[from] regex::Error),
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

/// Shorthand to create [`Error::InvalidConfig`] values like `invalid!("{x:?}")`
#[macro_export]
macro_rules! invalid {
    ($($tokens:tt)*) => {
        $crate::Error::InvalidConfig(format!($($tokens)*))
    };
}
