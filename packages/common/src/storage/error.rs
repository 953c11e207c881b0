use std::fmt;

/// Errors that can occur during remote asset operations.
#[derive(Debug)]
pub enum StorageError {
    /// An I/O error occurred.
    Io(std::io::Error),
    /// The uploaded bytes are not a decodable image.
    InvalidImage(String),
    /// The folder or remote id is malformed.
    InvalidKey(String),
    /// The upload exceeds the configured size limit.
    SizeLimitExceeded { actual: u64, limit: u64 },
    /// The remote service rejected or failed the request.
    Remote(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "storage IO error: {err}"),
            Self::InvalidImage(msg) => write!(f, "invalid image: {msg}"),
            Self::InvalidKey(msg) => write!(f, "invalid object key: {msg}"),
            Self::SizeLimitExceeded { actual, limit } => {
                write!(f, "upload exceeds size limit ({actual} > {limit} bytes)")
            }
            Self::Remote(msg) => write!(f, "remote store error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl StorageError {
    /// Whether the failure is caused by the caller's input rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidImage(_) | Self::InvalidKey(_) | Self::SizeLimitExceeded { .. }
        )
    }
}
