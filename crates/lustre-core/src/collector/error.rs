//! Error type for source collection.

use crate::collector::parser::ParseError;

/// Error from collecting one source.
#[derive(Debug)]
pub enum CollectError {
    /// I/O error reading a pseudo-file (other than the file being absent).
    Io(std::io::Error),
    /// Malformed content in a pseudo-file.
    Parse(ParseError),
    /// A resolved path is too short to carry an entity name.
    Path(String),
    /// The source panicked; carries the panic message.
    Panic(String),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(e) => write!(f, "parse error: {}", e.message),
            CollectError::Path(path) => write!(f, "no entity in path: {}", path),
            CollectError::Panic(message) => write!(f, "source panicked: {}", message),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Io(e) => Some(e),
            CollectError::Parse(e) => Some(e),
            CollectError::Path(_) | CollectError::Panic(_) => None,
        }
    }
}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

impl From<ParseError> for CollectError {
    fn from(e: ParseError) -> Self {
        CollectError::Parse(e)
    }
}
