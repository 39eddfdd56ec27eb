use thiserror::Error;

#[derive(Error, Debug)]
pub enum InnoError {
    #[error("I/O error: {0}")]
    Io(std::io::Error),

    #[error("Unsupported setup data version: {0}")]
    Version(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Block error: {0}")]
    Block(String),

    #[error("Slice error: {0}")]
    Slice(String),

    #[error("Chunk error: {0}")]
    Chunk(String),

    #[error("LZMA error: {0}")]
    Lzma(String),

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    Checksum {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Collision: {0}")]
    Collision(String),

    #[error("Password error: {0}")]
    Password(String),
}

impl InnoError {
    /// Wraps this error so it can travel through `std::io::Read` adapters.
    pub fn into_io(self) -> std::io::Error {
        match self {
            InnoError::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

// Read adapters carry our errors inside io::Error; unwrap them again here so
// callers see a BlockError rather than an opaque I/O failure.
impl From<std::io::Error> for InnoError {
    fn from(e: std::io::Error) -> Self {
        if e.get_ref().is_some_and(|inner| inner.is::<InnoError>()) {
            if let Some(inner) = e.into_inner() {
                if let Ok(err) = inner.downcast::<InnoError>() {
                    return *err;
                }
            }
            return InnoError::Format("corrupt error chain".into());
        }
        InnoError::Io(e)
    }
}

impl From<liblzma::stream::Error> for InnoError {
    fn from(e: liblzma::stream::Error) -> Self {
        InnoError::Lzma(e.to_string())
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, InnoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_roundtrip_keeps_kind() {
        let io = InnoError::Block("block CRC32 mismatch".into()).into_io();
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidData);
        match InnoError::from(io) {
            InnoError::Block(msg) => assert_eq!(msg, "block CRC32 mismatch"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_plain_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(InnoError::from(io), InnoError::Io(_)));
    }
}
