use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn position_out_of_bounds(position: usize, position_count: usize) -> Error {
        ErrorKind::PositionOutOfBounds {
            position,
            position_count,
        }
        .into()
    }

    pub fn invalid_region(offset: usize, length: usize, position_count: usize) -> Error {
        ErrorKind::InvalidRegion {
            offset,
            length,
            position_count,
        }
        .into()
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        ErrorKind::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
        .into()
    }

    pub fn internal(message: impl Into<String>) -> Error {
        ErrorKind::InternalInvariant {
            message: message.into(),
        }
        .into()
    }

    pub fn unsupported(operation: impl Into<String>, encoding: impl Into<String>) -> Error {
        ErrorKind::UnsupportedOperation {
            operation: operation.into(),
            encoding: encoding.into(),
        }
        .into()
    }

    pub fn unknown_encoding(name: impl Into<String>) -> Error {
        ErrorKind::UnknownEncoding { name: name.into() }.into()
    }

    pub fn duplicate_encoding(name: impl Into<String>) -> Error {
        ErrorKind::DuplicateEncoding { name: name.into() }.into()
    }

    /// Returns `true` for the caller-correctable position and range errors.
    pub fn is_bounds_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::PositionOutOfBounds { .. }
                | ErrorKind::InvalidRegion { .. }
                | ErrorKind::InvalidArgument { .. }
        )
    }

    /// Returns `true` if the error reports corrupted in-memory block state.
    pub fn is_internal(&self) -> bool {
        matches!(self.kind(), ErrorKind::InternalInvariant { .. })
    }

    /// Returns `true` if the payload block cannot perform the requested operation.
    pub fn is_unsupported(&self) -> bool {
        matches!(self.kind(), ErrorKind::UnsupportedOperation { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("position {position} is out of bounds for {position_count} positions")]
    PositionOutOfBounds {
        position: usize,
        position_count: usize,
    },

    #[error("invalid region: offset {offset}, length {length}, position count {position_count}")]
    InvalidRegion {
        offset: usize,
        length: usize,
        position_count: usize,
    },

    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("internal invariant violated: {message}")]
    InternalInvariant { message: String },

    #[error("operation {operation} is not supported by {encoding} block")]
    UnsupportedOperation { operation: String, encoding: String },

    #[error("unknown block encoding: {name}")]
    UnknownEncoding { name: String },

    #[error("encoding already registered: {name}")]
    DuplicateEncoding { name: String },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::position_out_of_bounds(5, 3).is_bounds_error());
        assert!(Error::invalid_region(2, 4, 3).is_bounds_error());
        assert!(Error::invalid_arg("ids", "too short").is_bounds_error());
        assert!(Error::internal("missing key").is_internal());
        assert!(!Error::internal("missing key").is_bounds_error());
        assert!(Error::unsupported("copy_positions", "LAZY").is_unsupported());
    }

    #[test]
    fn test_error_display() {
        let err = Error::position_out_of_bounds(7, 2);
        assert_eq!(
            err.to_string(),
            "position 7 is out of bounds for 2 positions"
        );
        let err = Error::unsupported("copy_positions", "LAZY");
        assert_eq!(
            err.to_string(),
            "operation copy_positions is not supported by LAZY block"
        );
    }
}
