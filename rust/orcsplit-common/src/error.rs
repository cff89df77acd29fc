use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_format(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    /// The backing byte stream cannot be bound for decoding, or a stripe
    /// cannot be opened by the decoder.
    pub fn open(context: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Open {
                context: context.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn schema(column: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Schema {
                column: column.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn cancelled() -> Error {
        Error(ErrorKind::Cancelled.into())
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn not_implemented(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::NotImplemented {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    pub fn arrow<E>(context: impl Into<String>, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error(
            ErrorKind::Arrow {
                context: context.into(),
                source: Box::new(source),
            }
            .into(),
        )
    }

    /// Returns `true` for the error observed by a reader after `cancel()`.
    ///
    /// Cancellation is a normal termination: callers should not escalate it,
    /// but must not treat the batches produced so far as a complete result.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind(), ErrorKind::Cancelled)
    }

    pub fn is_format_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidFormat { .. } | ErrorKind::Protobuf { .. }
        )
    }

    pub fn is_open_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Open { .. })
    }

    pub fn is_schema_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Schema { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("not yet implemented: {message}")]
    NotImplemented { message: String },

    #[error("invalid storage format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("invalid protobuf message '{element}': {source}")]
    Protobuf {
        element: String,
        source: prost::DecodeError,
    },

    #[error("failed to open '{context}' for decoding: {message}")]
    Open { context: String, message: String },

    #[error("schema mismatch for column '{column}': {message}")]
    Schema { column: String, message: String },

    #[error("read cancelled")]
    Cancelled,

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("Arrow error: {context}: {source}")]
    Arrow {
        context: String,
        source: StdErrorBoxed,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        ErrorKind::Protobuf {
            element: String::new(),
            source: e,
        }
        .into()
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

impl From<arrow_schema::ArrowError> for Error {
    fn from(e: arrow_schema::ArrowError) -> Self {
        Error::arrow("", e)
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(_: std::convert::Infallible) -> Self {
        Error::invalid_operation("conversion")
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn test_error_classification() {
        assert!(Error::cancelled().is_cancelled());
        assert!(!Error::cancelled().is_format_error());
        assert!(Error::invalid_format("footer", "truncated").is_format_error());
        assert!(Error::open("stripe 3", "corrupt").is_open_error());
        assert!(Error::schema("c", "incompatible").is_schema_error());
    }

    #[test]
    fn test_error_display() {
        let err = Error::schema("price", "Utf8 cannot be read as Int64");
        assert_eq!(
            err.to_string(),
            "schema mismatch for column 'price': Utf8 cannot be read as Int64"
        );
        let err: Error = std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into();
        assert!(matches!(err.into_kind(), ErrorKind::Io { .. }));
    }
}
