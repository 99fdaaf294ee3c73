// Error model shared by the object layer, cursors and transports.
use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Config,
    IdentityMissing,
    PaginationExhausted,
    Permission,
    NotFound,
    RateLimited,
    Remote,
    Io,
    Decode,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<String>,
    status: Option<u16>,
    code: Option<i64>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            status: None,
            code: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Request path the failure relates to, when one was involved.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// HTTP status reported by the transport.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Error code reported by the remote graph, distinct from the HTTP status.
    pub fn code(&self) -> Option<i64> {
        self.code
    }

    /// True for failures surfaced by a transport rather than by local checks.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Permission
                | ErrorKind::NotFound
                | ErrorKind::RateLimited
                | ErrorKind::Remote
                | ErrorKind::Io
                | ErrorKind::Decode
        )
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {path})")?;
        }
        if let Some(status) = self.status {
            write!(f, " (status: {status})")?;
        }
        if let Some(code) = self.code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::Config => 3,
        ErrorKind::IdentityMissing => 4,
        ErrorKind::PaginationExhausted => 5,
        ErrorKind::Permission => 6,
        ErrorKind::NotFound => 7,
        ErrorKind::RateLimited => 8,
        ErrorKind::Remote => 9,
        ErrorKind::Io => 10,
        ErrorKind::Decode => 11,
    }
}
