use serde::{Deserialize, Serialize};

/// Category of a store error. Lets the caller decide whether an
/// operation is worth repeating (io) or points at a bug (protocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Ключ отсутствует в таблице.
    NotFound,
    /// I/O or network error, connection is likely gone.
    Io,
    /// Malformed frame or unexpected response.
    Protocol,
    /// Invalid address, table or store configuration.
    Config,
    /// Store refused the operation (injected fault, overload).
    Rejected,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => f.write_str("not_found"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Protocol => f.write_str("protocol"),
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Rejected => f.write_str("rejected"),
        }
    }
}

/// Unified error type for all `StoreClient` operations.
///
/// Carries an `ErrorKind` plus a human-readable message. The pair is also
/// what travels over the wire, so it derives serde.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreError {
    kind: ErrorKind,
    message: String,
}

impl StoreError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn not_found(table: &str, key: &str) -> Self {
        Self { kind: ErrorKind::NotFound, message: format!("{table}/{key} not found") }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Protocol, message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Rejected, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self { Self { kind: ErrorKind::Io, message: e.to_string() } }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self { Self { kind: ErrorKind::Protocol, message: e.to_string() } }
}
