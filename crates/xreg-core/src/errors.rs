use thiserror::Error;

/// Result type alias using RegistryError
pub type Result<T> = std::result::Result<T, RegistryError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code used for programmatic handling,
/// log assertions, and the HTTP status mapping in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    // Addressing
    NotFound,
    MethodNotAllowed,

    // Concurrency / identity
    Conflict,
    InvalidId,

    // Query directives
    InvalidFilter,
    InvalidInline,

    // Write validation
    InvalidState,
    ReadOnly,
    InvalidExtension,
    InvalidData,

    // Integration/IO
    Persistence,
    Serialization,
    Timeout,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::MethodNotAllowed => "ERR_METHOD_NOT_ALLOWED",
            ExErrorKind::Conflict => "ERR_CONFLICT",
            ExErrorKind::InvalidId => "ERR_INVALID_ID",
            ExErrorKind::InvalidFilter => "ERR_INVALID_FILTER",
            ExErrorKind::InvalidInline => "ERR_INVALID_INLINE",
            ExErrorKind::InvalidState => "ERR_INVALID_STATE",
            ExErrorKind::ReadOnly => "ERR_READ_ONLY",
            ExErrorKind::InvalidExtension => "ERR_INVALID_EXTENSION",
            ExErrorKind::InvalidData => "ERR_INVALID_DATA",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Timeout => "ERR_TIMEOUT",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Classification fields for programmatic handling plus the context that
/// makes a log line useful (operation, entity path).
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_path: Option<String>,
    message: String,
}

impl ExError {
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_path: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity path context
    pub fn with_entity_path(mut self, path: impl Into<String>) -> Self {
        self.entity_path = Some(path.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_path(&self) -> Option<&str> {
        self.entity_path.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(path) = &self.entity_path {
            write!(f, " (path: {})", path)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for registry operations
///
/// The display text of each variant is what clients see in an error response
/// body, so the wording of the epoch and not-found messages is fixed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    // ===== Addressing =====
    /// Unknown path (client-facing text is fixed)
    #[error("Not found")]
    NotFound { path: String },

    /// Path exists but the method makes no sense there
    #[error("{method} not allowed on '{path}'")]
    MethodNotAllowed { method: String, path: String },

    // ===== Concurrency / identity =====
    #[error("Attribute \"epoch\"({got}) doesn't match existing value ({want})")]
    EpochMismatch { path: String, got: i64, want: i64 },

    /// A body id attribute disagrees with the id in the URL
    #[error("The \"{attr}\" attribute must be set to \"{expected}\", not \"{got}\"")]
    IdMismatch {
        attr: String,
        expected: String,
        got: String,
    },

    /// An id differing only in case from an existing sibling
    #[error("An entity with a conflicting id already exists: {existing} (requested {requested})")]
    DuplicateId { existing: String, requested: String },

    #[error("Invalid ID \"{id}\"")]
    InvalidId { id: String },

    // ===== Query directives =====
    #[error("Invalid 'filter' value: {reason}")]
    InvalidFilter { reason: String },

    #[error("Invalid 'inline' value: {value}")]
    InvalidInline { value: String },

    // ===== Write validation =====
    #[error("{reason}")]
    InvalidState { reason: String },

    #[error("Write operations are not allowed on read-only \"{path}\"")]
    ReadOnly { path: String },

    #[error("Invalid extension(s): {name}")]
    InvalidExtension { name: String },

    #[error("{reason}")]
    InvalidData { reason: String },

    // ===== Integration =====
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Request deadline exceeded during '{op}'")]
    Timeout { op: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RegistryError {
    pub fn kind(&self) -> ExErrorKind {
        match self {
            RegistryError::NotFound { .. } => ExErrorKind::NotFound,
            RegistryError::MethodNotAllowed { .. } => ExErrorKind::MethodNotAllowed,
            RegistryError::EpochMismatch { .. }
            | RegistryError::IdMismatch { .. }
            | RegistryError::DuplicateId { .. } => ExErrorKind::Conflict,
            RegistryError::InvalidId { .. } => ExErrorKind::InvalidId,
            RegistryError::InvalidFilter { .. } => ExErrorKind::InvalidFilter,
            RegistryError::InvalidInline { .. } => ExErrorKind::InvalidInline,
            RegistryError::InvalidState { .. } => ExErrorKind::InvalidState,
            RegistryError::ReadOnly { .. } => ExErrorKind::ReadOnly,
            RegistryError::InvalidExtension { .. } => ExErrorKind::InvalidExtension,
            RegistryError::InvalidData { .. } => ExErrorKind::InvalidData,
            RegistryError::Persistence { .. } => ExErrorKind::Persistence,
            RegistryError::Serialization { .. } => ExErrorKind::Serialization,
            RegistryError::Timeout { .. } => ExErrorKind::Timeout,
            RegistryError::Internal { .. } => ExErrorKind::Internal,
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        RegistryError::NotFound { path: path.into() }
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        RegistryError::InvalidState {
            reason: reason.into(),
        }
    }

    pub fn invalid_data(reason: impl Into<String>) -> Self {
        RegistryError::InvalidData {
            reason: reason.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        RegistryError::Persistence {
            message: message.into(),
        }
    }
}

/// Conversion from RegistryError to ExError
impl From<RegistryError> for ExError {
    fn from(err: RegistryError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        match err {
            RegistryError::NotFound { path }
            | RegistryError::ReadOnly { path }
            | RegistryError::EpochMismatch { path, .. }
            | RegistryError::MethodNotAllowed { path, .. } => ExError::new(kind)
                .with_entity_path(path)
                .with_message(message),
            RegistryError::Timeout { op } => ExError::new(kind).with_op(op).with_message(message),
            _ => ExError::new(kind).with_message(message),
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Serialization {
            message: err.to_string(),
        }
    }
}
