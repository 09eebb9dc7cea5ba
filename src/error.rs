//! Error types for envsync.
//!
//! Domain-specific error enums, one per concern, aggregated into a single
//! [`Error`] that every fallible operation in the crate returns.

use thiserror::Error;

/// Local state (`~/.config/envsync/state.json`) errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("not initialized: run `envsync init` first")]
    NotInitialized,

    #[error("already initialized: state.json exists")]
    AlreadyInitialized,

    #[error("no active project selected")]
    NoActiveProject,

    #[error("no active environment selected")]
    NoActiveEnvironment,

    #[error("unsupported state schema version: {0}")]
    UnsupportedSchemaVersion(u32),

    #[error("failed to read state file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to write state file: {0}")]
    WriteFile(#[source] std::io::Error),

    #[error("state file is malformed: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Cryptographic primitive errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("wrong recovery phrase")]
    BadPhrase,

    #[error("ciphertext is invalid or was tampered with")]
    InvalidCiphertext,

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("random number generator failed: {0}")]
    Rng(String),

    #[error("invalid recovery phrase word count: expected {expected}, got {got}")]
    InvalidWordCount { expected: usize, got: usize },

    #[error("unknown recovery phrase word: {0}")]
    UnknownWord(String),
}

/// Vault model errors (projects, environments, secrets, versions).
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("project already exists: {0}")]
    ProjectAlreadyExists(String),

    #[error("environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("environment already exists: {0}")]
    EnvironmentAlreadyExists(String),

    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("secret version not found: {key} @ v{version}")]
    VersionNotFound { key: String, version: u64 },

    #[error("secret was deleted: {0}")]
    Deleted(String),

    #[error("secret expired: {0}")]
    Expired(String),

    #[error("team not found: {0}")]
    TeamNotFound(String),

    #[error("team already exists: {0}")]
    TeamAlreadyExists(String),

    #[error("actor not found on team: {0}")]
    ActorNotFound(String),
}

/// Input validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("invalid secret key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("empty key is not allowed")]
    EmptyKey,

    #[error("empty value is not allowed for key '{0}'")]
    EmptyValue(String),

    #[error("invalid expiry '{0}': expected RFC3339 timestamp or duration (e.g. '24h')")]
    InvalidExpiry(String),

    #[error("invalid role '{0}': expected admin, maintainer, reader (or writer as an alias)")]
    InvalidRole(String),

    #[error("invalid project name '{0}': must match ^[a-z0-9][a-z0-9_-]{{0,62}}$")]
    InvalidProject(String),

    #[error("invalid file permissions on '{path}': expected {expected}, got {actual}")]
    InvalidPermissions {
        path: String,
        expected: String,
        actual: String,
    },
}

/// RBAC denial.
#[derive(Error, Debug)]
pub enum RbacError {
    #[error("actor '{actor}' lacks role '{required}' on team '{team}' (has '{actual}')")]
    Unauthorized {
        actor: String,
        team: String,
        required: String,
        actual: String,
    },

    #[error("actor '{actor}' is not a member of team '{team}'")]
    NotAMember { actor: String, team: String },
}

/// Remote transport / sync errors.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("remote revision conflict: expected {expected}, got {got}")]
    RevisionConflict { expected: u64, got: u64 },

    #[error("remote salt/key-check does not match local state")]
    PhraseMismatch,

    #[error("network error (retryable): {0}")]
    Retryable(String),

    #[error("transport error (not retryable): {0}")]
    Fatal(String),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("file lock error: {0}")]
    Lock(String),
}

/// Sync engine conflicts.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("push would overwrite remote changes to: {0:?} (use --force)")]
    PushConflict(Vec<String>),

    #[error("pull would overwrite local changes to: {0:?} (use --force-remote)")]
    PullConflict(Vec<String>),
}

/// Cloud session (login/logout) errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no active session: run `envsync login` first")]
    SessionMissing,

    #[error("session expired: run `envsync login` again")]
    SessionExpired,
}

/// Cloud / self-host server auth errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("token is revoked")]
    TokenRevoked,

    #[error("token is expired")]
    TokenExpired,

    #[error("insufficient scope: requires '{0}'")]
    ForbiddenScope(String),

    #[error("rate limited")]
    RateLimited,
}

/// Cloud control-plane errors (C8) that don't fit the local-vault taxonomy.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("invalid project name '{0}'")]
    InvalidProject(String),

    #[error("organization_id and team_id are mutually exclusive")]
    OwnerConflict,

    #[error("If-Match header is required")]
    PreconditionRequired,

    #[error("token not found: {0}")]
    TokenNotFound(String),

    #[error("PAT issuance is disabled: ENVSYNC_CLOUD_PAT_PEPPER is not set")]
    PatDisabled,

    #[error("request body exceeds the configured size limit")]
    PayloadTooLarge,
}

/// Top-level envsync error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Rbac(#[from] RbacError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for envsync operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Actionable hint shown below the error, if any (mirrors the CLI's
    /// `NotInitialized` / `NoPrivateKey` hints).
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::Config(ConfigError::NotInitialized) => {
                Some("run 'envsync init' or 'envsync restore' first")
            }
            Error::Crypto(CryptoError::BadPhrase) => {
                Some("check ENVSYNC_RECOVERY_PHRASE or run 'envsync phrase save'")
            }
            Error::Session(SessionError::SessionMissing)
            | Error::Session(SessionError::SessionExpired) => Some("run 'envsync login'"),
            _ => None,
        }
    }

    /// Whether this error should be retried by the HTTP transport retry loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(TransportError::Retryable(_)))
    }

    /// HTTP status for the cloud and self-host servers' JSON error body
    /// (spec.md 4.8, 7: "an appropriate HTTP status").
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Transport(TransportError::RevisionConflict { .. }) => StatusCode::CONFLICT,
            Error::Transport(TransportError::PayloadTooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Transport(TransportError::BadRequest(_)) => StatusCode::BAD_REQUEST,
            Error::Validation(_) | Error::Cloud(CloudError::InvalidProject(_))
            | Error::Cloud(CloudError::OwnerConflict) => StatusCode::BAD_REQUEST,
            Error::Cloud(CloudError::PreconditionRequired) => StatusCode::PRECONDITION_REQUIRED,
            Error::Cloud(CloudError::TokenNotFound(_)) => StatusCode::NOT_FOUND,
            Error::Cloud(CloudError::PatDisabled) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Cloud(CloudError::PayloadTooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Auth(AuthError::Unauthorized) | Error::Auth(AuthError::TokenRevoked)
            | Error::Auth(AuthError::TokenExpired) => StatusCode::UNAUTHORIZED,
            Error::Auth(AuthError::ForbiddenScope(_)) => StatusCode::FORBIDDEN,
            Error::Auth(AuthError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
            Error::Secret(SecretError::NotFound(_))
            | Error::Secret(SecretError::ProjectNotFound(_))
            | Error::Secret(SecretError::EnvironmentNotFound(_))
            | Error::Secret(SecretError::TeamNotFound(_))
            | Error::Secret(SecretError::VersionNotFound { .. }) => StatusCode::NOT_FOUND,
            Error::Rbac(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error slug for the JSON error body's `error` field.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Transport(TransportError::RevisionConflict { .. }) => "conflict",
            Error::Cloud(CloudError::InvalidProject(_)) => "invalid_project",
            Error::Cloud(CloudError::OwnerConflict) => "invalid_owner",
            Error::Cloud(CloudError::PreconditionRequired) => "precondition_required",
            Error::Cloud(CloudError::TokenNotFound(_)) => "not_found",
            Error::Cloud(CloudError::PatDisabled) => "pat_disabled",
            Error::Cloud(CloudError::PayloadTooLarge)
            | Error::Transport(TransportError::PayloadTooLarge) => "payload_too_large",
            Error::Auth(AuthError::Unauthorized) => "unauthorized",
            Error::Auth(AuthError::TokenRevoked) => "token_revoked",
            Error::Auth(AuthError::TokenExpired) => "token_expired",
            Error::Auth(AuthError::ForbiddenScope(_)) => "forbidden",
            Error::Auth(AuthError::RateLimited) => "too_many_requests",
            Error::Validation(_) => "bad_request",
            Error::Rbac(_) => "forbidden",
            Error::Secret(_) => "not_found",
            _ => "internal_error",
        }
    }
}
