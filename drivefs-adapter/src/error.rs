use std::fmt::Display;

/// Failures surfaced by the adapter. Nothing is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to retrieve metadata for '{path}': {reason}")]
    MetadataUnavailable { path: String, reason: String },
    #[error("'{id}' is outside of the allowed scope")]
    OutOfScope { id: String },
    #[error("unable to read '{path}': {reason}")]
    ReadFailed { path: String, reason: String },
    #[error("unable to write '{path}': {reason}")]
    WriteFailed { path: String, reason: String },
    #[error("unable to create directory '{path}': {reason}")]
    CreateDirectoryFailed { path: String, reason: String },
    #[error("unable to delete '{path}': {reason}")]
    DeleteFailed { path: String, reason: String },
    #[error("unable to move '{path}': {reason}")]
    MoveFailed { path: String, reason: String },
    #[error("unable to copy '{path}': {reason}")]
    CopyFailed { path: String, reason: String },
    #[error("setting visibility of '{path}' is not supported by this driver")]
    VisibilitySettingUnsupported { path: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fieldless view of [`Error`] for callers that only need to branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MetadataUnavailable,
    OutOfScope,
    ReadFailed,
    WriteFailed,
    CreateDirectoryFailed,
    DeleteFailed,
    MoveFailed,
    CopyFailed,
    VisibilitySettingUnsupported,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MetadataUnavailable { .. } => ErrorKind::MetadataUnavailable,
            Error::OutOfScope { .. } => ErrorKind::OutOfScope,
            Error::ReadFailed { .. } => ErrorKind::ReadFailed,
            Error::WriteFailed { .. } => ErrorKind::WriteFailed,
            Error::CreateDirectoryFailed { .. } => ErrorKind::CreateDirectoryFailed,
            Error::DeleteFailed { .. } => ErrorKind::DeleteFailed,
            Error::MoveFailed { .. } => ErrorKind::MoveFailed,
            Error::CopyFailed { .. } => ErrorKind::CopyFailed,
            Error::VisibilitySettingUnsupported { .. } => ErrorKind::VisibilitySettingUnsupported,
        }
    }

    /// Callers may treat this as "not found".
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::MetadataUnavailable
    }

    pub(crate) fn metadata(path: &str, reason: impl Display) -> Self {
        Error::MetadataUnavailable {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Re-label a resolution failure as the failure of the calling
    /// operation. Scope denials pass through unchanged.
    pub(crate) fn recast(self, make: impl FnOnce(String) -> Error) -> Error {
        match self {
            Error::OutOfScope { .. } => self,
            other => make(other.to_string()),
        }
    }
}
