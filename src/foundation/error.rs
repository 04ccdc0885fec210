use std::path::PathBuf;

/// Convenience result type used across montage.
pub type MontageResult<T> = Result<T, MontageError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum MontageError {
    /// A source has a zero-area natural size. Fatal for the whole render.
    #[error("invalid media geometry: {0}")]
    InvalidMediaGeometry(String),

    /// A source could not be opened or has no decodable video track. Local to one item.
    #[error("unreadable source (item {index}): {reason}")]
    UnreadableSource {
        /// Ordinal index of the dropped media item.
        index: usize,
        /// Why the source was rejected.
        reason: String,
    },

    /// Allocation produced zero segments.
    #[error("composition has no segments")]
    EmptyComposition,

    /// The encode primitive reported failure.
    #[error("export to '{}' failed: {reason}", output.display())]
    ExportFailed {
        /// Output location, unusable after the failure.
        output: PathBuf,
        /// Failure reason reported by the encoder.
        reason: String,
    },

    /// A filler source (silence or blank background) is missing.
    #[error("missing bundled resource '{}'", .0.display())]
    MissingBundledResource(PathBuf),

    /// Invalid user-provided configuration or request data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MontageError {
    /// Build a [`MontageError::InvalidMediaGeometry`] value.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidMediaGeometry(msg.into())
    }

    /// Build a [`MontageError::UnreadableSource`] value.
    pub fn unreadable(index: usize, reason: impl Into<String>) -> Self {
        Self::UnreadableSource {
            index,
            reason: reason.into(),
        }
    }

    /// Build a [`MontageError::ExportFailed`] value.
    pub fn export_failed(output: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ExportFailed {
            output: output.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`MontageError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MontageError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
