//! Error types for release operations.
//!
//! Errors are categorized so callers can decide whether to retry and what to
//! tell the operator.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for release operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of release errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (transient, retryable).
    Network,
    /// Platform not supported.
    Platform,
    /// Release, asset or binary not found.
    NotFound,
    /// Archive or response format error.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Platform => "Unsupported platform",
            Self::NotFound => "Release or asset not found",
            Self::Format => "Invalid file format",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and try again",
            Self::Platform => "This tool may not publish binaries for this platform",
            Self::NotFound => "Verify the repository, tag and asset pattern",
            Self::Format => "The downloaded file may be corrupted, try again",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while fetching a release.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The current platform has no known binary triple.
    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform {
        /// Operating system.
        os: String,
        /// CPU architecture.
        arch: String,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The requested release does not exist.
    #[error("release {tag} not found for {repo}")]
    ReleaseNotFound {
        /// Repository in `owner/name` form.
        repo: String,
        /// Requested tag.
        tag: String,
    },

    /// No asset in the release matched.
    #[error("no asset named {expected} in {repo} {tag}")]
    AssetNotFound {
        /// Repository in `owner/name` form.
        repo: String,
        /// Release tag searched.
        tag: String,
        /// Asset name that was expected.
        expected: String,
    },

    /// The archive did not contain the binary.
    #[error("{binary} not found inside {asset}")]
    BinaryNotInArchive {
        /// Binary file name.
        binary: String,
        /// Asset that was searched.
        asset: String,
    },

    /// Failed to unpack an archive.
    #[error("failed to unpack {asset}: {message}")]
    Archive {
        /// Asset being unpacked.
        asset: String,
        /// Error message.
        message: String,
    },

    /// Invalid response from the API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// IO error during file operations.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnsupportedPlatform { .. } => ErrorCategory::Platform,
            // 404 is a wrong name, not a flaky network
            Error::Http {
                status: Some(404), ..
            } => ErrorCategory::NotFound,
            Error::Http { .. } => ErrorCategory::Network,
            Error::ReleaseNotFound { .. }
            | Error::AssetNotFound { .. }
            | Error::BinaryNotInArchive { .. } => ErrorCategory::NotFound,
            Error::Archive { .. } | Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Io { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
