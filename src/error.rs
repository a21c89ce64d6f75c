//! Error types for the seisplot application.
//!
//! A single error enum covers request validation, data-center resolution,
//! the FDSN service family and image generation. The orchestration layer
//! collapses several of these into `NoDataFound` before they reach callers.

use thiserror::Error;

use crate::fdsn::FdsnError;

/// The main error type for seisplot operations.
#[derive(Error, Debug)]
pub enum SeisplotError {
    /// A required query parameter is absent
    #[error("Missing parameter: {param}")]
    MissingParameter { param: String },

    /// A query parameter is present but cannot be used
    #[error("Invalid parameter: {param} - {message}")]
    InvalidParameter { param: String, message: String },

    /// The data-center key does not map to a known FDSN endpoint
    #[error("Unavailable datacenter: {data_center}")]
    UnavailableDataCenter { data_center: String },

    /// The data center does not offer a dataselect service
    #[error("No data service provided by {base_url}")]
    NoDataService { base_url: String },

    /// Nothing to plot for this request
    #[error("No data found")]
    NoDataFound,

    /// Errors raised by the FDSN service or its transport
    #[error("FDSN service error: {0}")]
    Fdsn(#[from] FdsnError),

    /// Figure construction or encoding errors
    #[error("Image generation error: {message}")]
    ImageGeneration { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server errors
    #[error("Server error: {message}")]
    Server { message: String },
}

impl SeisplotError {
    /// Whether a failed network call should be attempted again.
    ///
    /// Service and transport failures are transient. Undecodable data and
    /// everything raised locally are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            SeisplotError::Fdsn(FdsnError::Decode(_)) => false,
            SeisplotError::Fdsn(_) => true,
            _ => false,
        }
    }
}

/// Convenience type alias for Results with SeisplotError
pub type Result<T> = std::result::Result<T, SeisplotError>;
