//! Error types for section hydration.

use std::time::Duration;

use thiserror::Error;

/// Errors that can end a hydration call.
///
/// Every variant carries owned strings so the error can be cloned onto
/// `loading-error` events and compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HydrationError {
    /// Transport failure or a response status outside 2xx.
    #[error("Network error: {reason}")]
    NetworkError {
        /// HTTP status code when a response was received
        status: Option<u16>,
        /// The reason for the network error
        reason: String,
    },

    /// The request URL could not be resolved against the current page.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL as given by the caller
        url: String,
        /// The reason the URL was rejected
        reason: String,
    },

    /// No response arrived within the configured request timeout.
    #[error("Request to '{url}' timed out after {timeout:?}")]
    Timeout {
        /// The URL that was being fetched
        url: String,
        /// The configured timeout
        timeout: Duration,
    },

    /// Another call for the same section is still in flight.
    #[error("Section '{section_id}' already has a request in flight")]
    SectionBusy {
        /// The section that was busy
        section_id: String,
    },

    /// The call was dropped before it completed.
    #[error("Hydration of section '{section_id}' was cancelled")]
    Cancelled {
        /// The section whose call was dropped
        section_id: String,
    },

    /// The service or one of its collaborators was misconfigured.
    #[error("Configuration error: {reason}")]
    Configuration {
        /// The reason for the configuration error
        reason: String,
    },
}

impl HydrationError {
    /// Builds a network error for a response with a non-2xx status.
    pub fn http_status(status: u16) -> Self {
        Self::NetworkError {
            status: Some(status),
            reason: format!("HTTP error! status: {status}"),
        }
    }

    /// Returns the HTTP status code if the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NetworkError { status, .. } => *status,
            _ => None,
        }
    }
}
