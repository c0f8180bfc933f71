//! Browser error types

use thiserror::Error;

/// Browser-related errors
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Browser binary not found: {0}")]
    BrowserNotFound(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Transport fault: {0}")]
    Transport(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
