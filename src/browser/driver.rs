//! The automation surface the dispatch sequencer drives.
//!
//! The sequencer never touches CDP types directly; it sees a [`PageDriver`]
//! handle whose waits are bounded by the session's configured upper bound.
//! That seam is what keeps the per-contact state machine testable without a
//! running Chromium.

use std::fmt;
use std::path::Path;

use super::BrowserError;

/// An element locator, either CSS or XPath. WhatsApp Web's DOM needs both:
/// stable attributes get CSS, position-dependent entries get XPath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::XPath(selector.into())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css:{s}"),
            Self::XPath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// One page being driven. All waits block until the condition holds or the
/// session's wait bound elapses; the bound is long (minutes) because WhatsApp
/// Web's first render is slow and variable.
#[allow(async_fn_in_trait)]
pub trait PageDriver {
    /// Wait for the element to exist in the DOM.
    async fn wait_until_present(&mut self, selector: &Selector) -> Result<(), BrowserError>;

    /// Wait for the element to exist and be interactable.
    async fn wait_until_clickable(&mut self, selector: &Selector) -> Result<(), BrowserError>;

    async fn click(&mut self, selector: &Selector) -> Result<(), BrowserError>;

    /// Click the element and type into it.
    async fn type_text(&mut self, selector: &Selector, text: &str) -> Result<(), BrowserError>;

    /// Press the input-terminator key in the element.
    async fn press_enter(&mut self, selector: &Selector) -> Result<(), BrowserError>;

    /// Send a file path to a (possibly hidden) file input as a native file
    /// selection. No visibility wait: the host page hides the input.
    async fn attach_file(&mut self, selector: &Selector, path: &Path) -> Result<(), BrowserError>;

    /// Tear the session down. Idempotent; later calls are no-ops.
    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// Starts a remote-controllable browser session against the messaging service.
#[allow(async_fn_in_trait)]
pub trait SessionProvider {
    type Session: PageDriver;

    /// Start a session navigated to the conversation deep link for `target`
    /// (or the bare service URL when no target is known).
    async fn acquire(&self, target: Option<&str>) -> Result<Self::Session, BrowserError>;
}
