//! Browser automation module
//!
//! Handles launching and controlling the single Chromium instance a run
//! dispatches through, and defines the driver seam the sequencer uses.

mod driver;
mod errors;
mod session;

pub use driver::{PageDriver, Selector, SessionProvider};
pub use errors::BrowserError;
pub use session::{ChromeSessionProvider, Session};
