//! Run observability sink
//!
//! The coordinator and sequencer report through an injected capability
//! instead of module-level logger state; the default sink forwards to
//! `tracing` with the same lines and ordering the tool has always emitted.

use tracing::{error, info, warn};

use crate::browser::BrowserError;
use crate::contacts::Contact;
use crate::dispatch::DispatchError;
use crate::runner::DispatchSummary;

/// Receives run and per-contact lifecycle events.
pub trait RunObserver {
    fn run_started(&mut self, total: usize);
    fn contact_started(&mut self, contact: &Contact);
    fn contact_sent(&mut self, contact: &Contact);
    fn contact_failed(&mut self, contact: &Contact, error: &DispatchError);
    /// A fatal setup failure; the run stops without dispatching further.
    fn fatal(&mut self, message: &str);
    /// The end-of-run session close failed; the run itself still finished.
    fn session_close_failed(&mut self, error: &BrowserError);
    fn run_finished(&mut self, summary: &DispatchSummary);
}

/// Default observer backed by `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl LogObserver {
    fn display_phone(contact: &Contact) -> String {
        contact.phone().unwrap_or_else(|_| contact.raw.clone())
    }
}

impl RunObserver for LogObserver {
    fn run_started(&mut self, total: usize) {
        info!("Dispatching to {} contacts", total);
    }

    fn contact_started(&mut self, contact: &Contact) {
        info!("CELLPHONE: {}", Self::display_phone(contact));
    }

    fn contact_sent(&mut self, contact: &Contact) {
        info!("Message scheduled for {}", Self::display_phone(contact));
    }

    fn contact_failed(&mut self, contact: &Contact, error: &DispatchError) {
        error!(
            "Failed to send message to {}: {}",
            Self::display_phone(contact),
            error
        );
    }

    fn fatal(&mut self, message: &str) {
        error!("{message}");
    }

    fn session_close_failed(&mut self, error: &BrowserError) {
        warn!("Failed to close browser session: {error}");
    }

    fn run_finished(&mut self, summary: &DispatchSummary) {
        info!(
            "All messages have been scheduled. ({}/{} sent)",
            summary.sent, summary.attempted
        );
    }
}
