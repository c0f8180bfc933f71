//! Run coordinator
//!
//! Owns the whole batch: one session per run, contacts dispatched strictly
//! sequentially in source order, per-contact failures isolated, session
//! closed exactly once on every path that acquired one.

use std::path::PathBuf;
use std::time::Duration;

use crate::browser::{PageDriver, SessionProvider};
use crate::contacts::Contact;
use crate::dispatch::{Sequencer, StepPolicy};
use crate::observer::RunObserver;

/// Run-level timing and targeting policy.
#[derive(Debug, Clone)]
pub struct RunPolicy {
    /// Extra stabilization wait before the first contact only; the first
    /// load of the messaging UI is slower than later in-session navigation.
    pub first_load_grace: Duration,
    /// Per-step timing for the sequencer.
    pub step: StepPolicy,
    /// Initial navigation target; the first contact's number is used when
    /// unset.
    pub primary_number: Option<String>,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            first_load_grace: Duration::from_secs(60),
            step: StepPolicy::default(),
            primary_number: None,
        }
    }
}

/// Everything one batch needs: contacts in source order, the shared message
/// template, and the attachment path when it was resolved.
#[derive(Debug, Clone)]
pub struct RunBatch {
    pub contacts: Vec<Contact>,
    pub message: String,
    pub attachment: Option<PathBuf>,
}

/// Per-run accounting. Not persisted; surfaced through the observer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub attempted: usize,
    pub sent: usize,
}

/// Orchestrates one batch over one browser session.
pub struct Runner<P: SessionProvider, O: RunObserver> {
    provider: P,
    observer: O,
    policy: RunPolicy,
}

impl<P: SessionProvider, O: RunObserver> Runner<P, O> {
    pub fn new(provider: P, observer: O) -> Self {
        Self::with_policy(provider, observer, RunPolicy::default())
    }

    pub fn with_policy(provider: P, observer: O, policy: RunPolicy) -> Self {
        Self {
            provider,
            observer,
            policy,
        }
    }

    /// Run the batch to completion.
    ///
    /// Fatal setup failures (no contacts, unresolved attachment, session
    /// launch failure) stop the run before any dispatch; per-contact
    /// failures never do.
    pub async fn run(&mut self, batch: &RunBatch) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        if batch.contacts.is_empty() {
            self.observer.fatal("No data to process");
            return summary;
        }

        let Some(attachment) = batch.attachment.as_deref() else {
            self.observer.fatal("No PDF file found!");
            return summary;
        };

        let target = self
            .policy
            .primary_number
            .clone()
            .or_else(|| batch.contacts.iter().find_map(|c| c.phone().ok()));

        let mut session = match self.provider.acquire(target.as_deref()).await {
            Ok(session) => session,
            Err(e) => {
                self.observer
                    .fatal(&format!("Web driver is not initialized: {e}"));
                return summary;
            }
        };

        self.observer.run_started(batch.contacts.len());

        for (index, contact) in batch.contacts.iter().enumerate() {
            if index == 0 && !self.policy.first_load_grace.is_zero() {
                tokio::time::sleep(self.policy.first_load_grace).await;
            }

            self.observer.contact_started(contact);
            summary.attempted += 1;

            let mut sequencer = Sequencer::new(&mut session, self.policy.step.clone());
            match sequencer.dispatch(contact, &batch.message, attachment).await {
                Ok(()) => {
                    summary.sent += 1;
                    self.observer.contact_sent(contact);
                }
                Err(e) => self.observer.contact_failed(contact, &e),
            }
        }

        if let Err(e) = session.close().await {
            self.observer.session_close_failed(&e);
        }

        self.observer.run_finished(&summary);
        summary
    }
}
