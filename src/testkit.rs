//! Scripted in-memory stand-ins for the browser seam, shared by the
//! sequencer and runner tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::browser::{BrowserError, PageDriver, Selector, SessionProvider};
use crate::contacts::Contact;
use crate::dispatch::DispatchError;
use crate::observer::RunObserver;
use crate::runner::DispatchSummary;

/// Records every driver action as a line; actions containing any of the
/// configured needles fail with a timeout, like an element that never
/// satisfies its wait condition.
#[derive(Clone, Default)]
pub(crate) struct ScriptedDriver {
    log: Arc<Mutex<Vec<String>>>,
    fail_matching: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_when(self, needle: &str) -> Self {
        self.fail_matching.lock().unwrap().push(needle.to_string());
        self
    }

    pub fn actions(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, action: String) -> Result<(), BrowserError> {
        let should_fail = self
            .fail_matching
            .lock()
            .unwrap()
            .iter()
            .any(|needle| action.contains(needle.as_str()));
        if should_fail {
            return Err(BrowserError::Timeout(action));
        }
        self.log.lock().unwrap().push(action);
        Ok(())
    }
}

impl PageDriver for ScriptedDriver {
    async fn wait_until_present(&mut self, selector: &Selector) -> Result<(), BrowserError> {
        self.record(format!("wait_present {selector}"))
    }

    async fn wait_until_clickable(&mut self, selector: &Selector) -> Result<(), BrowserError> {
        self.record(format!("wait_clickable {selector}"))
    }

    async fn click(&mut self, selector: &Selector) -> Result<(), BrowserError> {
        self.record(format!("click {selector}"))
    }

    async fn type_text(&mut self, selector: &Selector, text: &str) -> Result<(), BrowserError> {
        self.record(format!("type {selector} {text}"))
    }

    async fn press_enter(&mut self, selector: &Selector) -> Result<(), BrowserError> {
        self.record(format!("enter {selector}"))
    }

    async fn attach_file(&mut self, selector: &Selector, path: &Path) -> Result<(), BrowserError> {
        self.record(format!("attach {selector} {}", path.display()))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.record("close".to_string())?;
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Provider handing out clones of one scripted driver, so the test can keep
/// inspecting the shared action log after the run.
pub(crate) struct ScriptedProvider {
    driver: ScriptedDriver,
    acquires: Arc<AtomicUsize>,
    targets: Arc<Mutex<Vec<Option<String>>>>,
    fail_acquire: bool,
}

impl ScriptedProvider {
    pub fn new(driver: ScriptedDriver) -> Self {
        Self {
            driver,
            acquires: Arc::new(AtomicUsize::new(0)),
            targets: Arc::new(Mutex::new(Vec::new())),
            fail_acquire: false,
        }
    }

    pub fn failing_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    pub fn handle(&self) -> (ScriptedDriver, Arc<AtomicUsize>, Arc<Mutex<Vec<Option<String>>>>) {
        (
            self.driver.clone(),
            self.acquires.clone(),
            self.targets.clone(),
        )
    }
}

impl SessionProvider for ScriptedProvider {
    type Session = ScriptedDriver;

    async fn acquire(&self, target: Option<&str>) -> Result<ScriptedDriver, BrowserError> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        self.targets
            .lock()
            .unwrap()
            .push(target.map(str::to_string));
        if self.fail_acquire {
            return Err(BrowserError::LaunchFailed("scripted launch failure".into()));
        }
        Ok(self.driver.clone())
    }
}

/// Observer that records lifecycle events for assertion.
#[derive(Clone, Default)]
pub(crate) struct RecordingObserver {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl RunObserver for RecordingObserver {
    fn run_started(&mut self, total: usize) {
        self.push(format!("started {total}"));
    }

    fn contact_started(&mut self, contact: &Contact) {
        self.push(format!("contact {}", contact.raw));
    }

    fn contact_sent(&mut self, contact: &Contact) {
        self.push(format!("sent {}", contact.raw));
    }

    fn contact_failed(&mut self, contact: &Contact, error: &DispatchError) {
        self.push(format!("failed {} ({error})", contact.raw));
    }

    fn fatal(&mut self, message: &str) {
        self.push(format!("fatal {message}"));
    }

    fn session_close_failed(&mut self, error: &BrowserError) {
        self.push(format!("close_failed {error}"));
    }

    fn run_finished(&mut self, summary: &DispatchSummary) {
        self.push(format!("finished {}/{}", summary.sent, summary.attempted));
    }
}
