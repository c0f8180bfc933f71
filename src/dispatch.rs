//! Dispatch sequencer
//!
//! Drives one contact's message-plus-attachment delivery through WhatsApp
//! Web's UI: a linear sequence of steps, each gated by a wait-for-condition
//! and a settle grace period for animation latency the wait cannot observe.
//! Any step failure aborts the remaining steps for this contact only; the
//! batch loop moves on to the next one.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::browser::{BrowserError, PageDriver, Selector};
use crate::contacts::Contact;

/// WhatsApp Web selectors.
///
/// The result entry renders asynchronously and its DOM position is not
/// stable, so it is matched by the phone number in its title instead.
mod selectors {
    use crate::browser::Selector;

    pub fn new_chat_button() -> Selector {
        Selector::css("span[data-icon='new-chat-outline'], div[title='New chat']")
    }

    pub fn recipient_search() -> Selector {
        Selector::xpath("//div[@contenteditable='true'][@data-tab='3']")
    }

    pub fn conversation_entry(phone: &str) -> Selector {
        Selector::xpath(format!("//span[contains(@title,'{phone}')]"))
    }

    pub fn message_box() -> Selector {
        Selector::xpath("//div[@title='Type a message']")
    }

    pub fn attach_button() -> Selector {
        Selector::css("span[data-testid='clip']")
    }

    pub fn file_input() -> Selector {
        Selector::css("input[type='file']")
    }

    pub fn send_button() -> Selector {
        Selector::xpath("//span[@data-testid='send']")
    }
}

/// The step at which a dispatch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    OpenNewChat,
    EnterRecipient,
    SelectConversation,
    ComposeMessage,
    OpenAttachMenu,
    UploadFile,
    ConfirmSend,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenNewChat => "open new chat",
            Self::EnterRecipient => "enter recipient",
            Self::SelectConversation => "select conversation",
            Self::ComposeMessage => "compose message",
            Self::OpenAttachMenu => "open attach menu",
            Self::UploadFile => "upload file",
            Self::ConfirmSend => "confirm send",
        };
        f.write_str(name)
    }
}

/// Per-contact dispatch failure. Never propagates past the current contact.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("invalid phone number {0:?}")]
    InvalidPhone(String),

    #[error("{step} failed: {cause}")]
    Step { step: Step, cause: BrowserError },
}

impl DispatchError {
    /// The step that failed, if the sequence got that far.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::InvalidPhone(_) => None,
            Self::Step { step, .. } => Some(*step),
        }
    }
}

/// Timing policy for each step: the settle grace period applied between a
/// satisfied wait condition and the action, standing in for the render-
/// complete signal the page never emits.
#[derive(Debug, Clone)]
pub struct StepPolicy {
    pub settle: Duration,
}

impl Default for StepPolicy {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(750),
        }
    }
}

/// Drives the per-contact delivery sequence on a borrowed session.
pub struct Sequencer<'a, D: PageDriver> {
    driver: &'a mut D,
    policy: StepPolicy,
}

impl<'a, D: PageDriver> Sequencer<'a, D> {
    pub fn new(driver: &'a mut D, policy: StepPolicy) -> Self {
        Self { driver, policy }
    }

    /// Deliver the message and attachment to one contact.
    ///
    /// Linear, no branching except failure: every step is wait-for-predicate,
    /// settle, act. The two opening interactions require the target to be
    /// clickable; typing targets only need presence; the file-path injection
    /// waits for nothing because the input is deliberately hidden.
    pub async fn dispatch(
        &mut self,
        contact: &Contact,
        message: &str,
        attachment: &Path,
    ) -> Result<(), DispatchError> {
        let phone = contact
            .phone()
            .map_err(|_| DispatchError::InvalidPhone(contact.raw.clone()))?;

        self.open_new_chat().await?;
        self.enter_recipient(&phone).await?;
        self.select_conversation(&phone).await?;
        self.compose_message(message).await?;
        self.open_attach_menu().await?;
        self.upload_file(attachment).await?;
        self.confirm_send().await?;

        debug!("Dispatch complete for {}", phone);
        Ok(())
    }

    async fn open_new_chat(&mut self) -> Result<(), DispatchError> {
        let selector = selectors::new_chat_button();
        self.wait_clickable(Step::OpenNewChat, &selector).await?;
        self.settle().await;
        self.driver
            .click(&selector)
            .await
            .map_err(step_err(Step::OpenNewChat))
    }

    async fn enter_recipient(&mut self, phone: &str) -> Result<(), DispatchError> {
        let selector = selectors::recipient_search();
        self.wait_present(Step::EnterRecipient, &selector).await?;
        self.settle().await;
        self.driver
            .type_text(&selector, phone)
            .await
            .map_err(step_err(Step::EnterRecipient))
    }

    async fn select_conversation(&mut self, phone: &str) -> Result<(), DispatchError> {
        let selector = selectors::conversation_entry(phone);
        self.wait_clickable(Step::SelectConversation, &selector).await?;
        self.settle().await;
        self.driver
            .click(&selector)
            .await
            .map_err(step_err(Step::SelectConversation))
    }

    async fn compose_message(&mut self, message: &str) -> Result<(), DispatchError> {
        let selector = selectors::message_box();
        self.wait_present(Step::ComposeMessage, &selector).await?;
        self.settle().await;
        self.driver
            .type_text(&selector, message)
            .await
            .map_err(step_err(Step::ComposeMessage))?;
        self.driver
            .press_enter(&selector)
            .await
            .map_err(step_err(Step::ComposeMessage))
    }

    async fn open_attach_menu(&mut self) -> Result<(), DispatchError> {
        let selector = selectors::attach_button();
        self.wait_present(Step::OpenAttachMenu, &selector).await?;
        self.settle().await;
        self.driver
            .click(&selector)
            .await
            .map_err(step_err(Step::OpenAttachMenu))
    }

    async fn upload_file(&mut self, attachment: &Path) -> Result<(), DispatchError> {
        let selector = selectors::file_input();
        self.settle().await;
        self.driver
            .attach_file(&selector, attachment)
            .await
            .map_err(step_err(Step::UploadFile))
    }

    async fn confirm_send(&mut self) -> Result<(), DispatchError> {
        let selector = selectors::send_button();
        self.wait_clickable(Step::ConfirmSend, &selector).await?;
        self.settle().await;
        self.driver
            .click(&selector)
            .await
            .map_err(step_err(Step::ConfirmSend))
    }

    async fn settle(&self) {
        if !self.policy.settle.is_zero() {
            tokio::time::sleep(self.policy.settle).await;
        }
    }

    async fn wait_present(&mut self, step: Step, selector: &Selector) -> Result<(), DispatchError> {
        self.driver
            .wait_until_present(selector)
            .await
            .map_err(|cause| DispatchError::Step { step, cause })
    }

    async fn wait_clickable(&mut self, step: Step, selector: &Selector) -> Result<(), DispatchError> {
        self.driver
            .wait_until_clickable(selector)
            .await
            .map_err(|cause| DispatchError::Step { step, cause })
    }
}

fn step_err(step: Step) -> impl FnOnce(BrowserError) -> DispatchError {
    move |cause| DispatchError::Step { step, cause }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ScriptedDriver;

    fn contact(raw: &str) -> Contact {
        Contact {
            ordinal: 0,
            raw: raw.to_string(),
        }
    }

    fn quick_policy() -> StepPolicy {
        StepPolicy {
            settle: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn runs_the_full_step_sequence_in_order() {
        let mut driver = ScriptedDriver::new();
        let mut sequencer = Sequencer::new(&mut driver, quick_policy());

        sequencer
            .dispatch(&contact("15551234567"), "hello", Path::new("/tmp/flyer.pdf"))
            .await
            .unwrap();

        let actions = driver.actions();
        let expected = [
            "wait_clickable css:span[data-icon='new-chat-outline'], div[title='New chat']",
            "click css:span[data-icon='new-chat-outline'], div[title='New chat']",
            "wait_present xpath://div[@contenteditable='true'][@data-tab='3']",
            "type xpath://div[@contenteditable='true'][@data-tab='3'] +15551234567",
            "wait_clickable xpath://span[contains(@title,'+15551234567')]",
            "click xpath://span[contains(@title,'+15551234567')]",
            "wait_present xpath://div[@title='Type a message']",
            "type xpath://div[@title='Type a message'] hello",
            "enter xpath://div[@title='Type a message']",
            "wait_present css:span[data-testid='clip']",
            "click css:span[data-testid='clip']",
            "attach css:input[type='file'] /tmp/flyer.pdf",
            "wait_clickable xpath://span[@data-testid='send']",
            "click xpath://span[@data-testid='send']",
        ];
        assert_eq!(actions, expected);
    }

    #[tokio::test]
    async fn invalid_phone_fails_before_any_ui_action() {
        let mut driver = ScriptedDriver::new();
        let mut sequencer = Sequencer::new(&mut driver, quick_policy());

        let err = sequencer
            .dispatch(&contact("555-GHOST"), "hello", Path::new("/tmp/flyer.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::InvalidPhone(_)));
        assert_eq!(err.step(), None);
        assert!(driver.actions().is_empty());
    }

    #[tokio::test]
    async fn wait_timeout_is_tagged_with_the_step() {
        let mut driver = ScriptedDriver::new().fail_when("wait_clickable xpath://span[contains");
        let mut sequencer = Sequencer::new(&mut driver, quick_policy());

        let err = sequencer
            .dispatch(&contact("15551234567"), "hello", Path::new("/tmp/flyer.pdf"))
            .await
            .unwrap_err();

        assert_eq!(err.step(), Some(Step::SelectConversation));
        assert!(matches!(
            err,
            DispatchError::Step {
                cause: BrowserError::Timeout(_),
                ..
            }
        ));
        // Nothing past the failed step ran.
        assert!(!driver.actions().iter().any(|a| a.contains("clip")));
    }

    #[tokio::test]
    async fn action_failure_aborts_remaining_steps() {
        let mut driver = ScriptedDriver::new().fail_when("click css:span[data-testid='clip']");
        let mut sequencer = Sequencer::new(&mut driver, quick_policy());

        let err = sequencer
            .dispatch(&contact("15551234567"), "hello", Path::new("/tmp/flyer.pdf"))
            .await
            .unwrap_err();

        assert_eq!(err.step(), Some(Step::OpenAttachMenu));
        assert!(!driver.actions().iter().any(|a| a.contains("attach ")));
        assert!(!driver.actions().iter().any(|a| a.contains("send")));
    }
}
