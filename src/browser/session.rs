//! Browser session management
//!
//! Launches and controls the single Chromium instance a run dispatches
//! through. The binary is looked up in the working tree first (deployments
//! bundle it next to the program), then in the platform's usual install
//! locations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrowserError, PageDriver, Selector, SessionProvider};
use crate::locate;

const WHATSAPP_URL: &str = "https://web.whatsapp.com/";
const WHATSAPP_SEND_URL: &str = "https://web.whatsapp.com/send?phone=";

/// How often a pending wait re-probes the DOM.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default upper bound for condition waits. First load and conversation
/// rendering are slow and variable, so this is generous.
const DEFAULT_WAIT_BOUND: Duration = Duration::from_secs(60);

/// Find the Chromium binary: working directory tree first, then the
/// platform's well-known install locations.
fn find_browser_binary(name: &str) -> Option<PathBuf> {
    if let Some(path) = locate::find_in_working_tree(name) {
        info!("Browser binary located at: {}", path.display());
        return Some(path);
    }

    let candidates: Vec<PathBuf> = if cfg!(target_os = "windows") {
        let mut paths = vec![
            PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
            PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        ];
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            paths.push(PathBuf::from(format!(
                r"{}\Google\Chrome\Application\chrome.exe",
                local
            )));
        }
        paths
    } else if cfg!(target_os = "macos") {
        vec![PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        )]
    } else {
        vec![
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/google-chrome-stable"),
        ]
    };

    candidates.into_iter().find(|p| p.exists())
}

/// Starts Chromium sessions bound to a discovered binary.
pub struct ChromeSessionProvider {
    binary_name: String,
    wait_bound: Duration,
}

impl ChromeSessionProvider {
    pub fn new(binary_name: impl Into<String>) -> Self {
        Self {
            binary_name: binary_name.into(),
            wait_bound: DEFAULT_WAIT_BOUND,
        }
    }

    /// Override the condition-wait upper bound.
    pub fn wait_bound(mut self, bound: Duration) -> Self {
        self.wait_bound = bound;
        self
    }
}

impl SessionProvider for ChromeSessionProvider {
    type Session = Session;

    async fn acquire(&self, target: Option<&str>) -> Result<Session, BrowserError> {
        let binary = find_browser_binary(&self.binary_name)
            .ok_or_else(|| BrowserError::BrowserNotFound(self.binary_name.clone()))?;

        let config = BrowserConfig::builder()
            .chrome_executable(binary)
            .with_head()
            .no_sandbox()
            .window_size(1920, 1080)
            .arg("--start-maximized")
            .arg("--disable-notifications")
            .arg("--no-default-browser-check")
            .build()
            .map_err(BrowserError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        // When the handler ends, Chrome has disconnected; pending CDP calls
        // surface that as transport errors.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            debug!("Browser event handler ended");
        });

        // Chrome opens with one blank tab; reuse it.
        let page = {
            let mut pages = browser
                .pages()
                .await
                .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;
            if pages.is_empty() {
                browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?
            } else {
                pages.remove(0)
            }
        };

        let url = match target {
            Some(phone) => format!("{WHATSAPP_SEND_URL}{phone}"),
            None => WHATSAPP_URL.to_string(),
        };
        info!("Navigating session to {}", url);
        page.goto(url.as_str())
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;

        Ok(Session {
            browser: Some(browser),
            page: Some(page),
            handler: Some(handler_task),
            wait_bound: self.wait_bound,
        })
    }
}

/// The single remote-automation handle for a run.
///
/// Driven strictly sequentially; closed exactly once (later closes no-op).
pub struct Session {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    wait_bound: Duration,
}

impl Session {
    fn page(&self) -> Result<&Page, BrowserError> {
        self.page.as_ref().ok_or(BrowserError::SessionClosed)
    }

    async fn resolve(&self, selector: &Selector) -> Result<Element, BrowserError> {
        let page = self.page()?;
        let found = match selector {
            Selector::Css(s) => page.find_element(s.as_str()).await,
            Selector::XPath(s) => page.find_xpath(s.as_str()).await,
        };
        found.map_err(|e| BrowserError::ElementNotFound(format!("{selector}: {e}")))
    }

    /// Poll for the element until it exists (and, when `clickable`, is
    /// interactable), bounded by the session's wait bound.
    async fn wait_for(&self, selector: &Selector, clickable: bool) -> Result<Element, BrowserError> {
        let probe = async {
            loop {
                if let Ok(element) = self.resolve(selector).await {
                    if !clickable || element.clickable_point().await.is_ok() {
                        return element;
                    }
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(self.wait_bound, probe)
            .await
            .map_err(|_| BrowserError::Timeout(format!("waiting for {selector}")))
    }
}

impl PageDriver for Session {
    async fn wait_until_present(&mut self, selector: &Selector) -> Result<(), BrowserError> {
        self.wait_for(selector, false).await.map(|_| ())
    }

    async fn wait_until_clickable(&mut self, selector: &Selector) -> Result<(), BrowserError> {
        self.wait_for(selector, true).await.map(|_| ())
    }

    async fn click(&mut self, selector: &Selector) -> Result<(), BrowserError> {
        let element = self.resolve(selector).await?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::Transport(format!("click {selector}: {e}")))?;
        Ok(())
    }

    async fn type_text(&mut self, selector: &Selector, text: &str) -> Result<(), BrowserError> {
        let element = self.resolve(selector).await?;
        let element = element
            .click()
            .await
            .map_err(|e| BrowserError::Transport(format!("focus {selector}: {e}")))?;
        element
            .type_str(text)
            .await
            .map_err(|e| BrowserError::Transport(format!("type into {selector}: {e}")))?;
        Ok(())
    }

    async fn press_enter(&mut self, selector: &Selector) -> Result<(), BrowserError> {
        let element = self.resolve(selector).await?;
        element
            .press_key("Enter")
            .await
            .map_err(|e| BrowserError::Transport(format!("submit {selector}: {e}")))?;
        Ok(())
    }

    async fn attach_file(&mut self, selector: &Selector, path: &Path) -> Result<(), BrowserError> {
        let element = self.resolve(selector).await?;
        let params = SetFileInputFilesParams {
            files: vec![path.to_string_lossy().into_owned()],
            node_id: None,
            backend_node_id: Some(element.backend_node_id),
            object_id: None,
        };
        self.page()?
            .execute(params)
            .await
            .map_err(|e| BrowserError::Transport(format!("attach file to {selector}: {e}")))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }

        if let Some(mut browser) = self.browser.take() {
            // Graceful close first, brief grace period for child processes,
            // then force kill so no Chrome process leaks.
            let _ = browser.close().await;
            tokio::time::sleep(Duration::from_millis(500)).await;
            let _ = browser.kill().await;
            info!("Browser session closed");
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }

        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        // Dropping without close() happens on unwind paths; kill the spawned
        // Chrome process so it does not outlive the run.
        if let Some(mut browser) = self.browser.take() {
            warn!("Browser session dropped without close(); killing browser process");
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = browser.kill().await;
                });
            }
        }
    }
}
