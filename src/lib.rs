//! whatsblast
//!
//! Bulk delivery of a templated message plus an attached document to a list of
//! phone numbers through WhatsApp Web, driving a Chromium instance over the
//! DevTools protocol.

pub mod browser;
pub mod contacts;
pub mod dispatch;
pub mod locate;
pub mod observer;
pub mod runner;

#[cfg(test)]
pub(crate) mod testkit;

use std::path::PathBuf;

/// Fallback used when `SPECIAL_MESSAGE` is not set.
pub const NO_MESSAGE_FALLBACK: &str = "No message has found";
/// Fallback used when `MAIN_CELLPHONE` is not set.
pub const NO_CELLPHONE_FALLBACK: &str = "No cellphone has found";

/// Run parameters, each resolved from an environment variable with a literal
/// fallback.
#[derive(Debug, Clone)]
pub struct Config {
    /// File name of the contact CSV, located by scanning the working tree.
    pub contact_csv: String,
    /// File name of the document to attach, located the same way.
    pub pdf_file: String,
    /// The message template sent to every contact.
    pub special_message: String,
    /// Primary phone number used as the initial navigation target when set.
    pub main_cellphone: String,
    /// Name of the Chromium binary to scan the working tree for.
    pub chrome_binary: String,
}

fn env_or(name: &str, fallback: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| fallback.to_string())
}

impl Config {
    /// Resolve all parameters from the environment.
    pub fn from_env() -> Self {
        Self {
            contact_csv: env_or("CONTACT_CSV", "cellphones.csv"),
            pdf_file: env_or("PDF_FILE", "Michelle_y_Nicolas.pdf"),
            special_message: env_or("SPECIAL_MESSAGE", NO_MESSAGE_FALLBACK),
            main_cellphone: env_or("MAIN_CELLPHONE", NO_CELLPHONE_FALLBACK),
            chrome_binary: env_or("CHROME_BINARY", "chrome"),
        }
    }

    /// The configured primary number, or `None` when the fallback literal is
    /// still in place.
    pub fn primary_number(&self) -> Option<&str> {
        if self.main_cellphone == NO_CELLPHONE_FALLBACK || self.main_cellphone.is_empty() {
            None
        } else {
            Some(&self.main_cellphone)
        }
    }
}

/// Get log directory path (shared across modules)
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("whatsblast").join("logs"))
}

/// Initialize logging: console output plus a daily rolling application log.
pub fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    if let Some(log_dir) = log_dir() {
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "whatsblast.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();

        None
    }
}
