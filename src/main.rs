//! Binary entry point: resolve configuration, load the batch inputs, and run
//! the dispatch loop. Invoked with no arguments; all outcomes surface through
//! the log stream.

use anyhow::Result;
use tracing::{error, info};

use whatsblast::browser::ChromeSessionProvider;
use whatsblast::observer::LogObserver;
use whatsblast::runner::{RunBatch, RunPolicy, Runner};
use whatsblast::{contacts, locate, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; the environment may be set directly.
    let _ = dotenvy::dotenv();
    let _guard = whatsblast::init_logging();

    info!("Starting whatsblast");
    if let Some(dir) = whatsblast::log_dir() {
        info!("Log files saved to: {}", dir.display());
    }

    let config = Config::from_env();

    let Some(csv_path) = locate::find_in_working_tree(&config.contact_csv) else {
        error!("No CSV file found!");
        return Ok(());
    };
    let contacts = match contacts::load_contacts(&csv_path) {
        Ok(contacts) => contacts,
        Err(e) => {
            error!("Failed to load contact CSV: {e}");
            return Ok(());
        }
    };

    let attachment = locate::find_in_working_tree(&config.pdf_file);
    if let Some(path) = &attachment {
        info!("PDF file located at: {}", path.display());
    }

    let provider = ChromeSessionProvider::new(config.chrome_binary.clone());
    let policy = RunPolicy {
        primary_number: config.primary_number().map(str::to_string),
        ..RunPolicy::default()
    };
    let batch = RunBatch {
        contacts,
        message: config.special_message.clone(),
        attachment,
    };

    let mut runner = Runner::with_policy(provider, LogObserver, policy);
    runner.run(&batch).await;

    Ok(())
}
