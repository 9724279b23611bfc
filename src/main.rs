// This is the entry point of the birthday job.
//
// **Architecture Overview:**
// - `core/` = Business logic (roster parsing, date matching, greetings, delivery)
// - `infra/` = Implementations of core traits (Google Sheets, Gemini, Gmail)
// - `config/` = Everything read from the environment
//
// This file's job is to:
// 1. Set up logging
// 2. Load configuration
// 3. Initialize services (dependency injection)
// 4. Run the pipeline once for today's date
//
// It runs to completion and exits. Scheduling (cron, Cloud Scheduler) lives
// outside the binary.

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "config/app_config.rs"]
mod config;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use anyhow::Context;

use crate::config::AppConfig;
use crate::core::greetings::GreetingService;
use crate::core::notify::Notifier;
use crate::core::pipeline::BirthdayPipeline;
use crate::infra::ai::GeminiClient;
use crate::infra::gmail::GmailClient;
use crate::infra::google_auth::{gmail_provider, provider_from_credentials};
use crate::infra::logging::{self, LogSettings};
use crate::infra::sheets::GoogleSheetsClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let env = |key: &str| std::env::var(key).ok();

    // Held until main returns so the file writer flushes.
    let _log_guard =
        logging::init(&LogSettings::from_lookup(env)).context("Failed to set up logging")?;

    let config = AppConfig::from_lookup(env).context("Invalid configuration")?;
    let today = config.today();

    let auth = provider_from_credentials(config.credentials, config.delegated_user)
        .await
        .context("Failed to load Google credentials")?;
    let gmail_auth = gmail_provider(auth.clone(), config.gmail_token_path)
        .await
        .context("Failed to load Gmail token file")?;

    let roster = GoogleSheetsClient::new(auth, config.spreadsheet_id, config.sheet_range);
    let greetings = GreetingService::new(GeminiClient::new(
        config.gemini_api_key,
        config.gemini_model,
    ));
    let notifier = Notifier::new(GmailClient::new(gmail_auth), config.sender_email);

    let pipeline = BirthdayPipeline::new(roster, greetings, notifier);
    let summary = pipeline.run(today).await;

    // Failed deliveries are already in the summary log; they don't fail the job.
    if !summary.failed.is_empty() {
        tracing::warn!("{} greeting(s) could not be delivered", summary.failed.len());
    }

    Ok(())
}
