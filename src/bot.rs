//! The daily cycle: compose prompt, generate image, post, email, sleep.
use anyhow::Result;
use chrono::Local;
use std::time::Duration;
use tracing::{error, info};

use crate::config::Config;
use crate::cooldown::ErrorMarker;
use crate::mailer::MailSender;
use crate::mastodon::StatusPublisher;
use crate::openai::ImageGenerator;
use crate::prompt::{self, PromptError};
use crate::schedule;

pub const EMAIL_SUBJECT: &str = "Your Floofy-Headed Bird Image";
pub const ALT_TEXT: &str = "Here's a random floofy-headed bird - generated by AI!";
const HASHTAGS: &str = "#floofy #bird #birds #ai #nature";

/// Result of one pass through the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// Failure cooldown still active; nothing was attempted.
    CoolingDown,
    /// The cycle failed and the error marker was refreshed.
    Failed,
    /// Image posted; email attempted.
    Completed,
}

/// Status message for the Mastodon post.
pub fn status_text(holiday: Option<&str>) -> String {
    match holiday {
        Some(name) => format!(
            "Here's a random floofy-headed bird celebrating \"{name}\" - generated by AI!\n{HASHTAGS}"
        ),
        None => format!("Here's a random floofy-headed bird - generated by AI!\n{HASHTAGS}"),
    }
}

/// Body for the notification email; mirrors the status without hashtags.
pub fn email_body(holiday: Option<&str>) -> String {
    match holiday {
        Some(name) => {
            format!("Here's a random floofy-headed bird celebrating \"{name}\" - generated by AI!")
        }
        None => "Here's a random floofy-headed bird - generated by AI!".to_string(),
    }
}

async fn run_cycle(
    cfg: &Config,
    generator: &dyn ImageGenerator,
    publisher: &dyn StatusPublisher,
    mailer: &dyn MailSender,
) -> Result<()> {
    let composed = prompt::compose(
        &cfg.prompt,
        Local::now().date_naive(),
        &mut rand::thread_rng(),
    )?;

    let image = generator.generate(&composed.text).await?;

    let holiday = composed.holiday.as_deref();
    publisher
        .post_image(&image, &status_text(holiday), ALT_TEXT)
        .await?;

    // Best-effort: the mailer absorbs its own failures.
    mailer
        .send(EMAIL_SUBJECT, &email_body(holiday), &image)
        .await;
    Ok(())
}

/// One pass of the state machine, without any sleeping. Returns `Err` only
/// for configuration-fatal conditions (missing prompt inputs), which must
/// terminate the process.
pub async fn run_iteration(
    cfg: &Config,
    marker: &ErrorMarker,
    generator: &dyn ImageGenerator,
    publisher: &dyn StatusPublisher,
    mailer: &dyn MailSender,
) -> Result<IterationOutcome> {
    if !marker.should_retry(Local::now().naive_local()) {
        info!("within failure cooldown; deferring this cycle");
        return Ok(IterationOutcome::CoolingDown);
    }

    info!("starting a new cycle");
    match run_cycle(cfg, generator, publisher, mailer).await {
        Ok(()) => Ok(IterationOutcome::Completed),
        Err(err) => {
            if matches!(
                err.downcast_ref::<PromptError>(),
                Some(PromptError::MissingBasePrompt(_) | PromptError::MissingHolidayTable(_))
            ) {
                return Err(err);
            }
            error!(?err, "cycle failed; recording error marker");
            if let Err(write_err) = marker.record(Local::now().naive_local()) {
                error!(?write_err, "failed to write error marker");
            }
            Ok(IterationOutcome::Failed)
        }
    }
}

/// Run forever: one cycle per day at the target hour, with cooldown
/// deferrals and a short retry delay after failures.
pub async fn run(
    cfg: &Config,
    marker: &ErrorMarker,
    generator: &dyn ImageGenerator,
    publisher: &dyn StatusPublisher,
    mailer: &dyn MailSender,
) -> Result<()> {
    loop {
        match run_iteration(cfg, marker, generator, publisher, mailer).await? {
            IterationOutcome::CoolingDown => {
                tokio::time::sleep(Duration::from_secs(cfg.app.cooldown_recheck_secs)).await;
            }
            IterationOutcome::Failed => {
                info!(secs = cfg.app.retry_delay_secs, "retrying after delay");
                tokio::time::sleep(Duration::from_secs(cfg.app.retry_delay_secs)).await;
            }
            IterationOutcome::Completed => {
                let wait =
                    schedule::seconds_until_hour(Local::now().naive_local(), cfg.app.target_hour);
                info!(
                    secs = wait.as_secs(),
                    hour = cfg.app.target_hour,
                    "cycle complete; sleeping until next run"
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}
