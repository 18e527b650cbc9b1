use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use birdbot::config;
use birdbot::cooldown::ErrorMarker;
use birdbot::mailer::MsmtpMailer;
use birdbot::mastodon::MastodonClient;
use birdbot::openai::OpenAiClient;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "birdbot.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let secrets = config::Secrets::from_env()?;

    info!("setting up Mastodon client");
    let publisher = MastodonClient::new(
        &secrets.mastodon_base_url,
        secrets.mastodon_access_token.clone(),
    )?;
    info!("setting up image API client");
    let generator = OpenAiClient::new(secrets.openai_api_key.clone(), &cfg.openai);
    let mailer = MsmtpMailer::new(&cfg.mail.msmtp_path, secrets.email_address.clone());
    let marker = ErrorMarker::new(&cfg.app.error_file, cfg.app.cooldown_hours);

    info!("starting bird bot");
    birdbot::bot::run(&cfg, &marker, &generator, &publisher, &mailer).await
}
