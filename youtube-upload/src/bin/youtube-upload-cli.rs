use bytes::Bytes;
use clap::Parser;
use eyre::Context;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_upload::config::Config;
use youtube_upload::oauth::{LoopbackProvider, OAUTH_DONE_HTML};
use youtube_upload::youtube_api::{DEFAULT_CATEGORY_ID, PrivacyStatus, UploadMetadata, Uploader};
use youtube_upload::SessionInitiator;

/// Sign in with Google and upload a video to YouTube.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// The media file to upload.
    media: PathBuf,

    #[arg(long)]
    title: String,

    #[arg(long, default_value = "")]
    description: String,

    /// May be given multiple times; order is preserved.
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Numeric YouTube category id.
    #[arg(long, default_value = DEFAULT_CATEGORY_ID)]
    category: String,

    /// One of private, unlisted, or public.
    #[arg(long, default_value_t = PrivacyStatus::Private)]
    privacy: PrivacyStatus,

    #[arg(long)]
    made_for_kids: bool,

    /// Overrides the declared content type (video/webm by default).
    #[arg(long)]
    content_type: Option<String>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();

    // A missing .env file is fine; the environment may already be set up.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::from_env();
    config.policy.privacy = args.privacy;
    config.policy.made_for_kids = args.made_for_kids;
    if let Some(content_type) = args.content_type {
        config.policy.content_type = content_type;
    }

    let media = tokio::fs::read(&args.media)
        .await
        .with_context(|| format!("read {}", args.media.display()))?;

    let provider = LoopbackProvider::new(config.client_secret.clone(), OAUTH_DONE_HTML);
    let initiator = SessionInitiator::new(Some(provider), &config);
    eprintln!("==> Check your browser to sign in to Google");
    let profile = initiator.sign_in().await.context("sign in to Google")?;
    eprintln!("==> Signed in as {} <{}>", profile.name, profile.email);

    let metadata = UploadMetadata::new(args.title, args.description, args.tags)
        .with_category(args.category);
    let uploader = Uploader::from_config(&config);
    let url = uploader
        .upload(
            Bytes::from(media),
            &metadata,
            &profile.access_token,
            |percent| {
                eprint!("\r    uploaded {percent:5.1}%");
                let _ = std::io::stderr().flush();
            },
        )
        .await
        .context("upload video to YouTube")?;
    eprintln!();

    println!("{url}");
    Ok(())
}
