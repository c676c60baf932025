//! YouTube Data API v3 upload client.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use youtube_upload::config::Config;
//! use youtube_upload::youtube_api::{UploadMetadata, Uploader};
//!
//! # async fn example(access_token: oauth2::AccessToken) -> eyre::Result<()> {
//! let uploader = Uploader::from_config(&Config::from_env());
//! let metadata = UploadMetadata::new("Episode 1", "Pilot episode", ["podcast"]);
//! let media = Bytes::from(tokio::fs::read("episode-1.webm").await?);
//!
//! let url = uploader
//!     .upload(media, &metadata, &access_token, |percent| eprintln!("{percent:.0}%"))
//!     .await?;
//! println!("uploaded to {url}");
//! # Ok(())
//! # }
//! ```

pub mod upload;
pub mod videos;

pub use upload::{UploadError, UploadSession, Uploader};
pub use videos::{DEFAULT_CATEGORY_ID, PrivacyStatus, UploadMetadata, UploadedVideo};
