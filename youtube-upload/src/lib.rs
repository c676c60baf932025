//! Google sign-in and resumable YouTube uploads for the channel studio.
//!
//! The flow is two steps. A [`session::SessionInitiator`] obtains an access token from an
//! [`session::IdentityProvider`] and turns it into a [`session::UserProfile`]. The profile's token
//! is then handed to a [`youtube_api::Uploader`] together with the media and its metadata, which
//! returns the new video's watch URL.

pub mod config;
pub mod oauth;
pub mod session;
pub mod youtube_api;

pub use config::Config;
pub use session::{SessionError, SessionInitiator, UserProfile};
pub use youtube_api::{UploadError, UploadMetadata, Uploader};
