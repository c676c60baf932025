//! Resumable video uploads.
//!
//! An upload runs in two strictly sequential phases:
//!
//! 1. **Session initiation**: a `POST` to the `videos.insert` endpoint with
//!    `uploadType=resumable` declares the media length, content type, and video metadata. YouTube
//!    answers with a session URI in the `Location` header.
//! 2. **Byte transfer**: the media is `PUT` to that session URI. Progress is reported as chunks
//!    are handed to the transport, and the final response carries the new video's id.
//!
//! Interrupted transfers are not resumed and nothing is retried; every failure is returned to
//! the caller as an [`UploadError`].
//!
//! See: <https://developers.google.com/youtube/v3/guides/using_resumable_upload_protocol>

use crate::config::{ApiEndpoints, Config, UploadPolicy};
use crate::youtube_api::videos::{
    UploadMetadata, UploadedVideo, VideoInsertRequest, VideoSnippet, VideoStatus,
};
use bytes::Bytes;
use http::StatusCode;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use oauth2::AccessToken;
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::instrument;

/// Ways an upload can fail.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Starting the upload session was refused.
    #[error("upload initiation failed with status {status}: {body}")]
    Initiation { status: StatusCode, body: String },
    /// Session initiation succeeded but the response named no session URI.
    #[error("no upload URL received from YouTube")]
    MissingUploadTarget,
    /// The byte transfer finished with a non-success status.
    #[error("upload failed with status {status}")]
    Transfer { status: StatusCode },
    /// The transfer succeeded but its response did not describe a video.
    #[error("could not parse the uploaded video resource")]
    MalformedResponse(#[source] reqwest::Error),
    /// The request never reached a terminal status.
    #[error("network error during upload")]
    Network(#[source] reqwest::Error),
}

/// Client for YouTube resumable uploads.
///
/// The client holds only immutable settings and a cloneable HTTP client, so a single instance can
/// drive any number of concurrent uploads.
#[derive(Debug, Clone)]
pub struct Uploader {
    client: reqwest::Client,
    endpoints: ApiEndpoints,
    policy: UploadPolicy,
}

impl Uploader {
    pub fn new(client: reqwest::Client, endpoints: ApiEndpoints, policy: UploadPolicy) -> Self {
        Self {
            client,
            endpoints,
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            reqwest::Client::new(),
            config.endpoints.clone(),
            config.policy.clone(),
        )
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Uploads `media` as a new video and returns its watch URL.
    ///
    /// `on_progress` receives the percentage of bytes handed to the transport so far. Values
    /// never decrease, the last one is `100.0` for a successful non-empty upload, and every call
    /// happens before this future resolves. Nothing is reported for empty media.
    ///
    /// The access token needs the `https://www.googleapis.com/auth/youtube.upload` scope.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/videos/insert>
    #[instrument(skip_all, fields(title = %metadata.title, bytes = media.len()))]
    pub async fn upload<F>(
        &self,
        media: Bytes,
        metadata: &UploadMetadata,
        access_token: &AccessToken,
        on_progress: F,
    ) -> Result<String, UploadError>
    where
        F: FnMut(f64),
    {
        let session = self
            .start_session(media.len() as u64, metadata, access_token)
            .await?;
        let video = session
            .transfer(&self.client, media, self.policy.chunk_size, on_progress)
            .await?;

        tracing::debug!(video_id = video.id, "upload complete");
        Ok(self.watch_url(&video.id))
    }

    /// Negotiates a resumable upload session for `total_bytes` of media.
    ///
    /// Each call opens a fresh session; the returned [`UploadSession`] is consumed by exactly one
    /// transfer.
    #[instrument(skip(self, metadata, access_token), level = tracing::Level::DEBUG)]
    pub async fn start_session(
        &self,
        total_bytes: u64,
        metadata: &UploadMetadata,
        access_token: &AccessToken,
    ) -> Result<UploadSession, UploadError> {
        let body = VideoInsertRequest {
            snippet: VideoSnippet {
                title: &metadata.title,
                description: &metadata.description,
                tags: &metadata.tags,
                category_id: &metadata.category_id,
            },
            status: VideoStatus {
                privacy_status: self.policy.privacy,
                self_declared_made_for_kids: self.policy.made_for_kids,
            },
        };

        let response = self
            .client
            .post(&self.endpoints.upload)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .header("Authorization", format!("Bearer {}", access_token.secret()))
            .header("X-Upload-Content-Length", total_bytes)
            .header("X-Upload-Content-Type", &self.policy.content_type)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(UploadError::Network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(UploadError::Initiation { status, body });
        }

        // The session URI is normally absolute, but resolve it against the request URL anyway.
        let target = response
            .headers()
            .get(LOCATION)
            .and_then(|location| location.to_str().ok())
            .and_then(|location| response.url().join(location).ok())
            .ok_or(UploadError::MissingUploadTarget)?;

        tracing::debug!(%target, "opened resumable upload session");
        Ok(UploadSession {
            target,
            total_bytes,
            content_type: self.policy.content_type.clone(),
        })
    }

    fn watch_url(&self, video_id: &str) -> String {
        format!(
            "{}/{}",
            self.endpoints.watch_base.trim_end_matches('/'),
            video_id
        )
    }
}

/// A negotiated upload session, valid for a single transfer.
#[derive(Debug)]
pub struct UploadSession {
    target: Url,
    total_bytes: u64,
    content_type: String,
}

impl UploadSession {
    /// The provider-issued URI the media must be sent to.
    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Sends the whole of `media` to the session URI.
    ///
    /// Progress notifications flow from the request body stream over a channel and are drained
    /// while the request is in flight, then once more after it completes, so that all of them
    /// reach `on_progress` before the outcome is returned.
    #[instrument(skip_all, fields(target = %self.target), level = tracing::Level::DEBUG)]
    pub async fn transfer<F>(
        self,
        client: &reqwest::Client,
        media: Bytes,
        chunk_size: usize,
        mut on_progress: F,
    ) -> Result<UploadedVideo, UploadError>
    where
        F: FnMut(f64),
    {
        let total = self.total_bytes;
        let mut report = |sent: u64| {
            // A zero-length body has no computable progress.
            if total > 0 {
                let percent = sent as f64 / total as f64 * 100.0;
                tracing::trace!(sent, total, percent, "upload progress");
                on_progress(percent);
            }
        };

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let body = reqwest::Body::wrap_stream(chunked_body(media, chunk_size, progress_tx));
        let send = client
            .put(self.target)
            .header(CONTENT_TYPE, self.content_type)
            .header(CONTENT_LENGTH, total)
            .body(body)
            .send();
        let mut send = std::pin::pin!(send);

        let response = loop {
            tokio::select! {
                biased;
                Some(sent) = progress_rx.recv() => report(sent),
                response = &mut send => break response,
            }
        };
        while let Ok(sent) = progress_rx.try_recv() {
            report(sent);
        }

        let response = response.map_err(UploadError::Network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Transfer { status });
        }

        response
            .json::<UploadedVideo>()
            .await
            .map_err(UploadError::MalformedResponse)
    }
}

/// Splits `media` into `chunk_size` pieces, sending the cumulative byte count on `progress` as
/// each piece is handed out.
fn chunked_body(
    mut media: Bytes,
    chunk_size: usize,
    progress: mpsc::UnboundedSender<u64>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let chunk_size = chunk_size.max(1);
    async_stream::stream! {
        let mut sent = 0u64;
        while !media.is_empty() {
            let chunk = media.split_to(chunk_size.min(media.len()));
            sent += chunk.len() as u64;
            // The receiver only goes away once the caller has stopped listening.
            let _ = progress.send(sent);
            yield Ok(chunk);
        }
    }
}
