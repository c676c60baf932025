//! YouTube Videos API types used by `videos.insert`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category used when the caller does not pick one.
///
/// `25` is "News & Politics" in the YouTube category list.
pub const DEFAULT_CATEGORY_ID: &str = "25";

/// Caller-supplied description of the video being uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadMetadata {
    pub title: String,
    pub description: String,
    /// Keyword tags, sent in the order given.
    pub tags: Vec<String>,
    /// Numeric YouTube video category id, as a string.
    pub category_id: String,
}

impl UploadMetadata {
    /// Creates metadata in the [`DEFAULT_CATEGORY_ID`] category.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            tags: tags.into_iter().map(Into::into).collect(),
            category_id: DEFAULT_CATEGORY_ID.to_string(),
        }
    }

    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = category_id.into();
        self
    }
}

/// Visibility of an uploaded video.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#status.privacyStatus>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrivacyStatus {
    /// Only the owner can see the video.
    #[default]
    #[serde(rename = "private")]
    Private,
    /// Anyone with the link can see the video.
    #[serde(rename = "unlisted")]
    Unlisted,
    /// Everyone can see the video.
    #[serde(rename = "public")]
    Public,
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Private => "private",
            Self::Unlisted => "unlisted",
            Self::Public => "public",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized privacy status `{0}` (expected private, unlisted, or public)")]
pub struct UnknownPrivacyStatus(String);

impl FromStr for PrivacyStatus {
    type Err = UnknownPrivacyStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "unlisted" => Ok(Self::Unlisted),
            "public" => Ok(Self::Public),
            _ => Err(UnknownPrivacyStatus(s.to_string())),
        }
    }
}

/// Request body for starting a resumable `videos.insert` with `part=snippet,status`.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos/insert>
#[derive(Debug, Serialize)]
pub(crate) struct VideoInsertRequest<'a> {
    pub snippet: VideoSnippet<'a>,
    pub status: VideoStatus,
}

/// See: <https://developers.google.com/youtube/v3/docs/videos#snippet>
#[derive(Debug, Serialize)]
pub(crate) struct VideoSnippet<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub tags: &'a [String],
    #[serde(rename = "categoryId")]
    pub category_id: &'a str,
}

/// See: <https://developers.google.com/youtube/v3/docs/videos#status>
#[derive(Debug, Serialize)]
pub(crate) struct VideoStatus {
    #[serde(rename = "privacyStatus")]
    pub privacy_status: PrivacyStatus,
    #[serde(rename = "selfDeclaredMadeForKids")]
    pub self_declared_made_for_kids: bool,
}

/// The part of the `video` resource returned by a completed upload that we use.
#[derive(Debug, Deserialize)]
pub struct UploadedVideo {
    /// The ID that YouTube uses to uniquely identify the video.
    pub id: String,
}
