//! Runtime configuration for sign-in and uploads.
//!
//! Everything here is plain data. [`Config::from_env`] is the only place that reads the process
//! environment; tests build configurations directly or through [`Config::from_lookup`].

use crate::youtube_api::videos::PrivacyStatus;

/// OAuth client used when `GOOGLE_CLIENT_ID` is not set.
pub const DEFAULT_CLIENT_ID: &str =
    "890331838183-0omv0jmid44m3leb5rladr7831gm9644.apps.googleusercontent.com";

/// Environment variable selecting the OAuth client.
pub const CLIENT_ID_VAR: &str = "GOOGLE_CLIENT_ID";

/// Environment variable holding the OAuth client secret, if the client has one.
pub const CLIENT_SECRET_VAR: &str = "GOOGLE_CLIENT_SECRET";

/// Content type declared for uploaded media unless overridden.
pub const DEFAULT_CONTENT_TYPE: &str = "video/webm";

/// 256 KiB, the granularity YouTube recommends for resumable upload chunks.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Top-level configuration shared by the session initiator and the uploader.
#[derive(Debug, Clone)]
pub struct Config {
    /// The OAuth client to authenticate against.
    ///
    /// `None` (or an empty string) makes sign-in fail with a configuration error.
    pub client_id: Option<String>,
    /// Secret for installed-application clients. Web clients have none.
    pub client_secret: Option<String>,
    pub endpoints: ApiEndpoints,
    pub policy: UploadPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: Some(DEFAULT_CLIENT_ID.to_string()),
            client_secret: None,
            endpoints: ApiEndpoints::default(),
            policy: UploadPolicy::default(),
        }
    }
}

impl Config {
    /// Reads `GOOGLE_CLIENT_ID` and `GOOGLE_CLIENT_SECRET` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// An unset or empty client id falls back to [`DEFAULT_CLIENT_ID`]; an unset or empty
    /// secret means the client has none.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());
        let client_id = non_empty(CLIENT_ID_VAR).unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());
        Self {
            client_id: Some(client_id),
            client_secret: non_empty(CLIENT_SECRET_VAR),
            ..Self::default()
        }
    }
}

/// Remote endpoints the core talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    /// Resumable upload session endpoint for `videos.insert`.
    pub upload: String,
    /// OpenID user-info endpoint returning `{email, name, picture}`.
    pub userinfo: String,
    /// Prefix of the canonical watch URL; the video id is appended after a `/`.
    pub watch_base: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            upload: "https://www.googleapis.com/upload/youtube/v3/videos".to_string(),
            userinfo: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
            watch_base: "https://youtu.be".to_string(),
        }
    }
}

impl ApiEndpoints {
    /// Points the upload and user-info endpoints at another host, keeping the Google paths.
    ///
    /// The watch URL base is left untouched.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            upload: format!("{base}/upload/youtube/v3/videos"),
            userinfo: format!("{base}/oauth2/v3/userinfo"),
            ..Self::default()
        }
    }
}

/// Per-client settings applied to every upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub privacy: PrivacyStatus,
    /// Value sent as `selfDeclaredMadeForKids`.
    pub made_for_kids: bool,
    /// Declared both when starting the session and on the byte transfer.
    pub content_type: String,
    /// Size of the pieces the media is handed to the transport in.
    ///
    /// Progress is reported once per chunk.
    pub chunk_size: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            privacy: PrivacyStatus::Private,
            made_for_kids: false,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}
