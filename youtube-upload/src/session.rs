//! Google sign-in for the uploader.
//!
//! The token-granting flow itself belongs to an [`IdentityProvider`] supplied by the host: the
//! browser-based [`crate::oauth::LoopbackProvider`] for desktop use, or a stub in tests. This
//! module only checks that sign-in is configured, asks the provider for a token, and trades a
//! granted token for the user's profile.
//!
//! Nothing is cached between calls. Token lifetime is entirely the provider's business, and a
//! failed step is reported once and never retried.

use crate::config::Config;
use oauth2::AccessToken;
use serde::Deserialize;
use std::future::Future;
use tracing::instrument;

/// Scopes requested on every sign-in: uploading videos plus the basic profile.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/youtube.upload",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

/// Outcome of a single token request.
#[derive(Debug, Clone)]
pub enum TokenGrant {
    /// The user granted the requested scopes.
    Granted(AccessToken),
    /// The provider declined, with its error code (e.g. `access_denied`).
    Denied(String),
}

/// A source of OAuth access tokens.
pub trait IdentityProvider {
    /// Runs one token request for `client_id` asking for `scopes`.
    ///
    /// Resolves exactly once. Failures of the provider itself are reported as
    /// [`TokenGrant::Denied`].
    fn request_token(
        &self,
        client_id: &str,
        scopes: &[&str],
    ) -> impl Future<Output = TokenGrant> + Send;
}

/// The signed-in user.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
    /// Avatar URL. Empty if the account has none.
    pub picture: String,
    /// Short-lived bearer token for the granted scopes. Never written to disk.
    pub access_token: AccessToken,
}

/// Why sign-in failed.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Sign-in cannot even start; an operator has to fix the setup.
    #[error("{0}")]
    Configuration(String),
    /// The identity provider declined the grant. The provider's message is kept verbatim.
    #[error("{0}")]
    Provider(String),
    /// The user-info lookup failed.
    #[error("failed to fetch user profile")]
    ProfileFetch(#[source] reqwest::Error),
}

/// Body of the OpenID user-info endpoint.
#[derive(Debug, Deserialize)]
struct UserInfo {
    email: String,
    /// Optional claims; absent ones come back as empty strings.
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: String,
}

/// Starts Google sign-in through an injected [`IdentityProvider`].
#[derive(Debug)]
pub struct SessionInitiator<P> {
    provider: Option<P>,
    client_id: Option<String>,
    userinfo_url: String,
    client: reqwest::Client,
}

impl<P: IdentityProvider> SessionInitiator<P> {
    /// `provider` is `None` when the host has no identity provider available; sign-in then fails
    /// with a configuration error.
    pub fn new(provider: Option<P>, config: &Config) -> Self {
        Self {
            provider,
            client_id: config.client_id.clone(),
            userinfo_url: config.endpoints.userinfo.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Prepares a sign-in whose outcome is delivered to one of two callbacks.
    ///
    /// If sign-in is not configured, `on_error` is called once right away and `None` is
    /// returned. Otherwise nothing happens until [`SessionHandle::request_access_token`] is
    /// called on the returned handle.
    pub fn initiate_session<S, E>(
        &self,
        on_success: S,
        mut on_error: E,
    ) -> Option<SessionHandle<'_, P, S, E>>
    where
        S: FnMut(UserProfile),
        E: FnMut(SessionError),
    {
        match self.configured() {
            Ok(_) => Some(SessionHandle {
                initiator: self,
                on_success,
                on_error,
            }),
            Err(e) => {
                on_error(e);
                None
            }
        }
    }

    /// Runs one complete sign-in: token request, then profile lookup.
    #[instrument(skip(self))]
    pub async fn sign_in(&self) -> Result<UserProfile, SessionError> {
        let (provider, client_id) = self.configured()?;

        match provider.request_token(client_id, SCOPES).await {
            TokenGrant::Denied(error) => {
                tracing::debug!(error, "identity provider declined the grant");
                Err(SessionError::Provider(error))
            }
            TokenGrant::Granted(access_token) => self.fetch_profile(access_token).await,
        }
    }

    fn configured(&self) -> Result<(&P, &str), SessionError> {
        let Some(provider) = &self.provider else {
            return Err(SessionError::Configuration(
                "Google identity provider is not loaded".to_string(),
            ));
        };
        let Some(client_id) = self.client_id.as_deref().filter(|id| !id.trim().is_empty()) else {
            return Err(SessionError::Configuration(format!(
                "missing Google client ID; set {}",
                crate::config::CLIENT_ID_VAR
            )));
        };
        Ok((provider, client_id))
    }

    /// Exchanges a granted token for the user's profile.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/identity/openid-connect/openid-connect#obtaininguserprofileinformation>
    #[instrument(skip_all, level = tracing::Level::DEBUG)]
    async fn fetch_profile(&self, access_token: AccessToken) -> Result<UserProfile, SessionError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .header("Authorization", format!("Bearer {}", access_token.secret()))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(SessionError::ProfileFetch)?;

        let info: UserInfo = response.json().await.map_err(SessionError::ProfileFetch)?;

        tracing::debug!(email = info.email, "fetched user profile");
        Ok(UserProfile {
            email: info.email,
            name: info.name,
            picture: info.picture,
            access_token,
        })
    }
}

/// A configured sign-in, ready to be triggered.
pub struct SessionHandle<'a, P, S, E> {
    initiator: &'a SessionInitiator<P>,
    on_success: S,
    on_error: E,
}

impl<P, S, E> SessionHandle<'_, P, S, E>
where
    P: IdentityProvider,
    S: FnMut(UserProfile),
    E: FnMut(SessionError),
{
    /// Requests a token and delivers the outcome to exactly one of the callbacks.
    ///
    /// May be called again for another attempt; every call starts from scratch.
    pub async fn request_access_token(&mut self) {
        match self.initiator.sign_in().await {
            Ok(profile) => (self.on_success)(profile),
            Err(e) => (self.on_error)(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiEndpoints;
    use mockito::Server;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Hands out a fixed grant and records what it was asked for.
    struct StubProvider {
        grant: TokenGrant,
        requests: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl StubProvider {
        fn new(grant: TokenGrant) -> Self {
            Self {
                grant,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl IdentityProvider for StubProvider {
        fn request_token(
            &self,
            client_id: &str,
            scopes: &[&str],
        ) -> impl Future<Output = TokenGrant> + Send {
            self.requests.lock().unwrap().push((
                client_id.to_string(),
                scopes.iter().map(|s| s.to_string()).collect(),
            ));
            let grant = self.grant.clone();
            async move { grant }
        }
    }

    fn config(server: &Server) -> Config {
        Config {
            client_id: Some("test-client.apps.googleusercontent.com".to_string()),
            endpoints: ApiEndpoints::with_base(&server.url()),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn signs_in_and_fetches_profile() {
        let mut server = Server::new_async().await;
        let userinfo = server
            .mock("GET", "/oauth2/v3/userinfo")
            .match_header("authorization", "Bearer granted-token")
            .with_status(200)
            .with_body(
                r#"{
                    "sub": "1234",
                    "email": "host@example.com",
                    "name": "Podcast Host",
                    "picture": "https://example.com/avatar.png"
                }"#,
            )
            .create_async()
            .await;

        let provider = StubProvider::new(TokenGrant::Granted(AccessToken::new(
            "granted-token".to_string(),
        )));
        let initiator = SessionInitiator::new(Some(provider), &config(&server));

        let mut profiles = Vec::new();
        let mut errors = Vec::new();
        {
            let mut handle = initiator
                .initiate_session(|p| profiles.push(p), |e| errors.push(e))
                .expect("sign-in is configured");
            handle.request_access_token().await;
        }

        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(profiles.len(), 1);
        let profile = &profiles[0];
        assert_eq!(profile.email, "host@example.com");
        assert_eq!(profile.name, "Podcast Host");
        assert_eq!(profile.picture, "https://example.com/avatar.png");
        assert_eq!(profile.access_token.secret(), "granted-token");
        userinfo.assert_async().await;

        let requests = initiator.provider.as_ref().unwrap().requests.lock().unwrap();
        assert_eq!(
            *requests,
            vec![(
                "test-client.apps.googleusercontent.com".to_string(),
                SCOPES.iter().map(|s| s.to_string()).collect::<Vec<_>>()
            )]
        );
    }

    #[tokio::test]
    async fn missing_provider_fails_immediately() {
        let server = Server::new_async().await;
        let initiator = SessionInitiator::<StubProvider>::new(None, &config(&server));

        let mut successes = 0;
        let mut errors = Vec::new();
        let handle = initiator.initiate_session(|_| successes += 1, |e| errors.push(e));

        assert!(handle.is_none());
        drop(handle);
        assert_eq!(successes, 0);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], SessionError::Configuration(_)));
        assert!(errors[0].to_string().contains("not loaded"), "{}", errors[0]);
    }

    #[tokio::test]
    async fn missing_client_id_fails_immediately() {
        let server = Server::new_async().await;
        let config = Config {
            client_id: Some(String::new()),
            ..config(&server)
        };
        let provider = StubProvider::new(TokenGrant::Denied("unused".to_string()));
        let initiator = SessionInitiator::new(Some(provider), &config);

        let mut errors = Vec::new();
        let handle = initiator.initiate_session(|_| panic!("no profile expected"), |e| {
            errors.push(e)
        });

        assert!(handle.is_none());
        drop(handle);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("GOOGLE_CLIENT_ID"), "{}", errors[0]);
        assert!(initiator.provider.as_ref().unwrap().requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_error_is_passed_through() {
        let mut server = Server::new_async().await;
        let userinfo = server
            .mock("GET", "/oauth2/v3/userinfo")
            .expect(0)
            .create_async()
            .await;

        let provider = StubProvider::new(TokenGrant::Denied("access_denied".to_string()));
        let initiator = SessionInitiator::new(Some(provider), &config(&server));

        let mut errors = Vec::new();
        {
            let mut handle = initiator
                .initiate_session(|_| panic!("no profile expected"), |e| errors.push(e))
                .expect("sign-in is configured");
            handle.request_access_token().await;
        }

        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], SessionError::Provider(e) if e == "access_denied"));
        assert_eq!(errors[0].to_string(), "access_denied");
        userinfo.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_profile_request() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/oauth2/v3/userinfo")
            .with_status(401)
            .with_body(r#"{"error": "invalid_token"}"#)
            .create_async()
            .await;

        let provider = StubProvider::new(TokenGrant::Granted(AccessToken::new(
            "stale".to_string(),
        )));
        let initiator = SessionInitiator::new(Some(provider), &config(&server));

        let err = initiator.sign_in().await.unwrap_err();
        assert!(matches!(err, SessionError::ProfileFetch(_)), "{err:?}");
        assert_eq!(err.to_string(), "failed to fetch user profile");
    }

    #[tokio::test]
    async fn malformed_profile_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/oauth2/v3/userinfo")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let provider = StubProvider::new(TokenGrant::Granted(AccessToken::new(
            "token".to_string(),
        )));
        let initiator = SessionInitiator::new(Some(provider), &config(&server));

        let err = initiator.sign_in().await.unwrap_err();
        assert!(matches!(err, SessionError::ProfileFetch(_)), "{err:?}");
    }

    #[tokio::test]
    async fn profile_without_optional_claims() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/oauth2/v3/userinfo")
            .with_status(200)
            .with_body(r#"{"email": "a@b.c", "name": "A"}"#)
            .create_async()
            .await;

        let provider = StubProvider::new(TokenGrant::Granted(AccessToken::new(
            "token".to_string(),
        )));
        let initiator = SessionInitiator::new(Some(provider), &config(&server));

        let profile = initiator.sign_in().await.unwrap();
        assert_eq!(profile.email, "a@b.c");
        assert_eq!(profile.name, "A");
        assert_eq!(profile.picture, "");
    }

    #[tokio::test]
    async fn profile_without_email() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/oauth2/v3/userinfo")
            .with_status(200)
            .with_body(r#"{"name": "A", "picture": "p"}"#)
            .create_async()
            .await;

        let provider = StubProvider::new(TokenGrant::Granted(AccessToken::new(
            "token".to_string(),
        )));
        let initiator = SessionInitiator::new(Some(provider), &config(&server));

        let err = initiator.sign_in().await.unwrap_err();
        assert!(matches!(err, SessionError::ProfileFetch(_)), "{err:?}");
    }

    #[tokio::test]
    async fn each_trigger_starts_over() {
        let mut server = Server::new_async().await;
        let userinfo = server
            .mock("GET", "/oauth2/v3/userinfo")
            .with_status(200)
            .with_body(r#"{"email": "a@b.c", "name": "A", "picture": "p"}"#)
            .expect(2)
            .create_async()
            .await;

        let provider = StubProvider::new(TokenGrant::Granted(AccessToken::new(
            "token".to_string(),
        )));
        let initiator = SessionInitiator::new(Some(provider), &config(&server));

        let mut successes = 0;
        {
            let mut handle = initiator
                .initiate_session(|_| successes += 1, |e| panic!("unexpected error: {e}"))
                .expect("sign-in is configured");
            handle.request_access_token().await;
            handle.request_access_token().await;
        }

        assert_eq!(successes, 2);
        assert_eq!(initiator.provider.as_ref().unwrap().requests.lock().unwrap().len(), 2);
        userinfo.assert_async().await;
    }
}
