//! Browser-based OAuth 2.0 sign-in for desktop use.
//!
//! [`LoopbackProvider`] implements [`IdentityProvider`] with the installed-application flow: it
//! opens the user's browser on Google's consent page and catches the redirect on a one-shot
//! HTTP server bound to localhost, then exchanges the authorization code (with PKCE) for an
//! access token.
//!
//! See: <https://developers.google.com/identity/protocols/oauth2/native-app>

use crate::session::{IdentityProvider, TokenGrant};
use eyre::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, RedirectUrl,
    Scope, TokenResponse, TokenUrl,
};
use std::future::Future;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth2 token endpoint URL used to redeem authorization codes
const TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v3/token";

/// Page shown in the browser once the redirect has been received.
pub const OAUTH_DONE_HTML: &str = include_str!("../oauth_success.html");

/// What the browser brought back to the redirect endpoint.
#[derive(Debug)]
enum Redirect {
    Code(AuthorizationCode),
    Denied(String),
}

/// Obtains access tokens by walking the user through Google's consent screen in their browser.
#[derive(Debug, Clone)]
pub struct LoopbackProvider {
    client_secret: Option<String>,
    oauth_done_html: &'static str,
}

impl LoopbackProvider {
    /// Creates a provider for an installed-application OAuth client.
    ///
    /// # Arguments
    ///
    /// * `client_secret` - The OAuth client secret, if the client was issued one. For installed
    ///   applications this is embedded in the binary and not considered secret.
    /// * `oauth_done_html` - HTML content to display after the redirect is received
    pub fn new(client_secret: Option<String>, oauth_done_html: &'static str) -> Self {
        Self {
            client_secret,
            oauth_done_html,
        }
    }

    /// Performs a complete authorization code flow.
    ///
    /// 1. Starts a local HTTP server to receive the redirect
    /// 2. Opens the user's browser on the consent page
    /// 3. Exchanges the returned authorization code for an access token
    ///
    /// A refusal on the consent page comes back as [`TokenGrant::Denied`]; anything else that
    /// goes wrong is an error.
    ///
    /// # Panics
    ///
    /// Panics if hardcoded OAuth endpoint URLs are malformed (this should never happen
    /// in practice as the URLs are static and validated).
    pub async fn authorize(&self, client_id: &str, scopes: &[&str]) -> eyre::Result<TokenGrant> {
        let csrf = CsrfToken::new_random();
        let (redirect_url, eventually_redirect) = self
            .setup_redirect(csrf.clone())
            .await
            .context("set up redirect endpoint")?;

        let auth_url =
            AuthUrl::new(AUTH_URL.to_string()).expect("Invalid authorization endpoint URL");
        let token_url = TokenUrl::new(TOKEN_URL.to_string()).expect("Invalid token endpoint URL");
        let mut client = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);
        if let Some(secret) = &self.client_secret {
            client = client.set_client_secret(ClientSecret::new(secret.clone()));
        }

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, _csrf_token) = client
            // We never re-use the CSRF since we only go through the flow exactly once.
            .authorize_url(move || csrf.clone())
            .add_scopes(scopes.iter().map(|scope| Scope::new(scope.to_string())))
            .set_pkce_challenge(pkce_challenge)
            .url();

        tracing::info!(url = %auth_url, "asking user to follow OAuth flow");
        webbrowser::open(auth_url.as_ref()).context("open user's browser")?;
        let authorization_code = match eventually_redirect
            .await
            .context("await user authorization code")?
        {
            Redirect::Code(code) => code,
            Redirect::Denied(error) => {
                tracing::debug!(error, "user declined authorization");
                return Ok(TokenGrant::Denied(error));
            }
        };

        let http_client = oauth2::reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .build()
            .context("build token exchange HTTP client")?;
        let token = client
            .exchange_code(authorization_code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http_client)
            .await
            .context("exchange authorization code with access token")?;

        Ok(TokenGrant::Granted(token.access_token().clone()))
    }

    /// Sets up a local HTTP server to receive the OAuth authorization callback.
    ///
    /// Creates a temporary HTTP server on a random local port to handle the OAuth
    /// redirect after user authorization. The server validates the CSRF token and
    /// extracts either the authorization code or the error the consent page reported.
    ///
    /// # Returns
    ///
    /// A tuple containing:
    /// - The redirect URL to use in the OAuth flow
    /// - A future that resolves to what the redirect carried
    async fn setup_redirect(
        &self,
        csrf: CsrfToken,
    ) -> eyre::Result<(RedirectUrl, impl Future<Output = eyre::Result<Redirect>>)> {
        let socket = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind to localhost")?;
        let addr = socket.local_addr().context("get local address")?;
        let url = RedirectUrl::new(format!("http://{}:{}", addr.ip(), addr.port()))
            .context("construct redirect url")?;
        let (tx, rx) = tokio::sync::oneshot::channel();
        let oauth_done = self.oauth_done_html;
        tokio::spawn(async move {
            let r = async move {
                let (conn, _) = socket.accept().await.context("accept")?;
                let conn = hyper_util::rt::TokioIo::new(conn);
                let (got, mut gotten) = tokio::sync::mpsc::channel(1);
                let service = service_fn(move |req: Request<body::Incoming>| {
                    let csrf = csrf.clone();
                    let got = got.clone();
                    async move {
                        let mut presented_state = None;
                        let mut presented_code = None;
                        let mut presented_error = None;
                        for (k, v) in
                            form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
                        {
                            match &*k {
                                "state" => presented_state = Some(v),
                                "code" => presented_code = Some(v),
                                "error" => presented_error = Some(v),
                                _ => {}
                            }
                        }
                        if presented_state.as_deref() != Some(csrf.secret().as_str()) {
                            return Err("invalid csrf token");
                        }
                        let redirect = match (presented_error, presented_code) {
                            (Some(error), _) => Redirect::Denied(error.into_owned()),
                            (None, Some(code)) => {
                                Redirect::Code(AuthorizationCode::new(code.into_owned()))
                            }
                            (None, None) => return Err("no authorization code found"),
                        };
                        if got.send(redirect).await.is_err() {
                            return Err("redirect already handled");
                        }
                        Ok(Response::new(Full::<Bytes>::from(oauth_done)))
                    }
                });
                let mut serve = std::pin::pin!(
                    hyper::server::conn::http1::Builder::new().serve_connection(conn, service)
                );

                tokio::select! {
                    exit = &mut serve => {
                        if let Err(e) = exit {
                            Err(e).context("redirect server got bad request")
                        } else {
                            eyre::bail!("redirect server exit prematurely");
                        }
                    }
                    redirect = gotten.recv() => {
                        let redirect =
                            redirect.ok_or_else(|| eyre::eyre!("redirect service dropped"))?;
                        // Let the browser receive the "done" page before closing.
                        serve.as_mut().graceful_shutdown();
                        let _ = serve.await;
                        Ok(redirect)
                    }
                }
            };
            let _ = tx.send(r.await);
        });
        Ok((url, async move {
            rx.await.context("redirect future dropped prematurely")?
        }))
    }
}

impl IdentityProvider for LoopbackProvider {
    fn request_token(
        &self,
        client_id: &str,
        scopes: &[&str],
    ) -> impl Future<Output = TokenGrant> + Send {
        async move {
            match self.authorize(client_id, scopes).await {
                Ok(grant) => grant,
                Err(e) => TokenGrant::Denied(format!("{e:#}")),
            }
        }
    }
}
