use std::fmt::{self, Debug};
use std::future::ready;
use std::sync::{Arc, Mutex, MutexGuard};

use ellen_chat_model::{Credential, IdentityProvider, Principal};
use reqwest::{Client, StatusCode, header};
use tracing::Instrument;

use crate::proto::UserRecord;
use crate::{Error, SupabaseConfig, endpoint};

/// Identity provider backed by a Supabase project.
///
/// The provider holds the access token of an already signed-in user. The
/// token is handed out as the session credential as is, and the principal
/// is resolved by asking the project's auth service about the token.
///
/// Clones share the token, so signing out through one clone signs out all
/// of them.
#[derive(Clone)]
pub struct SupabaseIdentity {
    client: Client,
    config: Arc<SupabaseConfig>,
    access_token: Arc<Mutex<Option<String>>>,
}

impl SupabaseIdentity {
    /// Creates a new `SupabaseIdentity` with the given configuration.
    #[inline]
    pub fn new(config: SupabaseConfig) -> Self {
        let access_token = Arc::new(Mutex::new(config.access_token.clone()));
        Self {
            client: Client::new(),
            config: Arc::new(config),
            access_token,
        }
    }

    /// Signs the user out.
    ///
    /// The token is forgotten right away, then the project's auth service
    /// is asked to revoke it. The user stays signed out locally even if the
    /// revocation fails. Signing out while signed out does nothing.
    pub async fn sign_out(&self) -> Result<(), Error> {
        let token = self.token().take();
        let Some(token) = token else {
            debug!("already signed out");
            return Ok(());
        };

        let url = endpoint(&self.config.project_url, &["auth", "v1", "logout"])?;
        let resp = self
            .client
            .post(url)
            .header("apikey", &self.config.anon_key)
            .header(header::AUTHORIZATION, Credential::new(token).bearer())
            .send()
            .instrument(debug_span!("http request", route = "POST /auth/v1/logout"))
            .await?;
        if matches!(
            resp.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            // The token had already expired.
            return Ok(());
        }
        resp.error_for_status()?;
        Ok(())
    }

    fn token(&self) -> MutexGuard<'_, Option<String>> {
        self.access_token
            .lock()
            .unwrap_or_else(|err| err.into_inner())
    }
}

impl Debug for SupabaseIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseIdentity")
            .field("config", &self.config)
            .field("signed_in", &self.token().is_some())
            .finish()
    }
}

impl IdentityProvider for SupabaseIdentity {
    type Error = Error;

    fn current_principal(
        &self,
    ) -> impl Future<Output = Result<Option<Principal>, Self::Error>> + Send + 'static
    {
        let token = self.token().clone();
        let req = token.map(|token| {
            endpoint(&self.config.project_url, &["auth", "v1", "user"]).map(
                |url| {
                    self.client
                        .get(url)
                        .header("apikey", &self.config.anon_key)
                        .header(
                            header::AUTHORIZATION,
                            Credential::new(token).bearer(),
                        )
                },
            )
        });

        async move {
            let Some(req) = req.transpose()? else {
                debug!("no access token configured");
                return Ok(None);
            };
            let resp = req.send().await?;
            if matches!(
                resp.status(),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
            ) {
                warn!("the access token was refused: {}", resp.status());
                return Ok(None);
            }
            let user: UserRecord = resp.error_for_status()?.json().await?;
            Ok(Some(Principal::from(user)))
        }
        .instrument(debug_span!("http request", route = "GET /auth/v1/user"))
    }

    fn session_token(
        &self,
    ) -> impl Future<Output = Result<Option<Credential>, Self::Error>> + Send + 'static
    {
        ready(Ok(self.token().as_deref().map(Credential::new)))
    }
}

#[cfg(test)]
mod tests {
    use ellen_chat_model::{BackendError, ErrorKind};

    use super::*;
    use crate::SupabaseConfigBuilder;

    #[tokio::test]
    async fn test_signed_out() {
        let identity = SupabaseIdentity::new(
            SupabaseConfigBuilder::with_project("http://127.0.0.1:9", "key")
                .build(),
        );
        assert_eq!(identity.current_principal().await.unwrap(), None);
        assert_eq!(identity.session_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_session_token() {
        let identity = SupabaseIdentity::new(
            SupabaseConfigBuilder::with_project("http://127.0.0.1:9", "key")
                .with_access_token("jwt")
                .build(),
        );
        let credential = identity.session_token().await.unwrap().unwrap();
        assert_eq!(credential.token(), "jwt");
    }

    #[tokio::test]
    async fn test_sign_out() {
        let identity = SupabaseIdentity::new(
            SupabaseConfigBuilder::with_project("http://127.0.0.1:9", "key")
                .with_access_token("jwt")
                .build(),
        );
        let shared = identity.clone();

        // Nothing listens on the discard port, so the revocation fails.
        let err = identity.sign_out().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(identity.session_token().await.unwrap(), None);
        assert_eq!(shared.session_token().await.unwrap(), None);
        assert_eq!(shared.current_principal().await.unwrap(), None);

        identity.sign_out().await.unwrap();
    }

    #[test]
    fn test_debug_redacts_token() {
        let identity = SupabaseIdentity::new(
            SupabaseConfigBuilder::with_project("http://127.0.0.1:9", "key")
                .with_access_token("jwt")
                .build(),
        );
        let debug = format!("{identity:?}");
        assert!(!debug.contains("jwt"));
        assert!(debug.contains("signed_in: true"));
    }
}
