use std::fmt::Debug;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_SESSION_HEADER: &str = "X-Session-Id";

/// Builder for [`BackendConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BackendConfigBuilder {
    base_url: Option<String>,
    session_header: Option<String>,
}

impl BackendConfigBuilder {
    /// Creates a builder with default settings.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL of the chat service.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the response header carrying the conversation identifier.
    #[inline]
    pub fn with_session_header<S: Into<String>>(mut self, name: S) -> Self {
        self.session_header = Some(name.into());
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> BackendConfig {
        BackendConfig {
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            session_header: self
                .session_header
                .unwrap_or_else(|| DEFAULT_SESSION_HEADER.to_string()),
        }
    }
}

/// Configuration for the chat service.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BackendConfig {
    pub(crate) base_url: String,
    pub(crate) session_header: String,
}

impl BackendConfig {
    /// Returns the base URL of the chat service.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Builder for [`SupabaseConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SupabaseConfigBuilder {
    project_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl SupabaseConfigBuilder {
    /// Creates a builder for the given project.
    #[inline]
    pub fn with_project<U, K>(project_url: U, anon_key: K) -> Self
    where
        U: Into<String>,
        K: Into<String>,
    {
        Self {
            project_url: project_url.into(),
            anon_key: anon_key.into(),
            access_token: None,
        }
    }

    /// Sets the access token of the signed-in user.
    #[inline]
    pub fn with_access_token<S: Into<String>>(mut self, token: S) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> SupabaseConfig {
        SupabaseConfig {
            project_url: self.project_url,
            anon_key: self.anon_key,
            access_token: self.access_token.filter(|token| !token.is_empty()),
        }
    }
}

impl Debug for SupabaseConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfigBuilder")
            .field("project_url", &self.project_url)
            .field("anon_key", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Configuration for the Supabase identity provider.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SupabaseConfig {
    pub(crate) project_url: String,
    pub(crate) anon_key: String,
    pub(crate) access_token: Option<String>,
}

impl Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("project_url", &self.project_url)
            .field("anon_key", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
