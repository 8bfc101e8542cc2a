//! Proxy configuration surface.
//!
//! Recognized options: API base URL, API version, default namespace,
//! credential pair, the non-default primary-key redirection map, and the
//! default language tag used by localization lookups. Leaving the base
//! URL unset switches the layer into local-record mode, where proxy
//! behavior attaches to locally constructed records instead of proxying
//! HTTP (see [`crate::binding::LocalRecord`]).

use std::collections::HashMap;

/// Default API version appended to the base URL.
pub const DEFAULT_VERSION: &str = "v1";

/// Default language tag for localization lookups.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Configuration for a proxy session.
///
/// # Example
///
/// ```
/// use proxy_kit::config::ProxyConfig;
///
/// let config = ProxyConfig::new("http://api.example.com/api/")
///     .with_version("v1")
///     .with_namespace("private")
///     .with_auth("superuser", "secret")
///     .with_pk_redirect("album", "item");
/// assert_eq!(config.default_language(), "en");
/// ```
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// API base URL. `None` switches the layer into local-record mode.
    pub api_url: Option<String>,
    /// API version segment, appended after the base URL.
    pub version: Option<String>,
    /// Default namespace segment, appended after the version.
    pub namespace: Option<String>,
    /// Basic-auth credential pair.
    pub auth: Option<(String, String)>,
    /// Resource type -> foreign-key field chased to find the real primary
    /// key, for resources whose key is not a plain `id` (one-to-one
    /// relations modeled on the owning side's key).
    pub pk_redirects: HashMap<String, String>,
    /// Language tag the localization lookup defaults to.
    pub language_code: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            api_url: None,
            version: Some(DEFAULT_VERSION.to_string()),
            namespace: None,
            auth: None,
            pk_redirects: HashMap::new(),
            language_code: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl ProxyConfig {
    /// Create a configuration for a remote API endpoint.
    pub fn new(api_url: impl Into<String>) -> Self {
        ProxyConfig {
            api_url: Some(api_url.into()),
            ..Default::default()
        }
    }

    /// Create a configuration with no remote endpoint (local-record mode).
    pub fn local() -> Self {
        ProxyConfig {
            api_url: None,
            ..Default::default()
        }
    }

    /// Set the API version segment.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the default namespace segment.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the basic-auth credential pair.
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((username.into(), password.into()));
        self
    }

    /// Redirect a resource type's primary key through a foreign-key field.
    pub fn with_pk_redirect(
        mut self,
        resource: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        self.pk_redirects.insert(resource.into(), field.into());
        self
    }

    /// Set the default language tag for localization lookups.
    pub fn with_language_code(mut self, code: impl Into<String>) -> Self {
        self.language_code = code.into();
        self
    }

    /// Whether the layer runs in local-record mode.
    pub fn is_local(&self) -> bool {
        self.api_url.is_none()
    }

    /// The foreign-key field to chase for a resource with a redirected
    /// primary key.
    pub fn pk_redirect(&self, resource: &str) -> Option<&str> {
        self.pk_redirects.get(resource).map(String::as_str)
    }

    /// Default language: the configured tag normalized to its primary
    /// subtag, lower-cased (`en-US` -> `en`).
    pub fn default_language(&self) -> String {
        self.language_code
            .split('-')
            .next()
            .unwrap_or(&self.language_code)
            .to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ProxyConfig::new("http://api.example.com/api/");
        assert_eq!(config.version.as_deref(), Some(DEFAULT_VERSION));
        assert!(config.namespace.is_none());
        assert!(config.auth.is_none());
        assert!(!config.is_local());
    }

    #[test]
    fn test_config_local_mode() {
        let config = ProxyConfig::local();
        assert!(config.is_local());
    }

    #[test]
    fn test_config_pk_redirect() {
        let config = ProxyConfig::new("http://api.example.com/api/")
            .with_pk_redirect("album", "item")
            .with_pk_redirect("track", "item");

        assert_eq!(config.pk_redirect("album"), Some("item"));
        assert_eq!(config.pk_redirect("item"), None);
    }

    #[test]
    fn test_config_default_language_primary_subtag() {
        let config = ProxyConfig::local().with_language_code("ja-JP");
        assert_eq!(config.default_language(), "ja");

        let config = ProxyConfig::local().with_language_code("EN");
        assert_eq!(config.default_language(), "en");
    }
}
