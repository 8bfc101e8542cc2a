//! Session context: configuration, cache backend, HTTP connection pool,
//! and the shared registries for clients, schemas and proxy bindings.
//!
//! A [`ProxySession`] is cheap to clone (it is an [`Arc`] around its
//! shared state) and safe to share across tasks. All registries are
//! concurrent maps; duplicate concurrent registrations resolve
//! last-writer-wins, which is benign because equal keys always describe
//! equal clients.

use crate::backend::CacheBackend;
use crate::binding::{ProxyRegistration, ResourceBinding};
use crate::client::ResourceClient;
use crate::config::ProxyConfig;
use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::metrics::{LogMetrics, ProxyMetrics};
use crate::schema::ResourceSchema;
use crate::uri;
use dashmap::DashMap;
use std::sync::Arc;

struct SessionInner<B: CacheBackend> {
    config: ProxyConfig,
    cache: B,
    http: reqwest::Client,
    clients: DashMap<String, Arc<ResourceClient<B>>>,
    schemas: Arc<DashMap<String, Arc<ResourceSchema>>>,
    proxies: Arc<DashMap<String, ProxyRegistration>>,
    metrics: Arc<dyn ProxyMetrics>,
}

/// Shared proxy context.
pub struct ProxySession<B: CacheBackend> {
    inner: Arc<SessionInner<B>>,
}

impl<B: CacheBackend> Clone for ProxySession<B> {
    fn clone(&self) -> Self {
        ProxySession {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: CacheBackend> ProxySession<B> {
    /// Create a session over the given configuration and cache backend.
    pub fn new(config: ProxyConfig, cache: B) -> Self {
        Self::with_metrics(config, cache, Arc::new(LogMetrics))
    }

    /// Create a session with a custom metrics sink.
    pub fn with_metrics(config: ProxyConfig, cache: B, metrics: Arc<dyn ProxyMetrics>) -> Self {
        ProxySession {
            inner: Arc::new(SessionInner {
                config,
                cache,
                http: reqwest::Client::new(),
                clients: DashMap::new(),
                schemas: Arc::new(DashMap::new()),
                proxies: Arc::new(DashMap::new()),
                metrics,
            }),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.inner.config
    }

    /// Number of distinct clients currently registered.
    pub fn client_count(&self) -> usize {
        self.inner.clients.len()
    }

    /// The client for the configured endpoint, default version and no
    /// namespace.
    ///
    /// # Errors
    ///
    /// `Error::ConfigError` when no API endpoint is configured.
    pub fn client(&self) -> Result<Arc<ResourceClient<B>>> {
        self.client_for(None)
    }

    /// The client for the configured endpoint under an explicit
    /// namespace.
    pub fn client_for(&self, namespace: Option<&str>) -> Result<Arc<ResourceClient<B>>> {
        let config = &self.inner.config;
        let api_url = config.api_url.clone().ok_or_else(|| {
            Error::ConfigError("No API endpoint configured for remote resources".to_string())
        })?;
        let namespace = namespace.or(config.namespace.as_deref());

        Ok(self.client_at(
            &api_url,
            config.version.as_deref(),
            namespace,
            config.auth.as_ref(),
        ))
    }

    /// The client for an arbitrary endpoint identity, deduplicated by
    /// URL, version, namespace and credentials.
    ///
    /// Two lookups with the same identity return handles to the same
    /// client, so their schema state and connection pool are shared.
    pub fn client_at(
        &self,
        api_url: &str,
        version: Option<&str>,
        namespace: Option<&str>,
        auth: Option<&(String, String)>,
    ) -> Arc<ResourceClient<B>> {
        let key = uri::build_client_key(api_url, version, namespace, auth);

        if let Some(existing) = self.inner.clients.get(&key) {
            return Arc::clone(existing.value());
        }

        debug!("Building a resource client for {}", key);
        let client = Arc::new(ResourceClient::new(
            api_url,
            version,
            namespace,
            auth.cloned(),
            self.inner.http.clone(),
            self.inner.cache.clone(),
            Arc::clone(&self.inner.metrics),
            Arc::clone(&self.inner.schemas),
            Arc::clone(&self.inner.proxies),
        ));

        // Last writer wins on a concurrent race; both candidates are
        // functionally identical.
        self.inner.clients.insert(key, Arc::clone(&client));
        client
    }

    /// Register a statically-bound resource type.
    pub fn register<T: ResourceBinding>(&self) {
        self.register_proxy(ProxyRegistration::of::<T>());
    }

    /// Register a resource binding built at runtime.
    pub fn register_proxy(&self, registration: ProxyRegistration) {
        self.inner
            .proxies
            .insert(registration.lookup_key(), registration);
    }

    /// The binding registered under a resource or type name, if any.
    pub fn registration(&self, name: &str) -> Option<ProxyRegistration> {
        self.inner
            .proxies
            .get(&name.to_ascii_lowercase())
            .map(|entry| entry.value().clone())
    }

    /// A manager for a resource on the default client.
    pub async fn manager(&self, resource: &str) -> Result<Manager<B>> {
        let namespace = self
            .registration(resource)
            .and_then(|registration| registration.namespace);
        let client = self.client_for(namespace.as_deref())?;
        let model = client.model(resource).await?;
        Ok(Manager::new(self.clone(), client, model))
    }

    /// A manager for a statically-bound resource type, registering it on
    /// first use.
    pub async fn manager_for<T: ResourceBinding>(&self) -> Result<Manager<B>> {
        if self.registration(T::RESOURCE_NAME).is_none() {
            self.register::<T>();
        }
        let client = self.client_for(T::namespace())?;
        let model = client.model(T::RESOURCE_NAME).await?;
        Ok(Manager::new(self.clone(), client, model))
    }

    /// Drop a cached schema so the next access re-fetches it.
    pub fn refresh_schema(&self, resource: &str) {
        self.inner
            .schemas
            .retain(|key, _| key != resource && !key.ends_with(&format!("/{}", resource)));
    }

    /// Drop every cached schema.
    pub fn clear_schemas(&self) {
        self.inner.schemas.clear();
    }

    /// Delete one cached response by URL.
    pub async fn evict(&self, url: &str) -> Result<()> {
        self.inner.cache.delete(url).await?;
        self.inner.metrics.record_evict(url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;

    fn session() -> ProxySession<InMemoryBackend> {
        let config = ProxyConfig::new("http://api.example.com:8000/api/").with_version("v1");
        ProxySession::new(config, InMemoryBackend::new())
    }

    #[test]
    fn test_client_deduplicated_by_identity() {
        let session = session();

        let a = session.client_at("http://api.example.com:8000/api/", Some("v1"), None, None);
        let b = session.client_at("http://api.example.com:8000/api/", Some("v1"), None, None);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(session.client_count(), 1);
    }

    #[test]
    fn test_distinct_identity_builds_distinct_client() {
        let session = session();

        let a = session.client_at("http://api.example.com:8000/api/", Some("v1"), None, None);
        let b = session.client_at(
            "http://api.example.com:8000/api/",
            Some("v1"),
            Some("aux"),
            None,
        );
        let c = session.client_at(
            "http://api.example.com:8000/api/",
            Some("v1"),
            None,
            Some(&("bob".to_string(), "secret".to_string())),
        );

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(session.client_count(), 3);
    }

    #[test]
    fn test_default_client_requires_endpoint() {
        let session = ProxySession::new(ProxyConfig::local(), InMemoryBackend::new());

        match session.client() {
            Err(Error::ConfigError(_)) => {}
            other => panic!("Expected a configuration error, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_registration_lookup_is_case_insensitive() {
        let session = session();
        session.register_proxy(ProxyRegistration::new("Article", "article"));

        let registration = session
            .registration("article")
            .expect("Failed to look up the registration");
        assert_eq!(registration.resource_name, "article");
    }
}
