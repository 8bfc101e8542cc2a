//! Per-endpoint resource client: URL construction, the cache-aware
//! request path, and schema retrieval.
//!
//! Every request funnels through [`ResourceClient::execute`], which is
//! where the cache protocol lives:
//!
//! - `GET` consults the response cache first; a miss fetches over HTTP,
//!   strips the bookkeeping key from the body, and stores the result
//!   under the full request URL (query string included).
//! - Any other verb deletes the cached entry for its URL *before* the
//!   request goes out, so a failed write cannot leave a stale read
//!   behind.
//!
//! Clients are built by [`crate::session::ProxySession::client_at`] and
//! deduplicated by endpoint identity; schema state lives in a registry
//! shared across all clients of a session, keyed by namespace-qualified
//! resource path.

use crate::backend::CacheBackend;
use crate::binding::ProxyRegistration;
use crate::codec;
use crate::error::{Error, Result};
use crate::metrics::ProxyMetrics;
use crate::schema::{ModelDescriptor, ResourceSchema};
use crate::uri;
use dashmap::DashMap;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Client for one endpoint identity (URL + version + namespace + auth).
pub struct ResourceClient<B: CacheBackend> {
    api_url: String,
    api_path: String,
    base_url: String,
    version: Option<String>,
    namespace: Option<String>,
    auth: Option<(String, String)>,
    http: reqwest::Client,
    cache: B,
    metrics: Arc<dyn ProxyMetrics>,
    schemas: Arc<DashMap<String, Arc<ResourceSchema>>>,
    registrations: Arc<DashMap<String, ProxyRegistration>>,
}

impl<B: CacheBackend> ResourceClient<B> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        api_url: &str,
        version: Option<&str>,
        namespace: Option<&str>,
        auth: Option<(String, String)>,
        http: reqwest::Client,
        cache: B,
        metrics: Arc<dyn ProxyMetrics>,
        schemas: Arc<DashMap<String, Arc<ResourceSchema>>>,
        registrations: Arc<DashMap<String, ProxyRegistration>>,
    ) -> Self {
        ResourceClient {
            api_url: api_url.to_string(),
            api_path: uri::url_path(api_url),
            base_url: uri::build_base_url(api_url, version, namespace),
            version: version.map(String::from),
            namespace: namespace.map(String::from),
            auth,
            http,
            cache,
            metrics,
            schemas,
            registrations,
        }
    }

    /// The configured endpoint URL, before version and namespace.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Path component of the endpoint URL (`/api/` for
    /// `http://h:8000/api/`).
    pub fn api_path(&self) -> &str {
        &self.api_path
    }

    /// Fully qualified collection root: endpoint URL + version +
    /// namespace.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub(crate) fn auth(&self) -> Option<&(String, String)> {
        self.auth.as_ref()
    }

    /// List URL for a resource collection.
    pub fn collection_url(&self, resource: &str) -> String {
        format!("{}{}/", self.base_url, resource)
    }

    /// Detail URL for one record.
    pub fn detail_url(&self, resource: &str, pk: &str) -> String {
        format!("{}{}/{}/", self.base_url, resource, pk)
    }

    fn schema_url(&self, resource: &str) -> String {
        format!("{}{}/schema/", self.base_url, resource)
    }

    fn schema_key(&self, resource: &str) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}/{}", namespace, resource),
            None => resource.to_string(),
        }
    }

    /// The schema for a resource, fetched once per session and shared
    /// across all clients of the same endpoint.
    pub async fn schema(&self, resource: &str) -> Result<Arc<ResourceSchema>> {
        let key = self.schema_key(resource);
        if let Some(cached) = self.schemas.get(&key) {
            return Ok(Arc::clone(cached.value()));
        }

        let url = self.schema_url(resource);
        let value = match self.request(Method::GET, &url, None).await {
            Ok(value) => value,
            Err(error) => {
                debug!(
                    "Couldn't fetch the schema definition for \"{}\": {}",
                    resource, error
                );
                return Err(Error::SchemaError(format!(
                    "Couldn't fetch the schema for \"{}\" ({})",
                    resource, error
                )));
            }
        };

        let schema: ResourceSchema = serde_json::from_value(value)
            .map_err(|error| Error::SchemaError(format!("Malformed schema for \"{}\": {}", resource, error)))?;

        if !self.registrations.contains_key(&resource.to_ascii_lowercase()) {
            // Degraded but defined: an unregistered resource still gets a
            // runtime model, just no static binding overrides.
            debug!("No proxy binding registered for \"{}\"", resource);
        }

        let schema = Arc::new(schema);
        self.schemas.insert(key, Arc::clone(&schema));
        Ok(schema)
    }

    /// A runtime model for a resource, built from its fetched schema.
    pub async fn model(&self, resource: &str) -> Result<Arc<ModelDescriptor>> {
        let schema = self.schema(resource).await?;
        Ok(Arc::new(ModelDescriptor::from_schema(resource, schema)))
    }

    /// Perform a request, returning the decoded response body.
    pub async fn request(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        Ok(self.execute(method, url, body).await?.0)
    }

    /// Perform a request, returning the decoded body and the `Location`
    /// header when the server set one.
    pub(crate) async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(Value, Option<String>)> {
        let full_url = uri::absolutize(url, &self.api_url, &self.base_url)?;
        let is_read = method == Method::GET;

        if is_read {
            if let Some(payload) = self.cache.get(&full_url).await? {
                self.metrics.record_hit(&full_url);
                return Ok((codec::from_payload(&payload)?, None));
            }
            self.metrics.record_miss(&full_url);
        } else {
            // Evict before the write goes out, never after.
            debug!("Deleting cache for {}", full_url);
            self.cache.delete(&full_url).await?;
            self.metrics.record_evict(&full_url);
        }

        debug!("{} {}", method, full_url);
        let started = Instant::now();

        let mut request = self.http.request(method.clone(), full_url.as_str());
        if let Some((username, password)) = &self.auth {
            request = request.basic_auth(username, Some(password));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|error| {
            self.metrics.record_error(&full_url, &error.to_string());
            Error::TransportError {
                url: full_url.clone(),
                method: method.to_string(),
                status: error.status().map(|status| status.as_u16()).unwrap_or(0),
            }
        })?;

        let status = response.status();
        self.metrics
            .record_request(method.as_str(), &full_url, status.as_u16(), started.elapsed());

        if status.as_u16() >= 300 {
            warn!("{} {} returned {}", method, full_url, status);
            return Err(Error::TransportError {
                url: full_url,
                method: method.to_string(),
                status: status.as_u16(),
            });
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(String::from);

        let bytes = response.bytes().await.map_err(|error| {
            self.metrics.record_error(&full_url, &error.to_string());
            Error::TransportError {
                url: full_url.clone(),
                method: method.to_string(),
                status: status.as_u16(),
            }
        })?;

        let mut value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        if is_read {
            codec::strip_bookkeeping(&mut value);
            self.cache
                .set(&full_url, codec::to_payload(&value)?, None)
                .await?;
            self.metrics.record_set(&full_url);
        }

        Ok((value, location))
    }

    /// Delete the cached response for a URL without issuing a request.
    pub(crate) async fn evict(&self, url: &str) -> Result<()> {
        let full_url = uri::absolutize(url, &self.api_url, &self.base_url)?;
        self.cache.delete(&full_url).await?;
        self.metrics.record_evict(&full_url);
        Ok(())
    }
}
