//! The record proxy: typed field access, relation resolution across
//! namespaces, and the write operations (save, delete, refresh).
//!
//! A proxy is identified by its resource URI and fetches its
//! representation lazily, at most once, on the first field read. Clones
//! share state, so a relation manager mutating its owner's membership
//! list is visible through every handle to that record.
//!
//! Relation resolution never assumes the target lives in the owner's
//! namespace: the target's namespace and resource name are inferred from
//! the linked URI shape, and the hop goes through the session's client
//! registry so cross-namespace targets reuse (or transparently build)
//! the right client.

use crate::backend::CacheBackend;
use crate::client::ResourceClient;
use crate::error::{Error, Result};
use crate::manager::{Manager, ManyToManyManager};
use crate::schema::{FieldAccessor, ModelDescriptor};
use crate::session::ProxySession;
use crate::uri;
use crate::value::{self, FieldValue};
use reqwest::Method;
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};

/// One resolved attribute of a record.
pub enum Attribute<B: CacheBackend> {
    /// A scalar field, coerced to its wire type.
    Value(FieldValue),
    /// A to-one relation, resolved to a proxy over the target record.
    One(EntityProxy<B>),
    /// A to-many relation, resolved to a membership manager.
    Many(ManyToManyManager<B>),
}

struct EntityState {
    resource_uri: Option<String>,
    record: Option<Map<String, Value>>,
}

/// Proxy over one remote record.
pub struct EntityProxy<B: CacheBackend> {
    session: ProxySession<B>,
    client: Arc<ResourceClient<B>>,
    model: Arc<ModelDescriptor>,
    state: Arc<RwLock<EntityState>>,
}

impl<B: CacheBackend> Clone for EntityProxy<B> {
    fn clone(&self) -> Self {
        EntityProxy {
            session: self.session.clone(),
            client: Arc::clone(&self.client),
            model: Arc::clone(&self.model),
            state: Arc::clone(&self.state),
        }
    }
}

impl<B: CacheBackend> EntityProxy<B> {
    pub(crate) fn new(
        session: ProxySession<B>,
        client: Arc<ResourceClient<B>>,
        model: Arc<ModelDescriptor>,
        resource_uri: Option<String>,
        record: Option<Map<String, Value>>,
    ) -> Self {
        EntityProxy {
            session,
            client,
            model,
            state: Arc::new(RwLock::new(EntityState {
                resource_uri,
                record,
            })),
        }
    }

    pub(crate) fn session(&self) -> &ProxySession<B> {
        &self.session
    }

    /// The client this record was resolved through.
    pub fn client(&self) -> &Arc<ResourceClient<B>> {
        &self.client
    }

    /// The generated model this proxy dispatches through.
    pub fn model(&self) -> &Arc<ModelDescriptor> {
        &self.model
    }

    /// Name of the resource this record belongs to.
    pub fn resource_name(&self) -> &str {
        self.model.resource_name()
    }

    /// The record's resource URI, when known.
    pub fn resource_uri(&self) -> Option<String> {
        self.read_state(|state| state.resource_uri.clone())
    }

    /// Whether the representation has been fetched (or seeded).
    pub fn is_loaded(&self) -> bool {
        self.read_state(|state| state.record.is_some())
    }

    fn read_state<T>(&self, f: impl FnOnce(&EntityState) -> T) -> T {
        let guard = self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    fn write_state<T>(&self, f: impl FnOnce(&mut EntityState) -> T) -> T {
        let mut guard = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// The record's representation, fetching it on first access.
    async fn representation(&self) -> Result<Map<String, Value>> {
        if let Some(record) = self.read_state(|state| state.record.clone()) {
            return Ok(record);
        }

        let resource_uri = self.resource_uri().ok_or_else(|| {
            Error::Other(format!(
                "Unsaved {} record has no representation to fetch",
                self.resource_name()
            ))
        })?;

        let value = self
            .client
            .request(Method::GET, &resource_uri, None)
            .await?;
        let record = value.as_object().cloned().ok_or_else(|| {
            Error::DeserializationError(format!(
                "Detail endpoint for {} returned a non-object body",
                self.resource_name()
            ))
        })?;

        self.write_state(|state| {
            if state.resource_uri.is_none() {
                state.resource_uri = record
                    .get("resource_uri")
                    .and_then(Value::as_str)
                    .map(String::from);
            }
            state.record = Some(record.clone());
        });
        Ok(record)
    }

    /// The raw representation as a field map.
    pub async fn data(&self) -> Result<Map<String, Value>> {
        self.representation().await
    }

    /// Resolve one field by name.
    ///
    /// `pk` resolves through the primary-key rules (redirections
    /// applied), as does `id` when the schema carries no literal `id`
    /// field; schema fields dispatch on their accessor kind.
    ///
    /// # Errors
    ///
    /// `Error::SchemaError` when the schema has no such field, or when a
    /// schema field is missing from the fetched representation.
    pub async fn attr(&self, name: &str) -> Result<Attribute<B>> {
        if name == "pk" || (name == "id" && self.model.accessor("id").is_none()) {
            return Ok(Attribute::Value(FieldValue::String(self.pk().await?)));
        }

        let accessor = self.model.accessor(name).cloned().ok_or_else(|| {
            Error::SchemaError(format!(
                "No such field \"{}\" in the {} schema",
                name,
                self.resource_name()
            ))
        })?;

        match accessor {
            FieldAccessor::Scalar(wire_type) => {
                let record = self.representation().await?;
                let raw = record.get(name).ok_or_else(|| {
                    Error::SchemaError(format!(
                        "The field \"{}\" is in the {} schema but not in the fetched representation",
                        name,
                        self.resource_name()
                    ))
                })?;
                Ok(Attribute::Value(value::coerce(wire_type, raw)?))
            }
            FieldAccessor::ToOne { schema_url } => {
                self.resolve_to_one(name, schema_url.as_deref()).await
            }
            FieldAccessor::ToMany { schema_url } => {
                self.resolve_to_many(name, schema_url.as_deref()).await
            }
        }
    }

    /// Resolve a scalar field.
    pub async fn scalar(&self, name: &str) -> Result<FieldValue> {
        match self.attr(name).await? {
            Attribute::Value(value) => Ok(value),
            _ => Err(Error::SchemaError(format!(
                "The field \"{}\" of {} is a relation, not a scalar",
                name,
                self.resource_name()
            ))),
        }
    }

    /// Resolve a to-one relation.
    pub async fn to_one(&self, name: &str) -> Result<EntityProxy<B>> {
        match self.attr(name).await? {
            Attribute::One(proxy) => Ok(proxy),
            _ => Err(Error::RelationError(format!(
                "The field \"{}\" of {} is not a to-one relation",
                name,
                self.resource_name()
            ))),
        }
    }

    /// Resolve a to-many relation.
    pub async fn to_many(&self, name: &str) -> Result<ManyToManyManager<B>> {
        match self.attr(name).await? {
            Attribute::Many(manager) => Ok(manager),
            _ => Err(Error::RelationError(format!(
                "The field \"{}\" of {} is not a to-many relation",
                name,
                self.resource_name()
            ))),
        }
    }

    /// A manager for the target of a relation, hopping namespaces through
    /// the shared client registry.
    async fn relation_manager(
        &self,
        field_name: &str,
        sample_uri: &str,
    ) -> Result<Manager<B>> {
        let target = uri::infer_target(sample_uri, self.client.api_path(), self.client.version())?;
        let namespace = if target.namespace.is_empty() {
            None
        } else {
            Some(target.namespace.as_str())
        };

        let hop = self.session.client_at(
            self.client.api_url(),
            self.client.version(),
            namespace,
            self.client.auth(),
        );
        let model = hop.model(&target.resource_name).await?;

        // Record the field name as an alias for the resolved target, so
        // later name-based lookups find its namespace.
        if field_name != target.resource_name && self.session.registration(field_name).is_none() {
            let mut registration =
                crate::binding::ProxyRegistration::new(field_name, target.resource_name.as_str());
            registration.namespace = namespace.map(String::from);
            self.session.register_proxy(registration);
        }

        Ok(Manager::new(self.session.clone(), hop, model))
    }

    async fn resolve_to_one(
        &self,
        name: &str,
        schema_url: Option<&str>,
    ) -> Result<Attribute<B>> {
        let record = self.representation().await?;
        let raw = record.get(name).cloned().unwrap_or(Value::Null);

        let (linked_uri, inline) = match &raw {
            Value::String(uri) => (Some(uri.clone()), None),
            Value::Object(map) => (
                map.get("resource_uri")
                    .and_then(Value::as_str)
                    .map(String::from),
                Some(map.clone()),
            ),
            Value::Null => (None, None),
            other => {
                return Err(Error::RelationError(format!(
                    "Unexpected value shape for relation \"{}\" of {}: {}",
                    name,
                    self.resource_name(),
                    other
                )))
            }
        };

        if linked_uri.is_none() && inline.is_none() {
            return Ok(Attribute::Value(FieldValue::Null));
        }

        let sample = linked_uri
            .clone()
            .or_else(|| schema_url.map(String::from))
            .ok_or_else(|| {
                Error::RelationError(format!(
                    "Couldn't identify the related schema for \"{}\" of {}",
                    name,
                    self.resource_name()
                ))
            })?;

        let manager = self.relation_manager(name, &sample).await?;
        let proxy = EntityProxy::new(
            manager.session().clone(),
            Arc::clone(manager.client()),
            Arc::clone(manager.model()),
            linked_uri,
            inline,
        );
        Ok(Attribute::One(proxy))
    }

    async fn resolve_to_many(
        &self,
        name: &str,
        schema_url: Option<&str>,
    ) -> Result<Attribute<B>> {
        let record = self.representation().await?;
        let raw = record.get(name).cloned().unwrap_or(Value::Array(Vec::new()));

        let items = raw.as_array().cloned().ok_or_else(|| {
            Error::RelationError(format!(
                "Expected a list for relation \"{}\" of {}",
                name,
                self.resource_name()
            ))
        })?;

        let mut member_uris = Vec::with_capacity(items.len());
        for item in &items {
            let member_uri = match item {
                Value::String(uri) => uri.clone(),
                Value::Object(map) => map
                    .get("resource_uri")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .ok_or_else(|| {
                        Error::RelationError(format!(
                            "Inline member of \"{}\" has no resource_uri",
                            name
                        ))
                    })?,
                other => {
                    return Err(Error::RelationError(format!(
                        "Unexpected member shape in relation \"{}\" of {}: {}",
                        name,
                        self.resource_name(),
                        other
                    )))
                }
            };
            member_uris.push(member_uri);
        }

        let sample = member_uris
            .first()
            .cloned()
            .or_else(|| schema_url.map(String::from))
            .ok_or_else(|| {
                Error::RelationError(format!(
                    "Couldn't identify the related schema for \"{}\" of {}",
                    name,
                    self.resource_name()
                ))
            })?;

        let manager = self.relation_manager(name, &sample).await?;

        let mut member_pks = Vec::with_capacity(member_uris.len());
        for member_uri in &member_uris {
            member_pks.push(uri::parse_pk(member_uri)?);
        }

        Ok(Attribute::Many(ManyToManyManager::new(
            self.clone(),
            name,
            manager,
            member_pks,
        )))
    }

    /// The foreign-key field this resource's primary key redirects
    /// through, from the session configuration or a registered binding.
    fn pk_redirect_field(&self) -> Option<String> {
        self.session
            .config()
            .pk_redirect(self.resource_name())
            .map(String::from)
            .or_else(|| {
                self.session
                    .registration(self.resource_name())
                    .and_then(|registration| registration.pk_field)
            })
    }

    /// The record's primary key.
    ///
    /// When the session configuration or a registered binding redirects
    /// this resource's key through a foreign-key field, that field is
    /// chased (a linked URI reduces to its trailing pk). Otherwise the
    /// key comes from the `id` field, or from the resource URI without
    /// fetching when the representation is not loaded yet.
    pub async fn pk(&self) -> Result<String> {
        if let Some(redirect_field) = self.pk_redirect_field() {
            let record = self.representation().await?;
            if let Some(pk) = Self::pk_from_field(record.get(&redirect_field)) {
                return pk;
            }
            // Redirect field absent from the representation: fall back
            // to the default key.
        }

        if let Some(record) = self.read_state(|state| state.record.clone()) {
            if let Some(pk) = Self::pk_from_field(record.get("id")) {
                return pk;
            }
        }

        if let Some(resource_uri) = self.resource_uri() {
            return uri::parse_pk(&resource_uri);
        }

        // Last resort: fetch and read the id.
        let record = self.representation().await?;
        Self::pk_from_field(record.get("id")).ok_or_else(|| {
            Error::NotFound(format!(
                "No primary key on this {} record",
                self.resource_name()
            ))
        })?
    }

    fn pk_from_field(raw: Option<&Value>) -> Option<Result<String>> {
        match raw {
            Some(Value::String(s)) => {
                if uri::looks_like_uri(s) {
                    Some(uri::parse_pk(s))
                } else {
                    Some(Ok(s.clone()))
                }
            }
            Some(Value::Number(n)) => Some(Ok(n.to_string())),
            Some(Value::Object(map)) => map
                .get("resource_uri")
                .and_then(Value::as_str)
                .map(uri::parse_pk),
            _ => None,
        }
    }

    /// Set one field locally; persisted by the next `save`.
    pub fn set(&self, name: &str, value: FieldValue) {
        self.set_raw(name, value::to_wire(&value));
    }

    /// Set one field to a raw wire value.
    pub fn set_raw(&self, name: &str, value: Value) {
        self.write_state(|state| {
            state
                .record
                .get_or_insert_with(Map::new)
                .insert(name.to_string(), value);
        });
    }

    pub(crate) fn push_relation(&self, field_name: &str, member_uri: &str) {
        self.write_state(|state| {
            let record = state.record.get_or_insert_with(Map::new);
            let entry = record
                .entry(field_name.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(members) = entry {
                members.push(Value::String(member_uri.to_string()));
            }
        });
    }

    pub(crate) fn remove_relation(&self, field_name: &str, member_uri: &str) {
        self.write_state(|state| {
            let record = state.record.get_or_insert_with(Map::new);
            if let Some(Value::Array(members)) = record.get_mut(field_name) {
                members.retain(|member| match member {
                    Value::String(uri) => uri != member_uri,
                    Value::Object(map) => {
                        map.get("resource_uri").and_then(Value::as_str) != Some(member_uri)
                    }
                    _ => true,
                });
            }
        });
    }

    pub(crate) fn clear_relation(&self, field_name: &str) {
        self.write_state(|state| {
            state
                .record
                .get_or_insert_with(Map::new)
                .insert(field_name.to_string(), Value::Array(Vec::new()));
        });
    }

    /// Persist the record: `PUT` to its URI when it has one, `POST` to
    /// the collection otherwise.
    ///
    /// Before a `PUT`, the canonical detail URL (derived from the
    /// primary key, redirections applied) is evicted in addition to the
    /// write-path eviction of the record's own URI, so a record reached
    /// through a non-canonical URI cannot leave a stale canonical read.
    pub async fn save(&self) -> Result<()> {
        let record = self
            .read_state(|state| state.record.clone())
            .unwrap_or_default();
        let body = Value::Object(record);

        match self.resource_uri() {
            Some(resource_uri) => {
                let pk = self.pk().await?;
                let canonical = self.client.detail_url(self.resource_name(), &pk);
                if canonical != resource_uri {
                    self.client.evict(&canonical).await?;
                }
                self.client
                    .request(Method::PUT, &resource_uri, Some(&body))
                    .await?;
                Ok(())
            }
            None => {
                let url = self.client.collection_url(self.resource_name());
                let (value, location) = self
                    .client
                    .execute(Method::POST, &url, Some(&body))
                    .await?;

                let resource_uri = value
                    .get("resource_uri")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .or(location);
                self.write_state(|state| {
                    state.resource_uri = resource_uri;
                    if let Some(map) = value.as_object() {
                        state.record = Some(map.clone());
                    }
                });
                Ok(())
            }
        }
    }

    /// Delete the record.
    ///
    /// A record known only by representation (no tracked URI) is deleted
    /// through a transient detail URL derived from its primary key.
    pub async fn delete(&self) -> Result<()> {
        let target = match self.resource_uri() {
            Some(resource_uri) => resource_uri,
            None => {
                let pk = self.pk().await?;
                self.client.detail_url(self.resource_name(), &pk)
            }
        };

        self.client.request(Method::DELETE, &target, None).await?;
        self.write_state(|state| {
            state.record = None;
            state.resource_uri = None;
        });
        Ok(())
    }

    /// Drop the local representation and its cached response, then
    /// re-fetch.
    pub async fn refresh(&self) -> Result<()> {
        let resource_uri = self.resource_uri().ok_or_else(|| {
            Error::Other(format!(
                "Unsaved {} record has nothing to refresh",
                self.resource_name()
            ))
        })?;

        self.client.evict(&resource_uri).await?;
        self.write_state(|state| state.record = None);
        self.representation().await?;
        Ok(())
    }
}
