//! Collection managers: the query entry points for one resource, plus
//! the membership manager backing to-many relations.

use crate::backend::CacheBackend;
use crate::client::ResourceClient;
use crate::entity::EntityProxy;
use crate::error::{Error, Result};
use crate::query::{FilterValue, Op, Query, QuerySet};
use crate::schema::ModelDescriptor;
use crate::session::ProxySession;
use crate::uri;
use reqwest::Method;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Query entry point for one resource collection.
pub struct Manager<B: CacheBackend> {
    session: ProxySession<B>,
    client: Arc<ResourceClient<B>>,
    model: Arc<ModelDescriptor>,
}

impl<B: CacheBackend> Clone for Manager<B> {
    fn clone(&self) -> Self {
        Manager {
            session: self.session.clone(),
            client: Arc::clone(&self.client),
            model: Arc::clone(&self.model),
        }
    }
}

impl<B: CacheBackend> Manager<B> {
    pub(crate) fn new(
        session: ProxySession<B>,
        client: Arc<ResourceClient<B>>,
        model: Arc<ModelDescriptor>,
    ) -> Self {
        Manager {
            session,
            client,
            model,
        }
    }

    pub fn resource_name(&self) -> &str {
        self.model.resource_name()
    }

    pub fn model(&self) -> &Arc<ModelDescriptor> {
        &self.model
    }

    pub(crate) fn client(&self) -> &Arc<ResourceClient<B>> {
        &self.client
    }

    pub(crate) fn session(&self) -> &ProxySession<B> {
        &self.session
    }

    /// Every record in the collection.
    pub fn all(&self) -> QuerySet<B> {
        QuerySet::new(self.clone(), Query::new())
    }

    /// Records matching one criterion.
    pub fn filter(&self, field: &str, op: Op, value: impl Into<FilterValue>) -> QuerySet<B> {
        self.all().filter(field, op, value)
    }

    /// Records matching a pre-built query.
    pub fn query(&self, query: Query) -> QuerySet<B> {
        QuerySet::new(self.clone(), query)
    }

    /// The single record matching one criterion.
    pub async fn get(
        &self,
        field: &str,
        op: Op,
        value: impl Into<FilterValue>,
    ) -> Result<EntityProxy<B>> {
        self.filter(field, op, value).get().await
    }

    /// The record with the given primary key, fetched by detail URL.
    pub async fn get_by_pk(&self, pk: &str) -> Result<EntityProxy<B>> {
        let url = self.client.detail_url(self.resource_name(), pk);
        let proxy = self.by_uri(url);
        match proxy.data().await {
            Ok(_) => Ok(proxy),
            Err(Error::TransportError { status: 404, .. }) => Err(Error::NotFound(format!(
                "No {} with primary key {}",
                self.resource_name(),
                pk
            ))),
            Err(error) => Err(error),
        }
    }

    /// Total number of records in the collection.
    pub async fn count(&self) -> Result<u64> {
        self.all().count().await
    }

    /// Whether the collection has any records.
    pub async fn exists(&self) -> Result<bool> {
        self.all().exists().await
    }

    /// Create a record and return a proxy over it.
    ///
    /// The new record's identity comes from the response body's
    /// `resource_uri` or, failing that, the `Location` header.
    pub async fn create(&self, fields: Map<String, Value>) -> Result<EntityProxy<B>> {
        let url = self.client.collection_url(self.resource_name());
        let body = Value::Object(fields);
        let (value, location) = self
            .client
            .execute(Method::POST, &url, Some(&body))
            .await?;

        let record = value.as_object().cloned();
        let resource_uri = record
            .as_ref()
            .and_then(|map| map.get("resource_uri"))
            .and_then(Value::as_str)
            .map(String::from)
            .or(location);

        if resource_uri.is_none() && record.is_none() {
            return Err(Error::Other(format!(
                "Create on {} returned neither a body nor a location",
                self.resource_name()
            )));
        }

        Ok(EntityProxy::new(
            self.session.clone(),
            Arc::clone(&self.client),
            Arc::clone(&self.model),
            resource_uri,
            record,
        ))
    }

    /// Fetch the record matching the given fields, creating it when
    /// absent. Returns the proxy and whether a create happened.
    pub async fn get_or_create(
        &self,
        fields: Map<String, Value>,
    ) -> Result<(EntityProxy<B>, bool)> {
        let mut query = Query::new();
        for (name, value) in &fields {
            if value.is_null() || value.is_object() || value.is_array() {
                continue;
            }
            query = query.filter(name, Op::Exact, FilterValue::from(value));
        }

        match self.query(query).get().await {
            Ok(existing) => Ok((existing, false)),
            Err(Error::NotFound(_)) => Ok((self.create(fields).await?, true)),
            Err(error) => Err(error),
        }
    }

    /// A proxy over a record known only by URI; nothing is fetched until
    /// a field is read.
    pub fn by_uri(&self, resource_uri: impl Into<String>) -> EntityProxy<B> {
        EntityProxy::new(
            self.session.clone(),
            Arc::clone(&self.client),
            Arc::clone(&self.model),
            Some(resource_uri.into()),
            None,
        )
    }

    /// Wrap one record object from a list response.
    pub(crate) fn wrap(&self, object: Value) -> Result<EntityProxy<B>> {
        let record = object.as_object().cloned().ok_or_else(|| {
            Error::DeserializationError(format!(
                "Expected a {} record object in the list response",
                self.resource_name()
            ))
        })?;

        let resource_uri = record
            .get("resource_uri")
            .and_then(Value::as_str)
            .map(String::from);

        Ok(EntityProxy::new(
            self.session.clone(),
            Arc::clone(&self.client),
            Arc::clone(&self.model),
            resource_uri,
            Some(record),
        ))
    }
}

/// Membership manager for one to-many relation of one record.
///
/// Queries run against the related collection constrained to the
/// membership set; mutation rewrites the owning record's relation list
/// locally, to be persisted by the owner's `save`.
pub struct ManyToManyManager<B: CacheBackend> {
    owner: EntityProxy<B>,
    field_name: String,
    target: Manager<B>,
    member_pks: Vec<String>,
}

impl<B: CacheBackend> ManyToManyManager<B> {
    pub(crate) fn new(
        owner: EntityProxy<B>,
        field_name: impl Into<String>,
        target: Manager<B>,
        member_pks: Vec<String>,
    ) -> Self {
        ManyToManyManager {
            owner,
            field_name: field_name.into(),
            target,
            member_pks,
        }
    }

    /// Name of the related resource.
    pub fn resource_name(&self) -> &str {
        self.target.resource_name()
    }

    /// Primary keys of the current members.
    pub fn member_pks(&self) -> &[String] {
        &self.member_pks
    }

    pub fn is_empty(&self) -> bool {
        self.member_pks.is_empty()
    }

    /// Number of members, without a network call.
    pub fn len(&self) -> usize {
        self.member_pks.len()
    }

    fn membership_query(&self) -> Query {
        let pks: Vec<FilterValue> = self
            .member_pks
            .iter()
            .map(|pk| FilterValue::Str(pk.clone()))
            .collect();
        // An empty membership renders an impossible query, which
        // short-circuits locally instead of asking the server to match
        // an empty set.
        Query::new().filter("id", Op::In, pks)
    }

    /// Every member record.
    pub fn all(&self) -> QuerySet<B> {
        self.target.query(self.membership_query())
    }

    /// Member records matching one extra criterion.
    ///
    /// # Errors
    ///
    /// `Error::UnsupportedFilter` for an `id`/`In` filter, which would
    /// silently override the membership constraint.
    pub fn filter(
        &self,
        field: &str,
        op: Op,
        value: impl Into<FilterValue>,
    ) -> Result<QuerySet<B>> {
        if field == "id" && op == Op::In {
            return Err(Error::UnsupportedFilter(
                "Filtering on \"id__in\" would override the membership constraint".to_string(),
            ));
        }
        Ok(self.all().filter(field, op, value))
    }

    /// The single member matching one criterion.
    pub async fn get(
        &self,
        field: &str,
        op: Op,
        value: impl Into<FilterValue>,
    ) -> Result<EntityProxy<B>> {
        self.filter(field, op, value)?.get().await
    }

    /// Add a record to the membership.
    ///
    /// The change is local until the owner is saved.
    pub fn add(&mut self, member: &EntityProxy<B>) -> Result<()> {
        let member_uri = member.resource_uri().ok_or_else(|| {
            Error::RelationError(format!(
                "Can't add an unsaved {} to \"{}\"",
                self.target.resource_name(),
                self.field_name
            ))
        })?;
        let pk = uri::parse_pk(&member_uri)?;

        if self.member_pks.contains(&pk) {
            return Ok(());
        }

        self.owner.push_relation(&self.field_name, &member_uri);
        self.member_pks.push(pk);
        Ok(())
    }

    /// Remove a record from the membership.
    pub fn remove(&mut self, member: &EntityProxy<B>) -> Result<()> {
        let member_uri = member.resource_uri().ok_or_else(|| {
            Error::RelationError(format!(
                "Can't remove an unsaved {} from \"{}\"",
                self.target.resource_name(),
                self.field_name
            ))
        })?;
        let pk = uri::parse_pk(&member_uri)?;

        self.owner.remove_relation(&self.field_name, &member_uri);
        self.member_pks.retain(|member_pk| member_pk != &pk);
        Ok(())
    }

    /// Remove every member.
    pub fn clear(&mut self) {
        self.owner.clear_relation(&self.field_name);
        self.member_pks.clear();
    }
}
