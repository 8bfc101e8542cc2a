//! Resource bindings: compile-time declarations of remote resource
//! types, their runtime registration records, and the local-record
//! fallback used when no API endpoint is configured.
//!
//! A binding carries what a schema cannot: which namespace a resource
//! lives under, which field its primary key redirects through, and the
//! name of its localization collection when the default
//! `{resource}localization` convention does not apply.

use serde_json::{Map, Value};

/// Compile-time binding of a Rust type to a remote resource.
///
/// # Example
///
/// ```
/// use proxy_kit::binding::ResourceBinding;
///
/// struct Album;
///
/// impl ResourceBinding for Album {
///     const RESOURCE_NAME: &'static str = "album";
///
///     fn pk_field() -> Option<&'static str> {
///         Some("item")
///     }
/// }
/// ```
pub trait ResourceBinding {
    /// Resource name as it appears in collection URLs.
    const RESOURCE_NAME: &'static str;

    /// Namespace the resource lives under, when not the root.
    fn namespace() -> Option<&'static str> {
        None
    }

    /// Foreign-key field the primary key redirects through, for
    /// resources keyed by a one-to-one relation instead of a plain id.
    fn pk_field() -> Option<&'static str> {
        None
    }

    /// Localization collection name, when it is not
    /// `{RESOURCE_NAME}localization`.
    fn localization_resource() -> Option<&'static str> {
        None
    }
}

/// Runtime registration record for one resource binding.
#[derive(Clone, Debug)]
pub struct ProxyRegistration {
    /// Name the binding is looked up under ("type name").
    pub type_name: String,
    /// Resource name as it appears in collection URLs.
    pub resource_name: String,
    pub namespace: Option<String>,
    pub pk_field: Option<String>,
    pub localization_resource: Option<String>,
}

impl ProxyRegistration {
    pub fn new(type_name: impl Into<String>, resource_name: impl Into<String>) -> Self {
        ProxyRegistration {
            type_name: type_name.into(),
            resource_name: resource_name.into(),
            namespace: None,
            pk_field: None,
            localization_resource: None,
        }
    }

    /// Build a registration from a statically-bound type.
    pub fn of<T: ResourceBinding>() -> Self {
        ProxyRegistration {
            type_name: T::RESOURCE_NAME.to_string(),
            resource_name: T::RESOURCE_NAME.to_string(),
            namespace: T::namespace().map(String::from),
            pk_field: T::pk_field().map(String::from),
            localization_resource: T::localization_resource().map(String::from),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_pk_field(mut self, field: impl Into<String>) -> Self {
        self.pk_field = Some(field.into());
        self
    }

    pub fn with_localization_resource(mut self, resource: impl Into<String>) -> Self {
        self.localization_resource = Some(resource.into());
        self
    }

    /// Registry key: the lower-cased type name.
    pub fn lookup_key(&self) -> String {
        self.type_name.to_ascii_lowercase()
    }

    /// Localization collection for this resource.
    pub fn localization_name(&self) -> String {
        self.localization_resource
            .clone()
            .unwrap_or_else(|| format!("{}localization", self.resource_name))
    }
}

/// A locally constructed record, used when the session has no API
/// endpoint (local mode).
///
/// Local records hold plain field values and never touch the network;
/// they exist so code written against record-shaped data keeps working
/// in deployments that run without the remote API.
#[derive(Clone, Debug, Default)]
pub struct LocalRecord {
    fields: Map<String, Value>,
}

impl LocalRecord {
    pub fn new() -> Self {
        LocalRecord::default()
    }

    pub fn from_fields(fields: Map<String, Value>) -> Self {
        LocalRecord { fields }
    }

    /// Set one field, returning the record for chaining.
    pub fn set(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The record's primary key, from its `id` field.
    pub fn pk(&self) -> Option<String> {
        match self.fields.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_data(self) -> Map<String, Value> {
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Album;

    impl ResourceBinding for Album {
        const RESOURCE_NAME: &'static str = "album";

        fn namespace() -> Option<&'static str> {
            Some("music")
        }

        fn pk_field() -> Option<&'static str> {
            Some("item")
        }
    }

    #[test]
    fn test_registration_from_binding() {
        let registration = ProxyRegistration::of::<Album>();
        assert_eq!(registration.resource_name, "album");
        assert_eq!(registration.namespace.as_deref(), Some("music"));
        assert_eq!(registration.pk_field.as_deref(), Some("item"));
        assert_eq!(registration.lookup_key(), "album");
    }

    #[test]
    fn test_localization_name_defaults_to_convention() {
        let registration = ProxyRegistration::new("Article", "article");
        assert_eq!(registration.localization_name(), "articlelocalization");

        let overridden = registration.with_localization_resource("articlei18n");
        assert_eq!(overridden.localization_name(), "articlei18n");
    }

    #[test]
    fn test_local_record_round_trip() {
        let record = LocalRecord::new()
            .set("id", json!(7))
            .set("title", json!("Seven"));

        assert_eq!(record.pk().as_deref(), Some("7"));
        assert_eq!(record.get("title"), Some(&json!("Seven")));
        assert!(record.get("missing").is_none());
    }
}
