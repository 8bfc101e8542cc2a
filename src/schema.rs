//! Resource schema descriptors and the model generator.
//!
//! A resource's `schema` sub-path returns field descriptors:
//!
//! ```json
//! {"fields": {"id":      {"type": "integer"},
//!             "title":   {"type": "string", "nullable": true},
//!             "parents": {"type": "related", "related_type": "to_many",
//!                         "schema": "/api/v1/core/item/schema/"}}}
//! ```
//!
//! [`ModelDescriptor::from_schema`] turns a fetched schema into a typed
//! model: a lookup table from field name to accessor kind
//! (scalar / to-one / to-many), built once at model-generation time and
//! dispatched on for every attribute access. Schemas are immutable once
//! fetched for a session's lifetime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Relation kind of a related field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    ToOne,
    ToMany,
}

/// Wire type of a scalar field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    List,
    Json,
    #[serde(other)]
    Unknown,
}

/// One field's schema descriptor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Wire type; relations report their own type name, which maps to
    /// `Unknown` and is ignored in favor of `related_type`.
    #[serde(rename = "type", default)]
    pub field_type: WireType,

    /// Whether the field accepts null.
    #[serde(default)]
    pub nullable: bool,

    /// Present for relation fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_type: Option<RelationKind>,

    /// Explicit schema URL of the relation target, when the server
    /// provides one.
    #[serde(default, rename = "schema", skip_serializing_if = "Option::is_none")]
    pub schema_url: Option<String>,
}

impl FieldSchema {
    /// Whether this field is a relation.
    pub fn is_relation(&self) -> bool {
        self.related_type.is_some()
    }
}

/// A fetched resource schema.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResourceSchema {
    #[serde(default)]
    pub fields: HashMap<String, FieldSchema>,
}

impl ResourceSchema {
    /// Look up one field's descriptor.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }
}

/// Accessor kind for one field, dispatched on per attribute access.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldAccessor {
    /// Plain value, coerced by wire type on access.
    Scalar(WireType),
    /// Reference to a single target record.
    ToOne {
        /// Explicit target schema URL, when the server provides one.
        schema_url: Option<String>,
    },
    /// References to a set of target records.
    ToMany {
        schema_url: Option<String>,
    },
}

/// A typed model generated from a resource schema.
///
/// Owns the resource name, the raw schema, and the accessor lookup table.
#[derive(Clone, Debug)]
pub struct ModelDescriptor {
    resource_name: String,
    schema: Arc<ResourceSchema>,
    accessors: HashMap<String, FieldAccessor>,
}

impl ModelDescriptor {
    /// Generate a model from a fetched schema.
    pub fn from_schema(resource_name: impl Into<String>, schema: Arc<ResourceSchema>) -> Self {
        let accessors = schema
            .fields
            .iter()
            .map(|(name, field)| {
                let accessor = match field.related_type {
                    Some(RelationKind::ToOne) => FieldAccessor::ToOne {
                        schema_url: field.schema_url.clone(),
                    },
                    Some(RelationKind::ToMany) => FieldAccessor::ToMany {
                        schema_url: field.schema_url.clone(),
                    },
                    None => FieldAccessor::Scalar(field.field_type),
                };
                (name.clone(), accessor)
            })
            .collect();

        ModelDescriptor {
            resource_name: resource_name.into(),
            schema,
            accessors,
        }
    }

    /// The resource name this model was generated for.
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// The raw schema the model was generated from.
    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    /// Accessor for one field, `None` when the schema has no such field.
    pub fn accessor(&self, name: &str) -> Option<&FieldAccessor> {
        self.accessors.get(name)
    }

    /// Field names, for diagnostics.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.accessors.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_schema() -> ResourceSchema {
        serde_json::from_value(json!({
            "fields": {
                "id": {"type": "integer"},
                "source_item_id": {"type": "string"},
                "ctime": {"type": "datetime", "nullable": true},
                "release_date": {"type": "date"},
                "parents": {"type": "related", "related_type": "to_many",
                            "schema": "/api/v1/core/item/schema/"},
                "item": {"type": "related", "related_type": "to_one"}
            }
        }))
        .expect("Failed to parse schema")
    }

    #[test]
    fn test_schema_deserialization() {
        let schema = sample_schema();
        assert_eq!(schema.fields.len(), 6);
        assert_eq!(
            schema.field("id").unwrap().field_type,
            WireType::Integer
        );
        assert!(schema.field("ctime").unwrap().nullable);
        assert_eq!(
            schema.field("parents").unwrap().related_type,
            Some(RelationKind::ToMany)
        );
        assert_eq!(
            schema.field("parents").unwrap().schema_url.as_deref(),
            Some("/api/v1/core/item/schema/")
        );
        assert!(!schema.field("source_item_id").unwrap().is_relation());
    }

    #[test]
    fn test_unknown_wire_type_tolerated() {
        let schema: ResourceSchema = serde_json::from_value(json!({
            "fields": {"blob": {"type": "some_future_type"}}
        }))
        .expect("Failed to parse schema");
        assert_eq!(schema.field("blob").unwrap().field_type, WireType::Unknown);
    }

    #[test]
    fn test_model_generation_accessor_table() {
        let model = ModelDescriptor::from_schema("item", Arc::new(sample_schema()));

        assert_eq!(model.resource_name(), "item");
        assert_eq!(
            model.accessor("source_item_id"),
            Some(&FieldAccessor::Scalar(WireType::String))
        );
        assert_eq!(
            model.accessor("parents"),
            Some(&FieldAccessor::ToMany {
                schema_url: Some("/api/v1/core/item/schema/".to_string())
            })
        );
        assert_eq!(
            model.accessor("item"),
            Some(&FieldAccessor::ToOne { schema_url: None })
        );
        assert_eq!(model.accessor("missing"), None);
    }
}
