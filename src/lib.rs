//! # proxy-kit
//!
//! A cache-backed object proxy over schema-described REST APIs.
//!
//! ## Features
//!
//! - **Schema Driven:** Models are generated at runtime from each
//!   resource's remote schema, no per-resource structs required
//! - **Relation Aware:** To-one and to-many fields resolve to proxies
//!   over their target records, across API namespaces
//! - **Cache Backed:** Every `GET` is served through a response cache
//!   with write-invalidation; backends are pluggable (in-memory, Redis,
//!   or custom)
//! - **Client Registry:** Clients are deduplicated by endpoint identity
//!   (URL, version, namespace, credentials), so equal endpoints share
//!   schema state and connection pools
//! - **Localizable:** Records resolve localized variants from sibling
//!   localization collections, degrading to null-valued placeholders
//!
//! ## Quick Start
//!
//! ```ignore
//! use proxy_kit::{ProxySession, ProxyConfig, Op, backend::InMemoryBackend};
//!
//! let config = ProxyConfig::new("http://api.example.com:8000/api/")
//!     .with_version("v1")
//!     .with_auth("superuser", "secret");
//! let session = ProxySession::new(config, InMemoryBackend::new());
//!
//! // Managers are query entry points; nothing is fetched until needed.
//! let items = session.manager("item").await?;
//! let item = items.get("source_item_id", Op::Exact, "t-101").await?;
//!
//! // Field access is schema-dispatched; relations hop namespaces.
//! let title = item.scalar("title").await?;
//! let children = item.to_many("children").await?;
//! let count = children.all().count().await?;
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod binding;
pub mod client;
pub mod codec;
pub mod config;
pub mod entity;
pub mod error;
pub mod localize;
pub mod manager;
pub mod metrics;
pub mod query;
pub mod schema;
pub mod session;
pub mod uri;
pub mod value;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use binding::{LocalRecord, ProxyRegistration, ResourceBinding};
pub use client::ResourceClient;
pub use config::ProxyConfig;
pub use entity::{Attribute, EntityProxy};
pub use error::{Error, Result};
pub use localize::{localize, Localized};
pub use manager::{Manager, ManyToManyManager};
pub use metrics::{LogMetrics, NoOpMetrics, ProxyMetrics};
pub use query::{FilterValue, Op, Query, QuerySet};
pub use schema::{FieldAccessor, ModelDescriptor, ResourceSchema};
pub use session::ProxySession;
pub use value::FieldValue;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
