//! Localization lookup: resolve the localized variant of a record for a
//! language tag.
//!
//! Localized variants live in a sibling collection named
//! `{resource}localization` by convention (a registered binding can
//! override the name). The lookup filters that collection by the owning
//! record's key and the language tag. A missing variant is not an
//! error: it resolves to an empty [`Localized`] whose field reads yield
//! null, so display code never branches on localization coverage.

use crate::backend::CacheBackend;
use crate::entity::EntityProxy;
use crate::error::Result;
use crate::manager::Manager;
use crate::query::Op;
use crate::value::FieldValue;

/// A resolved localization variant, possibly empty.
pub struct Localized<B: CacheBackend> {
    language_code: String,
    entity: Option<EntityProxy<B>>,
}

impl<B: CacheBackend> Localized<B> {
    /// An empty variant: every field reads as null.
    pub fn empty(language_code: impl Into<String>) -> Self {
        Localized {
            language_code: language_code.into(),
            entity: None,
        }
    }

    fn found(language_code: impl Into<String>, entity: EntityProxy<B>) -> Self {
        Localized {
            language_code: language_code.into(),
            entity: Some(entity),
        }
    }

    /// Whether no localized record exists for the requested language.
    pub fn is_empty(&self) -> bool {
        self.entity.is_none()
    }

    /// The language tag this variant was resolved for.
    pub fn language_code(&self) -> &str {
        &self.language_code
    }

    /// The underlying localized record, when one exists.
    pub fn entity(&self) -> Option<&EntityProxy<B>> {
        self.entity.as_ref()
    }

    /// Read one localized field.
    ///
    /// On an empty variant every field yields null, except
    /// `language_code`, which yields the requested tag.
    pub async fn get(&self, name: &str) -> Result<FieldValue> {
        match &self.entity {
            Some(entity) => entity.scalar(name).await,
            None if name == "language_code" => {
                Ok(FieldValue::String(self.language_code.clone()))
            }
            None => Ok(FieldValue::Null),
        }
    }
}

/// Resolve the localized variant of a record.
///
/// `language` defaults to the session's configured language (primary
/// subtag, lower-cased). The localization collection is looked up on the
/// same endpoint as the owning record.
pub async fn localize<B: CacheBackend>(
    entity: &EntityProxy<B>,
    language: Option<&str>,
) -> Result<Localized<B>> {
    let session = entity.session();
    let language_code = language
        .map(String::from)
        .unwrap_or_else(|| session.config().default_language());

    let resource_name = entity.resource_name().to_string();
    let localization_resource = session
        .registration(&resource_name)
        .map(|registration| registration.localization_name())
        .unwrap_or_else(|| format!("{}localization", resource_name));

    let client = entity.client();
    let model = client.model(&localization_resource).await?;
    let manager = Manager::new(session.clone(), client.clone(), model);

    let pk = entity.pk().await?;
    let mut matches = manager
        .filter(&resource_name, Op::Exact, pk.as_str())
        .filter("language_code", Op::Exact, language_code.as_str())
        .fetch()
        .await?;

    if matches.is_empty() {
        debug!(
            "No {} localization of {} for \"{}\"",
            resource_name, pk, language_code
        );
        return Ok(Localized::empty(language_code));
    }

    Ok(Localized::found(language_code, matches.remove(0)))
}
