//! Relationship references as they come out of the document store.
//!
//! A `categories` or `relatedPosts` entry is either a bare identifier (depth 0)
//! or the expanded document (depth >= 1). Ids are strings on MongoDB and
//! numbers on the SQL adapters. Everything that compares relationships goes
//! through [`relation_ids`] first.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_key(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(n) => n.to_string(),
        }
    }

    fn key(&self) -> Option<String> {
        match self {
            Self::Text(text) if text.trim().is_empty() => None,
            Self::Text(text) => Some(text.clone()),
            Self::Number(n) => Some(n.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RawId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Relation {
    Id(RawId),
    Document(RelatedDocument),
}

impl Relation {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(RawId::Text(id.into()))
    }

    /// The referenced identifier, or `None` for entries that cannot name a document.
    pub fn target_id(&self) -> Option<String> {
        match self {
            Self::Id(raw) => raw.key(),
            Self::Document(doc) => doc.id.as_ref().and_then(RawId::key),
        }
    }
}

/// Reduces a raw relationship list to identifiers, dropping null and empty entries.
///
/// Whitespace-only ids and expanded documents without an id are dropped as
/// well, so they never make a post count as having a relationship. A plain
/// null/empty check would count them; neither can be compared against other
/// posts or written back in a patch.
pub fn relation_ids(refs: &[Option<Relation>]) -> Vec<String> {
    refs.iter()
        .flatten()
        .filter_map(Relation::target_id)
        .collect()
}

pub fn relations_from_ids<I, S>(ids: I) -> Vec<Option<Relation>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ids.into_iter().map(|id| Some(Relation::id(id))).collect()
}

/// Accepts `"abc"` or `42` for a document id.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(RawId::into_key)
}

/// Treats a missing or `null` relationship field as an empty list.
pub fn deserialize_relations<'de, D>(deserializer: D) -> Result<Vec<Option<Relation>>, D::Error>
where
    D: Deserializer<'de>,
{
    let refs: Option<Vec<Option<Relation>>> = Option::deserialize(deserializer)?;
    Ok(refs.unwrap_or_default())
}
