use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::relation::{Relation, deserialize_id, deserialize_relations, relation_ids};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Published,
    #[default]
    Draft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "_status", default)]
    pub status: PostStatus,
    #[serde(default, deserialize_with = "deserialize_relations")]
    pub categories: Vec<Option<Relation>>,
    #[serde(default, deserialize_with = "deserialize_relations")]
    pub related_posts: Vec<Option<Relation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn category_ids(&self) -> Vec<String> {
        relation_ids(&self.categories)
    }

    pub fn related_post_ids(&self) -> Vec<String> {
        relation_ids(&self.related_posts)
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("<untitled>")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Partial update for a post. Only the fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_posts: Option<Vec<String>>,
}

/// Everything an audit run can read: the posts and category collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub categories: Vec<Category>,
}
