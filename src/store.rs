use std::collections::HashMap;
use std::path::Path;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use crate::model::{Category, Post, PostPatch, PostStatus, Snapshot};
use crate::relation::{RelatedDocument, Relation, relations_from_ids};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Posts,
    Categories,
}

impl Collection {
    pub fn slug(self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Categories => "categories",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindQuery {
    /// `None` matches every status.
    pub status: Option<PostStatus>,
    pub limit: usize,
    /// Relationship population depth; 0 leaves references as ids.
    pub depth: u8,
}

/// The CMS collections the audit reads and writes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_posts(&self, query: &FindQuery) -> anyhow::Result<Vec<Post>>;
    async fn find_categories(&self, limit: usize) -> anyhow::Result<Vec<Category>>;
    async fn update_post(&self, id: &str, patch: &PostPatch) -> anyhow::Result<()>;
}

/// Keeps both collections in memory. Backs fixture files and tests.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<Snapshot>,
}

impl MemoryDocumentStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    /// Reads a JSON or YAML (`.yaml`/`.yml`) snapshot.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = fs::read(path)
            .await
            .with_context(|| format!("read: {}", path.display()))?;
        let snapshot: Snapshot = if is_yaml(path) {
            serde_yaml::from_slice(&bytes).context("parse yaml snapshot")?
        } else {
            serde_json::from_slice(&bytes).context("parse json snapshot")?
        };
        tracing::debug!(
            posts = snapshot.posts.len(),
            categories = snapshot.categories.len(),
            "loaded snapshot"
        );
        Ok(Self::new(snapshot))
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.inner.read().await.clone()
    }

    /// Writes the current contents back in the format implied by the extension.
    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let snapshot = self.snapshot().await;
        let data = if is_yaml(path) {
            serde_yaml::to_string(&snapshot)
                .context("serialize yaml snapshot")?
                .into_bytes()
        } else {
            serde_json::to_vec_pretty(&snapshot).context("serialize json snapshot")?
        };

        let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp_path, &data)
            .await
            .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path)
            .await
            .with_context(|| format!("rename tmp to final: {}", path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_posts(&self, query: &FindQuery) -> anyhow::Result<Vec<Post>> {
        let snapshot = self.inner.read().await;
        let mut posts: Vec<Post> = snapshot
            .posts
            .iter()
            .filter(|post| query.status.is_none_or(|status| post.status == status))
            .take(query.limit)
            .cloned()
            .collect();

        if query.depth > 0 {
            let categories: HashMap<&str, &Category> = snapshot
                .categories
                .iter()
                .map(|c| (c.id.as_str(), c))
                .collect();
            let titles: HashMap<&str, &Post> =
                snapshot.posts.iter().map(|p| (p.id.as_str(), p)).collect();

            for post in &mut posts {
                populate(&mut post.categories, |id| {
                    categories
                        .get(id)
                        .map(|c| (c.title.clone(), c.slug.clone()))
                });
                populate(&mut post.related_posts, |id| {
                    titles.get(id).map(|p| (p.title.clone(), p.slug.clone()))
                });
            }
        }

        Ok(posts)
    }

    async fn find_categories(&self, limit: usize) -> anyhow::Result<Vec<Category>> {
        let snapshot = self.inner.read().await;
        Ok(snapshot.categories.iter().take(limit).cloned().collect())
    }

    async fn update_post(&self, id: &str, patch: &PostPatch) -> anyhow::Result<()> {
        let mut snapshot = self.inner.write().await;
        let post = snapshot
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| anyhow::anyhow!("post not found: {id}"))?;

        if let Some(categories) = &patch.categories {
            post.categories = relations_from_ids(categories.iter().cloned());
        }
        if let Some(related_posts) = &patch.related_posts {
            post.related_posts = relations_from_ids(related_posts.iter().cloned());
        }
        Ok(())
    }
}

/// Expands id references the store can resolve; unknown ids stay as ids.
fn populate<F>(refs: &mut [Option<Relation>], lookup: F)
where
    F: Fn(&str) -> Option<(Option<String>, Option<String>)>,
{
    for entry in refs.iter_mut().flatten() {
        let Relation::Id(raw) = &*entry else {
            continue;
        };
        let raw = raw.clone();
        let Some(id) = entry.target_id() else {
            continue;
        };
        if let Some((title, slug)) = lookup(&id) {
            *entry = Relation::Document(RelatedDocument {
                id: Some(raw),
                title,
                slug,
            });
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}
