use anyhow::Context as _;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::model::{Category, Post, PostPatch, PostStatus};
use crate::store::{Collection, DocumentStore, FindQuery};

/// Talks to a Payload CMS instance over its REST API (`/api/{collection}`).
#[derive(Debug, Clone)]
pub struct PayloadRestStore {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FindResponse<T> {
    docs: Vec<T>,
}

impl PayloadRestStore {
    pub fn new(base_url: Url, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    pub fn collection_url(&self, collection: Collection, id: Option<&str>) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| anyhow::anyhow!("payload url cannot be a base: {}", self.base_url))?;
            segments.pop_if_empty().extend(["api", collection.slug()]);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header(
                reqwest::header::AUTHORIZATION,
                format!("users API-Key {key}"),
            ),
            None => req,
        }
    }

    async fn find<T: DeserializeOwned>(
        &self,
        collection: Collection,
        params: &[(&str, String)],
    ) -> anyhow::Result<Vec<T>> {
        let url = self.collection_url(collection, None)?;
        let response = self
            .authorize(self.client.get(url.clone()).query(params))
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .with_context(|| format!("read {} response body", collection.slug()))?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or(raw);
            anyhow::bail!("payload find {} failed ({status}): {message}", collection.slug());
        }

        let found: FindResponse<T> = serde_json::from_str(&raw)
            .with_context(|| format!("parse {} find response", collection.slug()))?;
        Ok(found.docs)
    }
}

#[async_trait]
impl DocumentStore for PayloadRestStore {
    async fn find_posts(&self, query: &FindQuery) -> anyhow::Result<Vec<Post>> {
        let mut params = vec![
            ("limit", query.limit.to_string()),
            ("depth", query.depth.to_string()),
        ];
        if let Some(status) = query.status {
            params.push(("where[_status][equals]", status_param(status).to_owned()));
        }
        self.find(Collection::Posts, &params).await
    }

    async fn find_categories(&self, limit: usize) -> anyhow::Result<Vec<Category>> {
        let params = [("limit", limit.to_string()), ("depth", "0".to_owned())];
        self.find(Collection::Categories, &params).await
    }

    async fn update_post(&self, id: &str, patch: &PostPatch) -> anyhow::Result<()> {
        let url = self.collection_url(Collection::Posts, Some(id))?;
        let response = self
            .authorize(self.client.patch(url.clone()).json(patch))
            .send()
            .await
            .with_context(|| format!("PATCH {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = parse_error_message(&raw).unwrap_or(raw);
            anyhow::bail!("payload update post {id} failed ({status}): {message}");
        }
        Ok(())
    }
}

fn status_param(status: PostStatus) -> &'static str {
    match status {
        PostStatus::Published => "published",
        PostStatus::Draft => "draft",
    }
}

/// Payload reports failures as `{"errors": [{"message": ...}]}`.
fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let messages: Vec<&str> = value
        .get("errors")?
        .as_array()?
        .iter()
        .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
        .collect();
    if messages.is_empty() {
        return None;
    }
    Some(messages.join("; "))
}
