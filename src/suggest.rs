//! Heuristics that propose relationships for posts that lack them.
//!
//! Suggestions only ever name documents that were handed in; nothing here
//! creates categories or posts.

use std::collections::HashSet;

use crate::config::{AuditConfig, EmptySlugPolicy, FallbackPolicy};
use crate::model::{Category, Post};

pub const MAX_SUGGESTED_CATEGORIES: usize = 2;
pub const MAX_SUGGESTED_RELATED_POSTS: usize = 3;
/// Below this many overlap matches the related-post list is padded with any other post.
pub const MIN_OVERLAP_RELATED_POSTS: usize = 2;

const TITLE_MATCH_SCORE: u32 = 10;
const SLUG_MATCH_SCORE: u32 = 8;
const WORD_MATCH_SCORE: u32 = 3;
const MIN_SCORED_WORD_CHARS: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
pub struct CategorySuggester {
    fallback: FallbackPolicy,
    empty_slug: EmptySlugPolicy,
}

impl CategorySuggester {
    pub fn new(fallback: FallbackPolicy, empty_slug: EmptySlugPolicy) -> Self {
        Self {
            fallback,
            empty_slug,
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.fallback, config.empty_slug)
    }

    /// Returns up to two category ids from `categories`, best match first.
    pub fn suggest(&self, post: &Post, categories: &[Category]) -> Vec<String> {
        let title = post.title.as_deref().unwrap_or_default();
        if title.is_empty() || categories.is_empty() {
            tracing::warn!(
                post_id = %post.id,
                title = post.display_title(),
                categories = categories.len(),
                "cannot suggest categories: no title or no categories available"
            );
            return Vec::new();
        }

        let title = title.to_lowercase();
        let slug = post.slug.as_deref().unwrap_or_default().to_lowercase();

        let mut scored: Vec<(&Category, u32)> = categories
            .iter()
            .map(|category| (category, self.score(&title, &slug, category)))
            .filter(|(_, score)| *score > 0)
            .collect();
        // Stable: ties keep store order.
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        let mut picks: Vec<&Category> = scored
            .into_iter()
            .take(MAX_SUGGESTED_CATEGORIES)
            .map(|(category, _)| category)
            .collect();

        if picks.is_empty() {
            match self.fallback {
                FallbackPolicy::FirstCategory => {
                    if let Some(first) = categories.first() {
                        tracing::info!(
                            post_id = %post.id,
                            fallback = first.title.as_deref().unwrap_or(&first.id),
                            "no keyword match, using fallback category"
                        );
                        picks.push(first);
                    }
                }
                FallbackPolicy::None => {
                    tracing::info!(post_id = %post.id, "no keyword match, no fallback configured");
                }
            }
        }

        if !picks.is_empty() {
            let names: Vec<&str> = picks
                .iter()
                .map(|c| c.title.as_deref().unwrap_or(&c.id))
                .collect();
            tracing::info!(
                post_id = %post.id,
                title = post.display_title(),
                suggested = %names.join(", "),
                "suggested existing categories"
            );
        }

        picks.into_iter().map(|c| c.id.clone()).collect()
    }

    /// Title containment 10, slug containment 8, and 3 per long category
    /// word found inside a title word. `title` and `slug` are lowercase.
    fn score(&self, title: &str, slug: &str, category: &Category) -> u32 {
        let category_title = category
            .title
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if category_title.is_empty() {
            return 0;
        }
        let category_slug = category
            .slug
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        let mut score = 0;
        if title.contains(&category_title) {
            score += TITLE_MATCH_SCORE;
        }
        let slug_matches = match self.empty_slug {
            EmptySlugPolicy::Match => slug.contains(&category_slug),
            EmptySlugPolicy::Ignore => !category_slug.is_empty() && slug.contains(&category_slug),
        };
        if slug_matches {
            score += SLUG_MATCH_SCORE;
        }

        let title_words: Vec<&str> = title.split_whitespace().collect();
        for word in category_title.split_whitespace() {
            if word.chars().count() >= MIN_SCORED_WORD_CHARS
                && title_words.iter().any(|t| t.contains(word))
            {
                score += WORD_MATCH_SCORE;
            }
        }
        score
    }
}

/// Returns up to three other post ids, preferring posts that share a category.
pub fn suggest_related_posts(post: &Post, candidates: &[Post]) -> Vec<String> {
    if post.id.is_empty() {
        return Vec::new();
    }

    let own_categories: HashSet<String> = post.category_ids().into_iter().collect();
    let mut suggestions: Vec<String> = Vec::new();

    for other in candidates {
        if suggestions.len() >= MAX_SUGGESTED_RELATED_POSTS {
            break;
        }
        if other.id.is_empty() || other.id == post.id || suggestions.contains(&other.id) {
            continue;
        }
        let overlaps = other
            .category_ids()
            .iter()
            .any(|id| own_categories.contains(id));
        if overlaps {
            suggestions.push(other.id.clone());
        }
    }

    if suggestions.len() < MIN_OVERLAP_RELATED_POSTS {
        for other in candidates {
            if suggestions.len() >= MAX_SUGGESTED_RELATED_POSTS {
                break;
            }
            if other.id.is_empty() || other.id == post.id || suggestions.contains(&other.id) {
                continue;
            }
            suggestions.push(other.id.clone());
        }
    }

    tracing::info!(
        post_id = %post.id,
        title = post.display_title(),
        count = suggestions.len(),
        "suggested related posts"
    );
    suggestions
}
