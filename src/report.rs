use serde::{Deserialize, Serialize};

use crate::audit::AuditResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub success: bool,
    pub summary: Summary,
    pub breakdown: Breakdown,
    pub details: AuditResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_audited: usize,
    pub total_issues: usize,
    pub health_score: u8,
    pub auto_fix_applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub missing_both: usize,
    pub missing_categories: usize,
    pub missing_related_posts: usize,
    pub complete: usize,
}

impl AuditReport {
    pub fn new(details: AuditResult, auto_fix_applied: bool) -> Self {
        let total_audited = details.total();
        let breakdown = Breakdown {
            missing_both: details.missing_both.len(),
            missing_categories: details.missing_categories.len(),
            missing_related_posts: details.missing_related_posts.len(),
            complete: details.complete.len(),
        };
        Self {
            success: true,
            summary: Summary {
                total_audited,
                total_issues: details.issues(),
                health_score: health_score(breakdown.complete, total_audited),
                auto_fix_applied,
            },
            breakdown,
            details,
        }
    }
}

/// Percentage of complete posts, rounded half up. An empty audit scores 100.
pub fn health_score(complete: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let complete = complete.min(total) as u64;
    let total = total as u64;
    ((200 * complete + total) / (2 * total)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{CompleteEntry, PostSummary};

    #[test]
    fn health_score_edges_and_rounding() {
        assert_eq!(health_score(0, 0), 100);
        assert_eq!(health_score(0, 3), 0);
        assert_eq!(health_score(3, 3), 100);
        assert_eq!(health_score(1, 3), 33);
        assert_eq!(health_score(2, 3), 67);
        assert_eq!(health_score(1, 8), 13); // 12.5 rounds up
        assert_eq!(health_score(1, 200), 1); // 0.5 rounds up
    }

    #[test]
    fn empty_audit_report_is_healthy() {
        let report = AuditReport::new(AuditResult::default(), false);
        assert_eq!(report.summary.total_audited, 0);
        assert_eq!(report.summary.total_issues, 0);
        assert_eq!(report.summary.health_score, 100);
    }

    #[test]
    fn report_serializes_with_camel_case_keys() -> anyhow::Result<()> {
        let mut details = AuditResult::default();
        details.missing_both.push(PostSummary {
            id: "p1".to_owned(),
            slug: "a".to_owned(),
            title: "A".to_owned(),
            published_at: None,
        });
        details.complete.push(CompleteEntry {
            post: PostSummary {
                id: "p2".to_owned(),
                slug: "b".to_owned(),
                title: "B".to_owned(),
                published_at: None,
            },
            categories_count: 1,
            related_posts_count: 2,
        });

        let value = serde_json::to_value(AuditReport::new(details, true))?;
        assert_eq!(value["summary"]["totalAudited"], 2);
        assert_eq!(value["summary"]["totalIssues"], 1);
        assert_eq!(value["summary"]["healthScore"], 50);
        assert_eq!(value["summary"]["autoFixApplied"], true);
        assert_eq!(value["breakdown"]["missingBoth"], 1);
        assert_eq!(value["details"]["complete"][0]["id"], "p2");
        assert_eq!(value["details"]["complete"][0]["relatedPostsCount"], 2);
        assert!(value["details"]["missingBoth"][0].get("publishedAt").is_none());
        Ok(())
    }
}
