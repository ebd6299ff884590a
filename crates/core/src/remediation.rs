use crate::domain::recommendation::{Effort, Recommendation, RiskLevel};
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::extract::extract_code_block;
use crate::llm::{prompts, LlmClient, TextRequest};
use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const MISSING_CLIENT_PLACEHOLDER: &str = "# Error: LLM provider not configured";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OptimizationType {
    #[serde(rename = "EBS_delete")]
    EbsDelete,
    #[serde(rename = "RDS_snapshot_delete")]
    RdsSnapshotDelete,
    #[serde(rename = "S3_lifecycle")]
    S3Lifecycle,
}

impl OptimizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationType::EbsDelete => "EBS_delete",
            OptimizationType::RdsSnapshotDelete => "RDS_snapshot_delete",
            OptimizationType::S3Lifecycle => "S3_lifecycle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RemediationDetails {
    VolumeCleanup {
        volume_ids: Vec<String>,
        reason: String,
    },
    SnapshotCleanup {
        snapshot_ids: Vec<String>,
        reason: String,
    },
    Lifecycle {
        bucket_name: String,
        current_class: String,
        target_class: String,
        transition_days: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationItem {
    pub recommendation_id: i64,
    pub optimization_type: OptimizationType,
    pub details: RemediationDetails,
    pub auto_safe: bool,
}

impl RemediationItem {
    pub fn terraform_file_name(&self) -> String {
        format!(
            "{}_{}.tf",
            self.optimization_type.as_str().to_ascii_lowercase(),
            self.recommendation_id
        )
    }
}

/// Picks the low-risk quick wins that map onto a known cleanup and describes how to apply
/// each. Everything else is left for manual follow-up.
pub fn create_remediation_plan(recommendations: &[Recommendation]) -> Vec<RemediationItem> {
    recommendations
        .iter()
        .filter(|rec| rec.risk_level == RiskLevel::Low && rec.effort == Effort::QuickWin)
        .filter_map(|rec| {
            let title = rec.title.to_lowercase();
            let (optimization_type, details) = if title.contains("ebs") && title.contains("delete") {
                (
                    OptimizationType::EbsDelete,
                    RemediationDetails::VolumeCleanup {
                        volume_ids: Vec::new(),
                        reason: rec.description.clone(),
                    },
                )
            } else if title.contains("snapshot") && title.contains("delete") {
                (
                    OptimizationType::RdsSnapshotDelete,
                    RemediationDetails::SnapshotCleanup {
                        snapshot_ids: Vec::new(),
                        reason: rec.description.clone(),
                    },
                )
            } else if title.contains("s3") && title.contains("lifecycle") {
                (
                    OptimizationType::S3Lifecycle,
                    RemediationDetails::Lifecycle {
                        bucket_name: String::new(),
                        current_class: "STANDARD".to_string(),
                        target_class: "INTELLIGENT_TIERING".to_string(),
                        transition_days: 30,
                    },
                )
            } else {
                return None;
            };

            Some(RemediationItem {
                recommendation_id: rec.id,
                optimization_type,
                details,
                auto_safe: true,
            })
        })
        .collect()
}

pub async fn draft_terraform(
    client: Option<&dyn LlmClient>,
    item: &RemediationItem,
    max_tokens: u32,
) -> String {
    let Some(client) = client else {
        return MISSING_CLIENT_PLACEHOLDER.to_string();
    };

    let request = TextRequest::new(prompts::terraform_prompt(item), max_tokens);
    match client.generate_text(request).await {
        Ok(text) => {
            tracing::info!(
                recommendation_id = item.recommendation_id,
                optimization = item.optimization_type.as_str(),
                provider = %client.provider(),
                "terraform draft generated"
            );
            extract_code_block(&text)
        }
        Err(err) => {
            tracing::error!(
                recommendation_id = item.recommendation_id,
                error = %format!("{err:#}"),
                "terraform generation failed"
            );
            if let Some(diag) = err.downcast_ref::<LlmDiagnosticsError>() {
                tracing::debug!(
                    stage = diag.stage,
                    raw_output = ?diag.raw_output,
                    raw_response = ?diag.raw_response_json,
                    "provider diagnostics"
                );
            }
            format!("# Error generating Terraform: {err}")
        }
    }
}

pub fn save_terraform(dir: &Path, file_name: &str, code: &str) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create terraform directory {}", dir.display()))?;
    let path = dir.join(file_name);
    std::fs::write(&path, code)
        .with_context(|| format!("failed to write terraform file {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::RecommendationStatus;
    use crate::llm::mock::MockClient;
    use chrono::NaiveDate;
    use serde_json::json;

    fn rec(id: i64, title: &str, risk: RiskLevel, effort: Effort) -> Recommendation {
        Recommendation {
            id,
            created_at: NaiveDate::from_ymd_opt(2026, 2, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            account_name: "demo".to_string(),
            recommendation_type: "cleanup".to_string(),
            title: title.to_string(),
            description: "idle for 45 days".to_string(),
            estimated_monthly_savings: 10.0,
            risk_level: risk,
            effort,
            status: RecommendationStatus::Pending,
            implemented_at: None,
            actual_monthly_savings: None,
            notes: None,
        }
    }

    #[test]
    fn plan_keeps_only_low_risk_quick_wins() {
        let recs = vec![
            rec(1, "Delete unattached EBS volumes", RiskLevel::Low, Effort::QuickWin),
            rec(2, "Delete old RDS snapshot from 2023", RiskLevel::Low, Effort::QuickWin),
            rec(3, "Add S3 lifecycle policy", RiskLevel::Low, Effort::QuickWin),
            rec(4, "Delete EBS volumes in staging", RiskLevel::Medium, Effort::QuickWin),
            rec(5, "Add S3 lifecycle to logs bucket", RiskLevel::Low, Effort::Complex),
            rec(6, "Downsize EC2 m5.4xlarge", RiskLevel::Low, Effort::QuickWin),
        ];

        let plan = create_remediation_plan(&recs);
        let ids: Vec<_> = plan.iter().map(|i| i.recommendation_id).collect();
        assert_eq!(ids, [1, 2, 3]);
        assert_eq!(plan[0].optimization_type, OptimizationType::EbsDelete);
        assert_eq!(plan[1].optimization_type, OptimizationType::RdsSnapshotDelete);
        assert_eq!(plan[2].optimization_type, OptimizationType::S3Lifecycle);
        assert_eq!(plan[2].terraform_file_name(), "s3_lifecycle_3.tf");
    }

    #[test]
    fn plan_item_serializes_with_legacy_keys() {
        let plan = create_remediation_plan(&[rec(
            7,
            "Add S3 lifecycle policy (prod)",
            RiskLevel::Low,
            Effort::QuickWin,
        )]);
        assert_eq!(
            serde_json::to_value(&plan[0]).unwrap(),
            json!({
                "recommendation_id": 7,
                "optimization_type": "S3_lifecycle",
                "details": {
                    "bucket_name": "",
                    "current_class": "STANDARD",
                    "target_class": "INTELLIGENT_TIERING",
                    "transition_days": 30
                },
                "auto_safe": true
            })
        );
    }

    #[tokio::test]
    async fn draft_without_client_is_placeholder() {
        let plan = create_remediation_plan(&[rec(
            1,
            "Delete EBS volumes",
            RiskLevel::Low,
            Effort::QuickWin,
        )]);
        assert_eq!(
            draft_terraform(None, &plan[0], 2000).await,
            MISSING_CLIENT_PLACEHOLDER
        );
    }

    #[tokio::test]
    async fn draft_strips_fences_and_saves() {
        let plan = create_remediation_plan(&[rec(
            1,
            "Delete EBS volumes",
            RiskLevel::Low,
            Effort::QuickWin,
        )]);
        let client = MockClient::new("```hcl\nresource \"null_resource\" \"ebs\" {}\n```");
        let code = draft_terraform(Some(&client), &plan[0], 2000).await;
        assert_eq!(code, "resource \"null_resource\" \"ebs\" {}");

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("terraform_generated");
        let path = save_terraform(&out, &plan[0].terraform_file_name(), &code).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), code);
    }
}
