use crate::domain::recommendation::{Effort, NewRecommendation, RiskLevel};
use anyhow::ensure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationInput {
    pub title: String,
    #[serde(alias = "type")]
    pub recommendation_type: String,
    #[serde(alias = "savings")]
    pub estimated_monthly_savings: f64,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "risk")]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub effort: Option<String>,
}

impl RecommendationInput {
    pub fn validate_and_into_new(self) -> anyhow::Result<NewRecommendation> {
        let title = self.title.trim().to_string();
        ensure!(!title.is_empty(), "title must be non-empty");

        let recommendation_type = self.recommendation_type.trim().to_string();
        ensure!(
            !recommendation_type.is_empty(),
            "recommendation type must be non-empty"
        );

        // Negative estimates are accepted as given; only non-numbers are rejected.
        ensure!(
            self.estimated_monthly_savings.is_finite(),
            "estimated savings must be a finite number (got {})",
            self.estimated_monthly_savings
        );

        let mut new = NewRecommendation::new(
            title,
            recommendation_type,
            self.estimated_monthly_savings,
        );

        if let Some(account) = non_empty(self.account_name) {
            new = new.with_account(account);
        }
        if let Some(description) = non_empty(self.description) {
            new = new.with_description(description);
        }
        if let Some(risk) = non_empty(self.risk_level) {
            new = new.with_risk(RiskLevel::from(risk));
        }
        if let Some(effort) = non_empty(self.effort) {
            new = new.with_effort(Effort::from(effort));
        }

        Ok(new)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_legacy_seed_keys() {
        let input: RecommendationInput = serde_json::from_value(json!({
            "title": " Downsize EC2 m5.4xlarge ",
            "type": "EC2_rightsizing",
            "savings": 420.0,
            "risk": "low",
            "effort": "quick_win",
        }))
        .unwrap();

        let new = input.validate_and_into_new().unwrap();
        assert_eq!(new.title, "Downsize EC2 m5.4xlarge");
        assert_eq!(new.recommendation_type, "EC2_rightsizing");
        assert_eq!(new.risk_level, RiskLevel::Low);
        assert_eq!(new.effort, Effort::QuickWin);
        assert_eq!(new.account_name, "default");
    }

    #[test]
    fn keeps_negative_estimates() {
        let input: RecommendationInput = serde_json::from_value(json!({
            "title": "Move to provisioned IOPS",
            "recommendation_type": "EBS_tuning",
            "estimated_monthly_savings": -15.0,
        }))
        .unwrap();
        let new = input.validate_and_into_new().unwrap();
        assert_eq!(new.estimated_monthly_savings, -15.0);
        assert_eq!(new.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn rejects_blank_title_and_type() {
        let blank_title = RecommendationInput {
            title: "   ".to_string(),
            recommendation_type: "S3_lifecycle".to_string(),
            estimated_monthly_savings: 1.0,
            account_name: None,
            description: None,
            risk_level: None,
            effort: None,
        };
        assert!(blank_title.validate_and_into_new().is_err());

        let blank_type = RecommendationInput {
            title: "Add lifecycle".to_string(),
            recommendation_type: String::new(),
            estimated_monthly_savings: 1.0,
            account_name: None,
            description: None,
            risk_level: None,
            effort: None,
        };
        assert!(blank_type.validate_and_into_new().is_err());
    }
}
