use crate::analytics::{mean, percentile, population_stddev, MIN_POINTS};
use crate::domain::cost::CostSeries;
use crate::domain::round2;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_Z_THRESHOLD: f64 = 2.5;

const HIGH_Z: f64 = 3.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Medium,
    High,
}

impl AnomalySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalySeverity::Medium => "medium",
            AnomalySeverity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyReason {
    #[serde(rename = "z-score")]
    ZScore,
    #[serde(rename = "iqr")]
    Iqr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub date: NaiveDate,
    #[serde(rename = "cost")]
    pub amount: f64,
    pub z_score: f64,
    pub severity: AnomalySeverity,
    pub reason: AnomalyReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyStatus {
    #[serde(rename = "ok")]
    Found,
    #[serde(rename = "none")]
    Clear,
    #[serde(rename = "insufficient_data")]
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnomalySummary {
    Stats {
        status: AnomalyStatus,
        average_daily: f64,
        stddev: f64,
        q1: f64,
        q3: f64,
    },
    Insufficient {
        status: AnomalyStatus,
        message: String,
    },
}

impl AnomalySummary {
    pub fn status(&self) -> AnomalyStatus {
        match self {
            AnomalySummary::Stats { status, .. } | AnomalySummary::Insufficient { status, .. } => {
                *status
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<AnomalyRecord>,
    pub summary: AnomalySummary,
}

pub fn classify_severity(z_score: f64, amount: f64, q3: f64, iqr: f64) -> AnomalySeverity {
    if z_score >= HIGH_Z || amount > q3 + 3.0 * iqr {
        AnomalySeverity::High
    } else {
        AnomalySeverity::Medium
    }
}

/// Flags days whose z-score reaches `z_threshold` or whose amount is above the upper IQR
/// fence. Records come back in chronological order.
pub fn detect_anomalies(series: &CostSeries, z_threshold: f64) -> AnomalyReport {
    if series.len() < MIN_POINTS {
        return AnomalyReport {
            anomalies: Vec::new(),
            summary: AnomalySummary::Insufficient {
                status: AnomalyStatus::InsufficientData,
                message: format!("Need at least {MIN_POINTS} days to detect anomalies"),
            },
        };
    }

    let amounts = series.amounts();
    let avg = mean(&amounts);
    let std = population_stddev(&amounts, avg);
    let q1 = percentile(&amounts, 0.25);
    let q3 = percentile(&amounts, 0.75);
    let iqr = q3 - q1;
    let upper_fence = q3 + 1.5 * iqr;

    let mut points: Vec<_> = series.points.iter().collect();
    points.sort_by_key(|p| p.date);

    let anomalies: Vec<AnomalyRecord> = points
        .into_iter()
        .filter_map(|point| {
            let z = if std > 0.0 {
                (point.amount - avg) / std
            } else {
                0.0
            };
            let by_z = z >= z_threshold;
            let by_iqr = point.amount > upper_fence;
            if !(by_z || by_iqr) {
                return None;
            }

            Some(AnomalyRecord {
                date: point.date,
                amount: round2(point.amount),
                z_score: round2(z),
                severity: classify_severity(z, point.amount, q3, iqr),
                reason: if by_z {
                    AnomalyReason::ZScore
                } else {
                    AnomalyReason::Iqr
                },
            })
        })
        .collect();

    tracing::debug!(
        points = series.len(),
        flagged = anomalies.len(),
        mean = avg,
        stddev = std,
        "anomaly scan complete"
    );

    let status = if anomalies.is_empty() {
        AnomalyStatus::Clear
    } else {
        AnomalyStatus::Found
    };

    AnomalyReport {
        anomalies,
        summary: AnomalySummary::Stats {
            status,
            average_daily: round2(avg),
            stddev: round2(std),
            q1: round2(q1),
            q3: round2(q3),
        },
    }
}
