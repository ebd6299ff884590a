use crate::domain::cost::{ContributorBreakdown, CostPoint, CostSeries};
use crate::domain::round2;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCostResponse {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Vec<DailyCostRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCostRecord {
    pub date: NaiveDate,
    pub costs: BTreeMap<String, f64>,
}

impl DailyCostResponse {
    pub fn into_series(self) -> CostSeries {
        let mut by_contributor: BTreeMap<String, f64> = BTreeMap::new();
        let mut points = Vec::with_capacity(self.days.len());

        for day in self.days {
            let mut day_total = 0.0;
            for (name, amount) in day.costs {
                day_total += amount;
                *by_contributor.entry(name).or_insert(0.0) += amount;
            }
            points.push(CostPoint::new(day.date, round2(day_total)));
        }

        let rounded = by_contributor
            .into_iter()
            .map(|(name, amount)| (name, round2(amount)))
            .collect();

        CostSeries::new(points, ContributorBreakdown::from_totals(rounded))
    }
}
