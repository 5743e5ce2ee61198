use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{PredictionRecord, RecordKind, ZoneCategory};

/// Aggregate view over every zone predicted so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneSummary {
    pub total_zones: usize,
    pub zone_distribution: BTreeMap<String, usize>,
    pub average_score: f64,
    pub timestamp: DateTime<Utc>,
}

impl ZoneSummary {
    /// Zeroed summary reported when no history is available.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            total_zones: 0,
            zone_distribution: base_distribution(),
            average_score: 0.0,
            timestamp,
        }
    }

    /// Sentinel records are excluded; gray only shows up when some stored
    /// record carries no score.
    pub fn from_records(records: &[PredictionRecord], timestamp: DateTime<Utc>) -> Self {
        let mut distribution = base_distribution();
        let mut total_zones = 0;
        let mut score_sum = 0.0;
        let mut scored = 0usize;

        for record in records
            .iter()
            .filter(|record| record.kind != RecordKind::Sentinel)
        {
            total_zones += 1;
            *distribution
                .entry(record.result.category.label().to_string())
                .or_insert(0) += 1;
            if let Some(score) = record.result.score {
                score_sum += score;
                scored += 1;
            }
        }

        let average_score = if scored == 0 {
            0.0
        } else {
            score_sum / scored as f64
        };

        Self {
            total_zones,
            zone_distribution: distribution,
            average_score,
            timestamp,
        }
    }

    pub fn count(&self, category: ZoneCategory) -> usize {
        self.zone_distribution
            .get(category.label())
            .copied()
            .unwrap_or(0)
    }
}

fn base_distribution() -> BTreeMap<String, usize> {
    ZoneCategory::SCORED
        .iter()
        .map(|category| (category.label().to_string(), 0))
        .collect()
}
