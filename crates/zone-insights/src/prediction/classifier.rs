use super::domain::ZoneCategory;

pub const GREEN_THRESHOLD: f64 = 75.0;
pub const YELLOW_THRESHOLD: f64 = 50.0;

/// Maps a score onto the traffic-light scale. Missing and NaN scores are
/// unclassifiable.
pub fn classify(score: Option<f64>) -> ZoneCategory {
    match score {
        None => ZoneCategory::Unknown,
        Some(value) if value.is_nan() => ZoneCategory::Unknown,
        Some(value) if value >= GREEN_THRESHOLD => ZoneCategory::Green,
        Some(value) if value >= YELLOW_THRESHOLD => ZoneCategory::Yellow,
        Some(_) => ZoneCategory::Red,
    }
}
