use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

pub const FEATURE_COUNT: usize = 8;

/// Caller-supplied zone row. Any subset of the recognised keys may be
/// present; unknown keys are carried along and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawZoneRecord(Map<String, Value>);

impl RawZoneRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RawZoneRecord {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

/// The eight model inputs, in the order the regression expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    GrowthRate,
    CrimeRate,
    InfrastructureScore,
    Sentiment,
    InterestRate,
    Wages,
    HousingSupply,
    Immigration,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; FEATURE_COUNT] = [
        FeatureKind::GrowthRate,
        FeatureKind::CrimeRate,
        FeatureKind::InfrastructureScore,
        FeatureKind::Sentiment,
        FeatureKind::InterestRate,
        FeatureKind::Wages,
        FeatureKind::HousingSupply,
        FeatureKind::Immigration,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::GrowthRate => "growth_rate",
            Self::CrimeRate => "crime_rate",
            Self::InfrastructureScore => "infrastructure_score",
            Self::Sentiment => "sentiment",
            Self::InterestRate => "interest_rate",
            Self::Wages => "wages",
            Self::HousingSupply => "housing_supply_encoded",
            Self::Immigration => "immigration_encoded",
        }
    }

    /// Unencoded label key accepted when the `_encoded` field is missing.
    pub const fn alias(self) -> Option<&'static str> {
        match self {
            Self::HousingSupply => Some("housing_supply"),
            Self::Immigration => Some("immigration"),
            _ => None,
        }
    }

    pub const fn default_value(self) -> f64 {
        match self {
            Self::GrowthRate => 3.5,
            Self::CrimeRate => 1.2,
            Self::InfrastructureScore => 6.5,
            Self::Sentiment => 0.65,
            Self::InterestRate => 4.5,
            Self::Wages => 85000.0,
            Self::HousingSupply => 0.5,
            Self::Immigration => 0.5,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Fully populated, immutable model input for a single zone.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    postcode: String,
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub(crate) fn from_parts(postcode: impl Into<String>, values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            postcode: postcode.into(),
            values,
        }
    }

    pub fn postcode(&self) -> &str {
        &self.postcode
    }

    pub fn value(&self, kind: FeatureKind) -> f64 {
        self.values[kind.index()]
    }

    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    pub fn growth_rate(&self) -> f64 {
        self.value(FeatureKind::GrowthRate)
    }

    pub fn crime_rate(&self) -> f64 {
        self.value(FeatureKind::CrimeRate)
    }

    pub fn infrastructure_score(&self) -> f64 {
        self.value(FeatureKind::InfrastructureScore)
    }

    pub fn sentiment(&self) -> f64 {
        self.value(FeatureKind::Sentiment)
    }

    pub fn interest_rate(&self) -> f64 {
        self.value(FeatureKind::InterestRate)
    }

    pub fn wages(&self) -> f64 {
        self.value(FeatureKind::Wages)
    }

    pub fn housing_supply(&self) -> f64 {
        self.value(FeatureKind::HousingSupply)
    }

    pub fn immigration(&self) -> f64 {
        self.value(FeatureKind::Immigration)
    }
}

/// Traffic-light category. `Unknown` renders as "gray" on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneCategory {
    Red,
    Yellow,
    Green,
    #[serde(rename = "gray")]
    Unknown,
}

impl ZoneCategory {
    pub const SCORED: [ZoneCategory; 3] =
        [ZoneCategory::Red, ZoneCategory::Yellow, ZoneCategory::Green];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Unknown => "gray",
        }
    }

    /// Ordering red < yellow < green; `None` for the unscored category.
    pub const fn rank(self) -> Option<u8> {
        match self {
            Self::Red => Some(0),
            Self::Yellow => Some(1),
            Self::Green => Some(2),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreResult {
    pub score: Option<f64>,
    pub category: ZoneCategory,
}

impl ScoreResult {
    pub fn from_score(score: Option<f64>) -> Self {
        Self {
            score,
            category: super::classifier::classify(score),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsightSource {
    Backend(String),
    RuleBased,
    ErrorHandler,
}

impl InsightSource {
    pub fn label(&self) -> &str {
        match self {
            Self::Backend(name) => name,
            Self::RuleBased => "rule-based",
            Self::ErrorHandler => "error-handler",
        }
    }
}

impl Serialize for InsightSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub summary: String,
    pub full_analysis: String,
    pub confidence: f64,
    pub generated_by: InsightSource,
}

impl Insight {
    pub const BACKEND_CONFIDENCE: f64 = 90.0;
    pub const RULE_BASED_CONFIDENCE: f64 = 70.0;

    pub(crate) fn error_handler() -> Self {
        Self {
            summary: "Unable to generate insights due to insufficient data".to_string(),
            full_analysis: "Error analyzing zone metrics".to_string(),
            confidence: 0.0,
            generated_by: InsightSource::ErrorHandler,
        }
    }

    pub(crate) fn insufficient_data() -> Self {
        Self {
            summary: "Insufficient data for detailed analysis".to_string(),
            full_analysis: "Unable to generate insights due to data processing error".to_string(),
            confidence: 0.0,
            generated_by: InsightSource::ErrorHandler,
        }
    }
}

/// Metric values echoed back alongside a prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneMetrics {
    pub growth_rate: f64,
    pub crime_rate: f64,
    pub infrastructure_score: f64,
    pub sentiment: f64,
    pub interest_rate: f64,
    pub wages: f64,
    pub housing_supply: f64,
    pub immigration: f64,
}

impl ZoneMetrics {
    /// Placeholder metrics reported for rows that could not be processed.
    pub const DEGRADED: ZoneMetrics = ZoneMetrics {
        growth_rate: 0.0,
        crime_rate: 0.0,
        infrastructure_score: 5.0,
        sentiment: 0.5,
        interest_rate: 5.0,
        wages: 50000.0,
        housing_supply: 0.5,
        immigration: 0.5,
    };
}

impl From<&FeatureVector> for ZoneMetrics {
    fn from(vector: &FeatureVector) -> Self {
        Self {
            growth_rate: vector.growth_rate(),
            crime_rate: vector.crime_rate(),
            infrastructure_score: vector.infrastructure_score(),
            sentiment: vector.sentiment(),
            interest_rate: vector.interest_rate(),
            wages: vector.wages(),
            housing_supply: vector.housing_supply(),
            immigration: vector.immigration(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Scored,
    Degraded,
    Sentinel,
}

/// One answered zone. Immutable once assembled by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub postcode: String,
    pub result: ScoreResult,
    pub metrics: Option<ZoneMetrics>,
    pub insight: Option<Insight>,
    pub kind: RecordKind,
    pub timestamp: DateTime<Utc>,
}

impl PredictionRecord {
    pub const NEUTRAL_SCORE: f64 = 65.0;
    pub const SENTINEL_POSTCODE: &'static str = "0000";

    pub(crate) fn scored(
        vector: &FeatureVector,
        result: ScoreResult,
        insight: Insight,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            postcode: vector.postcode().to_string(),
            result,
            metrics: Some(ZoneMetrics::from(vector)),
            insight: Some(insight),
            kind: RecordKind::Scored,
            timestamp,
        }
    }

    pub(crate) fn degraded(postcode: Option<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            postcode: postcode.unwrap_or_else(|| Self::SENTINEL_POSTCODE.to_string()),
            result: ScoreResult {
                score: Some(Self::NEUTRAL_SCORE),
                category: ZoneCategory::Yellow,
            },
            metrics: Some(ZoneMetrics::DEGRADED),
            insight: Some(Insight::insufficient_data()),
            kind: RecordKind::Degraded,
            timestamp,
        }
    }

    pub(crate) fn sentinel(timestamp: DateTime<Utc>) -> Self {
        Self {
            postcode: Self::SENTINEL_POSTCODE.to_string(),
            result: ScoreResult::from_score(None),
            metrics: None,
            insight: None,
            kind: RecordKind::Sentinel,
            timestamp,
        }
    }

    pub fn response(&self) -> PredictionResponse<'_> {
        let metrics = self.metrics.as_ref();
        PredictionResponse {
            postcode: &self.postcode,
            predicted_score: self.result.score,
            color: self.result.category,
            metrics: MetricsView {
                risk_score: self.result.score,
                growth_rate: metrics.map(|m| m.growth_rate),
                crime_rate: metrics.map(|m| m.crime_rate),
                infrastructure_score: metrics.map(|m| m.infrastructure_score),
                sentiment: metrics.map(|m| m.sentiment),
                interest_rate: metrics.map(|m| m.interest_rate),
                wages: metrics.map(|m| m.wages),
                housing_supply: metrics.map(|m| m.housing_supply),
                immigration: metrics.map(|m| m.immigration),
                ai_insights: self.insight.as_ref(),
            },
            timestamp: self.timestamp,
        }
    }
}

impl Serialize for PredictionRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.response().serialize(serializer)
    }
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse<'a> {
    pub postcode: &'a str,
    pub predicted_score: Option<f64>,
    pub color: ZoneCategory,
    pub metrics: MetricsView<'a>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MetricsView<'a> {
    pub risk_score: Option<f64>,
    pub growth_rate: Option<f64>,
    pub crime_rate: Option<f64>,
    pub infrastructure_score: Option<f64>,
    pub sentiment: Option<f64>,
    pub interest_rate: Option<f64>,
    pub wages: Option<f64>,
    pub housing_supply: Option<f64>,
    pub immigration: Option<f64>,
    pub ai_insights: Option<&'a Insight>,
}

/// A single record for single-row input, a list otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionOutcome {
    Single(PredictionRecord),
    Batch(Vec<PredictionRecord>),
}

impl PredictionOutcome {
    pub fn records(&self) -> &[PredictionRecord] {
        match self {
            Self::Single(record) => std::slice::from_ref(record),
            Self::Batch(records) => records,
        }
    }

    pub fn into_records(self) -> Vec<PredictionRecord> {
        match self {
            Self::Single(record) => vec![record],
            Self::Batch(records) => records,
        }
    }
}
