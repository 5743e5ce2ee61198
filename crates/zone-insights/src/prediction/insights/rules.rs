use crate::prediction::domain::{FeatureVector, Insight, InsightSource};

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("{field} is not a finite number ({value})")]
pub struct InsightComputationError {
    pub field: &'static str,
    pub value: f64,
}

/// Sub-scores behind the deterministic narrative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RuleScores {
    pub growth: f64,
    pub crime_penalty: f64,
    pub infrastructure: f64,
    pub sentiment: f64,
    pub total: f64,
}

pub(crate) fn score_vector(vector: &FeatureVector) -> Result<RuleScores, InsightComputationError> {
    let growth_rate = finite("growth_rate", vector.growth_rate())?;
    let crime_rate = finite("crime_rate", vector.crime_rate())?;
    let infrastructure_score = finite("infrastructure_score", vector.infrastructure_score())?;
    let sentiment = finite("sentiment", vector.sentiment())?;

    let growth = saturate((growth_rate * 100.0).min(100.0));
    let crime_penalty = saturate((crime_rate * 100.0).max(0.0));
    let infrastructure = saturate(infrastructure_score * 10.0);
    let sentiment = saturate(sentiment * 100.0);

    let total = saturate(
        growth * 0.3
            + (100.0 - crime_penalty) * 0.2
            + infrastructure * 10.0 * 0.3
            + sentiment * 0.2,
    );

    Ok(RuleScores {
        growth,
        crime_penalty,
        infrastructure,
        sentiment,
        total,
    })
}

pub(crate) fn rule_based_insight(vector: &FeatureVector) -> Result<Insight, InsightComputationError> {
    let scores = score_vector(vector)?;

    let potential = if scores.total > 75.0 {
        "high"
    } else if scores.total > 50.0 {
        "moderate"
    } else {
        "low"
    };
    let summary = format!(
        "Zone {} shows {potential} investment potential with a score of {:.1}/100.",
        vector.postcode(),
        scores.total
    );

    let growth_label = if scores.growth > 75.0 {
        "Strong"
    } else if scores.growth > 50.0 {
        "Moderate"
    } else {
        "Limited"
    };
    let safety_label = if scores.crime_penalty < 25.0 {
        "Low Risk"
    } else if scores.crime_penalty < 50.0 {
        "Moderate Risk"
    } else {
        "High Risk"
    };
    let infrastructure_label = if scores.infrastructure > 7.0 {
        "Well Developed"
    } else if scores.infrastructure > 5.0 {
        "Adequate"
    } else {
        "Needs Improvement"
    };
    let sentiment_label = if scores.sentiment > 75.0 {
        "Positive"
    } else if scores.sentiment > 50.0 {
        "Neutral"
    } else {
        "Negative"
    };

    let analysis = format!(
        "Detailed Analysis:\n\
         - Growth Potential: {growth_label} ({growth:.1}%)\n\
         - Safety Rating: {safety_label} ({crime:.1}%)\n\
         - Infrastructure: {infrastructure_label} ({infrastructure:.1}/10)\n\
         - Market Sentiment: {sentiment_label} ({sentiment:.1}%)\n\
         \n\
         Overall Assessment:\n\
         This zone demonstrates {total:.1}% alignment with optimal investment criteria.",
        growth = scores.growth,
        crime = scores.crime_penalty,
        infrastructure = scores.infrastructure,
        sentiment = scores.sentiment,
        total = scores.total,
    );

    Ok(Insight {
        summary,
        full_analysis: analysis,
        confidence: Insight::RULE_BASED_CONFIDENCE,
        generated_by: InsightSource::RuleBased,
    })
}

fn finite(field: &'static str, value: f64) -> Result<f64, InsightComputationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InsightComputationError { field, value })
    }
}

/// Overflow from extreme but finite inputs clamps to the representable range.
fn saturate(value: f64) -> f64 {
    value.clamp(f64::MIN, f64::MAX)
}
