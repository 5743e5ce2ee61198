use super::backend::BackendError;
use crate::prediction::domain::FeatureVector;

pub(crate) const SYSTEM_PROMPT: &str =
    "You are a real estate investment analysis AI. Provide concise, data-driven insights.";

pub(crate) fn build_prompt(vector: &FeatureVector, score: f64) -> String {
    format!(
        "Analyze this real estate zone data and provide investment insights:\n\
         \n\
         Zone Postcode: {postcode}\n\
         Predicted Risk Score: {score:.1}/100\n\
         \n\
         Key Metrics:\n\
         - Growth Rate: {growth}\n\
         - Crime Rate: {crime}\n\
         - Infrastructure Score: {infrastructure}\n\
         - Market Sentiment: {sentiment}\n\
         - Interest Rate: {interest}\n\
         - Average Wages: {wages}\n\
         - Housing Supply: {housing}\n\
         - Immigration Trend: {immigration}\n\
         \n\
         Provide:\n\
         1. A brief summary (1-2 sentences) on the first line\n\
         2. Detailed analysis of investment potential\n\
         3. Key risk factors and opportunities",
        postcode = vector.postcode(),
        growth = percent(vector.growth_rate()),
        crime = percent(vector.crime_rate()),
        infrastructure = format!("{}/10", vector.infrastructure_score()),
        sentiment = percent(vector.sentiment()),
        interest = format!("{:.1}%", vector.interest_rate()),
        wages = currency(vector.wages()),
        housing = vector.housing_supply(),
        immigration = vector.immigration(),
    )
}

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// `$1,234,567.89`
pub(crate) fn currency(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (position, digit) in whole.chars().enumerate() {
        if position > 0 && (whole.len() - position) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}

/// First non-blank line is the summary, the rest is the analysis.
pub(crate) fn parse_completion(text: &str) -> Result<(String, String), BackendError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(BackendError::MalformedResponse(
            "completion was empty".to_string(),
        ));
    }

    let (summary, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
    let summary = summary.trim();
    let analysis = rest.trim();

    if analysis.is_empty() {
        return Err(BackendError::MalformedResponse(
            "completion had no analysis after the summary line".to_string(),
        ));
    }

    Ok((summary.to_string(), analysis.to_string()))
}
