use std::collections::HashMap;
use std::io::Write;

use serde::Serialize;

use crate::models::{PulseScore, SurveyQuestion, SurveyResponse};
use crate::normalize::normalize;

#[derive(Debug, Serialize)]
struct ThemeRow<'a> {
    theme: &'a str,
    score: String,
    weight_sum: f64,
    response_count: usize,
    assessed: bool,
}

#[derive(Debug, Serialize)]
struct ResponseRow<'a> {
    respondent: &'a str,
    question_id: &'a str,
    theme: &'a str,
    value: String,
    normalized: Option<String>,
    submitted_at: String,
}

pub fn write_theme_scores<W: Write>(writer: W, score: &PulseScore) -> anyhow::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for theme in &score.themes {
        csv.serialize(ThemeRow {
            theme: theme.theme.as_str(),
            score: format!("{:.2}", theme.score),
            weight_sum: theme.weight_sum,
            response_count: theme.response_count,
            assessed: theme.is_assessed(),
        })?;
    }
    csv.flush()?;
    Ok(())
}

/// One row per response; answers that cannot be normalized keep an empty
/// `normalized` column.
pub fn write_responses<W: Write>(
    writer: W,
    questions: &[SurveyQuestion],
    responses: &[SurveyResponse],
) -> anyhow::Result<()> {
    let by_id: HashMap<&str, &SurveyQuestion> =
        questions.iter().map(|q| (q.id.as_str(), q)).collect();
    let mut csv = csv::Writer::from_writer(writer);

    for response in responses {
        let question = by_id.get(response.question_id.as_str());
        let normalized = question
            .and_then(|q| normalize(q.question_type, &response.value).ok().flatten())
            .map(|value| format!("{value:.2}"));

        csv.serialize(ResponseRow {
            respondent: response.respondent.as_deref().unwrap_or("anonymous"),
            question_id: &response.question_id,
            theme: question.map(|q| q.theme.as_str()).unwrap_or(""),
            value: response.value.to_string(),
            normalized,
            submitted_at: response.submitted_at.to_rfc3339(),
        })?;
    }
    csv.flush()?;
    Ok(())
}
