use std::fmt::Write;

use chrono::NaiveDate;

use crate::insights::Insight;
use crate::models::{PulseScore, QuestionType, SurveyQuestion, SurveyResponse, ThemeScore};

/// Assessed themes, best first.
pub fn ranked_themes(score: &PulseScore) -> Vec<&ThemeScore> {
    let mut themes: Vec<&ThemeScore> = score.themes.iter().filter(|t| t.is_assessed()).collect();
    themes.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.theme.cmp(&b.theme))
    });
    themes
}

/// Free-text answers, newest first.
pub fn recent_comments<'a>(
    questions: &[SurveyQuestion],
    responses: &'a [SurveyResponse],
) -> Vec<&'a SurveyResponse> {
    let mut comments: Vec<&SurveyResponse> = responses
        .iter()
        .filter(|r| {
            questions
                .iter()
                .any(|q| q.id == r.question_id && q.question_type == QuestionType::Text)
        })
        .filter(|r| r.value.as_text().map_or(true, |t| !t.trim().is_empty()))
        .collect();
    comments.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    comments
}

pub fn build_report(
    survey: &str,
    cutoff: NaiveDate,
    score: &PulseScore,
    questions: &[SurveyQuestion],
    responses: &[SurveyResponse],
    insight: Option<&Insight>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# PulseScore Report");
    let _ = writeln!(
        output,
        "Generated for {} (responses since {})",
        survey, cutoff
    );
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "**PulseScore {:.1}/100: {}**",
        score.overall,
        score.tier.label()
    );
    let _ = writeln!(
        output,
        "Based on {} scored responses ({} skipped).",
        score.scored_responses, score.skipped_responses
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Categories");
    for category in &score.categories {
        let _ = writeln!(
            output,
            "- {} ({:.0}%): {:.1}",
            category.category.label(),
            category.weight * 100.0,
            category.score
        );
    }

    let ranked = ranked_themes(score);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Themes");
    if ranked.is_empty() {
        let _ = writeln!(output, "No themes assessed in this window.");
    } else {
        for theme in &ranked {
            let _ = writeln!(
                output,
                "- {}: {:.1} across {} responses",
                theme.theme.label(),
                theme.score,
                theme.response_count
            );
        }
    }

    let unassessed: Vec<&str> = score
        .themes
        .iter()
        .filter(|t| !t.is_assessed())
        .map(|t| t.theme.label())
        .collect();
    if !unassessed.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Not assessed: {}", unassessed.join(", "));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Strengths");
    if ranked.is_empty() {
        let _ = writeln!(output, "No themes assessed in this window.");
    } else {
        for theme in ranked.iter().take(3) {
            let _ = writeln!(output, "- {} ({:.1})", theme.theme.label(), theme.score);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Opportunities");
    let remaining = ranked.get(3..).unwrap_or_default();
    if ranked.is_empty() {
        let _ = writeln!(output, "No themes assessed in this window.");
    } else if remaining.is_empty() {
        let _ = writeln!(output, "Every assessed theme is listed under strengths.");
    } else {
        for theme in remaining.iter().rev().take(3) {
            let _ = writeln!(output, "- {} ({:.1})", theme.theme.label(), theme.score);
        }
    }

    let comments = recent_comments(questions, responses);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Comments");
    if comments.is_empty() {
        let _ = writeln!(output, "No comments recorded for this window.");
    } else {
        for comment in comments.iter().take(5) {
            let _ = writeln!(
                output,
                "- {}: \"{}\"",
                comment.submitted_at.date_naive(),
                comment.value
            );
        }
    }

    if let Some(insight) = insight {
        let _ = writeln!(output);
        let _ = writeln!(output, "## AI Insights");
        let _ = writeln!(output, "{}", insight.summary);
        for (heading, items) in [
            ("Strengths", &insight.strengths),
            ("Opportunities", &insight.opportunities),
            ("Action Items", &insight.action_items),
        ] {
            if items.is_empty() {
                continue;
            }
            let _ = writeln!(output);
            let _ = writeln!(output, "### {heading}");
            for item in items {
                let _ = writeln!(output, "- {item}");
            }
        }
    }

    output
}
