use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    Category, CategoryScore, PulseScore, SurveyQuestion, SurveyResponse, Theme, ThemeScore, Tier,
};
use crate::normalize::normalize;

/// How a category treats constituent themes nobody answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassessedThemes {
    /// Leave them out of the category mean. Differs from the literal
    /// formula, which averages an unanswered theme in as 0.
    #[default]
    Exclude,
    /// Average them in with a score of 0, the literal formula.
    CountAsZero,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct NormalizedAnswer {
    theme: Theme,
    weight: f64,
    value: f64,
}

pub fn compute_pulse_score(
    questions: &[SurveyQuestion],
    responses: &[SurveyResponse],
    policy: UnassessedThemes,
    computed_at: DateTime<Utc>,
) -> PulseScore {
    let by_id: HashMap<&str, &SurveyQuestion> =
        questions.iter().map(|q| (q.id.as_str(), q)).collect();

    let mut answers = Vec::with_capacity(responses.len());
    let mut skipped = 0usize;

    for response in responses {
        let Some(question) = by_id.get(response.question_id.as_str()) else {
            tracing::warn!(question_id = %response.question_id, "response to unknown question skipped");
            skipped += 1;
            continue;
        };

        match normalize(question.question_type, &response.value) {
            Ok(Some(value)) => answers.push(NormalizedAnswer {
                theme: question.theme,
                weight: effective_weight(question.weight),
                value,
            }),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(question_id = %question.id, error = %err, "response skipped");
                skipped += 1;
            }
        }
    }

    let themes = aggregate_themes(&answers);
    let categories = aggregate_categories(&answers, &themes, policy);
    let overall = overall_score(&categories);

    PulseScore {
        overall,
        tier: classify_tier(overall),
        categories,
        themes,
        scored_responses: answers.len(),
        skipped_responses: skipped,
        computed_at,
    }
}

fn effective_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// Weighted mean per theme, one entry for each of the twelve themes.
fn aggregate_themes(answers: &[NormalizedAnswer]) -> Vec<ThemeScore> {
    Theme::ALL
        .iter()
        .map(|&theme| {
            let mut weighted = 0.0;
            let mut weight_sum = 0.0;
            let mut response_count = 0usize;

            for answer in answers.iter().filter(|a| a.theme == theme) {
                weighted += answer.value * answer.weight;
                weight_sum += answer.weight;
                response_count += 1;
            }

            ThemeScore {
                theme,
                score: if weight_sum > 0.0 {
                    weighted / weight_sum
                } else {
                    0.0
                },
                weight_sum,
                response_count,
            }
        })
        .collect()
}

fn aggregate_categories(
    answers: &[NormalizedAnswer],
    themes: &[ThemeScore],
    policy: UnassessedThemes,
) -> Vec<CategoryScore> {
    Category::ALL
        .iter()
        .map(|&category| {
            let score = match category {
                Category::EmotionIndex => mean(answers.iter().map(|a| a.value)),
                _ => {
                    let members = themes
                        .iter()
                        .filter(|t| category.themes().contains(&t.theme))
                        .filter(|t| policy == UnassessedThemes::CountAsZero || t.is_assessed())
                        .map(|t| t.score);
                    mean(members)
                }
            };

            CategoryScore {
                category,
                weight: category.weight(),
                score,
            }
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (total, count) = values.fold((0.0, 0usize), |(total, count), v| (total + v, count + 1));
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

pub fn overall_score(categories: &[CategoryScore]) -> f64 {
    categories
        .iter()
        .map(|c| c.weight * c.score)
        .sum::<f64>()
        .clamp(0.0, 100.0)
}

pub fn classify_tier(overall: f64) -> Tier {
    if overall >= 85.0 {
        Tier::PulseCertified
    } else if overall >= 70.0 {
        Tier::EmergingCulture
    } else if overall >= 50.0 {
        Tier::AtRisk
    } else {
        Tier::InterventionAdvised
    }
}

/// Longest window honoured; larger requests are treated as this many days.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

pub fn cutoff_date(since_days: i64) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(since_days.clamp(1, MAX_WINDOW_DAYS))
}

pub fn filter_since(responses: &[SurveyResponse], cutoff: NaiveDate) -> Vec<SurveyResponse> {
    responses
        .iter()
        .filter(|r| r.submitted_at.date_naive() >= cutoff)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionType, ResponseValue};
    use crate::survey::default_questions;

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn question(id: &str, theme: Theme, weight: f64) -> SurveyQuestion {
        SurveyQuestion {
            id: id.to_string(),
            text: format!("Question {id}"),
            question_type: QuestionType::Likert,
            theme,
            weight,
        }
    }

    fn answer(question_id: &str, value: f64) -> SurveyResponse {
        SurveyResponse {
            question_id: question_id.to_string(),
            value: ResponseValue::Number(value),
            respondent: Some("r-1".to_string()),
            submitted_at: at(),
        }
    }

    fn uniform_answers(questions: &[SurveyQuestion], likert: f64) -> Vec<SurveyResponse> {
        questions
            .iter()
            .filter(|q| matches!(q.question_type, QuestionType::Likert | QuestionType::Emoji))
            .map(|q| answer(&q.id, likert))
            .collect()
    }

    #[test]
    fn neutral_answers_land_at_risk() {
        let questions = default_questions();
        let responses = uniform_answers(&questions, 3.0);
        let score = compute_pulse_score(&questions, &responses, UnassessedThemes::Exclude, at());

        for theme in &score.themes {
            assert!((theme.score - 50.0).abs() < 1e-9, "{:?}", theme);
        }
        for category in &score.categories {
            assert!((category.score - 50.0).abs() < 1e-9, "{:?}", category);
        }
        assert!((score.overall - 50.0).abs() < 1e-9);
        assert_eq!(score.tier, Tier::AtRisk);
    }

    #[test]
    fn top_answers_are_certified() {
        let questions = default_questions();
        let responses = uniform_answers(&questions, 5.0);
        let score = compute_pulse_score(&questions, &responses, UnassessedThemes::Exclude, at());
        assert!((score.overall - 100.0).abs() < 1e-9);
        assert_eq!(score.tier, Tier::PulseCertified);
    }

    #[test]
    fn theme_scores_respect_question_weights() {
        let questions = vec![
            question("a", Theme::PsychologicalSafety, 3.0),
            question("b", Theme::PsychologicalSafety, 1.0),
        ];
        let responses = vec![answer("a", 5.0), answer("b", 1.0)];
        let score = compute_pulse_score(&questions, &responses, UnassessedThemes::Exclude, at());
        let theme = score.theme(Theme::PsychologicalSafety).unwrap();
        assert!((theme.score - 75.0).abs() < 1e-9);
        assert_eq!(theme.weight_sum, 4.0);
        assert_eq!(theme.response_count, 2);
    }

    #[test]
    fn overall_is_exact_weighted_sum() {
        let questions = vec![
            question("m", Theme::MotivationFulfillment, 1.0),
            question("e", Theme::EngagementContinuity, 1.0),
            question("t", Theme::TrustInLeadership, 1.0),
            question("p", Theme::PsychologicalSafety, 1.0),
            question("i", Theme::InclusionBelonging, 1.0),
            question("g", Theme::GrowthDevelopment, 1.0),
        ];
        let responses = vec![
            answer("m", 4.0),
            answer("e", 2.0),
            answer("t", 5.0),
            answer("p", 3.0),
            answer("i", 1.0),
            answer("g", 5.0),
        ];
        let score = compute_pulse_score(&questions, &responses, UnassessedThemes::Exclude, at());

        let emotion = score.category(Category::EmotionIndex).unwrap().score;
        let engagement = score.category(Category::EngagementStability).unwrap().score;
        let trust = score.category(Category::CultureTrust).unwrap().score;

        assert!((emotion - (75.0 + 25.0 + 100.0 + 50.0 + 0.0 + 100.0) / 6.0).abs() < 1e-9);
        assert!((engagement - 50.0).abs() < 1e-9);
        assert!((trust - 50.0).abs() < 1e-9);
        assert_eq!(score.overall, 0.4 * emotion + 0.3 * engagement + 0.3 * trust);
    }

    #[test]
    fn unassessed_themes_follow_policy() {
        let questions = vec![
            question("m", Theme::MotivationFulfillment, 1.0),
            question("e", Theme::EngagementContinuity, 1.0),
        ];
        let responses = vec![answer("m", 5.0)];

        let excluded =
            compute_pulse_score(&questions, &responses, UnassessedThemes::Exclude, at());
        let zeroed =
            compute_pulse_score(&questions, &responses, UnassessedThemes::CountAsZero, at());

        let unanswered = excluded.theme(Theme::EngagementContinuity).unwrap();
        assert!(!unanswered.is_assessed());
        assert_eq!(unanswered.score, 0.0);

        assert_eq!(
            excluded.category(Category::EngagementStability).unwrap().score,
            100.0
        );
        assert_eq!(
            zeroed.category(Category::EngagementStability).unwrap().score,
            50.0
        );
        assert_eq!(excluded.category(Category::CultureTrust).unwrap().score, 0.0);
    }

    #[test]
    fn invalid_and_unknown_responses_are_skipped() {
        let questions = vec![question("a", Theme::EmotionalClimate, 1.0)];
        let responses = vec![answer("a", 4.0), answer("a", 9.0), answer("zzz", 3.0)];
        let score = compute_pulse_score(&questions, &responses, UnassessedThemes::Exclude, at());
        assert_eq!(score.scored_responses, 1);
        assert_eq!(score.skipped_responses, 2);
        assert_eq!(score.theme(Theme::EmotionalClimate).unwrap().score, 75.0);
    }

    #[test]
    fn empty_input_scores_zero() {
        let score = compute_pulse_score(&default_questions(), &[], UnassessedThemes::Exclude, at());
        assert_eq!(score.overall, 0.0);
        assert_eq!(score.tier, Tier::InterventionAdvised);
        assert_eq!(score.themes.len(), 12);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let questions = default_questions();
        let mut responses = uniform_answers(&questions, 4.0);
        responses.push(answer("psy-1", 2.0));
        let first = compute_pulse_score(&questions, &responses, UnassessedThemes::Exclude, at());
        let second = compute_pulse_score(&questions, &responses, UnassessedThemes::Exclude, at());
        assert_eq!(first, second);
    }

    #[test]
    fn tiers_follow_thresholds() {
        assert_eq!(classify_tier(100.0), Tier::PulseCertified);
        assert_eq!(classify_tier(85.0), Tier::PulseCertified);
        assert_eq!(classify_tier(84.9), Tier::EmergingCulture);
        assert_eq!(classify_tier(70.0), Tier::EmergingCulture);
        assert_eq!(classify_tier(69.99), Tier::AtRisk);
        assert_eq!(classify_tier(50.0), Tier::AtRisk);
        assert_eq!(classify_tier(49.5), Tier::InterventionAdvised);
        assert_eq!(classify_tier(0.0), Tier::InterventionAdvised);
    }

    #[test]
    fn tier_rank_never_drops_as_score_rises() {
        let mut previous = classify_tier(0.0);
        for step in 0..=1000 {
            let tier = classify_tier(step as f64 / 10.0);
            assert!(tier >= previous, "tier fell at {}", step as f64 / 10.0);
            previous = tier;
        }
    }

    #[test]
    fn cutoff_date_respects_since_days() {
        let cutoff = cutoff_date(14);
        let expected = Utc::now().date_naive() - Duration::days(14);
        assert_eq!(cutoff, expected);
        assert_eq!(cutoff_date(0), Utc::now().date_naive() - Duration::days(1));
    }

    #[test]
    fn cutoff_date_caps_huge_windows() {
        let capped = Utc::now().date_naive() - Duration::days(MAX_WINDOW_DAYS);
        assert_eq!(cutoff_date(9_000_000_000_000), capped);
        assert_eq!(cutoff_date(i64::MAX), capped);
        assert_eq!(cutoff_date(i64::MIN), Utc::now().date_naive() - Duration::days(1));
    }

    #[test]
    fn filter_since_drops_older_responses() {
        let mut old = answer("a", 3.0);
        old.submitted_at = at() - Duration::days(40);
        let recent = answer("a", 4.0);
        let cutoff = (at() - Duration::days(30)).date_naive();
        let kept = filter_since(&[old, recent.clone()], cutoff);
        assert_eq!(kept, vec![recent]);
    }
}
