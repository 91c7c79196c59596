use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    TrustInLeadership,
    PsychologicalSafety,
    InclusionBelonging,
    MotivationFulfillment,
    EngagementContinuity,
    RecognitionAppreciation,
    GrowthDevelopment,
    CommunicationClarity,
    CollaborationCohesion,
    WellbeingBalance,
    PurposeAlignment,
    EmotionalClimate,
}

impl Theme {
    pub const ALL: [Theme; 12] = [
        Theme::TrustInLeadership,
        Theme::PsychologicalSafety,
        Theme::InclusionBelonging,
        Theme::MotivationFulfillment,
        Theme::EngagementContinuity,
        Theme::RecognitionAppreciation,
        Theme::GrowthDevelopment,
        Theme::CommunicationClarity,
        Theme::CollaborationCohesion,
        Theme::WellbeingBalance,
        Theme::PurposeAlignment,
        Theme::EmotionalClimate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::TrustInLeadership => "trust_in_leadership",
            Theme::PsychologicalSafety => "psychological_safety",
            Theme::InclusionBelonging => "inclusion_belonging",
            Theme::MotivationFulfillment => "motivation_fulfillment",
            Theme::EngagementContinuity => "engagement_continuity",
            Theme::RecognitionAppreciation => "recognition_appreciation",
            Theme::GrowthDevelopment => "growth_development",
            Theme::CommunicationClarity => "communication_clarity",
            Theme::CollaborationCohesion => "collaboration_cohesion",
            Theme::WellbeingBalance => "wellbeing_balance",
            Theme::PurposeAlignment => "purpose_alignment",
            Theme::EmotionalClimate => "emotional_climate",
        }
    }

    /// Human readable name for reports.
    pub fn label(&self) -> &'static str {
        match self {
            Theme::TrustInLeadership => "Trust in Leadership",
            Theme::PsychologicalSafety => "Psychological Safety",
            Theme::InclusionBelonging => "Inclusion & Belonging",
            Theme::MotivationFulfillment => "Motivation & Fulfillment",
            Theme::EngagementContinuity => "Engagement Continuity",
            Theme::RecognitionAppreciation => "Recognition & Appreciation",
            Theme::GrowthDevelopment => "Growth & Development",
            Theme::CommunicationClarity => "Communication Clarity",
            Theme::CollaborationCohesion => "Collaboration & Cohesion",
            Theme::WellbeingBalance => "Wellbeing & Balance",
            Theme::PurposeAlignment => "Purpose Alignment",
            Theme::EmotionalClimate => "Emotional Climate",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .iter()
            .copied()
            .find(|theme| theme.as_str() == value)
            .ok_or_else(|| anyhow::anyhow!("unknown theme '{value}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Likert,
    Emoji,
    Binary,
    Text,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Likert => "likert",
            QuestionType::Emoji => "emoji",
            QuestionType::Binary => "binary",
            QuestionType::Text => "text",
        }
    }
}

impl FromStr for QuestionType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "likert" => Ok(QuestionType::Likert),
            "emoji" => Ok(QuestionType::Emoji),
            "binary" => Ok(QuestionType::Binary),
            "text" => Ok(QuestionType::Text),
            other => anyhow::bail!("unknown question type '{other}'"),
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyQuestion {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub theme: Theme,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// A submitted answer exactly as it arrived: a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseValue {
    Number(f64),
    Text(String),
}

impl ResponseValue {
    /// Numeric-looking input becomes a number, everything else stays text.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(number) if number.is_finite() => ResponseValue::Number(number),
            _ => ResponseValue::Text(trimmed.to_string()),
        }
    }

    /// Like `from_raw`, but free-text questions always keep the text.
    pub fn for_question(raw: &str, question_type: QuestionType) -> Self {
        match question_type {
            QuestionType::Text => ResponseValue::Text(raw.trim().to_string()),
            _ => ResponseValue::from_raw(raw),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseValue::Text(text) => Some(text),
            ResponseValue::Number(_) => None,
        }
    }
}

impl fmt::Display for ResponseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseValue::Number(number) => write!(f, "{number}"),
            ResponseValue::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponse {
    #[serde(alias = "questionId")]
    pub question_id: String,
    pub value: ResponseValue,
    #[serde(default)]
    pub respondent: Option<String>,
    #[serde(default = "Utc::now", alias = "submittedAt")]
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeScore {
    pub theme: Theme,
    pub score: f64,
    pub weight_sum: f64,
    pub response_count: usize,
}

impl ThemeScore {
    pub fn is_assessed(&self) -> bool {
        self.weight_sum > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    EmotionIndex,
    EngagementStability,
    CultureTrust,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::EmotionIndex,
        Category::EngagementStability,
        Category::CultureTrust,
    ];

    pub fn weight(&self) -> f64 {
        match self {
            Category::EmotionIndex => 0.4,
            Category::EngagementStability => 0.3,
            Category::CultureTrust => 0.3,
        }
    }

    /// Themes blended into this category. Emotion index reads every response
    /// directly and has none.
    pub fn themes(&self) -> &'static [Theme] {
        match self {
            Category::EmotionIndex => &[],
            Category::EngagementStability => {
                &[Theme::MotivationFulfillment, Theme::EngagementContinuity]
            }
            Category::CultureTrust => &[
                Theme::TrustInLeadership,
                Theme::PsychologicalSafety,
                Theme::InclusionBelonging,
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::EmotionIndex => "emotion_index",
            Category::EngagementStability => "engagement_stability",
            Category::CultureTrust => "culture_trust",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::EmotionIndex => "Emotion Index",
            Category::EngagementStability => "Engagement Stability",
            Category::CultureTrust => "Culture Trust",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    pub weight: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    InterventionAdvised,
    AtRisk,
    EmergingCulture,
    PulseCertified,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::PulseCertified => "pulse_certified",
            Tier::EmergingCulture => "emerging_culture",
            Tier::AtRisk => "at_risk",
            Tier::InterventionAdvised => "intervention_advised",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::PulseCertified => "Pulse Certified™",
            Tier::EmergingCulture => "Emerging Culture",
            Tier::AtRisk => "At Risk",
            Tier::InterventionAdvised => "Intervention Advised",
        }
    }
}

impl FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pulse_certified" => Ok(Tier::PulseCertified),
            "emerging_culture" => Ok(Tier::EmergingCulture),
            "at_risk" => Ok(Tier::AtRisk),
            "intervention_advised" => Ok(Tier::InterventionAdvised),
            other => anyhow::bail!("unknown tier '{other}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseScore {
    pub overall: f64,
    pub tier: Tier,
    pub categories: Vec<CategoryScore>,
    pub themes: Vec<ThemeScore>,
    pub scored_responses: usize,
    pub skipped_responses: usize,
    pub computed_at: DateTime<Utc>,
}

impl PulseScore {
    pub fn category(&self, category: Category) -> Option<&CategoryScore> {
        self.categories.iter().find(|c| c.category == category)
    }

    pub fn theme(&self, theme: Theme) -> Option<&ThemeScore> {
        self.themes.iter().find(|t| t.theme == theme)
    }
}

/// A stored score snapshot, as listed by `history`.
#[derive(Debug, Clone)]
pub struct ScoreSnapshot {
    pub survey_id: String,
    pub overall: f64,
    pub tier: Tier,
    pub response_count: i32,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailchimpEvent {
    pub event_type: String,
    pub email: String,
    pub list_id: Option<String>,
    pub tags: Vec<String>,
    pub payload: serde_json::Value,
}
