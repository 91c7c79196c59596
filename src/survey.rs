use crate::models::{QuestionType, SurveyQuestion, Theme};

pub const DEFAULT_SURVEY_ID: &str = "pulse-default";
pub const DEFAULT_SURVEY_TITLE: &str = "PulsePlace Culture Pulse";

const BANK: &[(&str, &str, QuestionType, Theme, f64)] = &[
    ("til-1", "I trust the decisions made by senior leadership.", QuestionType::Likert, Theme::TrustInLeadership, 1.0),
    ("til-2", "Leaders here follow through on what they promise.", QuestionType::Likert, Theme::TrustInLeadership, 1.0),
    ("psy-1", "I can raise concerns without fear of negative consequences.", QuestionType::Likert, Theme::PsychologicalSafety, 1.5),
    ("psy-2", "It is safe to admit a mistake on my team.", QuestionType::Likert, Theme::PsychologicalSafety, 1.0),
    ("inc-1", "I feel I belong at this organization.", QuestionType::Likert, Theme::InclusionBelonging, 1.0),
    ("inc-2", "People with different backgrounds are treated fairly here.", QuestionType::Likert, Theme::InclusionBelonging, 1.0),
    ("mot-1", "My work gives me a sense of accomplishment.", QuestionType::Likert, Theme::MotivationFulfillment, 1.0),
    ("mot-2", "How do you feel about the work you did this week?", QuestionType::Emoji, Theme::MotivationFulfillment, 1.0),
    ("eng-1", "I see myself working here two years from now.", QuestionType::Likert, Theme::EngagementContinuity, 1.2),
    ("eng-2", "I would recommend this organization as a place to work.", QuestionType::Likert, Theme::EngagementContinuity, 1.0),
    ("rec-1", "I receive recognition when I do good work.", QuestionType::Likert, Theme::RecognitionAppreciation, 1.0),
    ("rec-2", "My contributions are valued by my team.", QuestionType::Likert, Theme::RecognitionAppreciation, 1.0),
    ("grw-1", "I have opportunities to learn and grow here.", QuestionType::Likert, Theme::GrowthDevelopment, 1.0),
    ("grw-2", "My manager supports my career development.", QuestionType::Likert, Theme::GrowthDevelopment, 1.0),
    ("com-1", "I understand how my work connects to company goals.", QuestionType::Likert, Theme::CommunicationClarity, 1.0),
    ("com-2", "Important information reaches me in time.", QuestionType::Likert, Theme::CommunicationClarity, 1.0),
    ("col-1", "Teams here work well together across boundaries.", QuestionType::Likert, Theme::CollaborationCohesion, 1.0),
    ("col-2", "I can count on my colleagues for help.", QuestionType::Likert, Theme::CollaborationCohesion, 1.0),
    ("wel-1", "My workload is manageable.", QuestionType::Likert, Theme::WellbeingBalance, 1.0),
    ("wel-2", "How are you feeling about work-life balance right now?", QuestionType::Emoji, Theme::WellbeingBalance, 1.0),
    ("pur-1", "I believe in the mission of this organization.", QuestionType::Likert, Theme::PurposeAlignment, 1.0),
    ("pur-2", "My values align with the values of the company.", QuestionType::Likert, Theme::PurposeAlignment, 1.0),
    ("emo-1", "How do you feel coming to work most days?", QuestionType::Emoji, Theme::EmotionalClimate, 1.0),
    ("emo-2", "The mood on my team is generally positive.", QuestionType::Likert, Theme::EmotionalClimate, 1.0),
    ("bin-1", "Have you had a meaningful 1:1 with your manager this month?", QuestionType::Binary, Theme::GrowthDevelopment, 0.5),
    ("txt-1", "What one change would most improve our culture?", QuestionType::Text, Theme::EmotionalClimate, 1.0),
];

/// The built-in survey used when no questions are stored for a survey.
pub fn default_questions() -> Vec<SurveyQuestion> {
    BANK.iter()
        .map(|(id, text, question_type, theme, weight)| SurveyQuestion {
            id: id.to_string(),
            text: text.to_string(),
            question_type: *question_type,
            theme: *theme,
            weight: *weight,
        })
        .collect()
}
