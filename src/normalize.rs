use thiserror::Error;

use crate::models::{QuestionType, ResponseValue};

/// Emoji scale from most negative to most positive, matching Likert 1..=5.
pub const EMOJI_SCALE: [&str; 5] = ["😡", "😟", "😐", "🙂", "😄"];

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("{question_type} value {value} is outside the 1-5 scale")]
    OutOfScale { question_type: &'static str, value: f64 },
    #[error("binary value {0} must be 0 or 1")]
    NotBinary(f64),
    #[error("unrecognised {question_type} answer '{value}'")]
    Unrecognised {
        question_type: &'static str,
        value: String,
    },
}

/// Maps a raw answer onto 0..=100. Free-text answers have no numeric value
/// and yield `Ok(None)`.
pub fn normalize(
    question_type: QuestionType,
    value: &ResponseValue,
) -> Result<Option<f64>, NormalizeError> {
    match question_type {
        QuestionType::Likert | QuestionType::Emoji => {
            let point = scale_point(question_type, value)?;
            Ok(Some(scale_to_percent(point)))
        }
        QuestionType::Binary => binary_value(value).map(Some),
        QuestionType::Text => Ok(None),
    }
}

/// `(value - 1) * 25` for a point already known to be in 1..=5.
pub fn scale_to_percent(point: f64) -> f64 {
    (point - 1.0) * 25.0
}

fn scale_point(question_type: QuestionType, value: &ResponseValue) -> Result<f64, NormalizeError> {
    let point = match value {
        ResponseValue::Number(number) => *number,
        ResponseValue::Text(text) => {
            let trimmed = text.trim();
            if let Some(index) = EMOJI_SCALE.iter().position(|emoji| *emoji == trimmed) {
                (index + 1) as f64
            } else {
                trimmed
                    .parse::<f64>()
                    .map_err(|_| NormalizeError::Unrecognised {
                        question_type: question_type.as_str(),
                        value: trimmed.to_string(),
                    })?
            }
        }
    };

    if !(1.0..=5.0).contains(&point) {
        return Err(NormalizeError::OutOfScale {
            question_type: question_type.as_str(),
            value: point,
        });
    }
    Ok(point)
}

fn binary_value(value: &ResponseValue) -> Result<f64, NormalizeError> {
    match value {
        ResponseValue::Number(number) if *number == 1.0 => Ok(100.0),
        ResponseValue::Number(number) if *number == 0.0 => Ok(0.0),
        ResponseValue::Number(number) => Err(NormalizeError::NotBinary(*number)),
        ResponseValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => Ok(100.0),
            "no" | "n" | "false" | "0" => Ok(0.0),
            other => Err(NormalizeError::Unrecognised {
                question_type: QuestionType::Binary.as_str(),
                value: other.to_string(),
            }),
        },
    }
}
