use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    MailchimpEvent, PulseScore, QuestionType, ResponseValue, ScoreSnapshot, SurveyQuestion,
    SurveyResponse,
};
use crate::normalize::normalize;
use crate::server::EventStore;
use crate::survey::{default_questions, DEFAULT_SURVEY_ID, DEFAULT_SURVEY_TITLE};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn ensure_survey(pool: &PgPool, survey_id: &str, title: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pulse.surveys (id, title)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET title = EXCLUDED.title
        "#,
    )
    .bind(survey_id)
    .bind(title)
    .execute(pool)
    .await?;
    Ok(())
}

/// Registers a survey id without touching the title of an existing row.
const REGISTER_SURVEY_SQL: &str = r#"
    INSERT INTO pulse.surveys (id, title)
    VALUES ($1, $2)
    ON CONFLICT (id) DO NOTHING
    "#;

pub async fn register_survey(pool: &PgPool, survey_id: &str) -> anyhow::Result<()> {
    sqlx::query(REGISTER_SURVEY_SQL)
        .bind(survey_id)
        .bind(survey_id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to register survey '{survey_id}'"))?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    ensure_survey(pool, DEFAULT_SURVEY_ID, DEFAULT_SURVEY_TITLE).await?;

    let questions = default_questions();
    for (position, question) in questions.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO pulse.questions
            (id, survey_id, position, text, question_type, theme, weight)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (survey_id, id) DO UPDATE
            SET position = EXCLUDED.position, text = EXCLUDED.text,
                question_type = EXCLUDED.question_type, theme = EXCLUDED.theme,
                weight = EXCLUDED.weight
            "#,
        )
        .bind(&question.id)
        .bind(DEFAULT_SURVEY_ID)
        .bind(position as i32)
        .bind(&question.text)
        .bind(question.question_type.as_str())
        .bind(question.theme.as_str())
        .bind(question.weight)
        .execute(pool)
        .await?;
    }

    // Three respondents with distinct temperaments: upbeat, middling, strained.
    let respondents = [
        ("resp-aurora", 5.0, "yes", "Keep the Friday demos, they make wins visible.", 2),
        ("resp-birch", 4.0, "yes", "Clearer priorities between product and sales.", 5),
        ("resp-cedar", 2.0, "no", "Workload has been unsustainable since the reorg.", 9),
    ];

    let mut inserted = 0usize;
    for (respondent, scale, binary, comment, days_ago) in respondents {
        let submitted_at = Utc::now() - Duration::days(days_ago);
        for question in &questions {
            let value = match question.question_type {
                QuestionType::Likert | QuestionType::Emoji => {
                    ResponseValue::Number(scale)
                }
                QuestionType::Binary => ResponseValue::Text(binary.to_string()),
                QuestionType::Text => ResponseValue::Text(comment.to_string()),
            };
            let source_key = format!("seed-{respondent}-{}", question.id);
            inserted += insert_response(
                pool,
                DEFAULT_SURVEY_ID,
                &question.id,
                Some(respondent),
                &value,
                submitted_at,
                &source_key,
            )
            .await?;
        }
    }

    Ok(inserted)
}

async fn insert_response<'e, E>(
    executor: E,
    survey_id: &str,
    question_id: &str,
    respondent: Option<&str>,
    value: &ResponseValue,
    submitted_at: DateTime<Utc>,
    source_key: &str,
) -> anyhow::Result<usize>
where
    E: sqlx::PgExecutor<'e>,
{
    let (numeric, text) = match value {
        ResponseValue::Number(number) => (Some(*number), None),
        ResponseValue::Text(text) => (None, Some(text.as_str())),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO pulse.responses
        (id, survey_id, question_id, respondent, value_numeric, value_text, submitted_at, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(survey_id)
    .bind(question_id)
    .bind(respondent)
    .bind(numeric)
    .bind(text)
    .bind(submitted_at)
    .bind(source_key)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() as usize)
}

pub async fn fetch_questions(pool: &PgPool, survey_id: &str) -> anyhow::Result<Vec<SurveyQuestion>> {
    let rows = sqlx::query(
        "SELECT id, text, question_type, theme, weight \
         FROM pulse.questions WHERE survey_id = $1 ORDER BY position",
    )
    .bind(survey_id)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        tracing::info!(survey_id, "no stored questions, using the built-in survey");
        return Ok(default_questions());
    }

    let mut questions = Vec::with_capacity(rows.len());
    for row in rows {
        let question_type: String = row.get("question_type");
        let theme: String = row.get("theme");
        questions.push(SurveyQuestion {
            id: row.get("id"),
            text: row.get("text"),
            question_type: question_type.parse()?,
            theme: theme.parse()?,
            weight: row.get("weight"),
        });
    }

    Ok(questions)
}

pub async fn fetch_responses(
    pool: &PgPool,
    survey_id: &str,
    since_date: NaiveDate,
    respondent: Option<&str>,
) -> anyhow::Result<Vec<SurveyResponse>> {
    let mut query = String::from(
        "SELECT question_id, respondent, value_numeric, value_text, submitted_at \
         FROM pulse.responses \
         WHERE survey_id = $1 AND submitted_at >= $2",
    );

    if respondent.is_some() {
        query.push_str(" AND respondent = $3");
    }
    query.push_str(" ORDER BY submitted_at");

    let mut rows = sqlx::query(&query).bind(survey_id).bind(since_date);

    if let Some(value) = respondent {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut responses = Vec::with_capacity(records.len());

    for row in records {
        let numeric: Option<f64> = row.get("value_numeric");
        let text: Option<String> = row.get("value_text");
        let value = match (numeric, text) {
            (Some(number), _) => ResponseValue::Number(number),
            (None, Some(text)) => ResponseValue::Text(text),
            (None, None) => continue,
        };

        responses.push(SurveyResponse {
            question_id: row.get("question_id"),
            value,
            respondent: row.get("respondent"),
            submitted_at: row.get("submitted_at"),
        });
    }

    Ok(responses)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub question_id: String,
    pub value: ResponseValue,
    pub respondent: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub source_key: Option<String>,
}

/// Parses and validates a responses CSV. Any row that names an unknown
/// question or carries an answer outside its scale fails the whole file.
pub fn read_responses_csv<R: std::io::Read>(
    reader: R,
    questions: &[SurveyQuestion],
) -> anyhow::Result<Vec<ImportRow>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        question_id: String,
        value: String,
        respondent: Option<String>,
        submitted_at: Option<DateTime<Utc>>,
        source_key: Option<String>,
    }

    let by_id: HashMap<&str, &SurveyQuestion> =
        questions.iter().map(|q| (q.id.as_str(), q)).collect();
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("row {line}: malformed record"))?;
        let question = by_id
            .get(row.question_id.as_str())
            .with_context(|| format!("row {line}: unknown question '{}'", row.question_id))?;

        let value = ResponseValue::for_question(&row.value, question.question_type);
        normalize(question.question_type, &value)
            .with_context(|| format!("row {line}: invalid answer for {}", question.id))?;

        rows.push(ImportRow {
            question_id: row.question_id,
            value,
            respondent: row.respondent.filter(|r| !r.trim().is_empty()),
            submitted_at: row.submitted_at.unwrap_or_else(Utc::now),
            source_key: row.source_key.filter(|k| !k.trim().is_empty()),
        });
    }

    Ok(rows)
}

pub async fn import_csv(
    pool: &PgPool,
    survey_id: &str,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let questions = fetch_questions(pool, survey_id).await?;
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = read_responses_csv(file, &questions)?;

    register_survey(pool, survey_id).await?;

    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for row in rows {
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        inserted += insert_response(
            &mut *tx,
            survey_id,
            &row.question_id,
            row.respondent.as_deref(),
            &row.value,
            row.submitted_at,
            &source_key,
        )
        .await?;
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn save_score(pool: &PgPool, survey_id: &str, score: &PulseScore) -> anyhow::Result<Uuid> {
    register_survey(pool, survey_id).await?;
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO pulse.pulse_scores
        (id, survey_id, overall, tier, response_count, payload, computed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(survey_id)
    .bind(score.overall)
    .bind(score.tier.as_str())
    .bind(score.scored_responses as i32)
    .bind(serde_json::to_value(score)?)
    .bind(score.computed_at)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn fetch_score_history(
    pool: &PgPool,
    survey_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<ScoreSnapshot>> {
    let rows = sqlx::query(
        "SELECT survey_id, overall, tier, response_count, computed_at \
         FROM pulse.pulse_scores WHERE survey_id = $1 \
         ORDER BY computed_at DESC LIMIT $2",
    )
    .bind(survey_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut snapshots = Vec::with_capacity(rows.len());
    for row in rows {
        let tier: String = row.get("tier");
        snapshots.push(ScoreSnapshot {
            survey_id: row.get("survey_id"),
            overall: row.get("overall"),
            tier: tier.parse()?,
            response_count: row.get("response_count"),
            computed_at: row.get("computed_at"),
        });
    }
    Ok(snapshots)
}

pub async fn record_mailchimp_event(pool: &PgPool, event: &MailchimpEvent) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO pulse.mailchimp_events
        (id, event_type, email, list_id, tags, payload)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(&event.event_type)
    .bind(&event.email)
    .bind(&event.list_id)
    .bind(&event.tags)
    .bind(&event.payload)
    .execute(pool)
    .await?;
    Ok(id)
}

#[async_trait]
impl EventStore for PgPool {
    async fn record(&self, event: MailchimpEvent) -> anyhow::Result<Uuid> {
        record_mailchimp_event(self, &event).await
    }
}
