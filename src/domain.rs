//! Domain models persisted by the backend: survey responses, question sets, answer sets.
//!
//! Free-form payloads (`name`, `gender`, `surveyResult`, questions, answer pairs) stay as raw JSON values;
//! the backend stores whatever shape the front-end sends.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One submitted questionnaire result. Appended to `survey.json`, never modified.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
  pub name: Value,
  pub age: i64,
  pub gender: Value,
  pub survey_result: Value,
  pub id: String,
  pub created_at: i64,
}

/// Caller-supplied part of a submission; `id` and `createdAt` are assigned on save.
#[derive(Clone, Debug)]
pub struct NewSurvey {
  pub name: Value,
  pub age: i64,
  pub gender: Value,
  pub survey_result: Value,
}

/// Question list a user has defined for one named survey.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSet {
  pub id: String,
  pub create_time: String,
  pub survey_name: String,
  pub questions: Vec<Value>,
}

/// One submission of answers against a named survey.
/// `questionsForm` entries are usually `{question, answer}` objects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSet {
  pub id: String,
  pub create_time: String,
  pub survey_name: String,
  pub questions_form: Vec<Value>,
}
