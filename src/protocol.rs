//! Public protocol structs for the HTTP endpoints (serde ready).
//! Every response body is an `Envelope`; request bodies keep loosely-typed fields so
//! that validation can answer with a 400 envelope instead of a framework rejection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MSG_SUBMITTED: &str = "提交成功";
pub const MSG_QUERIED: &str = "查询成功";
pub const MSG_SAVED: &str = "保存成功";
pub const MSG_NOT_FOUND: &str = "数据不存在";
pub const MSG_MISSING_PARAMS: &str = "缺少参数";
pub const MSG_INTERNAL: &str = "服务器内部错误";

/// Uniform `{code, message, data}` wrapper. `code` 0 means success.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
  pub code: i32,
  pub message: String,
  pub data: Option<T>,
}

impl<T> Envelope<T> {
  pub fn ok(message: &str, data: T) -> Self {
    Self { code: 0, message: message.into(), data: Some(data) }
  }

  pub fn fail(code: i32, message: impl Into<String>) -> Self {
    Self { code, message: message.into(), data: None }
  }
}

//
// HTTP request DTOs
//

/// POST /survey. Fields are optional so that a missing one yields `缺少参数`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyIn {
  pub name: Option<Value>,
  pub age: Option<Value>,
  pub gender: Option<Value>,
  pub survey_result: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionNamesQuery {
  pub user_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSetQuery {
  pub survey_name: Option<String>,
  pub user_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSetIn {
  #[serde(default)]
  pub questions: Value,
  pub survey_name: Option<String>,
  pub user_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSetIn {
  pub user_name: Option<String>,
  pub survey_name: Option<String>,
  #[serde(default)]
  pub questions_form: Value,
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

/// JavaScript-style truthiness: null, false, 0, "" count as missing.
pub fn is_truthy(v: &Value) -> bool {
  match v {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
    Value::String(s) => !s.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}

/// Present and truthy.
pub fn present(v: &Option<Value>) -> Option<&Value> {
  v.as_ref().filter(|v| is_truthy(v))
}

/// Integer age from a JSON integer or an integer string.
pub fn as_age(v: &Value) -> Option<i64> {
  match v {
    Value::Number(n) => n.as_i64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}
