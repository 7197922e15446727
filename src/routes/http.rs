//! HTTP endpoint handlers. These are thin wrappers that validate parameters, forward to
//! the survey repository, and wrap the result in an `Envelope` with a matching status.

use std::sync::Arc;

use axum::{
  extract::{rejection::{JsonRejection, QueryRejection}, Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::domain::{NewSurvey, QuestionSet, SurveyResponse};
use crate::error::SurveyError;
use crate::protocol::*;
use crate::state::AppState;
use crate::util::trunc_for_log;

fn reply<T: Serialize>(status: StatusCode, env: Envelope<T>) -> Response {
  (status, Json(env)).into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
  reply::<Value>(StatusCode::BAD_REQUEST, Envelope::fail(400, message))
}

impl IntoResponse for SurveyError {
  fn into_response(self) -> Response {
    match self {
      SurveyError::InvalidInput(msg) => {
        warn!(target: "survey", %msg, "Rejected invalid input");
        bad_request(msg)
      }
      SurveyError::Store(e) => {
        error!(target: "survey", error = %e, "Storage failure");
        reply::<Value>(StatusCode::INTERNAL_SERVER_ERROR, Envelope::fail(500, MSG_INTERNAL))
      }
    }
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_survey(
  State(state): State<Arc<AppState>>,
  body: Result<Json<SurveyIn>, JsonRejection>,
) -> Response {
  let body = match body {
    Ok(Json(b)) => b,
    Err(e) => {
      warn!(target: "survey", error = %e.body_text(), "Unreadable survey body");
      return bad_request(MSG_MISSING_PARAMS);
    }
  };
  let (Some(name), Some(age), Some(gender), Some(result)) = (
    present(&body.name),
    present(&body.age),
    present(&body.gender),
    present(&body.survey_result),
  ) else {
    warn!(target: "survey", "Survey submission is missing parameters");
    return bad_request(MSG_MISSING_PARAMS);
  };
  let Some(age) = as_age(age) else {
    return bad_request("age 必须是整数");
  };

  let input = NewSurvey {
    name: name.clone(),
    age,
    gender: gender.clone(),
    survey_result: result.clone(),
  };
  match state.surveys.submit(input).await {
    Ok(rec) => {
      info!(target: "survey", id = %rec.id, result = %trunc_for_log(&rec.survey_result.to_string(), 120), "HTTP survey submitted");
      reply(StatusCode::OK, Envelope::ok(MSG_SUBMITTED, rec))
    }
    Err(e) => e.into_response(),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_surveys(State(state): State<Arc<AppState>>) -> Response {
  match state.surveys.list_all().await {
    Ok(all) => {
      info!(target: "survey", count = all.len(), "HTTP surveys listed");
      reply::<Vec<SurveyResponse>>(StatusCode::OK, Envelope::ok(MSG_QUERIED, all))
    }
    Err(e) => e.into_response(),
  }
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_survey(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
  match state.surveys.find_by_id(&id).await {
    Ok(Some(rec)) => reply(StatusCode::OK, Envelope::ok(MSG_QUERIED, rec)),
    Ok(None) => {
      info!(target: "survey", %id, "HTTP survey not found");
      reply::<SurveyResponse>(StatusCode::NOT_FOUND, Envelope::fail(404, MSG_NOT_FOUND))
    }
    Err(e) => e.into_response(),
  }
}

#[instrument(level = "info", skip(state, q))]
pub async fn http_list_question_names(
  State(state): State<Arc<AppState>>,
  q: Result<Query<QuestionNamesQuery>, QueryRejection>,
) -> Response {
  let Some(user_name) = q.ok().and_then(|Query(q)| q.user_name).filter(|u| !u.is_empty()) else {
    return bad_request(MSG_MISSING_PARAMS);
  };
  match state.surveys.list_question_names(&user_name).await {
    Ok(names) if names.is_empty() => {
      info!(target: "survey", %user_name, "HTTP no question sets for user");
      reply(
        StatusCode::NOT_FOUND,
        Envelope { code: 404, message: MSG_NOT_FOUND.into(), data: Some(names) },
      )
    }
    Ok(names) => {
      info!(target: "survey", %user_name, count = names.len(), "HTTP question sets listed");
      reply(StatusCode::OK, Envelope::ok(MSG_QUERIED, names))
    }
    Err(e) => e.into_response(),
  }
}

#[instrument(level = "info", skip(state, q))]
pub async fn http_get_question_set(
  State(state): State<Arc<AppState>>,
  q: Result<Query<QuestionSetQuery>, QueryRejection>,
) -> Response {
  let Ok(Query(q)) = q else {
    return bad_request(MSG_MISSING_PARAMS);
  };
  let (Some(survey_name), Some(user_name)) = (q.survey_name, q.user_name) else {
    return bad_request(MSG_MISSING_PARAMS);
  };
  match state.surveys.get_question_set(&survey_name, &user_name).await {
    Ok(Some(set)) => reply(StatusCode::OK, Envelope::ok(MSG_QUERIED, set)),
    Ok(None) => {
      info!(target: "survey", %survey_name, %user_name, "HTTP question set not found");
      reply::<QuestionSet>(StatusCode::NOT_FOUND, Envelope::fail(404, MSG_NOT_FOUND))
    }
    Err(e) => e.into_response(),
  }
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_set_question_set(
  State(state): State<Arc<AppState>>,
  body: Result<Json<QuestionSetIn>, JsonRejection>,
) -> Response {
  let Ok(Json(body)) = body else {
    return bad_request(MSG_MISSING_PARAMS);
  };
  let (Some(survey_name), Some(user_name)) = (body.survey_name, body.user_name) else {
    return bad_request(MSG_MISSING_PARAMS);
  };
  match state.surveys.set_question_set(body.questions, &survey_name, &user_name).await {
    Ok(set) => reply(StatusCode::OK, Envelope::ok(MSG_SAVED, set)),
    Err(e) => e.into_response(),
  }
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_answer_set(
  State(state): State<Arc<AppState>>,
  body: Result<Json<AnswerSetIn>, JsonRejection>,
) -> Response {
  let Ok(Json(body)) = body else {
    return bad_request(MSG_MISSING_PARAMS);
  };
  let (Some(survey_name), Some(user_name)) = (body.survey_name, body.user_name) else {
    return bad_request(MSG_MISSING_PARAMS);
  };
  match state.surveys.submit_answer_set(&survey_name, &user_name, body.questions_form).await {
    Ok(set) => reply(StatusCode::OK, Envelope::ok(MSG_SAVED, set)),
    Err(e) => e.into_response(),
  }
}
