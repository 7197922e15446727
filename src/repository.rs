//! Survey repository: domain operations over the flat-file store.
//!
//! Layout under the data root:
//!   survey.json                                   all survey responses (one JSON array)
//!   <userName>/_surveys.json                      index of the user's survey names
//!   <userName>/<surveyName>/<surveyName>_question.json
//!   <userName>/<surveyName>_answer.json
//!
//! Every file name ends in `.json` and no user or survey name may, so a name can
//! never land on a path the repository uses for a file.
//!
//! The repository assigns every `id` / `createdAt` / `createTime`. Lookups that find
//! nothing return `None` or an empty vec.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{AnswerSet, NewSurvey, QuestionSet, SurveyResponse};
use crate::error::{SurveyError, SurveyResult};
use crate::store::FlatFileStore;
use crate::util::{is_safe_segment, now_iso, now_millis};

const RESPONSE_LOG: &str = "survey.json";
const SURVEY_INDEX: &str = "_surveys.json";

/// One async mutex per file path, created lazily.
#[derive(Clone, Default)]
pub struct PathLocks {
  inner: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl PathLocks {
  pub async fn lock(&self, rel: &Path) -> OwnedMutexGuard<()> {
    let m = {
      let mut map = self.inner.lock().await;
      map.entry(rel.to_path_buf()).or_default().clone()
    };
    m.lock_owned().await
  }
}

pub struct SurveyRepository {
  store: FlatFileStore,
  // None reproduces unserialized read-modify-write
  locks: Option<PathLocks>,
  last_created_at: AtomicI64,
}

impl SurveyRepository {
  pub fn new(store: FlatFileStore, serialize_writes: bool) -> Self {
    Self {
      store,
      locks: serialize_writes.then(PathLocks::default),
      last_created_at: AtomicI64::new(0),
    }
  }

  #[cfg(test)]
  pub fn store(&self) -> &FlatFileStore {
    &self.store
  }

  async fn guard(&self, rel: &Path) -> Option<OwnedMutexGuard<()>> {
    match &self.locks {
      Some(l) => Some(l.lock(rel).await),
      None => None,
    }
  }

  /// Wall-clock millis, clamped so successive submissions never go backwards.
  fn next_created_at(&self) -> i64 {
    let now = now_millis();
    let prev = self.last_created_at.fetch_max(now, Ordering::SeqCst);
    prev.max(now)
  }

  /// Store a new survey response with a fresh id and timestamp.
  #[instrument(level = "info", skip(self, input), fields(name = %input.name))]
  pub async fn submit(&self, input: NewSurvey) -> SurveyResult<SurveyResponse> {
    let record = SurveyResponse {
      name: input.name,
      age: input.age,
      gender: input.gender,
      survey_result: input.survey_result,
      id: Uuid::new_v4().to_string(),
      created_at: self.next_created_at(),
    };

    let rel = Path::new(RESPONSE_LOG);
    let _g = self.guard(rel).await;
    let all = self.store.append_record(rel, record.clone()).await?;
    info!(target: "survey", id = %record.id, created_at = record.created_at, total = all.len(), "Survey response saved");
    Ok(record)
  }

  /// All responses, most recent first. Equal timestamps keep insertion order.
  #[instrument(level = "info", skip(self))]
  pub async fn list_all(&self) -> SurveyResult<Vec<SurveyResponse>> {
    let rel = Path::new(RESPONSE_LOG);
    let mut all: Vec<SurveyResponse> = {
      let _g = self.guard(rel).await;
      self.store.read_document(rel).await?
    };
    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    debug!(target: "survey", count = all.len(), "Listed survey responses");
    Ok(all)
  }

  #[instrument(level = "info", skip(self), fields(%id))]
  pub async fn find_by_id(&self, id: &str) -> SurveyResult<Option<SurveyResponse>> {
    let rel = Path::new(RESPONSE_LOG);
    let all: Vec<SurveyResponse> = {
      let _g = self.guard(rel).await;
      self.store.read_document(rel).await?
    };
    let found = all.into_iter().find(|r| r.id == id);
    debug!(target: "survey", %id, found = found.is_some(), "Looked up survey response");
    Ok(found)
  }

  /// Survey names that have a question set for `user_name`, sorted.
  /// Uses the per-user index when present, otherwise the user's subdirectories.
  #[instrument(level = "info", skip(self), fields(%user_name))]
  pub async fn list_question_names(&self, user_name: &str) -> SurveyResult<Vec<String>> {
    check_segment("userName", user_name)?;
    let user_dir = Path::new(user_name);
    let rel = user_dir.join(SURVEY_INDEX);
    let _g = self.guard(&rel).await;
    let names = match self.store.read_single_file::<Vec<String>>(&rel).await? {
      Some(names) => names,
      None => self.store.list_subdirectories(user_dir).await?,
    };
    debug!(target: "survey", %user_name, count = names.len(), "Listed question sets");
    Ok(names)
  }

  #[instrument(level = "info", skip(self), fields(%survey_name, %user_name))]
  pub async fn get_question_set(&self, survey_name: &str, user_name: &str) -> SurveyResult<Option<QuestionSet>> {
    check_segment("surveyName", survey_name)?;
    check_segment("userName", user_name)?;
    let rel = question_path(user_name, survey_name);
    let _g = self.guard(&rel).await;
    let set = self.store.read_single_file(&rel).await?;
    Ok(set)
  }

  /// Replace the question set for (`user_name`, `survey_name`).
  /// `questions` must be a JSON array; an empty array is accepted.
  #[instrument(level = "info", skip(self, questions), fields(%survey_name, %user_name))]
  pub async fn set_question_set(&self, questions: Value, survey_name: &str, user_name: &str) -> SurveyResult<QuestionSet> {
    let Value::Array(questions) = questions else {
      return Err(SurveyError::InvalidInput("questions 必须是数组".into()));
    };
    check_segment("surveyName", survey_name)?;
    check_segment("userName", user_name)?;

    let set = QuestionSet {
      id: Uuid::new_v4().to_string(),
      create_time: now_iso(),
      survey_name: survey_name.to_string(),
      questions,
    };

    self.store.ensure_dir(&Path::new(user_name).join(survey_name)).await?;
    let rel = question_path(user_name, survey_name);
    {
      let _g = self.guard(&rel).await;
      self.store.write_single_file(&rel, &set).await?;
    }
    self.index_survey(user_name, survey_name).await?;
    info!(target: "survey", id = %set.id, %survey_name, %user_name, count = set.questions.len(), "Question set saved");
    Ok(set)
  }

  /// Replace the answer set for (`user_name`, `survey_name`).
  /// No question set needs to exist for the survey.
  #[instrument(level = "info", skip(self, questions_form), fields(%survey_name, %user_name))]
  pub async fn submit_answer_set(&self, survey_name: &str, user_name: &str, questions_form: Value) -> SurveyResult<AnswerSet> {
    let Value::Array(questions_form) = questions_form else {
      return Err(SurveyError::InvalidInput("questionsForm 必须是数组".into()));
    };
    check_segment("surveyName", survey_name)?;
    check_segment("userName", user_name)?;

    let set = AnswerSet {
      id: Uuid::new_v4().to_string(),
      create_time: now_iso(),
      survey_name: survey_name.to_string(),
      questions_form,
    };

    self.store.ensure_dir(Path::new(user_name)).await?;
    let rel = answer_path(user_name, survey_name);
    let _g = self.guard(&rel).await;
    self.store.write_single_file(&rel, &set).await?;
    info!(target: "survey", id = %set.id, %survey_name, %user_name, count = set.questions_form.len(), "Answer set saved");
    Ok(set)
  }

  /// Add `survey_name` to the user's index. A missing index is seeded from the
  /// existing subdirectories so earlier question sets stay listed.
  async fn index_survey(&self, user_name: &str, survey_name: &str) -> SurveyResult<()> {
    let user_dir = Path::new(user_name);
    let rel = user_dir.join(SURVEY_INDEX);
    let _g = self.guard(&rel).await;

    let mut names = match self.store.read_single_file::<Vec<String>>(&rel).await? {
      Some(names) => names,
      None => self.store.list_subdirectories(user_dir).await?,
    };
    names.push(survey_name.to_string());
    names.sort();
    names.dedup();
    self.store.write_single_file(&rel, &names).await?;
    Ok(())
  }
}

/// Names become directories, so they must be safe path segments and must not
/// end in `.json` (which would collide with survey.json, the index, or an answer file).
fn check_segment(field: &str, value: &str) -> SurveyResult<()> {
  if is_safe_segment(value) && !value.to_ascii_lowercase().ends_with(".json") {
    Ok(())
  } else {
    Err(SurveyError::InvalidInput(format!("{} 不合法", field)))
  }
}

fn question_path(user_name: &str, survey_name: &str) -> PathBuf {
  Path::new(user_name)
    .join(survey_name)
    .join(format!("{}_question.json", survey_name))
}

fn answer_path(user_name: &str, survey_name: &str) -> PathBuf {
  Path::new(user_name).join(format!("{}_answer.json", survey_name))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::collections::HashSet;
  use tempfile::TempDir;

  fn repo() -> (TempDir, SurveyRepository) {
    let dir = TempDir::new().unwrap();
    let repo = SurveyRepository::new(FlatFileStore::new(dir.path()), true);
    (dir, repo)
  }

  fn li() -> NewSurvey {
    NewSurvey { name: "Li".into(), age: 30, gender: "M".into(), survey_result: json!("ok") }
  }

  #[tokio::test]
  async fn submit_assigns_unique_ids_and_ordered_timestamps() {
    let (_dir, repo) = repo();
    let mut ids = HashSet::new();
    let mut last = i64::MIN;
    for _ in 0..5 {
      let r = repo.submit(li()).await.unwrap();
      assert!(ids.insert(r.id.clone()));
      assert!(r.created_at >= last);
      last = r.created_at;
      assert_eq!(r.name, "Li");
      assert_eq!(r.age, 30);
      assert_eq!(r.survey_result, json!("ok"));
    }
  }

  #[tokio::test]
  async fn list_all_is_newest_first_and_stable_on_ties() {
    let (_dir, repo) = repo();
    let mk = |id: &str, at: i64| SurveyResponse {
      name: id.into(),
      age: 1,
      gender: "F".into(),
      survey_result: json!(null),
      id: id.into(),
      created_at: at,
    };
    let seeded = vec![mk("a", 100), mk("b", 300), mk("c", 200), mk("d", 300), mk("e", 100)];
    repo.store().write_document(Path::new(RESPONSE_LOG), &seeded).await.unwrap();

    let ids: Vec<String> = repo.list_all().await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["b", "d", "c", "a", "e"]);
  }

  #[tokio::test]
  async fn list_all_returns_every_submission() {
    let (_dir, repo) = repo();
    assert!(repo.list_all().await.unwrap().is_empty());
    for _ in 0..4 {
      repo.submit(li()).await.unwrap();
    }
    assert_eq!(repo.list_all().await.unwrap().len(), 4);
  }

  #[tokio::test]
  async fn find_by_id_hits_and_misses() {
    let (_dir, repo) = repo();
    let saved = repo.submit(li()).await.unwrap();
    repo.submit(li()).await.unwrap();

    assert_eq!(repo.find_by_id(&saved.id).await.unwrap(), Some(saved));
    assert_eq!(repo.find_by_id(&Uuid::new_v4().to_string()).await.unwrap(), None);
  }

  #[tokio::test]
  async fn concurrent_submissions_are_not_lost_when_serialized() {
    let (_dir, repo) = repo();
    let repo = Arc::new(repo);
    let mut handles = Vec::new();
    for _ in 0..16 {
      let repo = repo.clone();
      handles.push(tokio::spawn(async move { repo.submit(li()).await.unwrap() }));
    }
    for h in handles {
      h.await.unwrap();
    }
    assert_eq!(repo.list_all().await.unwrap().len(), 16);
  }

  #[tokio::test]
  async fn question_set_round_trip() {
    let (_dir, repo) = repo();
    let saved = repo.set_question_set(json!(["Q1", "Q2"]), "fruit", "alice").await.unwrap();
    let got = repo.get_question_set("fruit", "alice").await.unwrap().unwrap();
    assert_eq!(got, saved);
    assert_eq!(got.questions, vec![json!("Q1"), json!("Q2")]);
    assert_eq!(got.survey_name, "fruit");
  }

  #[tokio::test]
  async fn question_set_is_overwritten_not_accumulated() {
    let (dir, repo) = repo();
    repo.set_question_set(json!(["Q1"]), "fruit", "alice").await.unwrap();
    let second = repo.set_question_set(json!(["Q3", "Q4"]), "fruit", "alice").await.unwrap();

    let files = std::fs::read_dir(dir.path().join("alice/fruit")).unwrap().count();
    assert_eq!(files, 1);
    let got = repo.get_question_set("fruit", "alice").await.unwrap().unwrap();
    assert_eq!(got, second);
  }

  #[tokio::test]
  async fn question_set_accepts_empty_but_rejects_non_arrays() {
    let (_dir, repo) = repo();
    let empty = repo.set_question_set(json!([]), "blank", "alice").await.unwrap();
    assert!(empty.questions.is_empty());

    let err = repo.set_question_set(json!("Q1"), "fruit", "alice").await.unwrap_err();
    assert!(matches!(err, SurveyError::InvalidInput(_)));
    assert!(repo.get_question_set("fruit", "alice").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn unknown_question_set_is_absent() {
    let (_dir, repo) = repo();
    assert!(repo.get_question_set("fruit", "nobody").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn question_names_follow_saved_sets() {
    let (_dir, repo) = repo();
    assert!(repo.list_question_names("ghost").await.unwrap().is_empty());

    repo.set_question_set(json!(["Q"]), "fruit", "alice").await.unwrap();
    repo.set_question_set(json!(["Q"]), "animals", "alice").await.unwrap();
    repo.set_question_set(json!(["Q"]), "fruit", "alice").await.unwrap();
    repo.submit_answer_set("cars", "alice", json!([])).await.unwrap();

    assert_eq!(repo.list_question_names("alice").await.unwrap(), vec!["animals", "fruit"]);
  }

  #[tokio::test]
  async fn question_names_fall_back_to_directories_without_index() {
    let (dir, repo) = repo();
    std::fs::create_dir_all(dir.path().join("bob/legacy")).unwrap();
    std::fs::write(dir.path().join("bob/legacy_answer.json"), b"{}").unwrap();
    assert_eq!(repo.list_question_names("bob").await.unwrap(), vec!["legacy"]);

    // First save seeds the index from what is already on disk.
    repo.set_question_set(json!(["Q"]), "newer", "bob").await.unwrap();
    assert_eq!(repo.list_question_names("bob").await.unwrap(), vec!["legacy", "newer"]);
  }

  #[tokio::test]
  async fn answer_set_overwrites_and_needs_no_question_set() {
    let (dir, repo) = repo();
    let form = json!([{"question": "Q1", "answer": "apple"}]);
    repo.submit_answer_set("fruit", "carol", form.clone()).await.unwrap();
    let second = repo
      .submit_answer_set("fruit", "carol", json!([{"question": "Q1", "answer": "pear"}]))
      .await
      .unwrap();

    let text = std::fs::read_to_string(dir.path().join("carol/fruit_answer.json")).unwrap();
    let on_disk: AnswerSet = serde_json::from_str(&text).unwrap();
    assert_eq!(on_disk, second);
    assert_eq!(on_disk.questions_form[0]["answer"], json!("pear"));
  }

  #[tokio::test]
  async fn answer_set_rejects_non_arrays() {
    let (_dir, repo) = repo();
    let err = repo.submit_answer_set("fruit", "carol", json!({"q": 1})).await.unwrap_err();
    assert!(matches!(err, SurveyError::InvalidInput(_)));
  }

  #[tokio::test]
  async fn names_that_collide_with_data_files_are_rejected() {
    let (_dir, repo) = repo();
    repo.set_question_set(json!(["Q"]), "fruit", "alice").await.unwrap();

    for survey in ["_surveys.json", "fruit_answer.json", "x.JSON"] {
      let err = repo.set_question_set(json!(["Q"]), survey, "alice").await.unwrap_err();
      assert!(matches!(err, SurveyError::InvalidInput(_)), "{survey}");
      let err = repo.submit_answer_set(survey, "alice", json!([])).await.unwrap_err();
      assert!(matches!(err, SurveyError::InvalidInput(_)), "{survey}");
    }
    let err = repo.set_question_set(json!(["Q"]), "fruit", "survey.json").await.unwrap_err();
    assert!(matches!(err, SurveyError::InvalidInput(_)));

    // The user stays fully usable afterwards.
    repo.set_question_set(json!(["Q"]), "animals", "alice").await.unwrap();
    assert_eq!(repo.list_question_names("alice").await.unwrap(), vec!["animals", "fruit"]);
    repo.submit(li()).await.unwrap();
    assert_eq!(repo.list_all().await.unwrap().len(), 1);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn readers_never_see_a_partial_log_while_writes_are_serialized() {
    let (_dir, repo) = repo();
    let repo = Arc::new(repo);
    repo.submit(li()).await.unwrap();

    let writer = {
      let repo = repo.clone();
      tokio::spawn(async move {
        for _ in 0..100 {
          repo.submit(li()).await.unwrap();
        }
      })
    };
    let reader = {
      let repo = repo.clone();
      tokio::spawn(async move {
        let mut errors = 0;
        let mut last = 0;
        while last < 101 {
          match repo.list_all().await {
            Ok(all) => {
              assert!(all.len() >= last);
              last = all.len();
            }
            Err(_) => errors += 1,
          }
          if repo.find_by_id("missing").await.is_err() {
            errors += 1;
          }
        }
        errors
      })
    };

    writer.await.unwrap();
    assert_eq!(reader.await.unwrap(), 0);
  }

  #[tokio::test]
  async fn path_traversal_names_are_rejected() {
    let (_dir, repo) = repo();
    let err = repo.set_question_set(json!(["Q"]), "../x", "alice").await.unwrap_err();
    assert!(matches!(err, SurveyError::InvalidInput(_)));
    let err = repo.list_question_names("..").await.unwrap_err();
    assert!(matches!(err, SurveyError::InvalidInput(_)));
  }
}
