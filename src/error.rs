//! Error types for the flat-file store and the survey repository.
//!
//! A missing file or directory is never represented here: the store reports it
//! as an empty/absent result. These variants cover everything else (permission
//! problems, corrupt JSON, full disks) and are fatal for the request.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("io failure on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("invalid json in {path}: {source}")]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

impl StoreError {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io { path: path.into(), source }
  }

  pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
    Self::Json { path: path.into(), source }
  }
}

#[derive(Debug, Error)]
pub enum SurveyError {
  /// Caller-supplied input has the wrong shape; maps to a 400 envelope.
  #[error("{0}")]
  InvalidInput(String),
  #[error(transparent)]
  Store(#[from] StoreError),
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type SurveyResult<T> = Result<T, SurveyError>;
