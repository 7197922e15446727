//! Application state shared by all handlers.

use tracing::{info, instrument};

use crate::config::ServerConfig;
use crate::error::StoreResult;
use crate::repository::SurveyRepository;
use crate::store::FlatFileStore;

pub struct AppState {
  pub config: ServerConfig,
  pub surveys: SurveyRepository,
}

impl AppState {
  /// Build state from config and make sure the data root exists.
  #[instrument(level = "info", skip_all, fields(data_root = %config.data_root.display()))]
  pub async fn new(config: ServerConfig) -> StoreResult<Self> {
    let store = FlatFileStore::new(&config.data_root);
    store.ensure_dir(std::path::Path::new("")).await?;
    info!(target: "survey_backend", data_root = %store.root().display(), serialize_writes = config.serialize_writes, "Data root ready");
    let surveys = SurveyRepository::new(store, config.serialize_writes);
    Ok(Self { config, surveys })
  }
}
