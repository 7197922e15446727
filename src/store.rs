//! Flat-file JSON store.
//!
//! Whole-document reads and writes of JSON values under a data root, plus directory
//! enumeration. A missing file or directory is an empty/absent result, never an error.
//!
//! Writes truncate and rewrite the target in place (no temp file, no rename), and
//! `append_record` is a plain read followed by a write. Callers that need the pair to
//! be exclusive must serialize it themselves (see `repository::PathLocks`).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tracing::{debug, instrument};

use crate::error::{StoreError, StoreResult};

#[derive(Clone, Debug)]
pub struct FlatFileStore {
  root: PathBuf,
}

impl FlatFileStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn resolve(&self, rel: &Path) -> PathBuf {
    self.root.join(rel)
  }

  /// Read a JSON array document. Missing file yields an empty vec.
  #[instrument(level = "debug", skip(self), fields(path = %rel.display()))]
  pub async fn read_document<T: DeserializeOwned>(&self, rel: &Path) -> StoreResult<Vec<T>> {
    Ok(self.read_single_file::<Vec<T>>(rel).await?.unwrap_or_default())
  }

  /// Serialize `records` as an indented JSON array and overwrite the file in full.
  #[instrument(level = "debug", skip(self, records), fields(path = %rel.display(), count = records.len()))]
  pub async fn write_document<T: Serialize>(&self, rel: &Path, records: &[T]) -> StoreResult<()> {
    self.write_single_file(rel, records).await
  }

  /// Read the document, push `record`, write everything back. Returns the new contents.
  /// Not atomic: a concurrent append between the two steps is lost.
  #[instrument(level = "debug", skip(self, record), fields(path = %rel.display()))]
  pub async fn append_record<T>(&self, rel: &Path, record: T) -> StoreResult<Vec<T>>
  where
    T: Serialize + DeserializeOwned,
  {
    let mut records = self.read_document::<T>(rel).await?;
    records.push(record);
    self.write_document(rel, &records).await?;
    debug!(target: "store", path = %rel.display(), count = records.len(), "Appended record");
    Ok(records)
  }

  /// Names of the files and directories directly under `rel`, sorted.
  /// Missing directory yields an empty vec.
  #[instrument(level = "debug", skip(self), fields(path = %rel.display()))]
  pub async fn list_entries(&self, rel: &Path) -> StoreResult<Vec<String>> {
    let path = self.resolve(rel);
    let mut rd = match fs::read_dir(&path).await {
      Ok(rd) => rd,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        debug!(target: "store", path = %path.display(), "Directory does not exist");
        return Ok(Vec::new());
      }
      Err(e) => return Err(StoreError::io(path, e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = rd.next_entry().await.map_err(|e| StoreError::io(&path, e))? {
      names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
  }

  /// `list_entries` filtered to child directories. Entries removed between the
  /// listing and the metadata lookup are skipped.
  #[instrument(level = "debug", skip(self), fields(path = %rel.display()))]
  pub async fn list_subdirectories(&self, rel: &Path) -> StoreResult<Vec<String>> {
    let mut dirs = Vec::new();
    for name in self.list_entries(rel).await? {
      let path = self.resolve(&rel.join(&name));
      match fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => dirs.push(name),
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(StoreError::io(path, e)),
      }
    }
    Ok(dirs)
  }

  /// Read and parse exactly one JSON document. Missing file yields `None`.
  #[instrument(level = "debug", skip(self), fields(path = %rel.display()))]
  pub async fn read_single_file<T: DeserializeOwned>(&self, rel: &Path) -> StoreResult<Option<T>> {
    let path = self.resolve(rel);
    let bytes = match fs::read(&path).await {
      Ok(b) => b,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        debug!(target: "store", path = %path.display(), "File does not exist");
        return Ok(None);
      }
      Err(e) => return Err(StoreError::io(path, e)),
    };
    let value = serde_json::from_slice(&bytes).map_err(|e| StoreError::json(&path, e))?;
    debug!(target: "store", path = %path.display(), bytes = bytes.len(), "Read file");
    Ok(Some(value))
  }

  /// Serialize one value as indented JSON and overwrite the file in full.
  /// The parent directory must already exist.
  #[instrument(level = "debug", skip(self, value), fields(path = %rel.display()))]
  pub async fn write_single_file<T: Serialize + ?Sized>(&self, rel: &Path, value: &T) -> StoreResult<()> {
    let path = self.resolve(rel);
    let bytes = to_pretty_json(value).map_err(|e| StoreError::json(&path, e))?;
    fs::write(&path, &bytes).await.map_err(|e| StoreError::io(&path, e))?;
    debug!(target: "store", path = %path.display(), bytes = bytes.len(), "Wrote file");
    Ok(())
  }

  /// Create `rel` and any missing parents. Existing directories are fine.
  #[instrument(level = "debug", skip(self), fields(path = %rel.display()))]
  pub async fn ensure_dir(&self, rel: &Path) -> StoreResult<()> {
    let path = self.resolve(rel);
    fs::create_dir_all(&path).await.map_err(|e| StoreError::io(path, e))
  }
}

/// Four-space indented JSON, matching files written by earlier deployments.
fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
  let mut out = Vec::new();
  let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
  let mut ser = serde_json::Serializer::with_formatter(&mut out, fmt);
  value.serialize(&mut ser)?;
  Ok(out)
}
