// src/file.rs

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::config::consts::{RECORD_FILE_PREFIX, SLOTS_FILE_PREFIX};
use crate::config::options::ExportOptions;
use crate::core::sanitize::sanitize_file_part;
use crate::engine::FieldValue;
use crate::specs::patient::ExtractionResult;
use crate::specs::search::SlotRecord;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("path exists but is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> FileError + '_ {
    move |source| FileError::Io { path: path.to_path_buf(), source }
}

/// `patient_demographics_<First>_<Last>_<id>.json`; id is the patient id, else
/// the account number, else `unknown`.
pub fn record_file_name(result: &ExtractionResult) -> String {
    let info = &result.extracted_data.patient_info;
    let part = |v: &Option<FieldValue>| {
        v.as_ref()
            .and_then(FieldValue::as_text)
            .map(|t| sanitize_file_part(t, ""))
            .unwrap_or_default()
    };
    let meta = &result.metadata;
    let id = [meta.patient_id.as_deref(), meta.account_number.as_deref()]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .map(|s| sanitize_file_part(s, "unknown"))
        .unwrap_or_else(|| s!("unknown"));

    format!("{RECORD_FILE_PREFIX}_{}_{}_{id}.json", part(&info.first_name), part(&info.last_name))
}

/// `appointment_slots_<UTC timestamp>.json`
pub fn slots_file_name() -> String {
    format!("{SLOTS_FILE_PREFIX}_{}.json", Utc::now().format("%Y%m%dT%H%M%SZ"))
}

/// Pretty-printed JSON, parent directories created as needed.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), FileError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }
    let file = File::create(path).map_err(io_at(path))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, value)?;
    out.write_all(b"\n").map_err(io_at(path))?;
    out.flush().map_err(io_at(path))?;
    Ok(())
}

/// Write a details extraction into the export directory. Returns the path written.
pub fn write_record(export: &ExportOptions, result: &ExtractionResult) -> Result<PathBuf, FileError> {
    let path = export.out_dir().join(record_file_name(result));
    write_json(&path, result)?;
    logf!(path = %path.display(), "record written");
    Ok(path)
}

/// Write slots to `out` (a file, or a directory when it ends in a separator or
/// already is one), or to the default out dir when `out` is `None`.
pub fn write_slots(export: &ExportOptions, out: Option<&Path>, slots: &[SlotRecord]) -> Result<PathBuf, FileError> {
    let path = match out {
        Some(p) => resolve_single_out_path(p, &slots_file_name())?,
        None => export.out_dir().join(slots_file_name()),
    };
    write_json(&path, slots)?;
    logf!(path = %path.display(), count = slots.len(), "slots written");
    Ok(path)
}

pub fn resolve_single_out_path(user_o: &Path, default_filename: &str) -> Result<PathBuf, FileError> {
    if user_o.as_os_str().is_empty() {
        return Ok(PathBuf::from(default_filename));
    }
    if looks_like_dir_hint(user_o) || user_o.is_dir() {
        ensure_directory(user_o)?;
        Ok(user_o.join(default_filename))
    } else {
        Ok(user_o.to_path_buf())
    }
}

pub fn ensure_directory(dir: &Path) -> Result<(), FileError> {
    if dir.exists() && !dir.is_dir() {
        return Err(FileError::NotADirectory(dir.to_path_buf()));
    }
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(io_at(dir))?;
    }
    Ok(())
}

pub fn looks_like_dir_hint(p: &Path) -> bool {
    let s = p.to_string_lossy();
    s.ends_with('/') || s.ends_with('\\')
}
