// src/runner.rs
//! Page-level passes: load a saved page, decide what it is, run the matching
//! extractor and deliver the result. Console formatting lives in `cli`.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::consts::{CURRENT_PATIENT_KEY, DETAILS_PAGE_MARKER, SEARCH_RESULTS_KEY};
use crate::config::options::AppOptions;
use crate::core::html::{Document, Page};
use crate::core::net::{ReqwestTransport, Transport, TransportError};
use crate::file::{self, FileError};
use crate::session::{ListingSession, Navigator, Opened, SessionError};
use crate::specs::listing::{IdentityTuple, ListingOutcome, ListingSource, extract_listing};
use crate::specs::patient::{ExtractionResult, extract_details};
use crate::specs::search::{SearchClient, SearchConfig, SearchError, SlotRecord, csrf_token};
use crate::store::{CorrelationStore, FileStore, KeyValueStore, StoreError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "could not find any patient results in {searched}; make sure the Patient Search \
         results page is showing results, save it, and run this again"
    )]
    NoResults { searched: String },
    #[error("invalid search config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    File(#[from] FileError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageKind {
    Listing,
    Details,
}

/// Details pages are recognised by URL alone.
pub fn detect_kind(url: &str) -> PageKind {
    if url.contains(DETAILS_PAGE_MARKER) { PageKind::Details } else { PageKind::Listing }
}

fn read_file(path: &Path) -> Result<String, RunError> {
    fs::read_to_string(path).map_err(|source| RunError::Read { path: path.to_path_buf(), source })
}

/// Load a saved page. Frames referencing a local file next to the page get
/// that file as their content; remote or missing frames stay unreachable.
pub fn load_page(path: &Path, url: Option<&str>) -> Result<Page, RunError> {
    let mut page = Page::parse(&read_file(path)?);
    if let Some(url) = url {
        page = page.with_url(url);
    }

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let local: Vec<(usize, PathBuf)> = page
        .frames()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.document.is_none())
        .filter_map(|(i, f)| {
            let src = f.src.as_deref()?;
            if src.contains("://") || src.starts_with("//") || src.starts_with("about:") {
                return None;
            }
            let file = src.split(['?', '#']).next()?;
            Some((i, base.join(file)))
        })
        .collect();

    for (i, frame_path) in local {
        match fs::read_to_string(&frame_path) {
            Ok(text) => {
                page.attach_frame(i, Document::parse(&text));
                logd!(frame = i, path = %frame_path.display(), "attached local frame");
            }
            Err(e) => logd!(frame = i, path = %frame_path.display(), error = %e, "frame not reachable"),
        }
    }
    Ok(page)
}

pub fn open_store(opts: &AppOptions) -> CorrelationStore<FileStore> {
    CorrelationStore::new(FileStore::new(opts.store.session_dir()))
}

/* ---------------- listing ---------------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Open the patient only when the listing has exactly one.
    Auto,
    One(usize),
    All,
}

pub struct ListingReport {
    pub source: ListingSource,
    pub patients: Vec<IdentityTuple>,
    pub opened: Vec<Opened>,
}

pub fn run_listing<S: KeyValueStore>(
    page: &Page,
    store: &CorrelationStore<S>,
    opts: &AppOptions,
    selection: Selection,
    nav: &mut dyn Navigator,
) -> Result<ListingReport, RunError> {
    let (source, patients) = match extract_listing(page) {
        ListingOutcome::Found { source, patients } => (source, patients),
        ListingOutcome::NoParsableRows { source, skipped } => {
            logw!(%source, skipped, "result rows found but none carried a patient id");
            return Err(RunError::NoResults { searched: source.to_string() });
        }
        ListingOutcome::NotFound => {
            return Err(RunError::NoResults { searched: s!("the page or any of its frames") });
        }
    };
    logf!(count = patients.len(), %source, "found patients");

    let session = ListingSession::new(patients, store, opts.navigation.clone())?;
    let opened = match selection {
        Selection::Auto if session.patients().len() == 1 => vec![session.open(1, nav)?.1],
        Selection::Auto => Vec::new(),
        Selection::One(index) => vec![session.open(index, nav)?.1],
        Selection::All => session.open_all(nav)?,
    };

    Ok(ListingReport { source, patients: session.patients().to_vec(), opened })
}

/* ---------------- details ---------------- */

pub struct DetailsReport {
    pub result: ExtractionResult,
    pub written: Option<PathBuf>,
}

pub fn run_details<S: KeyValueStore>(
    page: &Page,
    store: &CorrelationStore<S>,
    opts: &AppOptions,
) -> Result<DetailsReport, RunError> {
    let result = extract_details(page, store);
    let written = if opts.export.write_file {
        Some(file::write_record(&opts.export, &result)?)
    } else {
        None
    };
    Ok(DetailsReport { result, written })
}

/* ---------------- search ---------------- */

pub fn load_search_config(path: &Path) -> Result<SearchConfig, RunError> {
    let text = read_file(path)?;
    serde_json::from_str(&text).map_err(|source| RunError::Config { path: path.to_path_buf(), source })
}

/// Token given directly wins; otherwise read it from a saved scheduler page.
pub fn resolve_csrf(token: Option<String>, from_page: Option<&Path>) -> Result<Option<String>, RunError> {
    if token.is_some() {
        return Ok(token);
    }
    match from_page {
        Some(p) => Ok(csrf_token(&load_page(p, None)?)),
        None => Ok(None),
    }
}

pub async fn run_search_with<T: Transport>(
    client: &SearchClient<T>,
    config: &SearchConfig,
    opts: &AppOptions,
    out: Option<&Path>,
) -> Result<(Vec<SlotRecord>, Option<PathBuf>), RunError> {
    let slots = client.search(config).await?;
    let written = if opts.export.write_file {
        Some(file::write_slots(&opts.export, out, &slots)?)
    } else {
        None
    };
    Ok((slots, written))
}

pub async fn run_search(
    config: &SearchConfig,
    origin: &str,
    csrf: Option<String>,
    opts: &AppOptions,
    out: Option<&Path>,
) -> Result<(Vec<SlotRecord>, Option<PathBuf>), RunError> {
    // an invalid config never builds a client
    config.validate()?;
    let client = SearchClient::new(ReqwestTransport::new()?, origin).with_csrf_token(csrf);
    run_search_with(&client, config, opts, out).await
}

/* ---------------- context ---------------- */

pub struct ContextSnapshot {
    pub current: Option<IdentityTuple>,
    pub listing: Option<Vec<IdentityTuple>>,
}

pub fn context_show<S: KeyValueStore>(store: &CorrelationStore<S>) -> ContextSnapshot {
    ContextSnapshot {
        current: store.get(CURRENT_PATIENT_KEY),
        listing: store.get(SEARCH_RESULTS_KEY),
    }
}

pub fn context_clear<S: KeyValueStore>(store: &CorrelationStore<S>) -> Result<(), RunError> {
    store.remove(CURRENT_PATIENT_KEY)?;
    store.remove(SEARCH_RESULTS_KEY)?;
    logf!("correlation context cleared");
    Ok(())
}
