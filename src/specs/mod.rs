// src/specs/mod.rs
//! # Page “specs” module
//!
//! This module hosts the **page-specific extraction specifications**. Each spec
//! focuses on a single page or endpoint and encodes *where the ground truth lives*
//! and *how to read it robustly*.
//!
//! ## What lives here
//! - **Patient details** (`patient`): the versioned record schema. Every logical
//!   field lists its candidate locators; `engine::FieldResolver` does the reading.
//! - **Search results listing** (`listing`): result rows → identity tuples, with
//!   the frame fallback for listings rendered inside an `<iframe>`.
//! - **Slot search** (`search`): request building, the single POST, and flattening
//!   of grouped results into slots.
//!
//! ## What does **not** live here
//! - **Correlation/persistence** (`store`) and the open-a-patient handle (`session`).
//! - **Delivery**: console output and JSON files are `runner`, `cli` and `file` concerns.
//! - **Page loading**: specs take an already parsed `core::html::Page`.
//!
//! ## Typical call chain
//! ```text
//! cli → runner::run_listing → specs::listing::extract_listing → session::ListingSession::open
//!                                                             ↘ store.put(current patient)
//! cli → runner::run_details → specs::patient::extract_details → store.get(current patient)
//! cli → runner::run_search  → specs::search::SearchClient::search
//! ```
//!
//! ## Conventions & invariants
//! - A field that is not on the page is `None`, never an error, and is still
//!   serialized (as `null`) so every output has the same shape.
//! - `select` fields report the **displayed text**; the raw input map keeps the
//!   option **code**.
//! - Locator lists are the only thing to touch when the application renames a control.
//! - **No logging spam**: skipped rows and failed sections warn, everything else is debug.
//!
//! ## Testing notes
//! - Specs are tested **offline** against saved HTML fixtures (`tests/fixtures`).
//! - The search client is tested through a recording `Transport`.
pub mod listing;
pub mod patient;
pub mod search;
