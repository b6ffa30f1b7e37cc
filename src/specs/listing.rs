// src/specs/listing.rs
//! Patient search results listing.
//!
//! Each result row is anchored by `a[id^="anchorPatientName"]`. The anchor's
//! `href` carries the internal patient id (`LoadPatient(<digits>, ...)`), and the
//! remainder of its id is the suffix shared by the row's sibling spans
//! (`spanPatientAccount<suffix>`, `spanPatientDOB<suffix>`, ...).
//!
//! Results are sometimes rendered inside an `<iframe>`; when the main document
//! yields no patient every reachable frame is tried in document order.
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};

use crate::core::html::{self, Document, Page, text_content};

const ANCHOR_PREFIX: &str = "anchorPatientName";

static ROW_ANCHOR: Lazy<Selector> = Lazy::new(|| html::selector(r#"a[id^="anchorPatientName"]"#));
static LOAD_PATIENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"LoadPatient\((\d+),").expect("static regex"));

/// Minimal identity of one listing row; enough to reopen and re-associate the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityTuple {
    /// 1-based position of the row anchor in its document.
    pub index: usize,
    pub hidden_patient_id: String,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub ssn: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub chart: Option<String>,
    #[serde(default)]
    pub patient_balance: Option<String>,
    #[serde(default)]
    pub plan_balance: Option<String>,
}

/// Where the rows were found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListingSource {
    CurrentPage,
    /// Embedded frame, by id, else name, else "unnamed".
    Frame(String),
}

impl fmt::Display for ListingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingSource::CurrentPage => f.write_str("current page"),
            ListingSource::Frame(label) => write!(f, "iframe \"{label}\""),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListingOutcome {
    Found { source: ListingSource, patients: Vec<IdentityTuple> },
    /// Row anchors exist but none yielded a patient id.
    NoParsableRows { source: ListingSource, skipped: usize },
    NotFound,
}

impl ListingOutcome {
    pub fn patients(&self) -> &[IdentityTuple] {
        match self {
            ListingOutcome::Found { patients, .. } => patients,
            _ => &[],
        }
    }
}

/// The first document (main page, then frames in order) that yields a patient
/// wins. Rows that exist but carry no patient id do not stop the search; they
/// are reported as `NoParsableRows` only when no document yields a patient.
pub fn extract_listing(page: &Page) -> ListingOutcome {
    let mut unparsable = None;
    match read_rows(page.document(), ListingSource::CurrentPage) {
        Some(found @ ListingOutcome::Found { .. }) => return found,
        Some(other) => unparsable = Some(other),
        None => {}
    }

    logd!("no patients in main document, searching frames");
    for frame in page.frames() {
        let Some(doc) = frame.document.as_ref() else {
            logd!(frame = frame.label(), "frame content not reachable, skipping");
            continue;
        };
        match read_rows(doc, ListingSource::Frame(s!(frame.label()))) {
            Some(found @ ListingOutcome::Found { .. }) => return found,
            Some(other) => {
                unparsable.get_or_insert(other);
            }
            None => {}
        }
    }
    unparsable.unwrap_or(ListingOutcome::NotFound)
}

/// Internal patient id from a row anchor's navigation reference.
pub fn patient_id_from_href(href: &str) -> Option<String> {
    LOAD_PATIENT.captures(href).map(|c| s!(&c[1]))
}

// `None` when the document has no row anchors at all.
fn read_rows(doc: &Document, source: ListingSource) -> Option<ListingOutcome> {
    let anchors: Vec<ElementRef<'_>> = doc.select(&ROW_ANCHOR).collect();
    if anchors.is_empty() {
        return None;
    }

    let mut patients = Vec::with_capacity(anchors.len());
    let mut skipped = 0;
    for (i, anchor) in anchors.into_iter().enumerate() {
        let index = i + 1;
        match read_row(doc, anchor, index) {
            Some(p) => patients.push(p),
            None => {
                logw!(index, "skipping row: could not extract patient id");
                skipped += 1;
            }
        }
    }

    if patients.is_empty() {
        return Some(ListingOutcome::NoParsableRows { source, skipped });
    }
    logf!(count = patients.len(), skipped, %source, "listing rows extracted");
    Some(ListingOutcome::Found { source, patients })
}

fn read_row(doc: &Document, anchor: ElementRef<'_>, index: usize) -> Option<IdentityTuple> {
    let hidden_patient_id = anchor.value().attr("href").and_then(patient_id_from_href)?;

    let suffix = anchor
        .value()
        .id()
        .and_then(|id| id.strip_prefix(ANCHOR_PREFIX))
        .unwrap_or_default();
    let span = |name: &str| {
        doc.by_id(&join!("spanPatient", name, suffix))
            .map(|el| s!(text_content(el).trim()))
    };

    Some(IdentityTuple {
        index,
        hidden_patient_id,
        account_number: span("Account"),
        patient_name: s!(text_content(anchor).trim()),
        ssn: span("SSN"),
        phone: span("Phone"),
        dob: span("DOB"),
        chart: span("LocationOrChart"),
        patient_balance: span("Balance"),
        plan_balance: span("Plan"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_pattern_requires_digits_and_comma() {
        assert_eq!(patient_id_from_href("javascript:LoadPatient(12345, 'x')").as_deref(), Some("12345"));
        assert_eq!(patient_id_from_href("javascript:LoadPatient(abc, 'x')"), None);
        assert_eq!(patient_id_from_href("javascript:LoadPatient(12345)"), None);
    }

    #[test]
    fn missing_siblings_are_absent_and_missing_href_is_skipped() {
        let page = Page::parse(
            r#"<a id="anchorPatientName_0" href="javascript:LoadPatient(7, 1)"> DOE, JANE </a>
               <span id="spanPatientDOB_0">01/02/1990</span>
               <a id="anchorPatientName_1">NO HREF</a>"#,
        );
        match extract_listing(&page) {
            ListingOutcome::Found { source, patients } => {
                assert_eq!(source, ListingSource::CurrentPage);
                assert_eq!(patients.len(), 1);
                let p = &patients[0];
                assert_eq!(p.index, 1);
                assert_eq!(p.patient_name, "DOE, JANE");
                assert_eq!(p.dob.as_deref(), Some("01/02/1990"));
                assert_eq!(p.account_number, None);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn rows_present_but_unparsable() {
        let page = Page::parse(r##"<a id="anchorPatientName1" href="#">x</a>"##);
        assert_eq!(
            extract_listing(&page),
            ListingOutcome::NoParsableRows { source: ListingSource::CurrentPage, skipped: 1 }
        );
    }

    #[test]
    fn unparsable_main_rows_fall_through_to_frame() {
        let page = Page::parse(
            r##"<a id="anchorPatientNameHdr" href="#">Name</a>
               <iframe id="fraResults"
                 srcdoc="<a id='anchorPatientName_0' href='javascript:LoadPatient(42, 1)'>ROE, RICHARD</a>"></iframe>"##,
        );
        match extract_listing(&page) {
            ListingOutcome::Found { source, patients } => {
                assert_eq!(source, ListingSource::Frame(s!("fraResults")));
                assert_eq!(patients.len(), 1);
                assert_eq!(patients[0].hidden_patient_id, "42");
                assert_eq!(patients[0].patient_name, "ROE, RICHARD");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn unparsable_rows_everywhere_report_first_source() {
        let page = Page::parse(
            r##"<iframe id="fraResults" srcdoc="<a id='anchorPatientName_0' href='#'>x</a><a id='anchorPatientName_1'>y</a>"></iframe>"##,
        );
        assert_eq!(
            extract_listing(&page),
            ListingOutcome::NoParsableRows { source: ListingSource::Frame(s!("fraResults")), skipped: 2 }
        );
    }

    #[test]
    fn source_label_matches_frame_naming() {
        assert_eq!(ListingSource::Frame(s!("fraMain")).to_string(), r#"iframe "fraMain""#);
        assert_eq!(ListingSource::CurrentPage.to_string(), "current page");
    }

    #[test]
    fn tuple_uses_camel_case_keys() {
        let t = IdentityTuple {
            index: 2,
            hidden_patient_id: s!("99"),
            account_number: Some(s!("A-1")),
            patient_name: s!("X"),
            ssn: None,
            phone: None,
            dob: None,
            chart: None,
            patient_balance: None,
            plan_balance: None,
        };
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["hiddenPatientId"], "99");
        assert_eq!(v["accountNumber"], "A-1");
        assert!(v["planBalance"].is_null());
    }
}
