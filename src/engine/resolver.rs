// src/engine/resolver.rs
//! Multi-strategy field resolution.
//!
//! A logical field is an ordered list of [`Locator`]s. The resolver walks the
//! list (label locators always last) and returns the first candidate that
//! exists and reads non-blank. Candidates that exist but read blank are kept
//! as a fallback, so a present empty text box still comes back as `""` while
//! a field with no present candidate comes back as `None`.
//!
//! Read rules by control kind:
//! - `select` → displayed text of the selected option (never the option code)
//! - checkbox → checked state
//! - radio → `value` of the checked member of the same `name` group, else absent
//! - `textarea` → its text; other `input` → `value` or `""`
//! - anything else → trimmed text content
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};

use super::types::{FieldValue, Locator, ResolveError};
use crate::core::html::{
    self, ControlKind, Document, control_kind, control_value, is_checked, selected_text, text_content,
};

static LABEL_LIKE: Lazy<Selector> = Lazy::new(|| html::selector("label, td"));
static CONTROL: Lazy<Selector> = Lazy::new(|| html::selector("input, select, textarea"));

pub struct FieldResolver<'a> {
    doc: &'a Document,
}

impl<'a> FieldResolver<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self { doc }
    }

    pub fn resolve(&self, candidates: &[Locator]) -> Result<Option<FieldValue>, ResolveError> {
        let ordered = candidates
            .iter()
            .filter(|l| !l.is_label())
            .chain(candidates.iter().filter(|l| l.is_label()));

        let mut blank = None;
        for loc in ordered {
            match self.read(loc)? {
                Some(v) if !v.is_blank() => return Ok(Some(v)),
                // present but blank: an unchecked box followed only by missing
                // candidates still reads `false`, not absent
                Some(v) => {
                    if blank.is_none() {
                        blank = Some(v);
                    }
                }
                None => {}
            }
        }
        Ok(blank)
    }

    /// Read a single locator. `Ok(None)` means the candidate is not on the page.
    pub fn read(&self, loc: &Locator) -> Result<Option<FieldValue>, ResolveError> {
        let value = match *loc {
            Locator::Id(id) => self.doc.by_id(id).and_then(|el| self.read_control(el)),
            Locator::Css(css) => {
                let sel = Selector::parse(css).map_err(|e| ResolveError::InvalidSelector {
                    selector: s!(css),
                    reason: e.to_string(),
                })?;
                self.doc.select(&sel).next().and_then(|el| self.read_control(el))
            }
            Locator::Label(phrase) => self.read_by_label(phrase),
            Locator::IdTextContains { id, needle } => self
                .doc
                .by_id(id)
                .map(|el| FieldValue::Flag(text_content(el).contains(needle))),
            Locator::IdEquals { id, expected } => self.doc.by_id(id).map(|el| {
                let read = self.read_control(el);
                FieldValue::Flag(read.as_ref().and_then(FieldValue::as_text) == Some(expected))
            }),
        };
        Ok(value)
    }

    fn read_control(&self, el: ElementRef<'_>) -> Option<FieldValue> {
        let value = match control_kind(el) {
            ControlKind::Select => FieldValue::Text(selected_text(el)),
            ControlKind::Checkbox => FieldValue::Flag(is_checked(el)),
            ControlKind::Radio => return self.read_radio(el),
            ControlKind::TextArea => FieldValue::Text(text_content(el)),
            ControlKind::Input => FieldValue::Text(control_value(el)),
            ControlKind::Other => FieldValue::Text(s!(text_content(el).trim())),
        };
        Some(value)
    }

    fn read_radio(&self, el: ElementRef<'_>) -> Option<FieldValue> {
        let checked = match el.value().attr("name") {
            Some(name) => self.doc.checked_in_group(name),
            None => is_checked(el).then_some(el),
        };
        checked.map(|c| FieldValue::Text(s!(c.value().attr("value").unwrap_or("on"))))
    }

    // First label-like element (document order) containing the phrase, then the
    // first control in its next element sibling, else in its parent.
    fn read_by_label(&self, phrase: &str) -> Option<FieldValue> {
        let label = self
            .doc
            .select(&LABEL_LIKE)
            .find(|el| text_content(*el).trim().contains(phrase))?;

        let control = label
            .next_siblings()
            .find_map(ElementRef::wrap)
            .and_then(|sib| sib.select(&CONTROL).next())
            .or_else(|| {
                label
                    .parent()
                    .and_then(ElementRef::wrap)
                    .and_then(|parent| parent.select(&CONTROL).next())
            })?;

        let text = match control_kind(control) {
            ControlKind::Select => selected_text(control),
            _ => control_value(control),
        };
        Some(FieldValue::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{css, equals, id, label, text_contains};

    fn resolve(html: &str, candidates: &[Locator]) -> Option<FieldValue> {
        let doc = Document::parse(html);
        FieldResolver::new(&doc).resolve(candidates).unwrap()
    }

    #[test]
    fn no_present_candidate_is_absent() {
        assert_eq!(resolve("<p>nothing</p>", &[id("a"), id("b"), label("Chart No.")]), None);
        assert_eq!(resolve("<p>nothing</p>", &[]), None);
    }

    #[test]
    fn select_reads_display_text_not_code() {
        let html = r#"<select id="cmbVSEX">
            <option value="M">Male</option>
            <option value="F" selected>Female</option>
        </select>"#;
        assert_eq!(resolve(html, &[id("cmbVSEX")]), Some("Female".into()));
    }

    #[test]
    fn first_non_blank_candidate_wins() {
        let html = r#"<input id="a" value=""><input id="b" value="second">"#;
        assert_eq!(resolve(html, &[id("missing"), id("a"), id("b")]), Some("second".into()));
    }

    #[test]
    fn present_blank_text_is_empty_string_not_absent() {
        let html = r#"<input id="a" value=""><textarea id="t"></textarea>"#;
        assert_eq!(resolve(html, &[id("a")]), Some("".into()));
        assert_eq!(resolve(html, &[id("missing"), id("t")]), Some("".into()));
    }

    #[test]
    fn checkbox_reads_checked_state() {
        let html = r#"<input type="checkbox" id="on" checked><input type="CHECKBOX" id="off">"#;
        assert_eq!(resolve(html, &[id("on")]), Some(true.into()));
        assert_eq!(resolve(html, &[id("off")]), Some(false.into()));
        // an unchecked box loses to a later populated candidate
        let html = r#"<input type="checkbox" id="off"><input type="checkbox" id="on" checked>"#;
        assert_eq!(resolve(html, &[id("off"), id("on")]), Some(true.into()));
    }

    #[test]
    fn unchecked_box_with_missing_fallback_stays_false() {
        let html = r#"<input type="checkbox" id="a">"#;
        assert_eq!(resolve(html, &[id("a"), id("b")]), Some(false.into()));
        assert_eq!(resolve(html, &[id("b"), id("a")]), Some(false.into()));
    }

    #[test]
    fn radio_reads_checked_sibling_in_group() {
        let html = r#"
            <input type="radio" id="r1" name="grp" value="yes">
            <input type="radio" id="r2" name="grp" value="no" checked>
            <input type="radio" id="z1" name="none" value="x">"#;
        assert_eq!(resolve(html, &[id("r1")]), Some("no".into()));
        assert_eq!(resolve(html, &[id("z1")]), None);
    }

    #[test]
    fn label_fallback_reads_next_sibling_control() {
        let html = r#"<table><tr>
            <td>Chart No.</td><td><input id="x" value="CH-77"></td>
        </tr></table>"#;
        assert_eq!(resolve(html, &[id("txtChartNo"), label("Chart No.")]), Some("CH-77".into()));
    }

    #[test]
    fn label_fallback_falls_back_to_parent_and_reads_select_text() {
        let html = r#"<div><label>Previous name</label><span></span>
            <select><option value="9">Smith</option></select></div>"#;
        assert_eq!(resolve(html, &[label("Previous")]), Some("Smith".into()));
    }

    #[test]
    fn label_locators_run_after_identifier_locators() {
        let html = r#"<label>Previous</label><div><input value="from-label"></div>
                      <input id="txtPreviousFirstName" value="from-id">"#;
        assert_eq!(
            resolve(html, &[label("Previous"), id("txtPreviousFirstName")]),
            Some("from-id".into())
        );
    }

    #[test]
    fn derived_flags() {
        let html = r#"<a id="lnkDaisey">Daisey: Enrolled</a><input id="flag" value="1">"#;
        assert_eq!(resolve(html, &[text_contains("lnkDaisey", "Enrolled")]), Some(true.into()));
        assert_eq!(resolve(html, &[equals("flag", "1")]), Some(true.into()));
        assert_eq!(resolve(html, &[equals("flag", "0")]), Some(false.into()));
        assert_eq!(resolve(html, &[equals("nope", "1")]), None);
    }

    #[test]
    fn non_control_element_reads_trimmed_text() {
        assert_eq!(resolve(r#"<span id="s">  42 </span>"#, &[id("s")]), Some("42".into()));
    }

    #[test]
    fn invalid_selector_is_an_error() {
        let doc = Document::parse("<p></p>");
        let err = FieldResolver::new(&doc).resolve(&[css("input[[")]).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidSelector { .. }));
    }
}
