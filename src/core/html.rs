// src/core/html.rs
//! Thin DOM layer over `scraper`: a parsed [`Document`], the [`Page`] that owns
//! it together with its embedded frames, and the control-reading primitives the
//! resolver and the listing reader share.
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::sanitize::normalize_ws;

/// Parse a selector that is known valid at compile time.
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static WITH_ID: Lazy<Selector> = Lazy::new(|| selector("[id]"));
static INPUT: Lazy<Selector> = Lazy::new(|| selector("input"));
static OPTION: Lazy<Selector> = Lazy::new(|| selector("option"));
static IFRAME: Lazy<Selector> = Lazy::new(|| selector("iframe"));

/// One parsed HTML document (top-level page or frame content).
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(src: &str) -> Self {
        Self { html: Html::parse_document(src) }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn select<'a, 'b>(&'a self, sel: &'b Selector) -> scraper::html::Select<'a, 'b> {
        self.html.select(sel)
    }

    /// First element carrying `id`, in document order.
    pub fn by_id(&self, id: &str) -> Option<ElementRef<'_>> {
        self.html.select(&WITH_ID).find(|el| el.value().id() == Some(id))
    }

    /// The checked `<input>` of an exclusive-choice group, if any.
    pub fn checked_in_group(&self, name: &str) -> Option<ElementRef<'_>> {
        self.html
            .select(&INPUT)
            .find(|el| el.value().attr("name") == Some(name) && is_checked(*el))
    }
}

/// An embedded sub-document. `document` is `None` when the loader could not
/// reach the frame content (cross-origin, missing file).
pub struct Frame {
    pub id: Option<String>,
    pub name: Option<String>,
    pub src: Option<String>,
    pub document: Option<Document>,
}

impl Frame {
    /// Display label: id, then name, then "unnamed".
    pub fn label(&self) -> &str {
        [self.id.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or("unnamed")
    }
}

/// A loaded page: the primary document, its frames, and where it came from.
pub struct Page {
    url: Option<String>,
    document: Document,
    frames: Vec<Frame>,
}

impl Page {
    /// Parse a page. Frames with inline `srcdoc` are reachable immediately;
    /// others stay unreachable until the loader attaches their content.
    pub fn parse(src: &str) -> Self {
        let document = Document::parse(src);
        let frames = document
            .select(&IFRAME)
            .map(|el| {
                let attr = |name: &str| el.value().attr(name).map(str::to_string);
                Frame {
                    id: attr("id"),
                    name: attr("name"),
                    src: attr("src"),
                    document: el.value().attr("srcdoc").map(Document::parse),
                }
            })
            .collect();
        Self { url: None, document, frames }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Supply content for frame `index`. Returns false for an unknown index.
    pub fn attach_frame(&mut self, index: usize, document: Document) -> bool {
        match self.frames.get_mut(index) {
            Some(frame) => {
                frame.document = Some(document);
                true
            }
            None => false,
        }
    }
}

/* ---------- control primitives ---------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlKind {
    Select,
    Checkbox,
    Radio,
    TextArea,
    Input,
    Other,
}

pub fn control_kind(el: ElementRef<'_>) -> ControlKind {
    match el.value().name() {
        "select" => ControlKind::Select,
        "textarea" => ControlKind::TextArea,
        "input" => match input_type(el).as_str() {
            "checkbox" => ControlKind::Checkbox,
            "radio" => ControlKind::Radio,
            _ => ControlKind::Input,
        },
        _ => ControlKind::Other,
    }
}

/// Lowercased `type` of an input; a missing type means "text".
pub fn input_type(el: ElementRef<'_>) -> String {
    el.value()
        .attr("type")
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| s!("text"))
}

pub fn is_checked(el: ElementRef<'_>) -> bool {
    el.value().attr("checked").is_some()
}

pub fn text_content(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Selected `<option>`: the last one flagged `selected`, else the first.
pub fn selected_option(select: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut first = None;
    let mut chosen = None;
    for opt in select.select(&OPTION) {
        if first.is_none() {
            first = Some(opt);
        }
        if opt.value().attr("selected").is_some() {
            chosen = Some(opt);
        }
    }
    chosen.or(first)
}

/// Displayed label of an option, whitespace collapsed.
pub fn option_text(opt: ElementRef<'_>) -> String {
    normalize_ws(&text_content(opt))
}

/// Underlying code of an option; falls back to its text like a browser does.
pub fn option_value(opt: ElementRef<'_>) -> String {
    match opt.value().attr("value") {
        Some(v) => v.to_string(),
        None => option_text(opt),
    }
}

/// Displayed text of the selected option, `""` for an empty select.
pub fn selected_text(select: ElementRef<'_>) -> String {
    selected_option(select).map(option_text).unwrap_or_default()
}

/// Literal form value of a control, the way a form submission would see it.
/// Selects yield the option code, not its label.
pub fn control_value(el: ElementRef<'_>) -> String {
    match control_kind(el) {
        ControlKind::Select => selected_option(el).map(option_value).unwrap_or_default(),
        ControlKind::TextArea => text_content(el),
        ControlKind::Checkbox | ControlKind::Radio => s!(el.value().attr("value").unwrap_or("on")),
        ControlKind::Input => s!(el.value().attr("value").unwrap_or("")),
        ControlKind::Other => s!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_id_returns_first_in_document_order() {
        let doc = Document::parse(r#"<p id="x">one</p><p id="x">two</p>"#);
        let el = doc.by_id("x").unwrap();
        assert_eq!(text_content(el), "one");
        assert!(doc.by_id("missing").is_none());
    }

    #[test]
    fn select_without_selected_attr_uses_first_option() {
        let doc = Document::parse(
            r#"<select id="s"><option value="1">  First
                 choice </option><option value="2">Second</option></select>"#,
        );
        let el = doc.by_id("s").unwrap();
        assert_eq!(selected_text(el), "First choice");
        assert_eq!(control_value(el), "1");
    }

    #[test]
    fn empty_select_reads_blank() {
        let doc = Document::parse(r#"<select id="s"></select>"#);
        assert_eq!(selected_text(doc.by_id("s").unwrap()), "");
    }

    #[test]
    fn srcdoc_frames_are_reachable_and_src_frames_are_not() {
        let page = Page::parse(
            r#"<iframe id="a" srcdoc="<p id='in'>hi</p>"></iframe>
               <iframe name="b" src="other.html"></iframe>
               <iframe></iframe>"#,
        );
        let frames = page.frames();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].document.as_ref().unwrap().by_id("in").is_some());
        assert!(frames[1].document.is_none());
        assert_eq!(frames[1].label(), "b");
        assert_eq!(frames[2].label(), "unnamed");
    }

    #[test]
    fn missing_input_type_is_text() {
        let doc = Document::parse(r#"<input id="t" value="v">"#);
        let el = doc.by_id("t").unwrap();
        assert_eq!(control_kind(el), ControlKind::Input);
        assert_eq!(control_value(el), "v");
    }
}
