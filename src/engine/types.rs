// src/engine/types.rs
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A resolved leaf value. Absence is modelled one level up as `Option`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
}

impl FieldValue {
    /// `""` and `false` are present-but-blank: they only win when nothing better exists.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Flag(b) => !b,
            FieldValue::Text(t) => t.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(t) => Some(t),
            FieldValue::Flag(_) => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            FieldValue::Text(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self { FieldValue::Text(s!(s)) }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self { FieldValue::Text(s) }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self { FieldValue::Flag(b) }
}

/// One physical way to find a logical field on a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Locator {
    /// Element id, read by control kind.
    Id(&'static str),
    /// CSS selector; first match in document order, read by control kind.
    Css(&'static str),
    /// Label-like element whose text contains the phrase; reads the nearest control.
    /// Always tried after every other locator of the same field.
    Label(&'static str),
    /// Boolean: does the element's text contain `needle`.
    IdTextContains { id: &'static str, needle: &'static str },
    /// Boolean: does the element's read equal `expected`.
    IdEquals { id: &'static str, expected: &'static str },
}

impl Locator {
    pub fn is_label(&self) -> bool {
        matches!(self, Locator::Label(_))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "#{id}"),
            Locator::Css(css) => write!(f, "css({css})"),
            Locator::Label(text) => write!(f, "label({text:?})"),
            Locator::IdTextContains { id, needle } => write!(f, "#{id} contains {needle:?}"),
            Locator::IdEquals { id, expected } => write!(f, "#{id} == {expected:?}"),
        }
    }
}

pub const fn id(id: &'static str) -> Locator { Locator::Id(id) }
pub const fn css(css: &'static str) -> Locator { Locator::Css(css) }
pub const fn label(text: &'static str) -> Locator { Locator::Label(text) }
pub const fn text_contains(id: &'static str, needle: &'static str) -> Locator {
    Locator::IdTextContains { id, needle }
}
pub const fn equals(id: &'static str, expected: &'static str) -> Locator {
    Locator::IdEquals { id, expected }
}

/// A logical field: its output key and ordered candidate locators.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub key: &'static str,
    pub locators: &'static [Locator],
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
}
