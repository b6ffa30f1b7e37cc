// src/specs/search.rs
//! Appointment slot search.
//!
//! One POST to the scheduler's `searchappt` controller, one JSON answer, one
//! flat list of slots. The endpoint expects every parameter to be present, so
//! optional settings are always sent with a neutral default instead of being
//! left out. There is no paging and no retry.
use scraper::Selector;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;
use url::form_urlencoded;

use crate::config::consts::SEARCH_PATH;
use crate::core::html::{self, Page};
use crate::core::net::{Transport, TransportError};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("providers is required and must be a non-empty list")]
    MissingProviders,
    #[error("visitType is required")]
    MissingVisitType,
    #[error("invalid origin `{origin}`: {reason}")]
    InvalidOrigin { origin: String, reason: String },
    #[error("could not encode search criteria: {0}")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("search endpoint answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("search response is not a list of result groups: {0}")]
    MalformedResponse(#[source] serde_json::Error),
}

/* ---------- configuration ---------- */

/// Search settings as the operator writes them (camelCase JSON).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    pub providers: Vec<ProviderInput>,
    pub visit_type: String,
    /// `"0"` searches every facility.
    pub facility: String,
    pub reason: String,
    pub specialty: String,
    pub gender: String,
    pub language: String,
    pub show_only_residents: bool,
    pub accepting_new_patient: bool,
    /// `MM/DD/YYYY`, empty for today.
    pub start_date: String,
    /// `HH:MM:SS`
    pub start_time: String,
    pub end_time: String,
    /// Comma list of weekdays, 1 = Sunday.
    pub day_pref: String,
    /// Minutes.
    pub duration: u32,
    /// Minutes.
    pub next_appt_after: u32,
    pub start_at_same_time: bool,
    pub exclude_booked_slots: bool,
    pub exclude_blocked_slots: bool,
    pub result_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            visit_type: s!(),
            facility: s!("0"),
            reason: s!(),
            specialty: s!(),
            gender: s!(),
            language: s!(),
            show_only_residents: false,
            accepting_new_patient: false,
            start_date: s!(),
            start_time: s!(),
            end_time: s!(),
            day_pref: s!(),
            duration: 15,
            next_appt_after: 0,
            start_at_same_time: false,
            exclude_booked_slots: true,
            exclude_blocked_slots: true,
            result_size: 100,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.providers.is_empty() {
            return Err(SearchError::MissingProviders);
        }
        if self.visit_type.trim().is_empty() {
            return Err(SearchError::MissingVisitType);
        }
        Ok(())
    }
}

/// A provider as written in the config: a bare id, or an object with an
/// optional scheduling rule and display name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderInput {
    Id(u64),
    Entry {
        id: Value,
        #[serde(default, alias = "rule", skip_serializing_if = "Option::is_none")]
        vrule: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

/// Provider as the endpoint expects it inside `providerandvrule`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRule {
    pub provider: Value,
    pub vrule: Value,
    pub provider_name: String,
}

impl From<&ProviderInput> for ProviderRule {
    fn from(input: &ProviderInput) -> Self {
        match input {
            ProviderInput::Id(id) => Self { provider: Value::from(*id), vrule: Value::from(0), provider_name: s!() },
            ProviderInput::Entry { id, vrule, name } => Self {
                provider: id.clone(),
                vrule: vrule.clone().unwrap_or_else(|| Value::from(0)),
                provider_name: name.clone().unwrap_or_default(),
            },
        }
    }
}

/* ---------- request ---------- */

fn flag(b: bool) -> &'static str {
    if b { "1" } else { "0" }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Criteria {
    pub vt: String,
    pub facility: String,
    pub visit_start_date: String,
    pub visit_start_time: String,
    pub visit_end_time: String,
    pub wait_time: String,
    pub same_time_appt: &'static str,
    pub reason: String,
    pub specialty: String,
    pub gender: String,
    pub language: String,
    pub show_only_residents: &'static str,
    pub accepting_new_patient: &'static str,
    pub providerandvrule: Vec<ProviderRule>,
}

pub fn build_criteria(config: &SearchConfig) -> Criteria {
    let facility = if config.facility.is_empty() { s!("0") } else { config.facility.clone() };
    Criteria {
        vt: config.visit_type.clone(),
        facility,
        visit_start_date: config.start_date.clone(),
        visit_start_time: config.start_time.clone(),
        visit_end_time: config.end_time.clone(),
        wait_time: config.next_appt_after.to_string(),
        same_time_appt: flag(config.start_at_same_time),
        reason: config.reason.clone(),
        specialty: config.specialty.clone(),
        gender: config.gender.clone(),
        language: config.language.clone(),
        show_only_residents: flag(config.show_only_residents),
        accepting_new_patient: flag(config.accepting_new_patient),
        providerandvrule: config.providers.iter().map(ProviderRule::from).collect(),
    }
}

/// URL-encoded form body. `criteria` is a JSON array holding one criteria object.
pub fn build_form(config: &SearchConfig) -> Result<String, SearchError> {
    let criteria = serde_json::to_string(&[build_criteria(config)]).map_err(SearchError::Encode)?;
    let duration = if config.duration == 0 { 15 } else { config.duration };

    Ok(form_urlencoded::Serializer::new(String::new())
        .append_pair("criteria", &criteria)
        .append_pair("startDate", &config.start_date)
        .append_pair("startTimefrm", &config.start_time)
        .append_pair("endTimefrm", &config.end_time)
        .append_pair("nSchDuration", &duration.to_string())
        .append_pair("dayPref", &config.day_pref)
        .append_pair("excludeBookedSlots", flag(config.exclude_booked_slots))
        .append_pair("excludeBlockedSlots", flag(config.exclude_blocked_slots))
        .finish())
}

pub fn search_url(origin: &str, result_size: u32) -> Result<String, SearchError> {
    let parsed = Url::parse(origin).map_err(|e| SearchError::InvalidOrigin {
        origin: s!(origin),
        reason: e.to_string(),
    })?;
    let origin = parsed.origin().ascii_serialization();
    let size = if result_size == 0 { 100 } else { result_size };
    Ok(format!("{origin}{SEARCH_PATH}&resultSize={size}"))
}

/// CSRF token published by a saved scheduler page, if any.
pub fn csrf_token(page: &Page) -> Option<String> {
    let meta = html::selector(r#"meta[name="csrf-token"]"#);
    let named = html::selector(r#"[name="X-CSRF-Token"]"#);
    let doc = page.document();

    let read = |sel: &Selector| {
        doc.select(sel).next().and_then(|el| {
            let v = el.value();
            v.attr("content").or_else(|| v.attr("value")).map(str::trim).filter(|t| !t.is_empty())
        })
    };
    read(&meta).or_else(|| read(&named)).map(str::to_string)
}

/* ---------- response ---------- */

/// One bookable slot, flattened out of its result group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRecord {
    pub date: Option<String>,
    pub time: Option<String>,
    pub datetime: Option<String>,
    pub provider: Option<String>,
    pub provider_id: Value,
    pub facility: Option<String>,
    pub facility_id: Value,
    pub visit_type: Option<String>,
    pub duration: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ResultGroup {
    #[serde(default)]
    results: Option<Value>,
    #[serde(default, deserialize_with = "lenient_minutes")]
    duration: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSlot {
    #[serde(default, deserialize_with = "lenient_text")]
    date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    start_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    datetime: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    provider_name: Option<String>,
    #[serde(default)]
    provider_id: Value,
    #[serde(default, deserialize_with = "lenient_text")]
    facility_name: Option<String>,
    #[serde(default)]
    facility_id: Value,
    #[serde(default, deserialize_with = "lenient_text")]
    visit_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_minutes")]
    slotduration: Option<u32>,
}

// Strings pass through, numbers and booleans are stringified.
fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

// Minutes given as a number or a numeric string; zero and blanks count as missing.
fn lenient_minutes<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let minutes = match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.round() as u64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as u64),
        _ => None,
    };
    Ok(minutes.and_then(|m| u32::try_from(m).ok()).filter(|m| *m > 0))
}

pub fn parse_groups(body: &str) -> Result<Vec<ResultGroup>, SearchError> {
    serde_json::from_str(body).map_err(SearchError::MalformedResponse)
}

/// Flatten groups in order. A group without a `results` list contributes
/// nothing; a slot's own duration wins over its group's.
pub fn flatten(groups: Vec<ResultGroup>) -> Result<Vec<SlotRecord>, SearchError> {
    let mut slots = Vec::new();
    for group in groups {
        let Some(Value::Array(results)) = group.results else { continue };
        for raw in results {
            let slot: RawSlot = serde_json::from_value(raw).map_err(SearchError::MalformedResponse)?;
            slots.push(SlotRecord {
                date: slot.date,
                time: slot.start_time,
                datetime: slot.datetime,
                provider: slot.provider_name,
                provider_id: slot.provider_id,
                facility: slot.facility_name,
                facility_id: slot.facility_id,
                visit_type: slot.visit_type,
                duration: slot.slotduration.or(group.duration),
            });
        }
    }
    Ok(slots)
}

/* ---------- client ---------- */

pub struct SearchClient<T> {
    transport: T,
    origin: String,
    csrf_token: Option<String>,
}

impl<T: Transport> SearchClient<T> {
    pub fn new(transport: T, origin: impl Into<String>) -> Self {
        Self { transport, origin: origin.into(), csrf_token: None }
    }

    pub fn with_csrf_token(mut self, token: Option<String>) -> Self {
        self.csrf_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn search(&self, config: &SearchConfig) -> Result<Vec<SlotRecord>, SearchError> {
        config.validate()?;

        let url = search_url(&self.origin, config.result_size)?;
        let body = build_form(config)?;

        let mut headers = vec![
            ("Content-Type", s!("application/x-www-form-urlencoded; charset=UTF-8")),
            ("Accept", s!("application/json, text/plain, */*")),
            ("X-Requested-With", s!("XMLHttpRequest")),
            ("isajaxrequest", s!("true")),
        ];
        if let Some(token) = &self.csrf_token {
            headers.push(("X-CSRF-Token", token.clone()));
        }

        logf!(providers = config.providers.len(), visit_type = %config.visit_type, "sending slot search");
        let resp = self.transport.post_form(&url, &headers, body).await?;
        if !resp.is_success() {
            loge!(status = resp.status, "slot search rejected");
            return Err(SearchError::Status { status: resp.status, body: snippet(&resp.body) });
        }

        let slots = flatten(parse_groups(&resp.body)?)?;
        logf!(count = slots.len(), "slot search complete");
        Ok(slots)
    }
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => join!(&body[..cut], "..."),
        None => s!(body),
    }
}
