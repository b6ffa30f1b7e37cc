// tests/search_client.rs
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use emr_scrape::core::net::{HttpResponse, Transport, TransportError};
use emr_scrape::specs::search::{ProviderInput, SearchClient, SearchConfig, SearchError};

#[derive(Debug, Clone)]
struct Sent {
    url: String,
    headers: Vec<(&'static str, String)>,
    body: String,
}

/// Answers every request with a canned response and remembers what was sent.
struct Recording {
    status: u16,
    body: String,
    sent: Mutex<Vec<Sent>>,
}

impl Recording {
    fn answering(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into(), sent: Mutex::new(Vec::new()) }
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for Recording {
    async fn post_form(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: String,
    ) -> Result<HttpResponse, TransportError> {
        self.sent.lock().unwrap().push(Sent { url: url.to_string(), headers: headers.to_vec(), body });
        Ok(HttpResponse { status: self.status, body: self.body.clone() })
    }
}

fn config() -> SearchConfig {
    SearchConfig {
        providers: vec![ProviderInput::Id(123456)],
        visit_type: "NP".into(),
        ..Default::default()
    }
}

const ORIGIN: &str = "https://ecw.example.org";

#[tokio::test]
async fn invalid_config_sends_nothing() {
    let client = SearchClient::new(Recording::answering(200, "[]"), ORIGIN);

    let no_providers = SearchConfig { providers: vec![], ..config() };
    assert!(matches!(client.search(&no_providers).await, Err(SearchError::MissingProviders)));

    let no_visit = SearchConfig { visit_type: "  ".into(), ..config() };
    assert!(matches!(client.search(&no_visit).await, Err(SearchError::MissingVisitType)));

    let parsed: SearchConfig = serde_json::from_value(json!({"providers": [1]})).unwrap();
    assert!(matches!(client.search(&parsed).await, Err(SearchError::MissingVisitType)));

    assert!(client.transport().sent().is_empty());
}

#[tokio::test]
async fn group_duration_fills_only_missing_slot_durations() {
    let body = json!([
        {"duration": 15, "results": [
            {"date": "01/20/2026", "startTime": "09:00", "datetime": "01/20/2026 09:00",
             "providerName": "Dr. A", "providerId": 123456, "facilityName": "Main", "facilityId": 1,
             "visitType": "NP"}
        ]},
        {"duration": 30, "results": [
            {"date": "01/21/2026", "startTime": "10:30", "providerName": "Dr. B", "providerId": "789",
             "slotduration": 45}
        ]}
    ]);
    let client = SearchClient::new(Recording::answering(200, body.to_string()), ORIGIN);

    let slots = client.search(&config()).await.unwrap();
    let durations: Vec<Option<u32>> = slots.iter().map(|s| s.duration).collect();
    assert_eq!(durations, [Some(15), Some(45)]);
    assert_eq!(slots[0].time.as_deref(), Some("09:00"));
    assert_eq!(slots[0].provider.as_deref(), Some("Dr. A"));
    assert_eq!(slots[1].provider_id, json!("789"));
}

#[tokio::test]
async fn request_carries_url_headers_and_complete_form() {
    let client = SearchClient::new(Recording::answering(200, "[]"), ORIGIN)
        .with_csrf_token(Some("tok-1".into()));
    let cfg = SearchConfig { result_size: 25, ..config() };
    assert!(client.search(&cfg).await.unwrap().is_empty());

    let sent = client.transport().sent();
    assert_eq!(sent.len(), 1);
    let req = &sent[0];
    assert_eq!(
        req.url,
        "https://ecw.example.org/mobiledoc/Controller?action=searchappt&project=WebEMR&resultSize=25"
    );
    let header = |name: &str| req.headers.iter().find(|(k, _)| *k == name).map(|(_, v)| v.as_str());
    assert_eq!(header("Content-Type"), Some("application/x-www-form-urlencoded; charset=UTF-8"));
    assert_eq!(header("X-Requested-With"), Some("XMLHttpRequest"));
    assert_eq!(header("isajaxrequest"), Some("true"));
    assert_eq!(header("X-CSRF-Token"), Some("tok-1"));

    let form: Vec<(String, String)> = url::form_urlencoded::parse(req.body.as_bytes()).into_owned().collect();
    let field = |k: &str| form.iter().find(|(key, _)| key == k).map(|(_, v)| v.clone());
    assert_eq!(field("excludeBlockedSlots").as_deref(), Some("1"));
    let criteria: serde_json::Value = serde_json::from_str(&field("criteria").unwrap()).unwrap();
    assert_eq!(
        criteria[0]["providerandvrule"],
        json!([{"provider": 123456, "vrule": 0, "providerName": ""}])
    );
}

#[tokio::test]
async fn non_success_status_is_one_error_without_retry() {
    let client = SearchClient::new(Recording::answering(500, "Internal Server Error"), ORIGIN);
    match client.search(&config()).await {
        Err(SearchError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("Internal"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(client.transport().sent().len(), 1);
}

#[tokio::test]
async fn unparsable_body_is_malformed_response() {
    let client = SearchClient::new(Recording::answering(200, "<html>login</html>"), ORIGIN);
    assert!(matches!(client.search(&config()).await, Err(SearchError::MalformedResponse(_))));

    let client = SearchClient::new(Recording::answering(200, r#"{"error": "x"}"#), ORIGIN);
    assert!(matches!(client.search(&config()).await, Err(SearchError::MalformedResponse(_))));
}
