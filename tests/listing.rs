// tests/listing.rs
use std::fs;
use std::path::PathBuf;

use emr_scrape::core::html::Page;
use emr_scrape::runner::load_page;
use emr_scrape::specs::listing::{ListingOutcome, ListingSource, extract_listing};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

#[test]
fn well_formed_rows_survive_and_malformed_rows_are_skipped() {
    let page = Page::parse(&fs::read_to_string(fixture("listing.html")).unwrap());

    let ListingOutcome::Found { source, patients } = extract_listing(&page) else {
        panic!("expected rows in the main document");
    };
    assert_eq!(source, ListingSource::CurrentPage);

    // 5 anchors: 3 carry LoadPatient(<digits>, ...), 2 do not
    let ids: Vec<&str> = patients.iter().map(|p| p.hidden_patient_id.as_str()).collect();
    assert_eq!(ids, ["100234", "100377", "100401"]);

    // skipped rows still consume an index
    let idx: Vec<usize> = patients.iter().map(|p| p.index).collect();
    assert_eq!(idx, [1, 3, 5]);

    let jane = &patients[0];
    assert_eq!(jane.patient_name, "DOE, JANE");
    assert_eq!(jane.account_number.as_deref(), Some("A-1001"));
    assert_eq!(jane.chart.as_deref(), Some("MAIN / CH-77"));
    assert_eq!(jane.plan_balance.as_deref(), Some("$0.00"));

    let john = &patients[1];
    assert_eq!(john.patient_name, "SMITH, JOHN");
    assert_eq!(john.ssn, None);
    assert_eq!(john.patient_balance, None);
}

#[test]
fn rows_inside_a_local_frame_are_found_and_the_frame_is_reported() {
    let page = load_page(&fixture("frame_outer.html"), None).unwrap();

    match extract_listing(&page) {
        ListingOutcome::Found { source, patients } => {
            assert_eq!(source, ListingSource::Frame("fraResults".into()));
            assert_eq!(source.to_string(), r#"iframe "fraResults""#);
            assert_eq!(patients.len(), 2);
            assert_eq!(patients[1].account_number.as_deref(), Some("B-2"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn inline_srcdoc_frame_is_searched() {
    let page = Page::parse(
        r#"<p>no rows here</p>
           <iframe srcdoc="<a id='anchorPatientNameX' href='javascript:LoadPatient(42, 1)'>A, B</a>"></iframe>"#,
    );
    let ListingOutcome::Found { source, patients } = extract_listing(&page) else {
        panic!("expected frame rows");
    };
    assert_eq!(source, ListingSource::Frame("unnamed".into()));
    assert_eq!(patients[0].hidden_patient_id, "42");
}

#[test]
fn no_rows_anywhere_is_not_found() {
    let page = Page::parse(r#"<p>Search returned nothing</p><iframe src="gone.html"></iframe>"#);
    assert_eq!(extract_listing(&page), ListingOutcome::NotFound);
    assert!(extract_listing(&page).patients().is_empty());
}
