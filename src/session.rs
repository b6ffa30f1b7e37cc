// src/session.rs
//! What the operator can do with a listing once it has been read: open one
//! patient's details page, or all of them in turn. Opening a patient first
//! records it in the correlation store so the details pass can link back.
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::config::consts::{CURRENT_PATIENT_KEY, SEARCH_RESULTS_KEY};
use crate::config::options::NavigationOptions;
use crate::specs::listing::IdentityTuple;
use crate::store::{CorrelationStore, KeyValueStore, StoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid index {index}: choose a number between 1 and {count}")]
    InvalidIndex { index: usize, count: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Something that can show a page to the operator.
pub trait Navigator {
    /// `false` when the page could not be opened (e.g. a blocked pop-up);
    /// the caller then asks the operator to open the URL by hand.
    fn open(&mut self, url: &str) -> bool;
}

/// Result of one `open` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Opened {
    pub url: String,
    /// `false` means the operator has to open `url` manually.
    pub navigated: bool,
}

pub struct ListingSession<'s, S> {
    patients: Vec<IdentityTuple>,
    store: &'s CorrelationStore<S>,
    navigation: NavigationOptions,
}

impl<'s, S: KeyValueStore> ListingSession<'s, S> {
    /// Wrap a freshly extracted listing. With more than one patient the whole
    /// listing is persisted alongside the per-patient key.
    pub fn new(
        patients: Vec<IdentityTuple>,
        store: &'s CorrelationStore<S>,
        navigation: NavigationOptions,
    ) -> Result<Self, SessionError> {
        if patients.len() > 1 {
            store.put(SEARCH_RESULTS_KEY, &patients)?;
        }
        Ok(Self { patients, store, navigation })
    }

    pub fn patients(&self) -> &[IdentityTuple] {
        &self.patients
    }

    pub fn details_url(&self, patient: &IdentityTuple) -> String {
        self.navigation.details_url(&patient.hidden_patient_id)
    }

    /// Record patient `index` (1-based) as current and open its details page.
    pub fn open(&self, index: usize, nav: &mut dyn Navigator) -> Result<(&IdentityTuple, Opened), SessionError> {
        let count = self.patients.len();
        let patient = index
            .checked_sub(1)
            .and_then(|i| self.patients.get(i))
            .ok_or(SessionError::InvalidIndex { index, count })?;

        let opened = self.open_patient(patient, nav)?;
        Ok((patient, opened))
    }

    /// Open every patient in listing order, pausing between tabs.
    pub fn open_all(&self, nav: &mut dyn Navigator) -> Result<Vec<Opened>, SessionError> {
        let pause = Duration::from_millis(self.navigation.open_all_pause_ms);
        let mut out = Vec::with_capacity(self.patients.len());
        for (i, patient) in self.patients.iter().enumerate() {
            if i > 0 && !pause.is_zero() {
                thread::sleep(pause);
            }
            out.push(self.open_patient(patient, nav)?);
            logf!("{}/{}: opened {}", i + 1, self.patients.len(), patient.patient_name);
        }
        Ok(out)
    }

    fn open_patient(&self, patient: &IdentityTuple, nav: &mut dyn Navigator) -> Result<Opened, SessionError> {
        self.store.put(CURRENT_PATIENT_KEY, patient)?;
        let url = self.details_url(patient);
        let navigated = nav.open(&url);
        if !navigated {
            logw!(%url, "could not open details page, open it manually");
        }
        Ok(Opened { url, navigated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[derive(Default)]
    struct Recorder {
        urls: Vec<String>,
        refuse: bool,
    }

    impl Navigator for Recorder {
        fn open(&mut self, url: &str) -> bool {
            self.urls.push(s!(url));
            !self.refuse
        }
    }

    fn tuple(index: usize, id: &str) -> IdentityTuple {
        IdentityTuple {
            index,
            hidden_patient_id: s!(id),
            account_number: None,
            patient_name: format!("Patient {index}"),
            ssn: None,
            phone: None,
            dob: None,
            chart: None,
            patient_balance: None,
            plan_balance: None,
        }
    }

    fn nav() -> NavigationOptions {
        NavigationOptions { details_base_url: s!("https://h/datPatient.aspx"), open_all_pause_ms: 0 }
    }

    #[test]
    fn open_writes_current_patient_then_navigates() {
        let store = CorrelationStore::new(MemoryStore::new());
        let session = ListingSession::new(vec![tuple(1, "10"), tuple(2, "20")], &store, nav()).unwrap();
        let mut rec = Recorder::default();

        let (p, opened) = session.open(2, &mut rec).unwrap();
        assert_eq!(p.hidden_patient_id, "20");
        assert!(opened.navigated);
        assert_eq!(rec.urls, ["https://h/datPatient.aspx?intPatient_ID=20&PatientId=20"]);
        assert_eq!(store.get::<IdentityTuple>(CURRENT_PATIENT_KEY), Some(tuple(2, "20")));
        assert_eq!(store.get::<Vec<IdentityTuple>>(SEARCH_RESULTS_KEY).map(|v| v.len()), Some(2));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let store = CorrelationStore::new(MemoryStore::new());
        let session = ListingSession::new(vec![tuple(1, "10")], &store, nav()).unwrap();
        let mut rec = Recorder::default();
        for bad in [0, 2] {
            assert!(matches!(
                session.open(bad, &mut rec),
                Err(SessionError::InvalidIndex { count: 1, .. })
            ));
        }
        assert!(rec.urls.is_empty());
        // a single result is not persisted as a listing
        assert_eq!(store.get::<Vec<IdentityTuple>>(SEARCH_RESULTS_KEY), None);
    }

    #[test]
    fn refused_open_is_reported_not_failed() {
        let store = CorrelationStore::new(MemoryStore::new());
        let session = ListingSession::new(vec![tuple(1, "10")], &store, nav()).unwrap();
        let mut rec = Recorder { refuse: true, ..Default::default() };
        let (_, opened) = session.open(1, &mut rec).unwrap();
        assert!(!opened.navigated);
        assert!(store.get::<IdentityTuple>(CURRENT_PATIENT_KEY).is_some());
    }

    #[test]
    fn open_all_leaves_last_patient_current() {
        let store = CorrelationStore::new(MemoryStore::new());
        let session = ListingSession::new(vec![tuple(1, "10"), tuple(2, "20"), tuple(3, "30")], &store, nav()).unwrap();
        let mut rec = Recorder::default();
        let opened = session.open_all(&mut rec).unwrap();
        assert_eq!(opened.len(), 3);
        assert_eq!(rec.urls.len(), 3);
        assert_eq!(store.get::<IdentityTuple>(CURRENT_PATIENT_KEY).map(|p| p.hidden_patient_id), Some(s!("30")));
    }
}
