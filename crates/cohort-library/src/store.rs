//! In-memory patient store loaded from JSON.
//!
//! The store is the data source behind the reference units and the ART
//! cohort filter. It is read-only once loaded and shared between units
//! behind an `Arc`.
//!
//! The JSON document is an array of patient records:
//!
//! ```json
//! [
//!   {
//!     "id": 1,
//!     "family_name": "Otieno",
//!     "given_name": "Achieng",
//!     "art_start_date": "2020-02-10",
//!     "cd4_counts": [{ "date": "2020-01-20", "value": 212 }]
//!   }
//! ]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use cohort_model::PatientId;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StoreError;

/// Date and reason a patient first became medically eligible for ART.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub date: NaiveDate,
    pub reason: String,
}

/// A regimen the patient started on `start_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimenChange {
    pub start_date: NaiveDate,
    pub code: String,
    #[serde(default)]
    pub line: Option<String>,
}

/// A dated numeric observation (CD4 count, CD4 percent, viral load).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub date: NaiveDate,
    #[serde(default)]
    pub next_appointment: Option<NaiveDate>,
}

/// Everything the reference units know about one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: PatientId,
    pub family_name: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub upn: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birthdate: Option<NaiveDate>,
    #[serde(default)]
    pub birthdate_estimated: bool,
    #[serde(default)]
    pub hiv_enrollment_date: Option<NaiveDate>,
    #[serde(default)]
    pub transfer_in_date: Option<NaiveDate>,
    #[serde(default)]
    pub transfer_out_date: Option<NaiveDate>,
    #[serde(default)]
    pub art_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub medically_eligible: Option<Eligibility>,
    #[serde(default)]
    pub regimens: Vec<RegimenChange>,
    #[serde(default)]
    pub cd4_counts: Vec<Observation>,
    #[serde(default)]
    pub cd4_percents: Vec<Observation>,
    #[serde(default)]
    pub viral_loads: Vec<Observation>,
    #[serde(default)]
    pub visits: Vec<Visit>,
    #[serde(default)]
    pub death_date: Option<NaiveDate>,
}

impl PatientRecord {
    pub fn new(id: impl Into<PatientId>, family_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            family_name: family_name.into(),
            given_name: None,
            upn: None,
            gender: None,
            birthdate: None,
            birthdate_estimated: false,
            hiv_enrollment_date: None,
            transfer_in_date: None,
            transfer_out_date: None,
            art_start_date: None,
            medically_eligible: None,
            regimens: Vec::new(),
            cd4_counts: Vec::new(),
            cd4_percents: Vec::new(),
            viral_loads: Vec::new(),
            visits: Vec::new(),
            death_date: None,
        }
    }

    /// First regimen by start date.
    pub fn initial_regimen(&self) -> Option<&RegimenChange> {
        self.regimens.iter().min_by_key(|r| r.start_date)
    }

    /// Most recent regimen by start date.
    pub fn current_regimen(&self) -> Option<&RegimenChange> {
        self.regimens.iter().max_by_key(|r| r.start_date)
    }

    /// Most recent visit on or before `on` (any visit when `on` is `None`).
    pub fn last_visit(&self, on: Option<NaiveDate>) -> Option<&Visit> {
        self.visits
            .iter()
            .filter(|v| on.is_none_or(|on| v.date <= on))
            .max_by_key(|v| v.date)
    }
}

/// Most recent observation by date.
pub fn latest(observations: &[Observation]) -> Option<&Observation> {
    observations.iter().max_by_key(|o| o.date)
}

/// Read-only patient records keyed by id.
#[derive(Debug, Clone, Default)]
pub struct PatientStore {
    patients: BTreeMap<PatientId, PatientRecord>,
}

impl PatientStore {
    /// Builds a store from records, rejecting duplicate ids.
    pub fn from_records(
        records: impl IntoIterator<Item = PatientRecord>,
    ) -> Result<Self, StoreError> {
        let mut patients = BTreeMap::new();
        for record in records {
            let id = record.id;
            if patients.insert(id, record).is_some() {
                return Err(StoreError::DuplicatePatient { patient: id });
            }
        }
        Ok(Self { patients })
    }

    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let records: Vec<PatientRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    /// Loads a JSON array of patient records from `path`.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        let store = Self::from_json_str(&json)?;
        info!(path = %path.display(), patients = store.len(), "patient store loaded");
        Ok(store)
    }

    pub fn patient(&self, id: PatientId) -> Option<&PatientRecord> {
        self.patients.get(&id)
    }

    /// All records in id order.
    pub fn patients(&self) -> impl Iterator<Item = &PatientRecord> + '_ {
        self.patients.values()
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }
}
