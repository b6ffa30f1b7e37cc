// src/specs/patient.rs
//! Patient details page (`datPatient.aspx`).
//!
//! The schema below is the whole contract with the page markup: each field
//! lists the element ids (and, last, label phrases) it may appear under across
//! page variants. When the application renames a control, only the locator
//! list changes.
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::config::consts::{CURRENT_PATIENT_KEY, SCHEMA_VERSION};
use crate::core::html::{self, ControlKind, Document, Page, control_kind, control_value, input_type};
use crate::engine::{FieldResolver, FieldSpec, FieldValue, ResolveError, equals, id, label, text_contains};
use crate::specs::listing::IdentityTuple;
use crate::store::{CorrelationStore, KeyValueStore};

static RAW_CONTROLS: Lazy<Selector> = Lazy::new(|| html::selector("input, select, textarea"));

/* ---------- schema ---------- */

schema_section! {
    pub struct PatientInfo {
        patient_id as "patientId" => [id("intPatient_ID")],
        account_number as "accountNumber" => [id("TxtVAcc")],
        chart_number as "chartNumber" => [id("txtChartNo"), label("Chart No.")],
        title as "title" => [id("cmbVTitle"), id("cmbTitle")],
        first_name as "firstName" => [id("txtVFNAME")],
        middle_name as "middleName" => [id("txtVMNAME")],
        last_name as "lastName" => [id("txtVLNAME")],
        suffix as "suffix" => [id("cmbSuffix"), id("cmbSupportSuffix")],
        preferred_name as "preferredName" => [id("txtVPREFNAME")],
        pronoun as "pronoun" => [id("cmbPronoun")],
        date_of_birth as "dateOfBirth" => [id("txtDDOB")],
        age as "age" => [id("txtAge"), id("patAgeSupportContact")],
        ssn as "ssn" => [id("txtVSSN")],
        gender as "gender" => [id("cmbVSEX"), id("cmbSEX")],
        gender_identity as "genderIdentity" => [id("cmbGenderIdentity")],
        sexual_orientation as "sexualOrientation" => [id("cmbSexualOrientation")],
        marital_status as "maritalStatus" => [id("cmbvstatus"), id("cmbMaritalStatus"), id("cmbVSTATUS")],
    }
}

schema_section! {
    pub struct CurrentAddress {
        address1 as "address1" => [id("txtvaddress1"), id("txtVAddress1")],
        address2 as "address2" => [id("txtvaddress2"), id("txtVAddress2")],
        city as "city" => [id("txtvcity"), id("txtVCity")],
        state as "state" => [id("txtVSTATE"), id("cmbState")],
        zip as "zip" => [id("txtVZIP"), id("SelectZipPatient"), id("txtZip")],
        county as "county" => [id("txtVCounty")],
        country as "country" => [id("ddlCountry"), id("cmbCountry")],
    }
}

schema_section! {
    pub struct AlternateAddress {
        same_as_above as "sameAsAbove" => [id("chkMailingAddress"), id("chkSameAsAbove")],
        address1 as "address1" => [id("txtMailingAddress1"), id("txtAlternateAddress1")],
        address2 as "address2" => [id("txtMailingAddress2"), id("txtAlternateAddress2")],
        city as "city" => [id("txtMailingCity"), id("txtAlternateCity")],
        state as "state" => [id("cmbMailingState"), id("cmbAlternateState")],
        zip as "zip" => [id("txtMailingZipCode"), id("txtAlternateZip")],
        county as "county" => [id("txtMailingCounty"), id("txtAlternateCounty")],
        country as "country" => [id("ddlPrtCountry"), id("cmbMailingCountry"), id("cmbAlternateCountry")],
    }
}

schema_section! {
    pub struct ContactInfo {
        mobile as "mobile" => [id("txtVPHONE"), id("txtCPhone"), id("txtMobile")],
        phone_type as "phoneType" => [id("cmbPhoneTypes"), id("cmbPhoneTypesX")],
        home_phone as "homePhone" => [id("txtVHPHONE")],
        work_phone as "workPhone" => [id("txtVWPHONE")],
        email as "email" => [id("txtVEmail")],
        preferred_contact_method as "preferredContactMethod" => [id("cmbPreferredContact")],
        text_via_email as "textViaEmail" => [id("txtTextViaEmail")],
        other_contacts as "otherContacts" => [id("txtOtherContacts"), id("Txt_1_0")],
    }
}

schema_section! {
    pub struct PrimaryInsurance {
        insurance_name as "insuranceName" => [id("txtPInsuranceName")],
        policy_number as "policyNumber" => [id("txtVIDNum")],
        group_number as "groupNumber" => [id("txtVGroupNum")],
        subscriber_id as "subscriberId" => [id("txtPSubscriberId")],
        relation_to_insured as "relationToInsured" => [id("cmbRelationship")],
        plan_id as "planId" => [id("hdniPlanId")],
    }
}

schema_section! {
    pub struct SecondaryInsurance {
        insurance_name as "insuranceName" => [id("txtSInsuranceName")],
        policy_number as "policyNumber" => [id("txtSecVIDNUM")],
        group_number as "groupNumber" => [id("txtSecVGroupNum")],
        subscriber_id as "subscriberId" => [id("txtSSubscriberId")],
        relation_to_insured as "relationToInsured" => [id("cmbSecRelationship")],
    }
}

schema_section! {
    pub struct Demographics {
        race as "race" => [id("txtRace_txtField"), id("ctrltxtRace"), id("hdnRaceName")],
        ethnicity as "ethnicity" => [id("ddlEthnicity"), id("cmbEthnicity")],
        language as "language" => [id("txtLanguage_txtField"), id("ctrltxtLanguage"), id("hdnMultipleLanguages")],
        limited_english_proficiency as "limitedEnglishProficiency" => [id("chkLimitedEnglish")],
        religion as "religion" => [id("ddlReligion"), id("cmbReligion")],
        education as "education" => [id("ddlEducation")],
    }
}

schema_section! {
    pub struct Providers {
        location as "location" => [id("cmbILOCID")],
        primary_provider as "primaryProvider" => [id("PrimaryCareText"), id("TxtRefPRVName")],
        primary_care_phone as "primaryCarePhone" => [id("PrimaryCarePhone")],
        primary_care_specialty as "primaryCareSpecialty" => [id("cmbSpecprimary")],
        referring_provider as "referringProvider" => [id("txtReferringProvider"), id("cmbIPRVID")],
        billing_provider as "billingProvider" => [id("cmbBilling_Provider")],
        rendering_provider as "renderingProvider" => [id("cmbIPRVID")],
        referral_source as "referralSource" => [id("cmbFindUS"), id("cmbReferralSource")],
        source_details as "sourceDetails" => [id("txtSourceDetails")],
        agency as "agency" => [id("cmbAgency")],
    }
}

schema_section! {
    pub struct EmergencyContact {
        name as "name" => [id("txtEmergencyContactName")],
        relationship as "relationship" => [id("cmbEmergencyRelationship")],
        phone as "phone" => [id("txtEmergencyPhone")],
        address as "address" => [id("txtEmergencyAddress")],
    }
}

schema_section! {
    pub struct Employment {
        work_status as "workStatus" => [id("cmbVWSTATUS"), id("cmbEmploymentStatus"), id("cmbWorkStatus")],
        employer as "employer" => [id("txtEmployer")],
        occupation as "occupation" => [id("txtOccupation")],
        student_status as "studentStatus" => [id("cmbStudentStatus")],
    }
}

schema_section! {
    pub struct ClinicalInfo {
        is_deceased as "isDeceased" => [id("chkDeceased")],
        deceased_date as "deceasedDate" => [id("txtDeceasedDate")],
        is_vip as "isVIP" => [id("chkVIP")],
        is_test_patient as "isTestPatient" => [id("hdnIsTestPatient")],
        comments as "comments" => [id("txtVComments")],
        is_daisey_enrolled as "isDaiseyEnrolled" => [text_contains("lnkDaisey", "Enrolled")],
    }
}

schema_section! {
    pub struct PreviousNames {
        first_name as "firstName" => [id("txtPreviousFirstName"), label("Previous")],
        last_name as "lastName" => [id("txtPreviousLastName")],
    }
}

schema_section! {
    pub struct MothersMaiden {
        first_name as "firstName" => [id("txtMotherFirstName")],
        last_name as "lastName" => [id("txtMotherLastName")],
    }
}

schema_section! {
    pub struct CommonWell {
        enabled as "enabled" => [id("toggleCommonWellHeaderButton"), id("patientToggleCheckbox")],
        consent_id as "consentId" => [id("hdnConsentID")],
        is_person_flow_completed as "isPersonFlowCompleted" => [id("hdnCWPersonFlowCompleted")],
        is_backload_sent as "isBackloadSent" => [id("isCommonWellBackloadSent")],
    }
}

schema_section! {
    pub struct SupportContact {
        is_required as "isRequired" => [equals("isMdnSupportContact", "1")],
        title as "title" => [id("cmbSupportTitle")],
        suffix as "suffix" => [id("cmbSupportSuffix")],
        is_title_type as "isTitleType" => [id("isTitleSupportContact")],
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Addresses {
    pub current: CurrentAddress,
    pub alternate: AlternateAddress,
}

impl Addresses {
    pub fn fill(&mut self, resolver: &FieldResolver<'_>) -> Result<(), ResolveError> {
        self.current.fill(resolver)?;
        self.alternate.fill(resolver)
    }

    pub fn populated(&self) -> usize {
        self.current.populated() + self.alternate.populated()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Insurance {
    pub primary: PrimaryInsurance,
    pub secondary: SecondaryInsurance,
}

impl Insurance {
    pub fn fill(&mut self, resolver: &FieldResolver<'_>) -> Result<(), ResolveError> {
        self.primary.fill(resolver)?;
        self.secondary.fill(resolver)
    }

    pub fn populated(&self) -> usize {
        self.primary.populated() + self.secondary.populated()
    }
}

/// Every leaf of every section, in output order, keyed by its dotted JSON path.
pub const SCHEMA: &[(&str, &[FieldSpec])] = &[
    ("patientInfo", PatientInfo::FIELDS),
    ("addresses.current", CurrentAddress::FIELDS),
    ("addresses.alternate", AlternateAddress::FIELDS),
    ("contactInfo", ContactInfo::FIELDS),
    ("insurance.primary", PrimaryInsurance::FIELDS),
    ("insurance.secondary", SecondaryInsurance::FIELDS),
    ("demographics", Demographics::FIELDS),
    ("providers", Providers::FIELDS),
    ("emergencyContact", EmergencyContact::FIELDS),
    ("employment", Employment::FIELDS),
    ("clinicalInfo", ClinicalInfo::FIELDS),
    ("previousNames", PreviousNames::FIELDS),
    ("mothersMaiden", MothersMaiden::FIELDS),
    ("commonWell", CommonWell::FIELDS),
    ("supportContact", SupportContact::FIELDS),
];

pub fn schema_field_count() -> usize {
    SCHEMA.iter().map(|(_, fields)| fields.len()).sum()
}

/* ---------- record ---------- */

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub patient_info: PatientInfo,
    pub addresses: Addresses,
    pub contact_info: ContactInfo,
    pub insurance: Insurance,
    pub demographics: Demographics,
    pub providers: Providers,
    pub emergency_contact: EmergencyContact,
    pub employment: Employment,
    pub clinical_info: ClinicalInfo,
    pub previous_names: PreviousNames,
    pub mothers_maiden: MothersMaiden,
    pub common_well: CommonWell,
    pub support_contact: SupportContact,
}

impl PatientRecord {
    pub fn populated(&self) -> usize {
        self.patient_info.populated()
            + self.addresses.populated()
            + self.contact_info.populated()
            + self.insurance.populated()
            + self.demographics.populated()
            + self.providers.populated()
            + self.emergency_contact.populated()
            + self.employment.populated()
            + self.clinical_info.populated()
            + self.previous_names.populated()
            + self.mothers_maiden.populated()
            + self.common_well.populated()
            + self.support_contact.populated()
    }
}

/// A section whose extraction stopped early. Fields resolved before the
/// failure are kept in the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionFailure {
    pub section: String,
    pub error: String,
}

/// Run one section's extraction; a failure is logged and recorded, never propagated.
pub(crate) fn isolate<F>(section: &str, failures: &mut Vec<SectionFailure>, fill: F)
where
    F: FnOnce() -> Result<(), ResolveError>,
{
    if let Err(e) = fill() {
        logw!(section, error = %e, "section extraction failed, keeping partial data");
        failures.push(SectionFailure { section: s!(section), error: e.to_string() });
    }
}

/// Resolve every schema section against the page's primary document.
pub fn extract_record(doc: &Document) -> (PatientRecord, Vec<SectionFailure>) {
    let r = FieldResolver::new(doc);
    let mut rec = PatientRecord::default();
    let mut failures = Vec::new();

    isolate("patientInfo", &mut failures, || rec.patient_info.fill(&r));
    isolate("addresses", &mut failures, || rec.addresses.fill(&r));
    isolate("contactInfo", &mut failures, || rec.contact_info.fill(&r));
    isolate("insurance", &mut failures, || rec.insurance.fill(&r));
    isolate("demographics", &mut failures, || rec.demographics.fill(&r));
    isolate("providers", &mut failures, || rec.providers.fill(&r));
    isolate("emergencyContact", &mut failures, || rec.emergency_contact.fill(&r));
    isolate("employment", &mut failures, || rec.employment.fill(&r));
    isolate("clinicalInfo", &mut failures, || rec.clinical_info.fill(&r));
    isolate("previousNames", &mut failures, || rec.previous_names.fill(&r));
    isolate("mothersMaiden", &mut failures, || rec.mothers_maiden.fill(&r));
    isolate("commonWell", &mut failures, || rec.common_well.fill(&r));
    isolate("supportContact", &mut failures, || rec.support_contact.fill(&r));

    logd!(populated = rec.populated(), failed = failures.len(), "record extracted");
    (rec, failures)
}

/// Every populated text-like input, select and textarea that has an id, with
/// its literal form value (selects give the option code). Document order.
pub fn raw_inputs(doc: &Document) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    for el in doc.select(&RAW_CONTROLS) {
        let wanted = match control_kind(el) {
            ControlKind::Select | ControlKind::TextArea => true,
            ControlKind::Input => matches!(input_type(el).as_str(), "text" | "tel" | "email"),
            _ => false,
        };
        let Some(id) = el.value().id().filter(|id| !id.is_empty()) else { continue };
        if !wanted {
            continue;
        }
        let value = control_value(el);
        if !value.is_empty() {
            out.insert(s!(id), value);
        }
    }
    out
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub extracted_at: DateTime<Utc>,
    pub patient_id: Option<String>,
    pub account_number: Option<String>,
    pub page_url: Option<String>,
    pub schema_version: String,
    pub section_errors: Vec<SectionFailure>,
}

/// The full output of one details-page pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub extracted_data: PatientRecord,
    pub raw_inputs: IndexMap<String, String>,
    pub search_context: Option<IdentityTuple>,
    pub metadata: Metadata,
}

fn text_of(value: &Option<FieldValue>) -> Option<String> {
    value.as_ref().and_then(FieldValue::as_text).map(str::to_string)
}

/// Extract a details page and link it with whatever the listing pass stored.
pub fn extract_details<S: KeyValueStore>(page: &Page, store: &CorrelationStore<S>) -> ExtractionResult {
    let doc = page.document();
    let (record, section_errors) = extract_record(doc);
    let raw = raw_inputs(doc);
    let search_context: Option<IdentityTuple> = store.get(CURRENT_PATIENT_KEY);

    if let Some(ctx) = &search_context {
        logf!(hidden_id = %ctx.hidden_patient_id, account = ?ctx.account_number, "linked to search context");
    }

    let metadata = Metadata {
        extracted_at: Utc::now(),
        patient_id: text_of(&record.patient_info.patient_id),
        account_number: text_of(&record.patient_info.account_number),
        page_url: page.url().map(str::to_string),
        schema_version: s!(SCHEMA_VERSION),
        section_errors,
    };

    ExtractionResult { extracted_data: record, raw_inputs: raw, search_context, metadata }
}
