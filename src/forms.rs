//! Forest-rights claim forms: form detection, per-form field extraction and
//! the validation rules applied to extracted claims.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormType {
    /// Individual rights to forest land
    FormA,
    /// Community rights
    FormB,
    /// Community forest resource
    FormC,
}

impl FormType {
    pub fn template(&self) -> &'static [FieldSpec] {
        match self {
            Self::FormA => FORM_A_FIELDS,
            Self::FormB => FORM_B_FIELDS,
            Self::FormC => FORM_C_FIELDS,
        }
    }

    fn specific_rules(&self) -> &'static [FieldRule] {
        match self {
            Self::FormA => &FORM_A_RULES,
            Self::FormB => &FORM_B_RULES,
            Self::FormC => &FORM_C_RULES,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub required: bool,
}

const fn field(key: &'static str, label: &'static str, required: bool) -> FieldSpec {
    FieldSpec {
        key,
        label,
        required,
    }
}

pub const FORM_A_FIELDS: &[FieldSpec] = &[
    field("claimantName", "Name of Claimant(s)", true),
    field("spouseName", "Name of Spouse", false),
    field("fatherMotherName", "Name of Father/Mother", true),
    field("address", "Address", true),
    field("village", "Village", true),
    field("gramPanchayat", "Gram Panchayat", true),
    field("tehsil", "Tehsil/Taluka", true),
    field("district", "District", true),
    field("isScheduledTribe", "Scheduled Tribe (Yes/No)", true),
    field("isOTFD", "Other Traditional Forest Dweller (Yes/No)", true),
    field("familyMembers", "Family Members with Age", false),
    field("extentForHabitation", "Extent of Forest Land for Habitation", false),
    field("extentForCultivation", "Extent of Forest Land for Self-Cultivation", false),
    field("disputedLands", "Disputed Lands", false),
    field("pattasLeases", "Pattas/Leases/Grants", false),
    field("rehabilitationLand", "Land for In-Situ Rehabilitation", false),
    field("displacedLand", "Land from where Displaced", false),
    field("forestVillageLand", "Extent of Land in Forest Villages", false),
    field("otherRights", "Any Other Traditional Right", false),
    field("evidence", "Evidence in Support", true),
    field("additionalInfo", "Any Other Information", false),
];

pub const FORM_B_FIELDS: &[FieldSpec] = &[
    field("claimantCommunity", "Name of Claimant Community", true),
    field("isFDSTCommunity", "FDST Community (Yes/No)", true),
    field("isOTFDCommunity", "OTFD Community (Yes/No)", true),
    field("village", "Village", true),
    field("gramPanchayat", "Gram Panchayat", true),
    field("tehsil", "Tehsil/Taluka", true),
    field("district", "District", true),
    field("nistariRights", "Community Rights such as Nistar", false),
    field("mfpRights", "Rights over Minor Forest Produce", false),
    field("fishWaterRights", "Uses/Entitlements (Fish, Water Bodies)", false),
    field("grazingRights", "Grazing Rights", false),
    field(
        "nomadPastoralistRights",
        "Traditional Resource Access for Nomadic/Pastoralist",
        false,
    ),
    field("habitatRights", "Community Tenures of Habitat for PTGs", false),
    field(
        "biodiversityRights",
        "Right to Access Biodiversity/IP/Traditional Knowledge",
        false,
    ),
    field("otherTraditionalRights", "Other Traditional Rights", false),
    field("evidence", "Evidence in Support", true),
    field("additionalInfo", "Any Other Information", false),
];

pub const FORM_C_FIELDS: &[FieldSpec] = &[
    field("village", "Village/Gram Sabha", true),
    field("gramPanchayat", "Gram Panchayat", true),
    field("tehsil", "Tehsil/Taluka", true),
    field("district", "District", true),
    field("gramSabhaMembers", "Names of Gram Sabha Members", true),
    field("khasraNumbers", "Khasra/Compartment Numbers", false),
    field("borderingVillages", "Bordering Villages", false),
    field("evidence", "List of Evidence in Support", true),
];

/// Alternative patterns for one field, tried in order
struct FieldRule {
    key: &'static str,
    patterns: Vec<Regex>,
}

fn rules(table: &[(&'static str, &[&str])]) -> Vec<FieldRule> {
    table
        .iter()
        .map(|&(key, patterns)| FieldRule {
            key,
            patterns: patterns
                .iter()
                .map(|p| Regex::new(&format!("(?i){}", p)).expect("static regex"))
                .collect(),
        })
        .collect()
}

static COMMON_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    rules(&[
        (
            "claimantName",
            &[
                r"(?:name of (?:the )?claimant|claimant name|नाम)[\s:]*(.+)",
                r"(?:1\.?\s*name)[\s:]*(.+)",
            ],
        ),
        (
            "spouseName",
            &[
                r"(?:name of (?:the )?spouse|spouse name|पति/पत्नी)[\s:]*(.+)",
                r"(?:2\.?\s*name of spouse)[\s:]*(.+)",
            ],
        ),
        (
            "fatherMotherName",
            &[
                r"(?:name of father/mother|father/mother|पिता/माता)[\s:]*(.+)",
                r"(?:3\.?\s*name of father)[\s:]*(.+)",
            ],
        ),
        (
            "address",
            &[r"(?:address|पता)[\s:]*(.+)", r"(?:4\.?\s*address)[\s:]*(.+)"],
        ),
        (
            "village",
            &[
                r"(?:village|गांव|ग्राम)[\s:]*(.+)",
                r"(?:5\.?\s*village)[\s:]*(.+)",
            ],
        ),
        (
            "gramPanchayat",
            &[
                r"(?:gram panchayat|ग्राम पंचायत)[\s:]*(.+)",
                r"(?:6\.?\s*gram panchayat)[\s:]*(.+)",
            ],
        ),
        (
            "tehsil",
            &[
                r"(?:tehsil|taluka|तहसील)[\s:]*(.+)",
                r"(?:7\.?\s*tehsil)[\s:]*(.+)",
            ],
        ),
        (
            "district",
            &[r"(?:district|जिला)[\s:]*(.+)", r"(?:8\.?\s*district)[\s:]*(.+)"],
        ),
        (
            "isScheduledTribe",
            &[
                r"(?:scheduled tribe|अनुसूचित जनजाति)[\s:]*(.+)",
                r"(?:9\.?\s*\(?a\)?\s*scheduled tribe)[\s:]*(.+)",
            ],
        ),
        (
            "isOTFD",
            &[
                r"(?:other traditional forest dweller|otfd)[\s:]*(.+)",
                r"(?:9\.?\s*\(?b\)?\s*other traditional)[\s:]*(.+)",
            ],
        ),
    ])
});

static FORM_A_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    rules(&[
        (
            "familyMembers",
            &[
                r"(?:family members|members in the family)[\s:]*(.+)",
                r"(?:10\.?\s*name of other members)[\s:]*(.+)",
            ],
        ),
        (
            "extentForHabitation",
            &[
                r"(?:extent.*habitation|for habitation)[\s:]*([0-9.]+)",
                r"(?:1\.?\s*\(?a\)?\s*for habitation)[\s:]*([0-9.]+)",
            ],
        ),
        (
            "extentForCultivation",
            &[
                r"(?:extent.*cultivation|self.cultivation)[\s:]*([0-9.]+)",
                r"(?:1\.?\s*\(?b\)?\s*for self.cultivation)[\s:]*([0-9.]+)",
            ],
        ),
        (
            "disputedLands",
            &[
                r"(?:disputed lands?)[\s:]*(.+)",
                r"(?:2\.?\s*disputed lands)[\s:]*(.+)",
            ],
        ),
        (
            "pattasLeases",
            &[
                r"(?:pattas?/leases?/grants?)[\s:]*(.+)",
                r"(?:3\.?\s*pattas)[\s:]*(.+)",
            ],
        ),
        (
            "evidence",
            &[
                r"(?:evidence in support|evidence)[\s:]*(.+)",
                r"(?:8\.?\s*evidence)[\s:]*(.+)",
            ],
        ),
    ])
});

static FORM_B_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    rules(&[
        (
            "claimantCommunity",
            &[
                r"(?:name of.*claimant.*community)[\s:]*(.+)",
                r"(?:1\.?\s*name of.*claimant)[\s:]*(.+)",
            ],
        ),
        (
            "isFDSTCommunity",
            &[
                r"(?:fdst community|forest dwelling)[\s:]*(.+)",
                r"(?:1\.?\s*\(?a\)?\s*fdst)[\s:]*(.+)",
            ],
        ),
        (
            "isOTFDCommunity",
            &[
                r"(?:otfd community)[\s:]*(.+)",
                r"(?:1\.?\s*\(?b\)?\s*otfd)[\s:]*(.+)",
            ],
        ),
        (
            "nistariRights",
            &[
                r"(?:nistar|community rights)[\s:]*(.+)",
                r"(?:1\.?\s*community rights.*nistar)[\s:]*(.+)",
            ],
        ),
        (
            "mfpRights",
            &[
                r"(?:minor forest produce|mfp)[\s:]*(.+)",
                r"(?:2\.?\s*rights over minor)[\s:]*(.+)",
            ],
        ),
        (
            "evidence",
            &[r"(?:evidence in support|evidence)[\s:]*(.+)"],
        ),
    ])
});

static FORM_C_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    rules(&[
        (
            "gramSabhaMembers",
            &[
                r"(?:members of.*gram sabha)[\s:]*(.+)",
                r"(?:5\.?\s*name.*members)[\s:]*(.+)",
            ],
        ),
        (
            "khasraNumbers",
            &[r"(?:khasra|compartment)[\s:]*(.+)", r"(?:6\.?\s*khasra)[\s:]*(.+)"],
        ),
        (
            "borderingVillages",
            &[
                r"(?:bordering villages?)[\s:]*(.+)",
                r"(?:7\.?\s*bordering)[\s:]*(.+)",
            ],
        ),
        (
            "evidence",
            &[r"(?:list of evidence|evidence in support|evidence)[\s:]*(.+)"],
        ),
    ])
});

/// Guess the claim form from its title, then from its content
pub fn detect_form_type(text: &str) -> FormType {
    let text = text.to_lowercase();
    let has = |needle: &str| text.contains(needle);

    if has("form a") || has("claim form for rights to forest land") {
        FormType::FormA
    } else if has("form b") || has("claim form for community rights") {
        FormType::FormB
    } else if has("form c") || has("claim form for rights to community forest resource") {
        FormType::FormC
    } else if has("extent of forest land") && has("self-cultivation") {
        FormType::FormA
    } else if has("community rights") && has("nistar") {
        FormType::FormB
    } else if has("gram sabha") && has("community forest resource") {
        FormType::FormC
    } else {
        FormType::FormA
    }
}

/// Fill the form's template from recognized text.
///
/// Every template key is present in the result, empty when nothing matched.
/// For each field the first line yielding a non-empty capture wins.
pub fn extract_form_fields(text: &str, form: FormType) -> BTreeMap<String, String> {
    let template = form.template();
    let mut fields: BTreeMap<String, String> = template
        .iter()
        .map(|spec| (spec.key.to_string(), String::new()))
        .collect();

    let lines: Vec<&str> = text
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    for table in [COMMON_RULES.as_slice(), form.specific_rules()] {
        for rule in table {
            let Some(slot) = fields.get_mut(rule.key) else {
                continue;
            };
            if !slot.is_empty() {
                continue;
            }
            if let Some(value) = lines.iter().find_map(|line| first_capture(rule, line)) {
                *slot = value;
            }
        }
    }

    fields
}

fn first_capture(rule: &FieldRule, line: &str) -> Option<String> {
    rule.patterns.iter().find_map(|pattern| {
        let value = pattern.captures(line)?.get(1)?.as_str().trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequiredCheck {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

pub fn validate_required(fields: &BTreeMap<String, String>, form: FormType) -> RequiredCheck {
    let errors: Vec<String> = form
        .template()
        .iter()
        .filter(|spec| spec.required)
        .filter(|spec| {
            fields
                .get(spec.key)
                .map_or(true, |value| value.trim().is_empty())
        })
        .map(|spec| format!("{} is required but not found", spec.label))
        .collect();

    RequiredCheck {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Detected form, filled fields, required-field check and claim report
#[derive(Debug, Clone, Serialize)]
pub struct FormExtraction {
    pub form_type: FormType,
    pub fields: BTreeMap<String, String>,
    pub validation: RequiredCheck,
    pub report: ValidationReport,
}

pub fn process_form(text: &str, form: Option<FormType>) -> FormExtraction {
    let form_type = form.unwrap_or_else(|| detect_form_type(text));
    let fields = extract_form_fields(text, form_type);
    let validation = validate_required(&fields, form_type);
    let report = generate_validation_report(&ClaimData::from_form(text, &fields, form_type));

    tracing::info!(
        form = ?form_type,
        missing = validation.errors.len(),
        errors = report.overall.errors.len(),
        warnings = report.overall.warnings.len(),
        "Extracted claim form fields"
    );

    FormExtraction {
        form_type,
        fields,
        validation,
        report,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Check {
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub requires_manual_review: bool,
}

impl Check {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            valid: true,
            message: message.into(),
            requires_manual_review: false,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
            requires_manual_review: false,
        }
    }
}

/// Occupation must predate the 13 December 2005 cutoff
pub fn occupation_cutoff() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2005, 12, 13)
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

pub fn validate_occupation_date(date: &str) -> Check {
    let date = date.trim();
    if date.is_empty() {
        return Check::fail("Date not provided");
    }

    let Some(parsed) = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date, format).ok())
    else {
        return Check::fail("Invalid date format");
    };

    match occupation_cutoff() {
        Some(cutoff) if parsed > cutoff => Check {
            valid: false,
            message: format!("Occupation must be before {}", cutoff.format("%a %b %d %Y")),
            requires_manual_review: true,
        },
        _ => Check::pass("Date valid for claim"),
    }
}

/// Documents accepted as proof of identity
pub const IDENTITY_DOCUMENTS: [&str; 6] = [
    "Voter Identity Card",
    "Aadhaar Card",
    "Ration Card",
    "Passport",
    "Domicile Certificate",
    "House Tax Receipts",
];

fn is_identity_document(evidence: &str) -> bool {
    let evidence = evidence.to_lowercase();
    IDENTITY_DOCUMENTS
        .iter()
        .any(|doc| evidence.contains(&doc.to_lowercase()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceCheck {
    pub valid: bool,
    pub message: String,
    pub missing_count: usize,
    pub identity_doc_missing: bool,
}

/// At least two pieces of evidence, one of them an identity document
pub fn validate_evidence<S: AsRef<str>>(evidence: &[S]) -> EvidenceCheck {
    if evidence.len() < 2 {
        return EvidenceCheck {
            valid: false,
            message: "At least 2 evidences required".to_string(),
            missing_count: 2 - evidence.len(),
            identity_doc_missing: false,
        };
    }

    if !evidence.iter().any(|e| is_identity_document(e.as_ref())) {
        return EvidenceCheck {
            valid: false,
            message: "At least one identity document required \
                      (Voter ID/Aadhaar/Ration Card/Domicile Certificate)"
                .to_string(),
            missing_count: 0,
            identity_doc_missing: true,
        };
    }

    EvidenceCheck {
        valid: true,
        message: "Evidence requirement satisfied".to_string(),
        missing_count: 0,
        identity_doc_missing: false,
    }
}

/// Rule 13 evidence categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceCategory {
    PublicDocuments,
    GovtAuthorized,
    PhysicalAttributes,
    JudicialRecords,
    ResearchStudies,
    HistoricalRecords,
    TraditionalStructures,
    Genealogy,
    ElderStatements,
}

impl EvidenceCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PublicDocuments => "Public Documents & Government Records",
            Self::GovtAuthorized => "Government Authorized Documents",
            Self::PhysicalAttributes => "Physical Attributes",
            Self::JudicialRecords => "Quasi-judicial and Judicial Records",
            Self::ResearchStudies => "Research Studies & Documentation",
            Self::HistoricalRecords => "Historical Records from Princely States",
            Self::TraditionalStructures => "Traditional Structures",
            Self::Genealogy => "Genealogy Records",
            Self::ElderStatements => "Statements of Elders",
        }
    }
}

impl Serialize for EvidenceCategory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

pub fn categorize_evidence(evidence: &str) -> EvidenceCategory {
    if is_identity_document(evidence) {
        return EvidenceCategory::GovtAuthorized;
    }

    let evidence = evidence.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| evidence.contains(w));

    if any(&["census", "survey", "gazetteer"]) {
        EvidenceCategory::PublicDocuments
    } else if any(&["genealogy", "family tree", "ancestry"]) {
        EvidenceCategory::Genealogy
    } else if any(&["house", "hut", "improvement"]) {
        EvidenceCategory::PhysicalAttributes
    } else if any(&["court", "judgment", "order"]) {
        EvidenceCategory::JudicialRecords
    } else if any(&["well", "burial", "sacred"]) {
        EvidenceCategory::TraditionalStructures
    } else if any(&["elder", "statement", "witness"]) {
        EvidenceCategory::ElderStatements
    } else if any(&["princely", "darbar"]) {
        EvidenceCategory::HistoricalRecords
    } else if any(&["research", "study", "studies"]) {
        EvidenceCategory::ResearchStudies
    } else {
        EvidenceCategory::PublicDocuments
    }
}

/// Largest area, in hectares, a single claim may cover
pub const MAX_CLAIM_AREA_HECTARES: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaCheck {
    pub valid: bool,
    pub message: String,
    pub exceeds_limit: bool,
}

pub fn validate_land_area(area: &str) -> AreaCheck {
    let fail = |message: String, exceeds_limit| AreaCheck {
        valid: false,
        message,
        exceeds_limit,
    };

    let Ok(area) = area.trim().parse::<f64>() else {
        return fail("Area must be a valid number".to_string(), false);
    };
    if !area.is_finite() || area <= 0.0 {
        return fail("Area must be greater than 0".to_string(), false);
    }
    if area > MAX_CLAIM_AREA_HECTARES {
        return fail(
            format!(
                "Area cannot exceed {} hectares",
                MAX_CLAIM_AREA_HECTARES
            ),
            true,
        );
    }

    AreaCheck {
        valid: true,
        message: format!(
            "Area within permissible limit of {} hectares",
            MAX_CLAIM_AREA_HECTARES
        ),
        exceeds_limit: false,
    }
}

const NOT_FOREST_DWELLER: &str =
    "Claimant must be either Forest Dwelling Scheduled Tribe or Other Traditional Forest Dweller";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilityCheck {
    pub valid: bool,
    pub errors: Vec<String>,
}

fn is_affirmative(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value.starts_with("yes") || value == "y" || value == "true" || value.starts_with("हाँ")
}

/// The claimant must be FDST or OTFD and be named with village and district.
///
/// Form C is filed by a gram sabha and only needs its location.
pub fn validate_claimant_eligibility(
    fields: &BTreeMap<String, String>,
    form: FormType,
) -> EligibilityCheck {
    let (status_keys, required): (&[&str], &[&str]) = match form {
        FormType::FormA => (
            &["isScheduledTribe", "isOTFD"],
            &["claimantName", "village", "district"],
        ),
        FormType::FormB => (
            &["isFDSTCommunity", "isOTFDCommunity"],
            &["claimantCommunity", "village", "district"],
        ),
        FormType::FormC => (&[], &["village", "district"]),
    };

    let mut errors = Vec::new();
    let forest_dweller = status_keys
        .iter()
        .any(|key| fields.get(*key).is_some_and(|value| is_affirmative(value)));
    if !status_keys.is_empty() && !forest_dweller {
        errors.push(NOT_FOREST_DWELLER.to_string());
    }
    errors.extend(
        required
            .iter()
            .filter(|key| fields.get(**key).map_or(true, |value| value.trim().is_empty()))
            .map(|key| format!("{} is required", key)),
    );

    EligibilityCheck {
        valid: errors.is_empty(),
        errors,
    }
}

/// Evidence wording that points at occupation after the cutoff
const SUSPICIOUS_PATTERNS: [&str; 7] = [
    "recent construction",
    "new settlement",
    "2006",
    "2007",
    "2008",
    "2009",
    "2010",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    Date,
    Evidence,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncroachmentFlag {
    #[serde(rename = "type")]
    pub kind: FlagKind,
    pub item: String,
    pub issue: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncroachmentCheck {
    pub flagged: bool,
    pub items: Vec<EncroachmentFlag>,
    pub requires_manual_review: bool,
}

/// Flag post-cutoff occupation dates and evidence with suspicious wording
pub fn check_for_post_cutoff_encroachment<E, D>(evidence: &[E], dates: &[D]) -> EncroachmentCheck
where
    E: AsRef<str>,
    D: AsRef<str>,
{
    let mut items = Vec::new();

    for date in dates {
        let check = validate_occupation_date(date.as_ref());
        if !check.valid && check.requires_manual_review {
            items.push(EncroachmentFlag {
                kind: FlagKind::Date,
                item: date.as_ref().to_string(),
                issue: check.message,
            });
        }
    }

    for item in evidence {
        let text = item.as_ref().to_lowercase();
        for pattern in SUSPICIOUS_PATTERNS.iter().filter(|p| text.contains(*p)) {
            items.push(EncroachmentFlag {
                kind: FlagKind::Evidence,
                item: item.as_ref().to_string(),
                issue: format!("Contains suspicious pattern: {}", pattern),
            });
        }
    }

    let flagged = !items.is_empty();
    EncroachmentCheck {
        flagged,
        items,
        requires_manual_review: flagged,
    }
}

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[/\-]\d{1,2}[/\-]\d{4})\b").expect("static regex")
});

/// Claim facts the report checks, gathered from an extracted form
#[derive(Debug, Clone)]
pub struct ClaimData<'a> {
    pub form: FormType,
    pub fields: &'a BTreeMap<String, String>,
    pub evidence: Vec<String>,
    pub occupation_dates: Vec<String>,
    pub area: Option<String>,
}

impl<'a> ClaimData<'a> {
    /// Evidence is the `evidence` field split on commas and semicolons.
    /// Occupation dates are the dates on lines that mention occupation or
    /// "since". The area is the habitation extent, else the cultivation one.
    pub fn from_form(text: &str, fields: &'a BTreeMap<String, String>, form: FormType) -> Self {
        let evidence = fields
            .get("evidence")
            .map(|value| {
                value
                    .split([',', ';'])
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let occupation_dates = text
            .lines()
            .filter(|line| {
                let line = line.to_lowercase();
                line.contains("occup") || line.contains("since")
            })
            .flat_map(|line| DATE_PATTERN.find_iter(line).map(|m| m.as_str().to_string()))
            .collect();

        let area = ["extentForHabitation", "extentForCultivation"]
            .iter()
            .filter_map(|key| fields.get(*key))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .map(str::to_string);

        Self {
            form,
            fields,
            evidence,
            occupation_dates,
            area,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overall {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateSummary {
    pub valid_dates: usize,
    pub invalid_dates: usize,
    pub details: Vec<Check>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizedEvidence {
    pub item: String,
    pub category: EvidenceCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub overall: Overall,
    pub eligibility: EligibilityCheck,
    pub evidence: EvidenceCheck,
    pub evidence_categories: Vec<CategorizedEvidence>,
    pub dates: Option<DateSummary>,
    pub area: Option<AreaCheck>,
    pub encroachment: EncroachmentCheck,
}

/// Run every claim check and fold the outcome into one report.
///
/// Eligibility, evidence and an over-limit area are errors that make the
/// claim invalid. Bad occupation dates, other area problems and suspicious
/// evidence are warnings.
pub fn generate_validation_report(claim: &ClaimData<'_>) -> ValidationReport {
    let mut overall = Overall {
        valid: true,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let eligibility = validate_claimant_eligibility(claim.fields, claim.form);
    if !eligibility.valid {
        overall.valid = false;
        overall.errors.extend(eligibility.errors.iter().cloned());
    }

    let evidence = validate_evidence(claim.evidence.as_slice());
    if !evidence.valid {
        overall.valid = false;
        overall.errors.push(evidence.message.clone());
    }

    let evidence_categories = claim
        .evidence
        .iter()
        .map(|item| CategorizedEvidence {
            item: item.clone(),
            category: categorize_evidence(item),
        })
        .collect();

    let dates = (!claim.occupation_dates.is_empty()).then(|| {
        let details: Vec<Check> = claim
            .occupation_dates
            .iter()
            .map(|date| validate_occupation_date(date))
            .collect();
        let valid_dates = details.iter().filter(|check| check.valid).count();
        overall.warnings.extend(
            details
                .iter()
                .filter(|check| !check.valid)
                .map(|check| check.message.clone()),
        );
        DateSummary {
            valid_dates,
            invalid_dates: details.len() - valid_dates,
            details,
        }
    });

    let area = claim.area.as_deref().map(validate_land_area);
    if let Some(area) = area.as_ref().filter(|area| !area.valid) {
        if area.exceeds_limit {
            overall.valid = false;
            overall.errors.push(area.message.clone());
        } else {
            overall.warnings.push(area.message.clone());
        }
    }

    let encroachment = check_for_post_cutoff_encroachment(
        claim.evidence.as_slice(),
        claim.occupation_dates.as_slice(),
    );
    overall.warnings.extend(
        encroachment
            .items
            .iter()
            .filter(|flag| flag.kind == FlagKind::Evidence)
            .map(|flag| flag.issue.clone()),
    );

    ValidationReport {
        overall,
        eligibility,
        evidence,
        evidence_categories,
        dates,
        area,
        encroachment,
    }
}
