//! Field normalisation and validation rules
//!
//! Covers case rows (bulk and manual entry), contact fields and the
//! account password policy.

use regex_lite::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::errors::{AppError, Result};

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z\s'-]+$").expect("name pattern compiles"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"))
}

/// Collapse internal whitespace runs and trim
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep only ASCII digits
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn is_valid_email(value: &str) -> bool {
    email_pattern().is_match(value)
}

pub fn is_valid_phone(value: &str) -> bool {
    value.len() == 10 && value.chars().all(|c| c.is_ascii_digit())
}

pub fn is_valid_pincode(value: &str) -> bool {
    value.len() == 6 && value.chars().all(|c| c.is_ascii_digit())
}

pub fn is_alpha_name(value: &str) -> bool {
    name_pattern().is_match(value)
}

/// Lowercase and trim an email for storage and lookup
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Check a password against the account policy, returning every violation
pub fn password_violations(password: &str, email: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if password.chars().count() < 8 {
        errors.push("Password must be at least 8 characters".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain at least 1 uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain at least 1 lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least 1 number".to_string());
    }
    if !password.chars().any(|c| "@$!%*?&".contains(c)) {
        errors.push("Password must contain at least 1 special character (@$!%*?&)".to_string());
    }
    if !email.is_empty() && password.to_lowercase() == email.to_lowercase() {
        errors.push("Password cannot be the same as email".to_string());
    }

    errors
}

/// Enforce the password policy
pub fn ensure_password_policy(password: &str, email: &str) -> Result<()> {
    let errors = password_violations(password, email);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(errors))
    }
}

/// Accept strings, numbers and nulls for spreadsheet-sourced cells
fn loose_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

/// A case row as received from a parsed spreadsheet or the manual form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRow {
    #[serde(default, deserialize_with = "loose_string")]
    pub case_number: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub document_type: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub contact_number: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub district: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub pincode: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub pin: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub remarks: Option<String>,
}

/// A row after normalisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub case_number: String,
    pub document_type: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub contact_number: String,
    pub email: Option<String>,
    pub address: String,
    pub state: String,
    pub district: String,
    pub pincode: String,
    pub remarks: Option<String>,
}

impl NewRecord {
    pub fn full_name(&self) -> String {
        let joined = collapse_whitespace(&format!("{} {}", self.first_name, self.last_name));
        if joined.is_empty() {
            "N/A".to_string()
        } else {
            joined
        }
    }
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(collapse_whitespace)
        .filter(|v| !v.is_empty())
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(collapse_whitespace).unwrap_or_default()
}

/// Normalise a raw row
pub fn normalize_row(row: &RecordRow) -> NewRecord {
    let pincode_raw = row
        .pincode
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .or(row.pin.as_deref())
        .unwrap_or_default();

    NewRecord {
        case_number: text(&row.case_number),
        document_type: optional(&row.document_type),
        first_name: text(&row.first_name),
        last_name: text(&row.last_name),
        contact_number: digits_only(row.contact_number.as_deref().unwrap_or_default()),
        email: optional(&row.email),
        address: text(&row.address),
        state: text(&row.state),
        district: text(&row.district),
        pincode: digits_only(pincode_raw),
        remarks: optional(&row.remarks),
    }
}

/// First rule a normalised row violates, if any
pub fn check_record(record: &NewRecord) -> std::result::Result<(), &'static str> {
    let required = [
        (&record.case_number, "Case Number is required"),
        (&record.first_name, "First Name is required"),
        (&record.last_name, "Last Name is required"),
        (&record.contact_number, "Contact Number is required"),
        (&record.address, "Address is required"),
        (&record.state, "State is required"),
        (&record.district, "District is required"),
        (&record.pincode, "Pincode is required"),
    ];
    if let Some((_, message)) = required.iter().find(|(value, _)| value.is_empty()) {
        return Err(*message);
    }

    if !is_valid_phone(&record.contact_number) {
        return Err("Contact Number must be numeric and exactly 10 digits");
    }
    if !is_valid_pincode(&record.pincode) {
        return Err("Pincode must be numeric and exactly 6 digits");
    }

    let named = [
        (&record.first_name, "First Name contains invalid characters"),
        (&record.last_name, "Last Name contains invalid characters"),
        (&record.state, "State contains invalid characters"),
        (&record.district, "District contains invalid characters"),
    ];
    if let Some((_, message)) = named.iter().find(|(value, _)| !is_alpha_name(value)) {
        return Err(*message);
    }

    if let Some(email) = &record.email {
        if !is_valid_email(email) {
            return Err("Invalid email format");
        }
    }

    Ok(())
}

/// Per-row failure in a bulk upload report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    pub row_number: usize,
    pub case_number: Option<String>,
    pub error: String,
}

/// A row that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRow {
    pub row_number: usize,
    pub record: NewRecord,
}

/// Outcome of validating a whole upload
#[derive(Debug, Default)]
pub struct BatchValidation {
    pub valid: Vec<ValidRow>,
    pub failed: Vec<RowFailure>,
}

impl BatchValidation {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Spreadsheet row number for a zero-based data index (row 1 is the header)
pub fn row_number(index: usize) -> usize {
    index + 2
}

/// Validate every row; `existing` holds case numbers already stored
pub fn validate_batch(rows: &[RecordRow], existing: &HashSet<String>) -> BatchValidation {
    let mut outcome = BatchValidation::default();
    let mut seen = HashSet::new();

    for (index, row) in rows.iter().enumerate() {
        let row_number = row_number(index);
        let record = normalize_row(row);
        let case_number = Some(record.case_number.clone()).filter(|c| !c.is_empty());

        let failure = match check_record(&record) {
            Err(message) => Some(message),
            Ok(()) if !seen.insert(record.case_number.clone()) => {
                Some("Duplicate Case Number in uploaded file")
            }
            Ok(()) if existing.contains(&record.case_number) => {
                Some("Case Number already exists in system")
            }
            Ok(()) => None,
        };

        match failure {
            Some(error) => outcome.failed.push(RowFailure {
                row_number,
                case_number,
                error: error.to_string(),
            }),
            None => outcome.valid.push(ValidRow { row_number, record }),
        }
    }

    outcome
}

/// Case numbers present in a raw upload, normalised
pub fn case_numbers(rows: &[RecordRow]) -> Vec<String> {
    rows.iter()
        .map(|row| text(&row.case_number))
        .filter(|c| !c.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(case_number: &str) -> RecordRow {
        RecordRow {
            case_number: Some(case_number.into()),
            first_name: Some("Asha".into()),
            last_name: Some("Verma".into()),
            contact_number: Some("98765 43210".into()),
            address: Some("12  MG Road".into()),
            state: Some("Karnataka".into()),
            district: Some("Bengaluru Urban".into()),
            pincode: Some("560 001".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_row() {
        let mut raw = row(" CASE-1 ");
        raw.pincode = None;
        raw.pin = Some("560001".into());
        let record = normalize_row(&raw);
        assert_eq!(record.case_number, "CASE-1");
        assert_eq!(record.contact_number, "9876543210");
        assert_eq!(record.address, "12 MG Road");
        assert_eq!(record.pincode, "560001");
        assert_eq!(record.full_name(), "Asha Verma");
    }

    #[test]
    fn test_numeric_cells_deserialize() {
        let raw: RecordRow = serde_json::from_value(serde_json::json!({
            "caseNumber": 1001,
            "firstName": "Asha",
            "contactNumber": 9876543210u64,
            "pincode": 560001,
            "email": null
        }))
        .unwrap();
        assert_eq!(raw.case_number.as_deref(), Some("1001"));
        assert_eq!(raw.contact_number.as_deref(), Some("9876543210"));
        assert_eq!(raw.pincode.as_deref(), Some("560001"));
        assert_eq!(raw.email, None);
    }

    #[test]
    fn test_check_record_messages() {
        let mut raw = row("C1");
        raw.first_name = Some("   ".into());
        assert_eq!(check_record(&normalize_row(&raw)), Err("First Name is required"));

        let mut raw = row("C1");
        raw.contact_number = Some("12345".into());
        assert_eq!(
            check_record(&normalize_row(&raw)),
            Err("Contact Number must be numeric and exactly 10 digits")
        );

        let mut raw = row("C1");
        raw.pincode = Some("5600011".into());
        assert_eq!(
            check_record(&normalize_row(&raw)),
            Err("Pincode must be numeric and exactly 6 digits")
        );

        let mut raw = row("C1");
        raw.first_name = Some("Asha2".into());
        assert_eq!(
            check_record(&normalize_row(&raw)),
            Err("First Name contains invalid characters")
        );

        let mut raw = row("C1");
        raw.last_name = Some("D'Souza-Rao".into());
        assert_eq!(check_record(&normalize_row(&raw)), Ok(()));
    }

    #[test]
    fn test_validate_batch_reports_row_numbers() {
        let existing: HashSet<String> = ["C9".to_string()].into_iter().collect();
        let mut bad_phone = row("C3");
        bad_phone.contact_number = Some("abc".into());
        let rows = vec![row("C1"), row("C1"), bad_phone, row("C9"), RecordRow::default()];

        let outcome = validate_batch(&rows, &existing);
        assert!(!outcome.is_clean());
        assert_eq!(outcome.valid.len(), 1);
        assert_eq!(outcome.valid[0].row_number, 2);

        let report: Vec<(usize, &str)> = outcome
            .failed
            .iter()
            .map(|f| (f.row_number, f.error.as_str()))
            .collect();
        assert_eq!(
            report,
            vec![
                (3, "Duplicate Case Number in uploaded file"),
                (4, "Contact Number is required"),
                (5, "Case Number already exists in system"),
                (6, "Case Number is required"),
            ]
        );
        assert_eq!(outcome.failed[3].case_number, None);
    }

    #[test]
    fn test_clean_batch() {
        let outcome = validate_batch(&[row("A"), row("B")], &HashSet::new());
        assert!(outcome.is_clean());
        assert_eq!(outcome.valid.len(), 2);
    }

    #[test]
    fn test_password_policy() {
        assert!(password_violations("Secret@123", "a@b.com").is_empty());

        let errors = password_violations("short", "");
        assert!(errors.contains(&"Password must be at least 8 characters".to_string()));
        assert!(errors.contains(&"Password must contain at least 1 uppercase letter".to_string()));
        assert!(errors.contains(&"Password must contain at least 1 number".to_string()));
        assert!(errors.contains(&"Password must contain at least 1 special character (@$!%*?&)".to_string()));
        assert!(!errors.contains(&"Password must contain at least 1 lowercase letter".to_string()));

        let errors = password_violations("Ab1@x.co", "ab1@x.co");
        assert_eq!(errors, vec!["Password cannot be the same as email".to_string()]);

        let err = ensure_password_policy("weak", "").unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_contact_helpers() {
        assert!(is_valid_email("ops@vendor.in"));
        assert!(!is_valid_email("ops@vendor"));
        assert!(!is_valid_email("ops vendor@x.in"));
        assert!(is_valid_phone("9876543210"));
        assert!(!is_valid_phone("987654321"));
        assert_eq!(normalize_email("  Ops@Vendor.IN "), "ops@vendor.in");
    }
}
