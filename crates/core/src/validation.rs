//! Section validation and clarification questions.
//!
//! Validation failures are not errors: an empty [`ValidationReport`] means the
//! intake is complete, anything else is the list of things still to ask.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::record::ClientRecord;
use crate::schema::{section_applies, Section};

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";
const PHONE_PATTERN: &str = r"^\+?[0-9]{10,15}$";

const CONTACT_METHODS: [&str; 3] = ["email", "phone", "text"];
const TRANSACTION_TYPES: [&str; 3] = ["buy", "sell", "rent"];
const TIMEFRAME_TERMS: [&str; 7] = ["day", "week", "month", "year", "asap", "soon", "immediately"];
const PAYMENT_METHODS: [&str; 4] = ["cash", "loan", "mortgage", "financing"];

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

fn phone_regex() -> Option<&'static Regex> {
    static PHONE: OnceLock<Option<Regex>> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(PHONE_PATTERN).ok()).as_ref()
}

fn matches_pattern(regex: Option<&Regex>, value: &str) -> bool {
    regex.map(|regex| regex.is_match(value)).unwrap_or(false)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub section: Section,
    pub description: String,
}

/// Issues per section, only for sections that have any. Iteration follows
/// schema section order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationReport {
    sections: BTreeMap<Section, Vec<String>>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, section: Section) -> Option<&[String]> {
        self.sections.get(&section).map(Vec::as_slice)
    }

    pub fn sections(&self) -> impl Iterator<Item = (Section, &[String])> {
        self.sections.iter().map(|(section, issues)| (*section, issues.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn issues(&self) -> Vec<ValidationIssue> {
        self.sections()
            .flat_map(|(section, issues)| {
                issues.iter().map(move |description| ValidationIssue {
                    section,
                    description: description.clone(),
                })
            })
            .collect()
    }

    fn insert(&mut self, section: Section, issues: Vec<String>) {
        if !issues.is_empty() {
            self.sections.insert(section, issues);
        }
    }
}

pub fn validate_contact_info(record: &ClientRecord) -> Vec<String> {
    let mut issues = Vec::new();

    match record.text("full_name") {
        None => issues.push("Full name is missing".to_string()),
        Some(name) if name.chars().count() < 3 => {
            issues.push("Full name seems too short".to_string())
        }
        Some(_) => {}
    }

    match record.text("email") {
        None => issues.push("Email address is missing".to_string()),
        Some(email) if !matches_pattern(email_regex(), &email) => {
            issues.push("Email address format appears invalid".to_string())
        }
        Some(_) => {}
    }

    match record.text("phone") {
        None => issues.push("Phone number is missing".to_string()),
        Some(phone) if !matches_pattern(phone_regex(), &phone) => {
            issues.push("Phone number format appears invalid".to_string())
        }
        Some(_) => {}
    }

    match record.text("preferred_contact") {
        None => issues.push("Preferred contact method is missing".to_string()),
        Some(method) if !CONTACT_METHODS.contains(&method.to_lowercase().as_str()) => {
            issues.push("Preferred contact method should be email, phone, or text".to_string())
        }
        Some(_) => {}
    }

    issues
}

pub fn validate_property_goals(record: &ClientRecord) -> Vec<String> {
    let mut issues = Vec::new();

    match record.text("transaction_type") {
        None => issues.push("Transaction type (buy/sell/rent) is missing".to_string()),
        Some(kind) if !TRANSACTION_TYPES.contains(&kind.to_lowercase().as_str()) => {
            issues.push("Transaction type should be buy, sell, or rent".to_string())
        }
        Some(_) => {}
    }

    match record.text("timeline") {
        None => issues.push("Timeline information is missing".to_string()),
        Some(timeline) => {
            let timeline = timeline.to_lowercase();
            if !TIMEFRAME_TERMS.iter().any(|term| timeline.contains(term)) {
                issues.push("Timeline information needs clarification with a timeframe".to_string());
            }
        }
    }

    if !record.has_value("budget") {
        issues.push("Budget or target price information is missing".to_string());
    }

    issues
}

pub fn validate_search_criteria(record: &ClientRecord) -> Vec<String> {
    let mut issues = Vec::new();
    if !section_applies(Section::SearchCriteria, record) {
        return issues;
    }

    if !record.has_value("location") {
        issues.push("Location preference is missing".to_string());
    }
    if !record.has_value("bedrooms") {
        issues.push("Number of bedrooms preference is missing".to_string());
    }
    if !record.has_value("property_type") {
        issues.push("Property type preference is missing".to_string());
    }

    issues
}

pub fn validate_financing(record: &ClientRecord) -> Vec<String> {
    let mut issues = Vec::new();
    if !section_applies(Section::Financing, record) {
        return issues;
    }

    if !record.contains("pre_approval") {
        issues.push("Pre-approval status is missing".to_string());
    }

    match record.text("payment_method") {
        None => issues.push("Payment method (cash/loan) is missing".to_string()),
        Some(method) if !PAYMENT_METHODS.contains(&method.to_lowercase().as_str()) => issues.push(
            "Payment method should indicate cash or some form of financing/loan".to_string(),
        ),
        Some(_) => {}
    }

    issues
}

pub fn validate_all(record: &ClientRecord) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.insert(Section::ContactInformation, validate_contact_info(record));
    report.insert(Section::PropertyGoals, validate_property_goals(record));
    report.insert(Section::SearchCriteria, validate_search_criteria(record));
    report.insert(Section::Financing, validate_financing(record));
    report
}

/// One question per issue, in section order then issue order.
pub fn generate_clarification_questions(report: &ValidationReport) -> Vec<String> {
    report
        .sections()
        .flat_map(|(section, issues)| issues.iter().map(move |issue| question_for(section, issue)))
        .collect()
}

fn question_for(section: Section, issue: &str) -> String {
    let lowered = issue.to_lowercase();

    if lowered.contains("missing") {
        let field = leading_part(&lowered, " is ");
        format!("I don't think I caught your {field}. Could you please provide that information?")
    } else if lowered.contains("invalid") || lowered.contains("format") {
        let field = leading_part(&lowered, " format");
        format!(
            "The {field} you provided doesn't seem to be in the right format. Could you please verify it?"
        )
    } else if lowered.contains("clarification") {
        let field = leading_part(&lowered, " needs ");
        format!("Could you please provide more specific details about your {field}?")
    } else {
        format!(
            "Regarding {}, {lowered}. Could you please clarify?",
            section.label().to_lowercase()
        )
    }
}

fn leading_part<'a>(text: &'a str, separator: &str) -> &'a str {
    text.split(separator).next().unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use crate::domain::record::ClientRecord;
    use crate::schema::Section;

    use super::{
        generate_clarification_questions, validate_all, validate_contact_info, validate_financing,
        validate_property_goals,
    };

    fn complete_buyer() -> ClientRecord {
        ClientRecord::new()
            .with("full_name", "Jane Doe")
            .with("email", "jane@x.com")
            .with("phone", "+15551234567")
            .with("preferred_contact", "Email")
            .with("transaction_type", "buy")
            .with("timeline", "within 3 months")
            .with("budget", "$450,000")
            .with("location", "Downtown")
            .with("bedrooms", 3u32)
            .with("property_type", "condo")
            .with("pre_approval", false)
            .with("payment_method", "mortgage")
    }

    fn renter() -> ClientRecord {
        ClientRecord::new()
            .with("full_name", "Jane Doe")
            .with("email", "jane@x.com")
            .with("phone", "+15551234567")
            .with("preferred_contact", "email")
            .with("transaction_type", "rent")
            .with("timeline", "next month")
            .with("budget", "$2000")
            .with("location", "Downtown")
            .with("bedrooms", 2u32)
            .with("property_type", "apartment")
    }

    #[test]
    fn complete_buyer_record_is_valid() {
        let report = validate_all(&complete_buyer());
        assert!(report.is_valid(), "unexpected issues: {report:?}");
    }

    #[test]
    fn renter_record_skips_financing() {
        let report = validate_all(&renter());
        assert!(report.is_empty(), "unexpected issues: {report:?}");
    }

    #[test]
    fn empty_record_reports_unconditional_sections() {
        let report = validate_all(&ClientRecord::new());

        assert_eq!(report.len(), 2, "criteria and financing need a transaction type first");
        assert_eq!(report.section(Section::ContactInformation).map(<[String]>::len), Some(4));
        assert_eq!(report.section(Section::PropertyGoals).map(<[String]>::len), Some(3));
    }

    #[test]
    fn empty_buyer_record_reports_every_section() {
        let report = validate_all(&ClientRecord::new().with("transaction_type", "buy"));

        let sections = report.sections().map(|(section, _)| section).collect::<Vec<_>>();
        assert_eq!(
            sections,
            vec![
                Section::ContactInformation,
                Section::PropertyGoals,
                Section::SearchCriteria,
                Section::Financing
            ]
        );
        for (_, issues) in report.sections() {
            assert!(issues.iter().all(|issue| issue.contains("missing")));
        }
    }

    #[test]
    fn missing_required_field_mentions_missing() {
        for field in ["full_name", "email", "phone", "preferred_contact"] {
            let record = complete_buyer()
                .iter()
                .filter(|(name, _)| *name != field)
                .fold(ClientRecord::new(), |acc, (name, value)| acc.with(name, value.clone()));

            let report = validate_all(&record);
            let issues = report.section(Section::ContactInformation).unwrap_or_default();
            assert!(
                issues.iter().any(|issue| issue.contains("missing")),
                "{field} should be reported missing"
            );
        }
    }

    #[test]
    fn email_format_rules() {
        let valid = ClientRecord::new().with("email", "a@b.com");
        assert!(!validate_contact_info(&valid).iter().any(|issue| issue.starts_with("Email")));

        let invalid = ClientRecord::new().with("email", "not-an-email");
        let issues = validate_contact_info(&invalid);
        assert!(issues.contains(&"Email address format appears invalid".to_string()));
    }

    #[test]
    fn phone_format_rules() {
        let valid = ClientRecord::new().with("phone", "+12345678901");
        assert!(!validate_contact_info(&valid).iter().any(|issue| issue.starts_with("Phone")));

        let invalid = ClientRecord::new().with("phone", "123");
        let issues = validate_contact_info(&invalid);
        assert!(issues.contains(&"Phone number format appears invalid".to_string()));
    }

    #[test]
    fn short_name_and_unknown_contact_method_are_flagged() {
        let record = ClientRecord::new().with("full_name", "Jo").with("preferred_contact", "fax");
        let issues = validate_contact_info(&record);

        assert!(issues.contains(&"Full name seems too short".to_string()));
        assert!(issues
            .contains(&"Preferred contact method should be email, phone, or text".to_string()));
    }

    #[test]
    fn timeline_needs_a_timeframe() {
        let record = ClientRecord::new()
            .with("transaction_type", "sell")
            .with("timeline", "whenever")
            .with("budget", "$300k");
        assert_eq!(
            validate_property_goals(&record),
            vec!["Timeline information needs clarification with a timeframe".to_string()]
        );

        let record = record.with("timeline", "ASAP");
        assert!(validate_property_goals(&record).is_empty());
    }

    #[test]
    fn financing_accepts_any_pre_approval_value_but_checks_payment_method() {
        let record = ClientRecord::new()
            .with("transaction_type", "buy")
            .with("pre_approval", false)
            .with("payment_method", "barter");
        assert_eq!(
            validate_financing(&record),
            vec!["Payment method should indicate cash or some form of financing/loan".to_string()]
        );
    }

    #[test]
    fn clarification_questions_follow_issue_order() {
        let record = ClientRecord::new()
            .with("full_name", "Jo")
            .with("email", "not-an-email")
            .with("preferred_contact", "email")
            .with("transaction_type", "sell")
            .with("timeline", "whenever")
            .with("budget", "$1m");
        let report = validate_all(&record);
        let questions = generate_clarification_questions(&report);

        assert_eq!(
            questions,
            vec![
                "Regarding contact information, full name seems too short. Could you please clarify?"
                    .to_string(),
                "The email address you provided doesn't seem to be in the right format. Could you please verify it?"
                    .to_string(),
                "I don't think I caught your phone number. Could you please provide that information?"
                    .to_string(),
                "The timeline information needs clarification with a timeframe you provided doesn't seem to be in the right format. Could you please verify it?"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn format_substring_takes_precedence_over_clarification() {
        let record = ClientRecord::new()
            .with("full_name", "Jane Doe")
            .with("email", "jane@x.com")
            .with("phone", "+15551234567")
            .with("preferred_contact", "phone")
            .with("transaction_type", "sell")
            .with("timeline", "whenever")
            .with("budget", "$450k");
        let questions = generate_clarification_questions(&validate_all(&record));

        // "information" contains "format", so this issue takes the format template.
        assert_eq!(
            questions,
            vec![
                "The timeline information needs clarification with a timeframe you provided doesn't seem to be in the right format. Could you please verify it?"
                    .to_string()
            ]
        );
    }

    #[test]
    fn one_question_per_issue_for_empty_record() {
        let report = validate_all(&ClientRecord::new().with("transaction_type", "buy"));
        let questions = generate_clarification_questions(&report);
        let issue_count = report.issues().len();

        assert_eq!(questions.len(), issue_count);
        assert_eq!(
            questions.first().map(String::as_str),
            Some(
                "I don't think I caught your full name. Could you please provide that information?"
            )
        );
        assert_eq!(
            questions.last().map(String::as_str),
            Some(
                "I don't think I caught your payment method (cash/loan). Could you please provide that information?"
            )
        );
    }
}
