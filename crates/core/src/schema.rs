//! Intake sections and the fields collected in each of them.
//!
//! The table is static and read-only. Validation and summaries group fields
//! by [`Section`], the extractor resolves context keys through each field's
//! aliases, and front-ends walk it to decide which prompt to ask next.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::record::ClientRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Section {
    #[serde(rename = "Contact Information")]
    ContactInformation,
    #[serde(rename = "Property Goals")]
    PropertyGoals,
    #[serde(rename = "Search Criteria")]
    SearchCriteria,
    #[serde(rename = "Financing")]
    Financing,
    #[serde(rename = "Additional Information")]
    AdditionalInformation,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::ContactInformation,
        Section::PropertyGoals,
        Section::SearchCriteria,
        Section::Financing,
        Section::AdditionalInformation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::ContactInformation => "Contact Information",
            Self::PropertyGoals => "Property Goals",
            Self::SearchCriteria => "Search Criteria",
            Self::Financing => "Financing",
            Self::AdditionalInformation => "Additional Information",
        }
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            Self::ContactInformation => CONTACT_FIELDS,
            Self::PropertyGoals => GOAL_FIELDS,
            Self::SearchCriteria => CRITERIA_FIELDS,
            Self::Financing => FINANCING_FIELDS,
            Self::AdditionalInformation => ADDITIONAL_FIELDS,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Question asked when the field is still missing.
    pub prompt: &'static str,
    pub follow_up: &'static [&'static str],
    /// Label used in confirmation summaries.
    pub label: &'static str,
    /// Context keys checked by the extractor, highest priority first.
    pub aliases: &'static [&'static str],
}

const CONTACT_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "full_name",
        prompt: "Full name",
        follow_up: &[],
        label: "Name",
        aliases: &["name", "full_name"],
    },
    FieldSpec {
        name: "email",
        prompt: "Email address",
        follow_up: &[],
        label: "Email",
        aliases: &["email"],
    },
    FieldSpec {
        name: "phone",
        prompt: "Phone number",
        follow_up: &[],
        label: "Phone",
        aliases: &["phone", "phone_number"],
    },
    FieldSpec {
        name: "preferred_contact",
        prompt: "Preferred contact method (email, phone, text)",
        follow_up: &["What's the best time to reach you?"],
        label: "Preferred Contact Method",
        aliases: &["preferred_contact"],
    },
];

const GOAL_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "transaction_type",
        prompt: "Are you looking to buy, sell, or rent a property?",
        follow_up: &["Is this your first time buying/selling/renting?"],
        label: "Transaction Type",
        aliases: &["transaction_type"],
    },
    FieldSpec {
        name: "timeline",
        prompt: "What's your timeline for moving in or completing the transaction?",
        follow_up: &["Is there a specific reason for this timeline?"],
        label: "Timeline",
        aliases: &["timeline"],
    },
    FieldSpec {
        name: "budget",
        prompt: "What's your budget or target price range?",
        follow_up: &["How flexible are you with this budget?"],
        label: "Budget/Target Price",
        aliases: &["budget", "price_range"],
    },
];

const CRITERIA_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "location",
        prompt: "What areas or neighborhoods are you interested in?",
        follow_up: &["Are you open to considering other areas?"],
        label: "Location",
        aliases: &["location", "area", "neighborhood"],
    },
    FieldSpec {
        name: "bedrooms",
        prompt: "How many bedrooms are you looking for?",
        follow_up: &[],
        label: "Bedrooms",
        aliases: &["bedrooms"],
    },
    FieldSpec {
        name: "property_type",
        prompt: "What type of property are you interested in? (house, condo, townhouse, etc.)",
        follow_up: &[],
        label: "Property Type",
        aliases: &["property_type"],
    },
    FieldSpec {
        name: "must_haves",
        prompt: "What features are must-haves for your new property?",
        follow_up: &["Are there any deal-breakers we should know about?"],
        label: "Must-Have Features",
        aliases: &["must_haves", "requirements"],
    },
];

const FINANCING_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "pre_approval",
        prompt: "Have you been pre-approved for a mortgage?",
        follow_up: &["Would you like a referral to a trusted mortgage broker?"],
        label: "Pre-Approved",
        aliases: &["pre_approval"],
    },
    FieldSpec {
        name: "payment_method",
        prompt: "Will you be paying with cash or financing with a loan?",
        follow_up: &[],
        label: "Payment Method",
        aliases: &["payment_method"],
    },
];

const ADDITIONAL_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "pets",
        prompt: "Do you have any pets that will be living with you?",
        follow_up: &["What type and how many?"],
        label: "Pets",
        aliases: &["pets"],
    },
    FieldSpec {
        name: "accessibility",
        prompt: "Do you have any accessibility requirements?",
        follow_up: &[],
        label: "Accessibility Requirements",
        aliases: &["accessibility"],
    },
    FieldSpec {
        name: "urgency",
        prompt: "How urgent is your need to buy/sell/rent?",
        follow_up: &[],
        label: "Urgency Level",
        aliases: &["urgency"],
    },
    FieldSpec {
        name: "additional_notes",
        prompt: "Is there anything else you'd like us to know about your situation or requirements?",
        follow_up: &[],
        label: "Additional Notes",
        aliases: &["additional_notes", "notes"],
    },
];

/// All fields in schema order.
pub fn all_fields() -> impl Iterator<Item = (Section, &'static FieldSpec)> {
    Section::ALL.into_iter().flat_map(|section| section.fields().iter().map(move |f| (section, f)))
}

pub fn field(name: &str) -> Option<&'static FieldSpec> {
    all_fields().map(|(_, spec)| spec).find(|spec| spec.name == name)
}

/// Whether a section applies for the given transaction type. Search criteria
/// only matter when buying or renting, financing only when buying.
pub fn section_applies(section: Section, record: &ClientRecord) -> bool {
    let transaction_type = record.normalized("transaction_type");
    match section {
        Section::SearchCriteria => matches!(transaction_type.as_str(), "buy" | "rent"),
        Section::Financing => transaction_type == "buy",
        _ => true,
    }
}

/// First applicable field, in schema order, that has not been collected yet.
/// `pre_approval` counts as collected as soon as the key exists.
pub fn next_missing_field(record: &ClientRecord) -> Option<&'static FieldSpec> {
    all_fields()
        .filter(|(section, _)| section_applies(*section, record))
        .map(|(_, spec)| spec)
        .find(|spec| {
            if spec.name == "pre_approval" {
                !record.contains(spec.name)
            } else {
                !record.has_value(spec.name)
            }
        })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::domain::record::ClientRecord;

    use super::{all_fields, field, next_missing_field, Section};

    #[test]
    fn field_names_are_globally_unique() {
        let mut seen = BTreeSet::new();
        for (_, spec) in all_fields() {
            assert!(seen.insert(spec.name), "duplicate field name: {}", spec.name);
        }
        assert_eq!(seen.len(), 17);
    }

    #[test]
    fn sections_keep_declared_order() {
        let labels = Section::ALL.iter().map(Section::label).collect::<Vec<_>>();
        assert_eq!(
            labels,
            vec![
                "Contact Information",
                "Property Goals",
                "Search Criteria",
                "Financing",
                "Additional Information"
            ]
        );
        assert_eq!(field("bedrooms").map(|spec| spec.label), Some("Bedrooms"));
    }

    #[test]
    fn next_missing_field_skips_sections_that_do_not_apply() {
        let record = ClientRecord::new()
            .with("full_name", "Jane Doe")
            .with("email", "jane@x.com")
            .with("phone", "+15551234567")
            .with("preferred_contact", "email")
            .with("transaction_type", "sell")
            .with("timeline", "next month")
            .with("budget", "$500k");

        let next = next_missing_field(&record).expect("additional info still missing");
        assert_eq!(next.name, "pets");
    }

    #[test]
    fn next_missing_field_starts_with_contact_details() {
        let next = next_missing_field(&ClientRecord::new()).expect("field");
        assert_eq!(next.name, "full_name");
    }

    #[test]
    fn section_serializes_as_display_name() {
        let value = serde_json::to_value(Section::PropertyGoals).expect("serialize");
        assert_eq!(value, serde_json::json!("Property Goals"));
    }
}
