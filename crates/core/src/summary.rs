use std::fmt::Write as _;

use crate::domain::record::ClientRecord;
use crate::schema::{section_applies, Section};

const SUMMARY_HEADER: &str = "Here's a summary of the information you've provided:";

/// Renders the record for confirmation. The output only depends on the record,
/// so the same record always produces the same text.
pub fn summarize(record: &ClientRecord) -> String {
    let mut summary = String::new();
    summary.push_str(SUMMARY_HEADER);
    summary.push_str("\n\n");

    let blocks = Section::ALL
        .into_iter()
        .filter(|section| section_applies(*section, record))
        .map(|section| render_section(section, record))
        .collect::<Vec<_>>();
    summary.push_str(&blocks.join("\n"));

    summary
}

fn render_section(section: Section, record: &ClientRecord) -> String {
    let mut block = format!("{}:\n", section.label());

    for spec in section.fields() {
        let Some(value) = record.get(spec.name) else {
            continue;
        };
        // Pre-approval is shown whenever it was answered, including "No".
        if spec.name != "pre_approval" && !value.is_truthy() {
            continue;
        }
        let _ = writeln!(block, "- {}: {value}", spec.label);
    }

    block
}

#[cfg(test)]
mod tests {
    use crate::domain::record::ClientRecord;

    use super::summarize;

    #[test]
    fn buyer_summary_is_stable() {
        let record = ClientRecord::new()
            .with("full_name", "Jane Doe")
            .with("email", "jane@x.com")
            .with("phone", "+15551234567")
            .with("preferred_contact", "email")
            .with("transaction_type", "buy")
            .with("timeline", "3 months")
            .with("budget", "$450k")
            .with("location", "Downtown")
            .with("bedrooms", 3u32)
            .with("property_type", "condo")
            .with("pre_approval", false)
            .with("payment_method", "loan")
            .with("pets", "one dog");

        let expected = "Here's a summary of the information you've provided:\n\n\
Contact Information:\n\
- Name: Jane Doe\n\
- Email: jane@x.com\n\
- Phone: +15551234567\n\
- Preferred Contact Method: email\n\
\n\
Property Goals:\n\
- Transaction Type: buy\n\
- Timeline: 3 months\n\
- Budget/Target Price: $450k\n\
\n\
Search Criteria:\n\
- Location: Downtown\n\
- Bedrooms: 3\n\
- Property Type: condo\n\
\n\
Financing:\n\
- Pre-Approved: No\n\
- Payment Method: loan\n\
\n\
Additional Information:\n\
- Pets: one dog\n";

        assert_eq!(summarize(&record), expected);
        assert_eq!(summarize(&record), summarize(&record.clone()));
    }

    #[test]
    fn rent_summary_omits_financing() {
        let record = ClientRecord::new()
            .with("transaction_type", "rent")
            .with("pre_approval", true)
            .with("payment_method", "cash")
            .with("location", "Midtown");
        let summary = summarize(&record);

        assert!(!summary.contains("Financing:"));
        assert!(!summary.contains("Payment Method"));
        assert!(summary.contains("Search Criteria:\n- Location: Midtown\n"));
    }

    #[test]
    fn sell_summary_omits_search_criteria_and_financing() {
        let record = ClientRecord::new().with("transaction_type", "sell").with("location", "Uptown");
        let summary = summarize(&record);

        assert!(!summary.contains("Search Criteria:"));
        assert!(!summary.contains("Financing:"));
        assert!(summary.ends_with("Additional Information:\n"));
    }

    #[test]
    fn empty_values_are_not_rendered() {
        let record = ClientRecord::new().with("full_name", "").with("email", "a@b.com");
        let summary = summarize(&record);

        assert!(!summary.contains("- Name:"));
        assert!(summary.contains("- Email: a@b.com\n"));
    }
}
