//! Best-effort mapping of a conversation context onto the client record.
//!
//! This is dictionary lookup plus a keyword heuristic, not language
//! understanding. The keyword precedence below is intentional and must stay
//! as-is: a context mentioning both "buy" and "sell" resolves to "buy".

use serde_json::{Map, Value};

use crate::domain::record::{ClientRecord, FieldValue};
use crate::schema::all_fields;

/// Context keys and values collected during one conversation turn.
pub type ExtractionContext = Map<String, Value>;

const TRANSACTION_KEYWORDS: &[(&[&str], &str)] =
    &[(&["buy", "purchase"], "buy"), (&["sell"], "sell"), (&["rent"], "rent")];

const PAYMENT_KEYWORDS: &[(&[&str], &str)] =
    &[(&["cash"], "cash"), (&["loan", "mortgage", "financing"], "loan")];

const PRE_APPROVAL_KEYWORD: &str = "pre-approved";

/// Applies `context` to `record`. Missing, empty and non-scalar values are
/// skipped; nothing is ever removed from the record.
pub fn extract(record: &mut ClientRecord, context: &ExtractionContext) {
    let haystack = stringify_context(context);

    for (_, spec) in all_fields() {
        let matched = if spec.name == "pre_approval" {
            first_present(context, spec.aliases)
        } else {
            first_truthy(context, spec.aliases)
        };

        if let Some(value) = matched {
            record.set(spec.name, value);
            continue;
        }

        let inferred = match spec.name {
            "transaction_type" => {
                keyword_match(&haystack, TRANSACTION_KEYWORDS).map(FieldValue::from)
            }
            "payment_method" => keyword_match(&haystack, PAYMENT_KEYWORDS).map(FieldValue::from),
            "pre_approval" => {
                haystack.contains(PRE_APPROVAL_KEYWORD).then_some(FieldValue::Bool(true))
            }
            _ => None,
        };
        if let Some(value) = inferred {
            record.set(spec.name, value);
        }
    }
}

fn first_truthy(context: &ExtractionContext, aliases: &[&str]) -> Option<FieldValue> {
    aliases
        .iter()
        .filter_map(|alias| context.get(*alias).and_then(FieldValue::from_json))
        .find(FieldValue::is_truthy)
}

fn first_present(context: &ExtractionContext, aliases: &[&str]) -> Option<FieldValue> {
    aliases.iter().find_map(|alias| context.get(*alias).and_then(FieldValue::from_json))
}

fn keyword_match(haystack: &str, table: &[(&[&str], &'static str)]) -> Option<&'static str> {
    table
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| haystack.contains(keyword)))
        .map(|(_, value)| *value)
}

fn stringify_context(context: &ExtractionContext) -> String {
    serde_json::to_string(context).unwrap_or_default().to_lowercase()
}
