//! Approximate API usage and cost accounting.
//!
//! Prices are static per-unit rates. They are good enough for a running
//! estimate and are not billing data.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type UsageMetadata = BTreeMap<String, String>;

const UNKNOWN_PROVIDER: &str = "unknown";

fn openai_input_rate(model: &str) -> Option<Decimal> {
    (model == "gpt-4o-mini").then(|| Decimal::new(15, 5))
}

fn openai_output_rate(model: &str) -> Option<Decimal> {
    (model == "gpt-4o-mini").then(|| Decimal::new(60, 5))
}

fn openai_tts_rate() -> Decimal {
    Decimal::new(15, 6)
}

fn deepgram_rate() -> Decimal {
    Decimal::new(25, 5)
}

fn cartesia_tts_rate() -> Decimal {
    Decimal::new(10, 6)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Llm,
    SpeechToText,
    TextToSpeech,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub session_id: Option<String>,
    pub kind: UsageKind,
    pub provider: String,
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub audio_seconds: f64,
    pub characters: u64,
    pub cost: Decimal,
    pub metadata: UsageMetadata,
}

impl UsageRecord {
    fn new(session_id: Option<&str>, kind: UsageKind, provider: &str, model: &str) -> Self {
        Self {
            session_id: session_id.map(str::to_owned),
            kind,
            provider: provider.to_owned(),
            model: model.to_owned(),
            timestamp: Utc::now(),
            input_tokens: 0,
            output_tokens: 0,
            audio_seconds: 0.0,
            characters: 0,
            cost: Decimal::ZERO,
            metadata: UsageMetadata::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub session_id: Option<String>,
    pub call_count: usize,
    pub total_cost: Decimal,
    pub costs_by_provider: BTreeMap<String, Decimal>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_audio_seconds: f64,
    pub total_characters: u64,
}

impl UsageSummary {
    pub fn cost_summary(&self) -> CostSummary {
        let mut total_cost = self.total_cost.round_dp(4);
        total_cost.rescale(4);
        CostSummary {
            total_cost: format!("${total_cost}"),
            audio_seconds: format!("{:.1}s", self.total_audio_seconds),
            tokens: (self.total_input_tokens + self.total_output_tokens).to_string(),
            characters: self.total_characters.to_string(),
        }
    }
}

/// Display-ready totals returned by the cost-summary endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_cost: String,
    pub audio_seconds: String,
    pub tokens: String,
    pub characters: String,
}

impl Default for CostSummary {
    fn default() -> Self {
        UsageSummary {
            session_id: None,
            call_count: 0,
            total_cost: Decimal::ZERO,
            costs_by_provider: BTreeMap::new(),
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_audio_seconds: 0.0,
            total_characters: 0,
        }
        .cost_summary()
    }
}

/// Mutex-guarded usage log. The server shares one instance across all
/// sessions.
#[derive(Debug, Default)]
pub struct UsageTracker {
    records: Mutex<Vec<UsageRecord>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_llm(
        &self,
        session_id: Option<&str>,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        metadata: UsageMetadata,
    ) -> UsageRecord {
        let is_openai = model.contains("openai") || openai_input_rate(model).is_some();
        let provider = if is_openai { "openai" } else { UNKNOWN_PROVIDER };
        let mut record = UsageRecord::new(session_id, UsageKind::Llm, provider, model);
        record.input_tokens = input_tokens;
        record.output_tokens = output_tokens;
        if is_openai {
            let input_rate = openai_input_rate(model).unwrap_or(Decimal::ZERO);
            let output_rate = openai_output_rate(model).unwrap_or(Decimal::ZERO);
            record.cost =
                Decimal::from(input_tokens) * input_rate + Decimal::from(output_tokens) * output_rate;
        }
        record.metadata = metadata;
        self.push(record)
    }

    pub fn track_stt(
        &self,
        session_id: Option<&str>,
        model: &str,
        audio_seconds: f64,
        metadata: UsageMetadata,
    ) -> UsageRecord {
        let is_deepgram = model.contains("deepgram") || model == "nova-2";
        let provider = if is_deepgram { "deepgram" } else { UNKNOWN_PROVIDER };
        let mut record = UsageRecord::new(session_id, UsageKind::SpeechToText, provider, model);
        record.audio_seconds = audio_seconds.max(0.0);
        if is_deepgram {
            let seconds = Decimal::from_f64(record.audio_seconds).unwrap_or(Decimal::ZERO);
            record.cost = seconds * deepgram_rate();
        }
        record.metadata = metadata;
        self.push(record)
    }

    pub fn track_tts(
        &self,
        session_id: Option<&str>,
        model: &str,
        characters: u64,
        metadata: UsageMetadata,
    ) -> UsageRecord {
        let is_openai = model == "tts-1" || (model.contains("openai") && model.contains("tts"));
        let (provider, rate) = if is_openai {
            ("openai", openai_tts_rate())
        } else if model.contains("cartesia") {
            ("cartesia", cartesia_tts_rate())
        } else {
            (UNKNOWN_PROVIDER, Decimal::ZERO)
        };
        let mut record = UsageRecord::new(session_id, UsageKind::TextToSpeech, provider, model);
        record.characters = characters;
        record.cost = Decimal::from(characters) * rate;
        record.metadata = metadata;
        self.push(record)
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn total_cost(&self) -> Decimal {
        self.records().iter().map(|record| record.cost).sum()
    }

    pub fn cost_by_provider(&self) -> BTreeMap<String, Decimal> {
        let mut costs = BTreeMap::new();
        for record in self.records() {
            *costs.entry(record.provider).or_insert(Decimal::ZERO) += record.cost;
        }
        costs
    }

    /// Totals over every record, or only the records of `session_id`.
    pub fn summary(&self, session_id: Option<&str>) -> UsageSummary {
        let records = self
            .records()
            .into_iter()
            .filter(|record| match session_id {
                Some(id) => record.session_id.as_deref() == Some(id),
                None => true,
            })
            .collect::<Vec<_>>();

        let mut costs_by_provider = BTreeMap::new();
        for record in &records {
            *costs_by_provider.entry(record.provider.clone()).or_insert(Decimal::ZERO) +=
                record.cost;
        }

        UsageSummary {
            session_id: session_id.map(str::to_owned),
            call_count: records.len(),
            total_cost: records.iter().map(|record| record.cost).sum(),
            costs_by_provider,
            total_input_tokens: records.iter().map(|record| record.input_tokens).sum(),
            total_output_tokens: records.iter().map(|record| record.output_tokens).sum(),
            total_audio_seconds: records.iter().map(|record| record.audio_seconds).sum(),
            total_characters: records.iter().map(|record| record.characters).sum(),
        }
    }

    fn push(&self, record: UsageRecord) -> UsageRecord {
        tracing::info!(
            event_name = "usage.tracked",
            session_id = record.session_id.as_deref().unwrap_or(""),
            kind = ?record.kind,
            provider = %record.provider,
            model = %record.model,
            cost = %record.cost,
            "tracked api usage"
        );
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }
        record
    }
}
