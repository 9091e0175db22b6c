//! Event filters
//!
//! Predicates that let a consumer react only to donations carrying a
//! particular reward, poll option or challenge. The selectable values come
//! from the lookup helpers in [`crate::lookups`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{DONATION_EVENT_ID, DonationEvent, EVENT_SOURCE_ID};

/// How a filter compares the event field with the configured value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonType {
    #[serde(rename = "is")]
    Is,
    #[serde(rename = "is not")]
    IsNot,
}

/// A filter as configured by the consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSettings {
    pub comparison_type: ComparisonType,
    /// The selected preset value; a number or a numeric string
    pub value: Value,
}

/// One selectable value of a preset filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetValue {
    pub value: i64,
    pub display: String,
}

/// The filters available on donation events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DonationFilter {
    Reward,
    PollOption,
    Challenge,
}

/// Reference to the event a filter applies to
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterEventRef {
    pub event_source_id: &'static str,
    pub event_id: &'static str,
}

/// Host-facing description of a filter
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub events: Vec<FilterEventRef>,
    pub comparison_types: Vec<ComparisonType>,
    pub value_type: &'static str,
}

impl DonationFilter {
    pub const ALL: [DonationFilter; 3] = [
        DonationFilter::Reward,
        DonationFilter::PollOption,
        DonationFilter::Challenge,
    ];

    /// Filter identifier as registered with the host
    pub fn id(&self) -> &'static str {
        match self {
            DonationFilter::Reward => "tcu:reward-id",
            DonationFilter::PollOption => "tcu:poll-option-id",
            DonationFilter::Challenge => "tcu:challenge-id",
        }
    }

    /// Look a filter up by its identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.id() == id)
    }

    pub fn definition(&self) -> FilterDefinition {
        let (name, description) = match self {
            DonationFilter::Reward => ("Tiltify Reward", "Filter by the Tiltify reward."),
            DonationFilter::PollOption => {
                ("Tiltify Poll Option", "Filter by the Tiltify poll option.")
            }
            DonationFilter::Challenge => ("Tiltify Challenge", "Filter by the Tiltify challenge."),
        };

        FilterDefinition {
            id: self.id(),
            name,
            description,
            events: vec![FilterEventRef {
                event_source_id: EVENT_SOURCE_ID,
                event_id: DONATION_EVENT_ID,
            }],
            comparison_types: vec![ComparisonType::Is, ComparisonType::IsNot],
            value_type: "preset",
        }
    }

    /// The event field this filter inspects
    pub fn field(&self, event: &DonationEvent) -> Option<i64> {
        match self {
            DonationFilter::Reward => event.reward_id,
            DonationFilter::PollOption => event.poll_option_id,
            DonationFilter::Challenge => event.challenge_id,
        }
    }

    /// Evaluate the filter against an event
    ///
    /// An event without the field never matches `is` and always matches
    /// `is not`.
    pub fn matches(&self, settings: &FilterSettings, event: &DonationEvent) -> bool {
        let equal = match (self.field(event), setting_id(&settings.value)) {
            (Some(field), Some(wanted)) => field == wanted,
            _ => false,
        };

        match settings.comparison_type {
            ComparisonType::Is => equal,
            ComparisonType::IsNot => !equal,
        }
    }
}

fn setting_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Descriptions of every donation filter
pub fn filter_definitions() -> Vec<FilterDefinition> {
    DonationFilter::ALL.iter().map(|f| f.definition()).collect()
}
