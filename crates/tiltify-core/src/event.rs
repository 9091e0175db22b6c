//! Emitted donation events
//!
//! A [`DonationEvent`] is built fresh for every delivered donation and handed
//! to the [`EventSink`](crate::traits::EventSink). It serializes in the payload
//! shape host automations consume (`from`, `donationAmount`, `campaignInfo`, ...).

use serde::{Deserialize, Serialize};

use crate::model::{CampaignContext, Donation, DonationId};

/// Event source id used on the host event bus
pub const EVENT_SOURCE_ID: &str = "tiltify";

/// Event id of a delivered donation
pub const DONATION_EVENT_ID: &str = "donation";

/// Campaign snapshot embedded in every event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignInfo {
    pub name: String,
    pub cause: String,
    pub cause_legal_name: String,
    pub fundraising_goal: f64,
    pub original_goal: f64,
    pub supporting_raised: f64,
    pub amount_raised: f64,
    pub total_raised: f64,
}

impl From<&CampaignContext> for CampaignInfo {
    fn from(context: &CampaignContext) -> Self {
        Self {
            name: context.campaign_name.clone(),
            cause: context.cause_name.clone(),
            cause_legal_name: context.cause_legal_name.clone(),
            fundraising_goal: context.fundraising_goal,
            original_goal: context.original_goal,
            supporting_raised: context.supporting_raised,
            amount_raised: context.amount_raised,
            total_raised: context.total_raised,
        }
    }
}

/// A donation delivered exactly once per identifier (at-least-once across crashes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationEvent {
    /// Identifier of the source donation, for idempotent consumers
    pub donation_id: DonationId,
    /// Payer display name
    pub from: String,
    pub donation_amount: f64,
    pub comment: Option<String>,
    pub reward_id: Option<i64>,
    pub poll_option_id: Option<i64>,
    pub challenge_id: Option<i64>,
    /// Completion time, milliseconds since the Unix epoch
    pub completed_at: i64,
    pub campaign_info: CampaignInfo,
}

impl DonationEvent {
    /// Build the event for `donation`, enriched with `context`
    pub fn new(donation: &Donation, context: &CampaignContext) -> Self {
        Self {
            donation_id: donation.id,
            from: donation.name.clone(),
            donation_amount: donation.amount,
            comment: donation.comment.clone(),
            reward_id: donation.reward_id,
            poll_option_id: donation.poll_option_id,
            challenge_id: donation.challenge_id,
            completed_at: donation.completed_at,
            campaign_info: CampaignInfo::from(context),
        }
    }

    /// Sample payload used for manually triggered test events
    pub fn sample() -> Self {
        Self {
            donation_id: 0,
            from: "Tiltify".to_string(),
            donation_amount: 4.2,
            comment: Some("Thanks for the stream!".to_string()),
            reward_id: None,
            poll_option_id: None,
            challenge_id: None,
            completed_at: 0,
            campaign_info: CampaignInfo {
                name: "My Campaign".to_string(),
                cause: "Save the Children".to_string(),
                cause_legal_name: "Save the Children Inc".to_string(),
                fundraising_goal: 1000.0,
                original_goal: 500.0,
                supporting_raised: 500.0,
                amount_raised: 1000.0,
                total_raised: 1500.0,
            },
        }
    }
}

/// Description of one event a source can emit
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub cached: bool,
    pub manual_metadata: DonationEvent,
}

/// Description of the event source registered with the host
#[derive(Debug, Clone, Serialize)]
pub struct EventSourceDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub events: Vec<EventDefinition>,
}

/// The `tiltify` event source with its single `donation` event
pub fn event_source_definition() -> EventSourceDefinition {
    EventSourceDefinition {
        id: EVENT_SOURCE_ID,
        name: "Tiltify",
        events: vec![EventDefinition {
            id: DONATION_EVENT_ID,
            name: "Donation",
            description: "When someone donates to you via Tiltify.",
            cached: false,
            manual_metadata: DonationEvent::sample(),
        }],
    }
}
