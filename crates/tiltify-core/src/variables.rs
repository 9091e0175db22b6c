//! Replace variables
//!
//! Named, read-only projections of a [`DonationEvent`] for use in consumer
//! templates. Every variable has a fallback that is returned when there is
//! no event, or when the field is empty.

use serde::Serialize;

use crate::event::DonationEvent;

/// Value produced by a replace variable
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VariableValue {
    Text(String),
    Number(f64),
}

impl std::fmt::Display for VariableValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableValue::Text(text) => f.write_str(text),
            VariableValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Output kind of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Text,
    Number,
}

/// The replace variables exposed for donation events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DonationVariable {
    From,
    Amount,
    RewardId,
    Comment,
    CampaignName,
    CampaignCause,
    CampaignCauseLegal,
    CampaignFundraisingGoal,
    CampaignOriginalGoal,
    CampaignSupportingRaised,
    CampaignRaised,
    CampaignTotalRaised,
}

/// Host-facing description of a variable
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDefinition {
    pub handle: &'static str,
    pub description: &'static str,
    pub possible_data_output: Vec<OutputKind>,
}

impl DonationVariable {
    pub const ALL: [DonationVariable; 12] = [
        DonationVariable::From,
        DonationVariable::Amount,
        DonationVariable::RewardId,
        DonationVariable::Comment,
        DonationVariable::CampaignName,
        DonationVariable::CampaignCause,
        DonationVariable::CampaignCauseLegal,
        DonationVariable::CampaignFundraisingGoal,
        DonationVariable::CampaignOriginalGoal,
        DonationVariable::CampaignSupportingRaised,
        DonationVariable::CampaignRaised,
        DonationVariable::CampaignTotalRaised,
    ];

    pub fn handle(&self) -> &'static str {
        match self {
            DonationVariable::From => "tiltifyDonationFrom",
            DonationVariable::Amount => "tiltifyDonationAmount",
            DonationVariable::RewardId => "tiltifyDonationRewardId",
            DonationVariable::Comment => "tiltifyDonationComment",
            DonationVariable::CampaignName => "tiltifyDonationCampaignName",
            DonationVariable::CampaignCause => "tiltifyDonationCampaignCause",
            DonationVariable::CampaignCauseLegal => "tiltifyDonationCampaignCauseLegal",
            DonationVariable::CampaignFundraisingGoal => "tiltifyDonationCampaignFundraisingGoal",
            DonationVariable::CampaignOriginalGoal => "tiltifyDonationCampaignOriginalGoal",
            DonationVariable::CampaignSupportingRaised => {
                "tiltifyDonationCampaignSupportingRaised"
            }
            DonationVariable::CampaignRaised => "tiltifyDonationCampaignRaised",
            DonationVariable::CampaignTotalRaised => "tiltifyDonationCampaignTotalRaised",
        }
    }

    pub fn from_handle(handle: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.handle() == handle)
    }

    pub fn description(&self) -> &'static str {
        match self {
            DonationVariable::From => "The name of who sent a Tiltify donation",
            DonationVariable::Amount => "The amount of a donation from Tiltify",
            DonationVariable::RewardId => "The reward ID of a donation from Tiltify",
            DonationVariable::Comment => "The comment of a donation from Tiltify",
            DonationVariable::CampaignName => {
                "The name of the campaign that received a donation from Tiltify"
            }
            DonationVariable::CampaignCause => {
                "The cause of the campaign that received a donation from Tiltify"
            }
            DonationVariable::CampaignCauseLegal => {
                "The legal cause name of the campaign that received a donation from Tiltify"
            }
            DonationVariable::CampaignFundraisingGoal => {
                "The fundraising goal of the cause that received a donation from Tiltify"
            }
            DonationVariable::CampaignOriginalGoal => {
                "The original goal set by the fundraiser of the campaign that received a donation from Tiltify"
            }
            DonationVariable::CampaignSupportingRaised => {
                "The amount of money raised by supporting campaigns that received a donation from Tiltify"
            }
            DonationVariable::CampaignRaised => {
                "The amount of money raised by the campaign that received a donation from Tiltify"
            }
            DonationVariable::CampaignTotalRaised => {
                "The total amount of money raised by the cause that received a donation from Tiltify"
            }
        }
    }

    pub fn output_kind(&self) -> OutputKind {
        match self {
            DonationVariable::From
            | DonationVariable::Comment
            | DonationVariable::CampaignName
            | DonationVariable::CampaignCause
            | DonationVariable::CampaignCauseLegal => OutputKind::Text,
            _ => OutputKind::Number,
        }
    }

    /// Value when there is no event or the field is empty
    pub fn fallback(&self) -> VariableValue {
        match self {
            DonationVariable::From => VariableValue::Text("Unknown User".to_string()),
            DonationVariable::RewardId => VariableValue::Number(-1.0),
            _ => match self.output_kind() {
                OutputKind::Text => VariableValue::Text(String::new()),
                OutputKind::Number => VariableValue::Number(0.0),
            },
        }
    }

    pub fn definition(&self) -> VariableDefinition {
        VariableDefinition {
            handle: self.handle(),
            description: self.description(),
            possible_data_output: vec![self.output_kind()],
        }
    }

    /// Project the variable out of `event`
    pub fn evaluate(&self, event: Option<&DonationEvent>) -> VariableValue {
        let Some(event) = event else {
            return self.fallback();
        };
        let info = &event.campaign_info;

        let value = match self {
            DonationVariable::From => text(&event.from),
            DonationVariable::Amount => number(event.donation_amount),
            DonationVariable::RewardId => event.reward_id.and_then(|id| number(id as f64)),
            DonationVariable::Comment => event.comment.as_deref().and_then(text),
            DonationVariable::CampaignName => text(&info.name),
            DonationVariable::CampaignCause => text(&info.cause),
            DonationVariable::CampaignCauseLegal => text(&info.cause_legal_name),
            DonationVariable::CampaignFundraisingGoal => number(info.fundraising_goal),
            DonationVariable::CampaignOriginalGoal => number(info.original_goal),
            DonationVariable::CampaignSupportingRaised => number(info.supporting_raised),
            DonationVariable::CampaignRaised => number(info.amount_raised),
            DonationVariable::CampaignTotalRaised => number(info.total_raised),
        };

        value.unwrap_or_else(|| self.fallback())
    }
}

fn text(value: &str) -> Option<VariableValue> {
    (!value.is_empty()).then(|| VariableValue::Text(value.to_string()))
}

fn number(value: f64) -> Option<VariableValue> {
    (value != 0.0 && !value.is_nan()).then_some(VariableValue::Number(value))
}

/// Descriptions of every donation variable
pub fn variable_definitions() -> Vec<VariableDefinition> {
    DonationVariable::ALL.iter().map(|v| v.definition()).collect()
}
