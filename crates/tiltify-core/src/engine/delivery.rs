//! Per-campaign delivery state
//!
//! Tracks which donations of a campaign have already been emitted:
//!
//! - `/tiltify/{campaignId}/lastId`: the resume cursor (`-1` for "none yet")
//! - `/tiltify/{campaignId}/ids`: delivered identifiers, oldest first
//!
//! The id list is a bounded recency window. It only has to cover the overlap
//! that the server-side "after" filter can produce; `lastId` stays the
//! primary cursor.

use serde_json::Value;
use std::collections::{HashSet, VecDeque};

use crate::error::{Error, Result};
use crate::model::DonationId;
use crate::traits::StateStore;

/// Stored value of `lastId` before anything was delivered
pub const NO_DONATION: DonationId = -1;

/// Path of the resume cursor for a campaign
pub fn last_id_path(campaign_id: &str) -> String {
    format!("/tiltify/{}/lastId", campaign_id)
}

/// Path of the delivered-id list for a campaign
pub fn ids_path(campaign_id: &str) -> String {
    format!("/tiltify/{}/ids", campaign_id)
}

/// Delivery state of one campaign
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryState {
    last_id: Option<DonationId>,
    order: VecDeque<DonationId>,
    seen: HashSet<DonationId>,
}

impl DeliveryState {
    /// Load the state of `campaign_id`
    ///
    /// Absent keys are the "nothing delivered yet" state, not an error.
    /// Loading never writes to the store.
    ///
    /// # Parameters
    ///
    /// - `store`: Where the state lives
    /// - `campaign_id`: Campaign the state belongs to
    /// - `window`: Maximum number of ids to keep, 0 for no limit
    pub async fn load(store: &dyn StateStore, campaign_id: &str, window: usize) -> Result<Self> {
        let last_id = match store.get(&last_id_path(campaign_id)).await {
            Ok(value) => parse_last_id(&value)?,
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let ids = match store.get(&ids_path(campaign_id)).await {
            Ok(value) => parse_ids(&value)?,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };

        let mut state = Self {
            last_id,
            ..Self::default()
        };
        for id in ids {
            if state.seen.insert(id) {
                state.order.push_back(id);
            }
        }
        state.evict(window);

        tracing::debug!(
            campaign_id,
            last_id = ?state.last_id,
            tracked = state.order.len(),
            "Loaded delivery state"
        );
        Ok(state)
    }

    /// The resume cursor, `None` before the first delivery
    pub fn last_id(&self) -> Option<DonationId> {
        self.last_id
    }

    /// Whether `id` is in the recency window
    pub fn is_delivered(&self, id: DonationId) -> bool {
        self.seen.contains(&id)
    }

    /// Record a delivered donation and advance the cursor to it
    pub fn record(&mut self, id: DonationId, window: usize) {
        if self.seen.insert(id) {
            self.order.push_back(id);
        }
        self.last_id = Some(id);
        self.evict(window);
    }

    /// Delivered ids, oldest first
    pub fn ids(&self) -> impl Iterator<Item = DonationId> + '_ {
        self.order.iter().copied()
    }

    /// Number of tracked ids
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no ids are tracked
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Store entries for a single atomic commit
    pub fn entries(&self, campaign_id: &str) -> Vec<(String, Value)> {
        vec![
            (
                last_id_path(campaign_id),
                Value::from(self.last_id.unwrap_or(NO_DONATION)),
            ),
            (
                ids_path(campaign_id),
                Value::Array(self.order.iter().map(|id| Value::from(*id)).collect()),
            ),
        ]
    }

    fn evict(&mut self, window: usize) {
        if window == 0 {
            return;
        }
        while self.order.len() > window {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }
}

fn parse_last_id(value: &Value) -> Result<Option<DonationId>> {
    match value.as_i64() {
        Some(id) if id < 0 => Ok(None),
        Some(id) => Ok(Some(id)),
        None if value.is_null() => Ok(None),
        None => Err(Error::state_store(format!(
            "lastId is not an integer: {}",
            value
        ))),
    }
}

fn parse_ids(value: &Value) -> Result<Vec<DonationId>> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::state_store(format!("ids is not an array: {}", value)))?;

    items
        .iter()
        .map(|item| {
            item.as_i64()
                .ok_or_else(|| Error::state_store(format!("ids contains a non-integer: {}", item)))
        })
        .collect()
}
