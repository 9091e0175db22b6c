//! Poll cycle engine
//!
//! The PollEngine is responsible for:
//! - Fetching candidate donations via DonationSource
//! - Filtering out donations already delivered
//! - Ordering the rest by completion time
//! - Emitting one DonationEvent per new donation via EventSink
//! - Persisting the updated delivery state after each tick
//!
//! ## Architecture
//!
//! ```text
//!                       ┌──────────────┐
//!                       │  PollEngine  │◄── tick (single-flight)
//!                       └──────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//! ┌─────────────┐     ┌────────────────┐     ┌─────────────┐
//! │ StateStore  │     │ DonationSource │     │  EventSink  │
//! │ (load/save) │     │ (fetch)        │     │  (emit)     │
//! └─────────────┘     └────────────────┘     └─────────────┘
//! ```
//!
//! ## Tick Flow
//!
//! 1. Load delivery state for the campaign
//! 2. Fetch all donations, or those after `lastId`
//! 3. Stable-sort by completion time
//! 4. Emit each donation not yet delivered, advancing `lastId`
//! 5. Commit `lastId` and the id window in one store update
//!
//! A failed fetch aborts the tick before anything is emitted or written.

pub mod delivery;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::context::with_timeout;
use crate::error::Result;
use crate::event::DonationEvent;
use crate::model::{CampaignContext, DonationId};
use crate::traits::{DonationSource, EventSink, StateStore};

pub use delivery::DeliveryState;

/// Outcome of one successful tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Donations returned by the source
    pub fetched: usize,

    /// Donations emitted as events
    pub emitted: usize,

    /// Donations skipped because they were already delivered
    pub skipped_duplicates: usize,

    /// Resume cursor after the tick
    pub last_id: Option<DonationId>,
}

/// Poll cycle engine for one campaign
///
/// ## Lifecycle
///
/// 1. Create with [`PollEngine::new()`] once the campaign context is loaded
/// 2. Drive it with [`PollEngine::run_with_shutdown()`], or call
///    [`PollEngine::tick()`] directly
/// 3. Send on the shutdown channel (or drop its sender) to stop
///
/// ## Threading
///
/// Ticks are serialized by an internal guard, so concurrent `tick()` calls
/// never interleave their read-modify-write of the delivery state.
pub struct PollEngine {
    campaign_id: String,
    context: CampaignContext,
    source: Arc<dyn DonationSource>,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn EventSink>,
    interval: Duration,
    request_timeout: Duration,
    max_tracked_ids: usize,
    tick_guard: Mutex<()>,
}

impl PollEngine {
    /// Create a new poll engine
    ///
    /// # Parameters
    ///
    /// - `campaign_id`: Campaign to poll, as configured
    /// - `context`: Loaded campaign context
    /// - `source`: Donation source bound to the credential
    /// - `store`: Durable state store
    /// - `sink`: Where events are emitted
    /// - `interval`: Delay between the end of one tick and the start of the next
    /// - `config`: Engine tuning
    pub fn new(
        campaign_id: impl Into<String>,
        context: CampaignContext,
        source: Arc<dyn DonationSource>,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn EventSink>,
        interval: Duration,
        config: &EngineConfig,
    ) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            context,
            source,
            store,
            sink,
            interval,
            request_timeout: config.request_timeout(),
            max_tracked_ids: config.max_tracked_ids,
            tick_guard: Mutex::new(()),
        }
    }

    /// The campaign this engine polls
    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    /// Run one poll cycle
    ///
    /// # Returns
    ///
    /// - `Ok(TickReport)`: The tick completed and its state was committed
    /// - `Err(Error)`: Upstream or storage failure before anything was
    ///   emitted (state untouched), or a sink failure after the emitted
    ///   prefix was committed
    pub async fn tick(&self) -> Result<TickReport> {
        let _guard = self.tick_guard.lock().await;

        let mut state =
            DeliveryState::load(self.store.as_ref(), &self.campaign_id, self.max_tracked_ids)
                .await?;
        let after = state.last_id();

        let mut donations = with_timeout(
            self.request_timeout,
            "donation fetch",
            self.source.fetch_donations(&self.campaign_id, after),
        )
        .await?;

        // sort_by_key is stable: equal timestamps keep response order
        donations.sort_by_key(|d| d.completed_at);

        let mut report = TickReport {
            fetched: donations.len(),
            ..TickReport::default()
        };
        let mut sink_error = None;

        for donation in &donations {
            if state.is_delivered(donation.id) {
                debug!(
                    campaign_id = %self.campaign_id,
                    donation_id = donation.id,
                    "Skipping already delivered donation"
                );
                report.skipped_duplicates += 1;
                continue;
            }

            if let Err(e) = self.sink.emit(DonationEvent::new(donation, &self.context)).await {
                sink_error = Some(e);
                break;
            }

            state.record(donation.id, self.max_tracked_ids);
            report.emitted += 1;
            info!(
                campaign_id = %self.campaign_id,
                donation_id = donation.id,
                amount = donation.amount,
                "Delivered donation from {}",
                donation.name
            );
        }

        self.store.commit(state.entries(&self.campaign_id)).await?;
        report.last_id = state.last_id();

        if let Some(e) = sink_error {
            return Err(e);
        }

        debug!(
            campaign_id = %self.campaign_id,
            fetched = report.fetched,
            emitted = report.emitted,
            skipped = report.skipped_duplicates,
            "Tick complete"
        );
        Ok(report)
    }

    /// Run ticks until shutdown
    ///
    /// The first tick starts immediately; each following tick starts one
    /// interval after the previous one finished. Tick failures are logged
    /// and never end the loop.
    ///
    /// Shutdown is observed both between and during ticks. An in-flight tick
    /// is abandoned; the next run resumes from the last committed state.
    /// A dropped sender counts as shutdown.
    pub async fn run_with_shutdown(&self, mut shutdown: oneshot::Receiver<()>) -> Result<()> {
        info!(
            campaign_id = %self.campaign_id,
            interval_ms = self.interval.as_millis() as u64,
            "Poll loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                result = self.tick() => {
                    if let Err(e) = result {
                        warn!(campaign_id = %self.campaign_id, "Poll tick failed: {}", e);
                    }
                }
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(campaign_id = %self.campaign_id, "Poll loop stopped");

        // Flush state before exiting
        self.store.flush().await
    }
}
