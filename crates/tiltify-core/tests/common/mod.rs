//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that record how the engine and
//! controller use their collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tiltify_core::config::{ConnectionConfig, EngineConfig};
use tiltify_core::error::{Error, Result};
use tiltify_core::event::DonationEvent;
use tiltify_core::model::{
    Campaign, CampaignContext, CampaignSummary, Cause, Challenge, Donation, DonationId, Poll,
    PollOption, Reward, User,
};
use tiltify_core::state::MemoryStateStore;
use tiltify_core::traits::{DonationSource, DonationSourceFactory, EventSink, StateStore};

pub const CAMPAIGN_ID: &str = "12345";

/// A scripted response to one donation fetch
#[derive(Debug, Clone)]
pub enum Scripted {
    Donations(Vec<Donation>),
    Upstream(&'static str),
}

/// A DonationSource that replays scripted donation responses
///
/// Once the script is exhausted every fetch returns an empty list.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Scripted>>,
    /// `after` argument of every donation fetch, in call order
    donation_requests: Mutex<Vec<Option<DonationId>>>,
    /// Remaining campaign fetches that fail before one succeeds
    campaign_failures: AtomicUsize,
    campaign_calls: AtomicUsize,
    /// Artificial latency of each donation fetch
    donation_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_lookups: AtomicBool,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            donation_requests: Mutex::new(Vec::new()),
            campaign_failures: AtomicUsize::new(0),
            campaign_calls: AtomicUsize::new(0),
            donation_delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_lookups: AtomicBool::new(false),
        }
    }

    /// Queue the next donation response
    pub fn push(&self, response: Scripted) -> &Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    /// Queue a successful donation response
    pub fn push_donations(&self, donations: Vec<Donation>) -> &Self {
        self.push(Scripted::Donations(donations))
    }

    /// Make the next `n` campaign fetches fail
    pub fn fail_campaign_times(&self, n: usize) {
        self.campaign_failures.store(n, Ordering::SeqCst);
    }

    pub fn set_donation_delay(&self, delay: Duration) {
        *self.donation_delay.lock().unwrap() = delay;
    }

    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn donation_requests(&self) -> Vec<Option<DonationId>> {
        self.donation_requests.lock().unwrap().clone()
    }

    pub fn donation_calls(&self) -> usize {
        self.donation_requests.lock().unwrap().len()
    }

    pub fn campaign_calls(&self) -> usize {
        self.campaign_calls.load(Ordering::SeqCst)
    }

    /// Highest number of donation fetches observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lookup<T>(&self, value: T) -> Result<T> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            Err(Error::upstream("HTTP 500"))
        } else {
            Ok(value)
        }
    }
}

#[async_trait::async_trait]
impl DonationSource for ScriptedSource {
    async fn fetch_campaign(&self, campaign_id: &str) -> Result<Campaign> {
        self.campaign_calls.fetch_add(1, Ordering::SeqCst);
        let failures = self.campaign_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.campaign_failures.store(failures - 1, Ordering::SeqCst);
            return Err(Error::upstream("HTTP 503"));
        }
        let mut campaign = campaign();
        campaign.id = campaign_id.parse().unwrap_or(campaign.id);
        Ok(campaign)
    }

    async fn fetch_cause(&self, _cause_id: i64) -> Result<Cause> {
        Ok(cause())
    }

    async fn fetch_donations(
        &self,
        _campaign_id: &str,
        after: Option<DonationId>,
    ) -> Result<Vec<Donation>> {
        self.donation_requests.lock().unwrap().push(after);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.donation_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Donations(donations)) => Ok(donations),
            Some(Scripted::Upstream(msg)) => Err(Error::upstream(msg)),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_rewards(&self, _campaign_id: &str) -> Result<Vec<Reward>> {
        self.lookup(vec![
            Reward { id: 1, name: "Sticker".to_string() },
            Reward { id: 2, name: "Shoutout".to_string() },
        ])
    }

    async fn fetch_polls(&self, _campaign_id: &str) -> Result<Vec<Poll>> {
        self.lookup(vec![
            Poll {
                id: 10,
                name: "Next game".to_string(),
                options: vec![
                    PollOption { id: 11, name: "Chess".to_string() },
                    PollOption { id: 12, name: "Go".to_string() },
                ],
            },
            Poll {
                id: 20,
                name: "Snack".to_string(),
                options: vec![PollOption { id: 21, name: "Chips".to_string() }],
            },
        ])
    }

    async fn fetch_challenges(&self, _campaign_id: &str) -> Result<Vec<Challenge>> {
        self.lookup(vec![Challenge { id: 7, name: "Sing a song".to_string() }])
    }

    async fn fetch_current_user(&self) -> Result<User> {
        self.lookup(User { id: 99, username: "streamer".to_string() })
    }

    async fn fetch_user_campaigns(&self, user_id: i64) -> Result<Vec<CampaignSummary>> {
        assert_eq!(user_id, 99, "campaign list must use the current user's id");
        self.lookup(vec![CampaignSummary {
            id: 12345,
            name: "Charity Stream".to_string(),
            slug: Some("charity-stream".to_string()),
        }])
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// Factory handing out one shared ScriptedSource
pub struct ScriptedSourceFactory {
    source: Arc<ScriptedSource>,
    created: Arc<AtomicUsize>,
}

impl ScriptedSourceFactory {
    pub fn new(source: Arc<ScriptedSource>) -> Self {
        Self {
            source,
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of times create() was called
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl DonationSourceFactory for ScriptedSourceFactory {
    fn create(&self, _config: &ConnectionConfig) -> Result<Arc<dyn DonationSource>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.source.clone())
    }
}

/// An EventSink that records every event
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<DonationEvent>>>,
    /// Fail every emit after this many successes
    fail_after: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(successes: usize) -> Self {
        Self {
            events: Arc::default(),
            fail_after: Some(successes),
        }
    }

    pub fn events(&self) -> Vec<DonationEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn ids(&self) -> Vec<DonationId> {
        self.events().iter().map(|e| e.donation_id).collect()
    }
}

#[async_trait::async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: DonationEvent) -> Result<()> {
        let mut events = self.events.lock().unwrap();
        if self.fail_after.is_some_and(|n| events.len() >= n) {
            return Err(Error::event_sink("host event bus unavailable"));
        }
        events.push(event);
        Ok(())
    }
}

/// A StateStore wrapping MemoryStateStore with injectable failures
#[derive(Clone)]
pub struct FlakyStateStore {
    inner: MemoryStateStore,
    fail_commit: Arc<AtomicBool>,
    fail_get: Arc<AtomicBool>,
    commit_calls: Arc<AtomicUsize>,
    flush_calls: Arc<AtomicUsize>,
}

impl FlakyStateStore {
    pub fn new(inner: MemoryStateStore) -> Self {
        Self {
            inner,
            fail_commit: Arc::default(),
            fail_get: Arc::default(),
            commit_calls: Arc::default(),
            flush_calls: Arc::default(),
        }
    }

    pub fn set_fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }

    pub fn flush_calls(&self) -> usize {
        self.flush_calls.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Value {
        self.inner.snapshot().await
    }
}

#[async_trait::async_trait]
impl StateStore for FlakyStateStore {
    async fn get(&self, path: &str) -> Result<Value> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(Error::state_store("disk unavailable"));
        }
        self.inner.get(path).await
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        self.inner.set(path, value).await
    }

    async fn append(&self, path: &str, value: Value) -> Result<()> {
        self.inner.append(path, value).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.inner.delete(path).await
    }

    async fn commit(&self, entries: Vec<(String, Value)>) -> Result<()> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(Error::state_store("disk full"));
        }
        self.inner.commit(entries).await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.flush().await
    }
}

/// A donation with the given id and completion time
pub fn donation(id: DonationId, completed_at: i64) -> Donation {
    Donation {
        id,
        amount: 5.0,
        name: format!("donor-{}", id),
        comment: None,
        completed_at,
        reward_id: None,
        poll_option_id: None,
        challenge_id: None,
    }
}

pub fn campaign() -> Campaign {
    Campaign {
        id: 12345,
        name: "Charity Stream".to_string(),
        cause_id: 77,
        fundraiser_goal_amount: 1000.0,
        original_fundraiser_goal: 500.0,
        amount_raised: 250.0,
        supporting_amount_raised: 50.0,
        total_amount_raised: 300.0,
    }
}

pub fn cause() -> Cause {
    Cause {
        id: 77,
        name: "Good Cause".to_string(),
        legal_name: "Good Cause Foundation".to_string(),
    }
}

pub fn context() -> CampaignContext {
    CampaignContext::from_parts(&campaign(), &cause())
}

/// Engine config for tests: short timeout, unbounded window
pub fn engine_config() -> EngineConfig {
    EngineConfig {
        request_timeout_secs: 2,
        max_tracked_ids: 0,
        ..EngineConfig::default()
    }
}
