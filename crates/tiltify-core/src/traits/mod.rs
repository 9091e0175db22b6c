//! Core traits for the Tiltify bridge
//!
//! This module defines the abstract interfaces the engine depends on.
//!
//! - [`DonationSource`]: Read campaign, cause and donation data
//! - [`StateStore`]: Durable path-addressed document store for delivery state
//! - [`EventSink`]: Host event bus receiving emitted donations

pub mod donation_source;
pub mod event_sink;
pub mod state_store;

pub use donation_source::{DonationSource, DonationSourceFactory};
pub use event_sink::{ChannelEventSink, EventSink};
pub use state_store::{StateStore, StateStoreFactory};
