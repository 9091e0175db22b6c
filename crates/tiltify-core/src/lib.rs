// # tiltify-core
//
// Core library for the Tiltify donation bridge.
//
// ## Architecture Overview
//
// This library polls a Tiltify campaign and delivers each new donation once:
// - **DonationSource**: Trait for reading campaigns, causes and donations
// - **StateStore**: Trait for the durable delivery state (resume cursor + id window)
// - **EventSink**: Trait for the host event bus receiving donation events
// - **PollEngine**: Single-flight poll cycle: fetch → dedup → order → emit → commit
// - **ConnectionController**: Connect/disconnect lifecycle around the engine
// - **ComponentRegistry**: Plugin-based registry for sources and state stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Single-Flight**: A tick never starts while the previous one is in flight
// 3. **Explicit Dependencies**: Collaborators are injected, nothing is global
// 4. **Library-First**: All core functionality can be used as a library
// 5. **At-Least-Once**: A failed tick changes nothing and is retried next interval

pub mod config;
pub mod context;
pub mod controller;
pub mod engine;
pub mod error;
pub mod event;
pub mod filters;
pub mod lookups;
pub mod model;
pub mod registry;
pub mod state;
pub mod traits;
pub mod variables;

// Re-export core types for convenience
pub use config::{ConnectionConfig, EngineConfig, StateStoreConfig, TiltifyConfig};
pub use controller::{ConnectionController, ConnectionEvent, ConnectionState};
pub use engine::{DeliveryState, PollEngine, TickReport};
pub use error::{Error, Result};
pub use event::DonationEvent;
pub use model::{CampaignContext, Donation, DonationId};
pub use registry::ComponentRegistry;
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{ChannelEventSink, DonationSource, DonationSourceFactory, EventSink, StateStore};
