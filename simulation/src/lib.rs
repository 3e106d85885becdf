//! # Vanet Simulation
//!
//! A discrete-event host for the vehicular NDN forwarding strategies.
//!
//! ## Overview
//!
//! Vehicles drive along a straight road at constant velocity. Each one runs
//! a forwarder with a FIB, a PIT and an optional content store, and hands
//! every forwarding decision to its [`vanet_strategy::StrategyEngine`].
//!
//! - **Radio**: A broadcast face reaches every node in range; a
//!   point-to-point face reaches its peer only while in range
//! - **Applications**: One constant-rate consumer and one producer
//! - **Scheduling**: Single-threaded, time-ordered, FIFO on ties
//!
//! ## Architecture
//!
//! - **Scheduler** (`scheduler.rs`): Event queue with idempotent cancel
//! - **World** (`world.rs`): Nodes, tables, radio and the strategy host
//! - **Config** (`config.rs`): Simulation parameters and scenario presets
//! - **Stats** (`stats.rs`): Counters and the serializable report
//! - **Scenarios** (`scenarios.rs`): Pre-built scenarios A, B and C
//!
//! ## Example
//!
//! ```rust,ignore
//! use vanet_simulation::{SimConfig, World};
//! use vanet_strategy::StrategyKind;
//!
//! let mut world = World::new(SimConfig::highway(StrategyKind::Lisic, 8))?;
//! world.run();
//! println!("{}", world.report("highway").summary());
//! ```

pub mod config;
pub mod error;
pub mod scenarios;
pub mod scheduler;
pub mod stats;
pub mod world;

// Re-export main types
pub use config::{RouteSetup, SimConfig};
pub use error::{SimError, SimResult};
pub use scheduler::{EventId, Scheduler};
pub use stats::{PacketKind, ProviderKnowledge, SimReport, SimStats, Transmission};
pub use world::{Event, NodeContext, World};
