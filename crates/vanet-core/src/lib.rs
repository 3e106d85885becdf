//! # Vanet Core
//!
//! Core traits, types, and errors shared by the forwarding strategies and
//! the simulation harness that hosts them.
//!
//! The strategies never touch the forwarder's tables directly. They see the
//! outside world through [`ForwardingContext`], which a host (the simulator,
//! or a real forwarder) implements.
//!
//! ## Key Traits
//!
//! - [`ForwardingStrategy`]: The four forwarding events plus timer callbacks
//! - [`ForwardingContext`]: Primitives a strategy may call back into
//!
//! ## Key Types
//!
//! - [`NodeId`], [`FaceId`], [`Face`]: Node and link identities
//! - [`Kinematics`]: Position and velocity of a node at an instant
//! - [`Name`], [`Interest`], [`Data`]: NDN packets with typed tags

pub mod error;
pub mod identity;
pub mod kinematics;
pub mod packet;
pub mod routing;
pub mod traits;

// Re-export main types
pub use error::*;
pub use identity::*;
pub use kinematics::*;
pub use packet::*;
pub use routing::*;
pub use traits::*;
