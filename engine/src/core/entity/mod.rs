//! Entity-Component System (ECS) functionality
//!
//! Script host entities carry a [`Name`], an [`EntityProperties`] map and,
//! while their assets load, a [`PendingAssets`] marker.

pub mod components;
pub mod world;

// Re-export commonly used types
pub use components::{EntityProperties, Name, PendingAssets};
pub use world::World;

// Re-export hecs types that users will need
pub use hecs::Entity;
