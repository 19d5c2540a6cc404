//! Master-data synchronization
//!
//! - `coordinator`: one pass over every resource type, per-type isolation
//! - `scheduler`: TTL gating on top of the coordinator
//! - `stamp_store`: persisted `last_successful_sync_at`
//! - `remote`: the fetch/submit contract with the server
//! - `seed`: bootstrap records shown before the first sync

pub mod coordinator;
pub mod remote;
pub mod resource_type;
pub mod scheduler;
pub mod seed;
pub mod stamp_store;

pub use coordinator::{
    CoordinatorOptions, ResourceSyncCoordinator, SuccessPolicy, SyncMode, SyncRun, TypeSyncStatus,
};
pub use remote::{ResourceApi, ResponseEnvelope, SubmitAck};
pub use resource_type::ResourceType;
pub use scheduler::{SyncScheduler, DEFAULT_SYNC_TTL};
pub use seed::{SeedDataset, StaticSeedDataset};
pub use stamp_store::SyncStampStore;
