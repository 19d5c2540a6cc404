//! Data access layer, one DAO per table group

pub mod collection;
pub mod outbox;

pub use collection::CollectionDao;
pub use outbox::OutboxDao;
