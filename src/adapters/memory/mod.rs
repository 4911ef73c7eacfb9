//! In-memory document store for tests and local development

mod query;
pub mod store;

pub use store::{ChargeSchedule, InMemoryStore, StoreOperation, DEFAULT_PAGE_SIZE};
