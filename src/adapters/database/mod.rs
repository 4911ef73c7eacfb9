//! Database abstraction layer

pub mod traits;

pub use traits::{
    ContainerRef, DocumentStore, PageStream, QueryPage, QuerySpec, StoreConnector, StoreResponse,
};
