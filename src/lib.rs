pub mod cache;
pub mod client;
pub mod error;
pub mod model;
pub mod notify;
pub mod probe;
pub mod search;
pub mod validate;

pub use cache::{Catalog, LiveQuery, Query, QueryPhase, QueryState, Tag};
pub use client::ApiClient;
pub use error::{Error, Result};
