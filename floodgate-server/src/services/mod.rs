//! Services backing the ingestion endpoints.

mod processor;
mod store;
mod tracker;
mod ttl;

pub use self::processor::*;
pub use self::store::*;
pub use self::tracker::*;
pub use self::ttl::*;
