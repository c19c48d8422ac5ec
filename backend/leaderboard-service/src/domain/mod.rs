pub mod hour_bucket;
pub mod models;

pub use hour_bucket::HourBucket;
pub use models::*;
