mod retry;
mod source;

pub use retry::{RetryPolicy, with_retries};
pub use source::MarketDataSource;
