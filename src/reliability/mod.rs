pub mod retry;

pub use retry::{RetryConfig, RetryError, RetryPolicy, RetryStrategy};
