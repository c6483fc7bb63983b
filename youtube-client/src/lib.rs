pub mod api;
pub mod duration;
pub mod key_pool;
pub mod retry;

pub use api::*;
pub use key_pool::KeyPool;
pub use retry::{RetryConfig, RetryExecutor};
