//! Request orchestration primitives: a bounded-concurrency queue, a
//! time/size-bounded cache, canonical cache keys and a retry decorator.
//!
//! None of these know about HTTP; `service` composes them around the client.
pub mod cache;
pub mod key;
pub mod queue;
pub mod retry;

pub use cache::ResultCache;
pub use key::create_key;
pub use queue::{QueueError, RequestQueue};
pub use retry::{retry, with_retry, RetryPolicy};
