//! Outcome reporting to caller-supplied callback targets.
//!
//! - [`Outcome`]: the JSON record POSTed to the target
//! - [`CallbackSender`]: the "send POST, get status or error" capability,
//!   implemented over HTTP by [`HttpCallbackSender`]
//! - [`BackoffPolicy`]: how many attempts and how long to wait between them
//! - [`CallbackDispatcher`]: one event, all attempts
//! - [`DeliveryPool`]: a bounded set of tasks running the dispatcher so slow
//!   targets never hold up event processing

mod backoff;
mod dispatcher;
mod outcome;
mod pool;
mod sender;

pub use backoff::BackoffPolicy;
pub use dispatcher::{CallbackDispatcher, DeliveryOutcome};
pub use outcome::Outcome;
pub use pool::DeliveryPool;
pub use sender::{CallbackSender, HttpCallbackSender};
