//! Herald - in-memory notification pipeline
//!
//! Accepts typed notification events, queues them per [`Category`], processes
//! each one on a dedicated worker with a category-specific delay and simulated
//! failure, then reports the outcome to the event's callback target with
//! bounded, linearly backed-off retries.
//!
//! ```rust,no_run
//! use herald::{Category, Config, Pipeline};
//! use serde_json::json;
//!
//! # async fn demo() -> herald::Result {
//! let pipeline = Pipeline::start(Config::default())?;
//! let id = pipeline.submit(
//!     Category::Email,
//!     json!({"recipient": "user@example.com", "message": "hello"}),
//!     Some("http://localhost:9000/callback".into()),
//! )?;
//! println!("accepted {id}");
//! let report = pipeline.shutdown().await;
//! assert_eq!(report.abandoned_events, 0);
//! # Ok(())
//! # }
//! ```
//!
//! See `demos/notify.rs` for a runnable example.

mod category;
mod config;
mod error;
mod event;
mod pipeline;
mod router;
mod shutdown;
mod stats;
mod worker;

pub mod callback;
pub mod logging;

pub use category::Category;
pub use config::{CategorySettings, Config};
pub use error::Error;
pub use event::{Event, EventId, EventState};
pub use pipeline::{Pipeline, PipelineStatus};
pub use router::{CategoryQueue, QueueRouter};
pub use shutdown::{ShutdownCoordinator, ShutdownReport};
pub use stats::{Stats, StatsSnapshot};
pub use worker::{FailureInjector, Worker};

pub type Result<T = ()> = std::result::Result<T, Error>;

/// Reason recorded on events failed by the failure injector.
pub const SIMULATED_FAILURE: &str = "Simulated processing failure";

/// Reason recorded on events whose processing hold was cut short by a forced shutdown.
pub const PROCESSING_INTERRUPTED: &str = "Processing interrupted";
