//! Submits a handful of notifications and shuts down on Ctrl-C (or once
//! everything has been processed).
//!
//! ```sh
//! RUST_LOG=herald=debug HERALD_EMAIL_DELAY_MS=500 \
//!     cargo run --example notify -- http://localhost:9000/callback
//! ```

use std::time::Duration;

use herald::{Category, Config, Pipeline, logging::init_tracing};
use serde_json::json;

#[tokio::main]
async fn main() -> herald::Result {
    init_tracing();

    let callback = std::env::args().nth(1);
    let config = Config::from_env()?;
    let pipeline = Pipeline::start(config)?;

    let requests = [
        (Category::Email, json!({"recipient": "user@example.com", "message": "Welcome!"})),
        (Category::Sms, json!({"phoneNumber": "+15550100", "message": "Your code is 1234"})),
        (Category::Push, json!({"deviceId": "device-42", "message": "New follower"})),
        (Category::Email, json!({"recipient": "ops@example.com", "message": "Weekly report"})),
    ];
    for (category, payload) in requests {
        let id = pipeline.submit(category, payload, callback.clone())?;
        println!("accepted {category} event {id}");
    }

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = async {
            while pipeline.stats().processed() < pipeline.stats().accepted {
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        } => {}
    }

    let report = pipeline.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&pipeline.status())?);
    println!(
        "shutdown after {:?}: forced={} abandoned_events={} abandoned_callbacks={}",
        report.elapsed, report.forced, report.abandoned_events, report.abandoned_callbacks
    );
    Ok(())
}
