#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use herald::{
    Result,
    callback::{CallbackSender, Outcome},
};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Callback target double: records every request and answers with a fixed status.
pub struct Recorder {
    requests: Mutex<Vec<(String, Outcome)>>,
    notify: Notify,
    status: u16,
    delay: Duration,
}

impl Recorder {
    pub fn ok() -> Arc<Self> {
        Self::new(200, Duration::ZERO)
    }

    pub fn new(status: u16, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            notify: Notify::new(),
            status,
            delay,
        })
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.requests.lock().iter().map(|(_, o)| o.clone()).collect()
    }

    pub fn targets(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Wait until at least `n` requests have been recorded.
    pub async fn wait_for(&self, n: usize) -> Vec<Outcome> {
        loop {
            if self.requests.lock().len() >= n {
                return self.outcomes();
            }
            self.notify.notified().await;
        }
    }
}

#[async_trait]
impl CallbackSender for Recorder {
    async fn send(&self, target: &str, outcome: &Outcome) -> Result<u16> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.requests
            .lock()
            .push((target.to_string(), outcome.clone()));
        self.notify.notify_one();
        Ok(self.status)
    }
}
