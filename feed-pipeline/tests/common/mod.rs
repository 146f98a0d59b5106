#![allow(dead_code)]

use async_trait::async_trait;
use feed_pipeline::{MediaFetcher, PipelineError, Result};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::time::Duration;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Writes a fixed body and counts how often it was asked to.
pub struct CountingFetcher {
    body: Vec<u8>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_urls: Vec<String>,
    delay: Option<Duration>,
}

impl CountingFetcher {
    pub fn new(body: &[u8]) -> Self {
        Self {
            body: body.to_vec(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_urls: Vec::new(),
            delay: None,
        }
    }

    pub fn failing_for(mut self, url: impl Into<String>) -> Self {
        self.fail_urls.push(url.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for CountingFetcher {
    async fn fetch_to_path(&self, url: &str, dest: &Path) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.fail_urls.iter().any(|u| u == url) {
            Err(PipelineError::General(format!("connection reset: {}", url)))
        } else {
            tokio::fs::write(dest, &self.body).await?;
            Ok(self.body.len() as u64)
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn image_url(id: &str) -> String {
    format!("https://cdn.example.com/media/{}.jpg", id)
}

pub fn image_record(id: &str, user_id: &str) -> Value {
    json!({
        "node": {
            "id": id,
            "link": format!("https://example.com/p/{}/", id),
            "is_video": false,
            "images": {
                "standard_resolution": { "url": image_url(id), "width": 640, "height": 640 },
                "thumbnail": { "url": format!("https://cdn.example.com/thumb/{}.jpg", id) }
            },
            "user": { "id": user_id, "username": "alice" }
        }
    })
}

pub fn video_record(id: &str, user_id: &str) -> Value {
    json!({
        "node": {
            "id": id,
            "link": format!("https://example.com/p/{}/", id),
            "is_video": true,
            "user": { "id": user_id, "username": "alice" }
        }
    })
}
