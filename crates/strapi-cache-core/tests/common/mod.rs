#![allow(clippy::unwrap_used, dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};
use strapi_cache_core::{
    Config, HttpRequest, HttpResponse, JobQueue, ManualClock, MemoryStore, RefreshJob, Result,
    StrapiClient, Transport,
};

pub const BASE_URL: &str = "https://cms.test";

/// Transport answering every request with the current canned response.
pub struct ScriptedTransport {
    response: Mutex<HttpResponse>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(HttpResponse::new(status, body)),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn respond(&self, status: u16, body: &str) {
        *self.response.lock().unwrap() = HttpResponse::new(status, body);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        Ok(self.response.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<RefreshJob>>,
}

impl RecordingQueue {
    pub fn jobs(&self) -> Vec<RefreshJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, job: RefreshJob) -> Result<()> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub queue: Arc<RecordingQueue>,
    pub client: StrapiClient,
}

/// Client on 2024-05-01 10:00 UTC with a memory store and recording queue.
pub fn harness(config: Config, body: &str) -> Harness {
    harness_with(config, body, true)
}

pub fn harness_with(config: Config, body: &str, with_queue: bool) -> Harness {
    let transport = ScriptedTransport::new(200, body);
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let queue = Arc::new(RecordingQueue::default());

    let mut builder = StrapiClient::builder(config)
        .transport(transport.clone())
        .store(store.clone())
        .clock(clock.clone());
    if with_queue {
        builder = builder.queue(queue.clone());
    }

    Harness {
        transport,
        store,
        clock,
        queue,
        client: builder.build().unwrap(),
    }
}

pub fn config(cache_type: &str) -> Config {
    let mut config = Config::new(BASE_URL);
    config.cache_type = cache_type.to_string();
    config
}
