#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use httpmock::prelude::*;
use httpmock::Mock;
use serde_json::json;
use watttime::{Client, ClientConfig, Clock};

pub const USERNAME: &str = "user";
pub const PASSWORD: &str = "pass";
// base64("user:pass")
pub const BASIC_AUTH: &str = "Basic dXNlcjpwYXNz";
pub const TOKEN: &str = "token-abc";
pub const BEARER: &str = "Bearer token-abc";

/// Clock that only moves when told to; sleeping advances it instantly.
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
    slept: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            slept: Mutex::new(Vec::new()),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

pub fn mock_login(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(GET)
            .path("/login")
            .header("Authorization", BASIC_AUTH);
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "token": TOKEN }));
    })
}

pub fn config(server: &MockServer, output_dir: &Path) -> ClientConfig {
    let mut cfg = ClientConfig::new(USERNAME, PASSWORD).with_url(server.base_url());
    cfg.output_dir = output_dir.to_path_buf();
    cfg
}

pub fn connect(server: &MockServer, output_dir: &Path, clock: Arc<ManualClock>) -> Client {
    Client::with_clock(config(server, output_dir), clock)
        .expect("Client should log in against the mock server.")
}
