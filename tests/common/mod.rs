#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use peer_review_server::{AppState, ManualClock, MemoryStore, Settings};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct TestContext {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 10, 0, 0).unwrap()
}

/// App state over a fresh in-memory store with a clock pinned to `now`.
pub fn test_context(now: DateTime<Utc>) -> TestContext {
    let config = Settings::new_for_test(None).expect("Failed to load test config");
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(now));
    let state = AppState::from_stores(config, store.clone(), store.clone(), clock.clone())
        .expect("Failed to build app state");

    TestContext { state, store, clock }
}

pub fn signup_body(name: &str, reg_number: &str, password: &str) -> Value {
    json!({
        "name": name,
        "regNumber": reg_number,
        "mobile": "9876543210",
        "vitEmail": format!("{}@vitstudent.ac.in", reg_number.to_lowercase()),
        "personalEmail": format!("{}@example.com", name.to_lowercase()),
        "teamNumber": "12",
        "codename": format!("{}-codename", name.to_lowercase()),
        "password": password,
        "residenceType": "hosteller",
        "hostelType": "MH",
        "blockRoom": "A-101"
    })
}
