//! In-crate fakes shared by unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{FieldSyncError, Result};
use crate::network::{NetworkMonitor, StaticProbe};
use crate::storage::ResourceRecord;
use crate::sync::{ResourceApi, ResourceType, SubmitAck};

type FailWith = fn() -> FieldSyncError;

enum FetchScript {
    Records(Vec<Value>),
    Fail(FailWith),
}

/// Scriptable [`ResourceApi`]
///
/// Unscripted types answer with two records `{type}-1` and `{type}-2`.
/// Submits succeed unless a result was queued with [`FakeResourceApi::push_submit`].
#[derive(Default)]
pub struct FakeResourceApi {
    fetch_scripts: Mutex<HashMap<ResourceType, FetchScript>>,
    fetch_calls: Mutex<Vec<ResourceType>>,
    submit_results: Mutex<VecDeque<Result<SubmitAck>>>,
    submitted: Mutex<Vec<(String, Value)>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeResourceApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(&self, resource_type: ResourceType, records: Vec<Value>) {
        self.fetch_scripts
            .lock()
            .insert(resource_type, FetchScript::Records(records));
    }

    pub fn fail_with(&self, resource_type: ResourceType, error: FailWith) {
        self.fetch_scripts
            .lock()
            .insert(resource_type, FetchScript::Fail(error));
    }

    pub fn push_submit(&self, result: Result<SubmitAck>) {
        self.submit_results.lock().push_back(result);
    }

    /// Every fetch sleeps this long first
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn fetch_calls(&self) -> Vec<ResourceType> {
        self.fetch_calls.lock().clone()
    }

    pub fn submitted(&self) -> Vec<(String, Value)> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl ResourceApi for FakeResourceApi {
    async fn fetch(&self, resource_type: ResourceType) -> Result<Vec<ResourceRecord>> {
        self.fetch_calls.lock().push(resource_type);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let values = match self.fetch_scripts.lock().get(&resource_type) {
            Some(FetchScript::Fail(error)) => return Err(error()),
            Some(FetchScript::Records(values)) => values.clone(),
            None => vec![
                json!({"id": format!("{}-1", resource_type)}),
                json!({"id": format!("{}-2", resource_type)}),
            ],
        };
        values.into_iter().map(ResourceRecord::new).collect()
    }

    async fn submit(&self, kind: &str, payload: &Value) -> Result<SubmitAck> {
        let scripted = self.submit_results.lock().pop_front();
        let result = scripted.unwrap_or_else(|| Ok(SubmitAck::from_body(json!({"id": "ack"}))));
        if result.is_ok() {
            self.submitted.lock().push((kind.to_string(), payload.clone()));
        }
        result
    }
}

pub fn online_monitor() -> (Arc<StaticProbe>, Arc<NetworkMonitor>) {
    let probe = Arc::new(StaticProbe::new(true));
    let monitor = Arc::new(NetworkMonitor::new(probe.clone()));
    monitor.set_online(true);
    (probe, monitor)
}
