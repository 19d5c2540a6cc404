//! Offline-first sync walkthrough
//!
//! Runs without a server: `DemoApi` serves canned master data and fails one
//! resource type, and a `StaticProbe` plays the device's reachability API.

use async_trait::async_trait;
use fieldsync_sdk::{
    Collaborators, ConnectivityProbe, FieldSyncConfig, FieldSyncError, FieldSyncSDK, ResourceApi,
    ResourceRecord, ResourceType, StaticProbe, SubmitAck, SubmitOutcome, TypeSyncStatus,
};
use serde_json::{json, Value};
use std::sync::Arc;

struct DemoApi;

#[async_trait]
impl ResourceApi for DemoApi {
    async fn fetch(&self, resource_type: ResourceType) -> fieldsync_sdk::Result<Vec<ResourceRecord>> {
        if resource_type == ResourceType::RentalCounterparty {
            return Err(FieldSyncError::Timeout("no answer within 30s".to_string()));
        }
        (1..=3)
            .map(|i| ResourceRecord::new(json!({"id": i, "name": format!("{} #{}", resource_type, i)})))
            .collect()
    }

    async fn submit(&self, _kind: &str, payload: &Value) -> fieldsync_sdk::Result<SubmitAck> {
        Ok(SubmitAck::from_body(json!({"data": {"id": 1001, "echo": payload}})))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("========================================");
    println!("FieldSync offline-first demo");
    println!("========================================\n");

    let data_dir = std::env::temp_dir().join("fieldsync_demo");
    let config = FieldSyncConfig::builder()
        .data_dir(&data_dir)
        .api_base_url("https://api.example.com/v1")
        .build();

    let probe = Arc::new(StaticProbe::new(true));
    let sdk = FieldSyncSDK::initialize(
        config,
        Collaborators {
            probe: Some(probe.clone() as Arc<dyn ConnectivityProbe>),
            api: Some(Arc::new(DemoApi) as Arc<dyn ResourceApi>),
            ..Collaborators::default()
        },
    )
    .await?;
    println!("✅ SDK initialized at {}\n", data_dir.display());

    // === 1. full sync, one type failing ===
    let run = sdk.force_sync().await;
    println!("🔄 {}", run.summary());
    for (resource_type, status) in &run.per_type_status {
        match status {
            TypeSyncStatus::Success { row_count } => println!("   ✅ {:<20} {} rows", resource_type, row_count),
            TypeSyncStatus::Error { error, class } => println!("   ❌ {:<20} {:?}: {}", resource_type, class, error),
        }
    }
    println!("   sync due again? {}\n", sdk.is_sync_due().await?);

    // === 2. submit while offline ===
    probe.set_online(false);
    sdk.check_connection().await;
    let outcome = sdk
        .submit("timesheet", "2024-05-01/1", json!({"equipment": 1, "hours": 8}))
        .await?;
    if let SubmitOutcome::Queued(entry) = &outcome {
        println!("📥 offline: timesheet queued as {}", entry.id);
    }
    println!("   pending mutations: {}\n", sdk.pending_mutations(None).await?.len());

    // === 3. back online, replay ===
    probe.set_online(true);
    sdk.check_connection().await;
    let report = sdk.drain_outbox(None).await?;
    println!("📤 replayed {} mutations, {} rejected", report.delivered.len(), report.rejected.len());

    sdk.shutdown().await;
    Ok(())
}
