//! Integration tests for topic reading over a directory spool

use interop_relay::adapters::events::SpoolEventSource;
use interop_relay::adapters::tenant::TenantDirectory;
use interop_relay::core::reader::TopicReader;
use interop_relay::domain::{DataTrigger, Tenant, LOAD_EVENT_NAME, PUBLISH_EVENT_NAME};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn metadata(run_id: &str) -> Value {
    json!({"runId": run_id, "runDateTime": "2024-03-01T02:00:00Z"})
}

fn publish_event(tenant: &str, resource_type: &str, id: &str, trigger: &str) -> Value {
    let resource = json!({"resourceType": resource_type, "id": id});
    json!({
        "tenantId": tenant,
        "resourceType": resource_type,
        "dataTrigger": trigger,
        "resourceJson": resource.to_string(),
        "metadata": metadata("run1"),
    })
}

fn load_event(tenant: &str, id: &str) -> Value {
    json!({
        "tenantId": tenant,
        "resourceType": "Location",
        "resourceFHIRId": id,
        "dataTrigger": "adhoc",
        "metadata": metadata("run2"),
    })
}

fn spool(dir: &Path, name: &str, contents: Value) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), contents.to_string()).unwrap();
}

fn reader(root: &Path, tenants: Vec<Tenant>, subscribed: &[&str]) -> (SpoolEventSource, TopicReader) {
    let source = SpoolEventSource::new(root, 100);
    let reader = TopicReader::new(
        Arc::new(source.clone()),
        Arc::new(TenantDirectory::new(tenants)),
        "Location",
        subscribed.iter().map(|s| s.to_string()).collect(),
    );
    (source, reader)
}

#[tokio::test]
async fn test_second_subscribed_type_read_when_first_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let (source, reader) = reader(
        temp_dir.path(),
        vec![Tenant::new("tenant", "Test Tenant")],
        &["Appointment", "Encounter"],
    );
    spool(
        &source.publish_dir("Encounter", DataTrigger::Nightly),
        "001.json",
        publish_event("tenant", "Encounter", "enc-1", "nightly"),
    );

    let batch = reader.next_batch().await.unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].event_name.as_deref(), Some(PUBLISH_EVENT_NAME));
    assert!(batch[0].body.contains("enc-1"));
    assert!(reader.next_batch().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_topics_drained_in_priority_order() {
    let temp_dir = TempDir::new().unwrap();
    let (source, reader) = reader(
        temp_dir.path(),
        vec![Tenant::new("tenant", "Test Tenant")],
        &["Appointment"],
    );
    spool(
        &source.publish_dir("Appointment", DataTrigger::AdHoc),
        "001.json",
        publish_event("tenant", "Appointment", "appt-adhoc", "adhoc"),
    );
    spool(&source.load_dir("Location"), "001.json", load_event("tenant", "1234"));
    spool(
        &source.publish_dir("Appointment", DataTrigger::Nightly),
        "001.json",
        publish_event("tenant", "Appointment", "appt-nightly", "nightly"),
    );

    let first = reader.next_batch().await.unwrap();
    let second = reader.next_batch().await.unwrap();
    let third = reader.next_batch().await.unwrap();

    assert!(first[0].body.contains("appt-nightly"));
    assert_eq!(second[0].event_name.as_deref(), Some(LOAD_EVENT_NAME));
    assert_eq!(second[0].run_id.as_deref(), Some("run2"));
    assert!(third[0].body.contains("appt-adhoc"));
    assert!(reader.next_batch().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_blocked_tenant_events_dropped_on_every_stream() {
    let temp_dir = TempDir::new().unwrap();
    let (source, reader) = reader(
        temp_dir.path(),
        vec![
            Tenant::new("blocked", "Blocked Clinic").with_blocked_resources("Appointment, Location"),
            Tenant::new("open", "Open Clinic"),
        ],
        &["Appointment"],
    );
    spool(
        &source.publish_dir("Appointment", DataTrigger::Nightly),
        "001.json",
        json!([
            publish_event("blocked", "Appointment", "appt-1", "nightly"),
            publish_event("open", "Appointment", "appt-2", "nightly"),
        ]),
    );
    spool(
        &source.load_dir("Location"),
        "001.json",
        json!([load_event("blocked", "1"), load_event("open", "2")]),
    );

    let nightly = reader.next_batch().await.unwrap();
    let load = reader.next_batch().await.unwrap();

    assert_eq!(nightly.len(), 1);
    assert_eq!(nightly[0].tenant_mnemonic, "open");
    assert_eq!(load.len(), 1);
    assert_eq!(load[0].tenant_mnemonic, "open");
}

#[tokio::test]
async fn test_fully_blocked_topic_falls_through() {
    let temp_dir = TempDir::new().unwrap();
    let (source, reader) = reader(
        temp_dir.path(),
        vec![Tenant::new("blocked", "Blocked Clinic").with_blocked_resources("Appointment")],
        &["Appointment"],
    );
    spool(
        &source.publish_dir("Appointment", DataTrigger::Nightly),
        "001.json",
        publish_event("blocked", "Appointment", "appt-1", "nightly"),
    );
    spool(&source.load_dir("Location"), "001.json", load_event("blocked", "1234"));

    let batch = reader.next_batch().await.unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].event_name.as_deref(), Some(LOAD_EVENT_NAME));
}

#[tokio::test]
async fn test_invalid_spool_file_set_aside() {
    let temp_dir = TempDir::new().unwrap();
    let (source, reader) = reader(
        temp_dir.path(),
        vec![Tenant::new("tenant", "Test Tenant")],
        &[],
    );
    let dir = source.load_dir("Location");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("001.json"), "{not json").unwrap();
    spool(&dir, "002.json", load_event("tenant", "1234"));

    let batch = reader.next_batch().await.unwrap();

    assert_eq!(batch.len(), 1);
    assert!(dir.join("001.json.invalid").exists());
    assert!(!dir.join("002.json").exists());
}
