//! Reconciliation over scripted router sessions.

mod common;

use common::{FakeSession, GB};
use mikrotik_billing::manual::{ManualCustomer, ManualCustomerStore};
use mikrotik_billing::models::{CustomerSource, UsageSource};
use mikrotik_billing::reconcile::{
    push_usage_update, sync_router, BillingEngine, CustomerEdit, RouterTarget, SyncStatus,
};
use mikrotik_billing::router::RouterSession;
use mikrotik_billing::usage::combine;
use tempfile::TempDir;

fn empty_store(dir: &TempDir) -> ManualCustomerStore {
    ManualCustomerStore::new(dir.path().join("customers.json"))
}

#[tokio::test]
async fn test_sync_unreachable_router_returns_empty() {
    let mut session = FakeSession::new("kantor", "10.0.0.1")
        .lease("*1", "192.168.2.10", "nama:Andi")
        .unreachable();

    let sync = sync_router(&mut session).await;

    assert!(sync.customers.is_empty());
    assert!(matches!(sync.status, SyncStatus::Unreachable { .. }));
    assert_eq!(sync.router_id, "kantor");
}

#[tokio::test]
async fn test_sync_builds_records_with_defaults() {
    let mut session = FakeSession::new("kantor", "10.0.0.1")
        .lease("*1", "192.168.2.10", "nama:Andi; paket:10Mbps; harga:100000; due:10/11/2025; no_hp:0812")
        .lease("*2", "192.168.2.11", "   ")
        .lease("*3", "192.168.2.12", "catatan:baru");
    let log = session.log.clone();

    let sync = sync_router(&mut session).await;

    assert_eq!(sync.status, SyncStatus::Synced { leases: 2 });
    assert_eq!(sync.customers.len(), 2);

    let andi = &sync.customers[0];
    assert_eq!(andi.name, "Andi");
    assert_eq!(andi.price, 100000);
    assert_eq!(andi.due_date.to_iso().as_deref(), Some("2025-11-10"));
    assert_eq!(
        andi.source,
        CustomerSource::Router {
            router_id: "kantor".to_string(),
            lease_id: "*1".to_string()
        }
    );

    let unknown = &sync.customers[1];
    assert_eq!(unknown.name, "Unknown");
    assert_eq!(unknown.package, "-");
    assert_eq!(unknown.phone, "-");
    assert_eq!(unknown.price, 0);

    let log = log.lock().unwrap();
    assert_eq!(log.connects, 1);
    assert_eq!(log.disconnects, 1);
}

#[tokio::test]
async fn test_queue_usage_wins_over_interfaces() {
    let mut session = FakeSession::new("kantor", "10.0.0.1")
        .lease("*1", "192.168.2.10", "nama:Andi")
        .queue("192.168.2.10/32", "1073741824/0")
        .interface("ether1", 5 * GB, 0);

    let sync = sync_router(&mut session).await;
    let andi = &sync.customers[0];

    assert_eq!(andi.usage_total, "1.00 GB");
    assert_eq!(andi.usage_per_interface.len(), 1);
    assert_eq!(andi.usage_per_interface[0].name, "QueueSimple");
}

#[tokio::test]
async fn test_interface_fallback_when_queue_listing_fails() {
    let mut session = FakeSession::new("kantor", "10.0.0.1")
        .lease("*1", "192.168.2.10", "nama:Andi")
        .queue("192.168.2.10/32", "1073741824/0")
        .interface("ether1", GB / 2, 0)
        .interface("ether2", GB, GB / 2);
    session.queues_fail = true;

    let sync = sync_router(&mut session).await;
    let andi = &sync.customers[0];

    assert_eq!(sync.status, SyncStatus::Synced { leases: 1 });
    assert_eq!(andi.usage_total, "2.00 GB");
    let names: Vec<&str> = andi.usage_per_interface.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["ether1", "ether2"]);

    let usage = combine("192.168.2.10", &[], &session.interfaces);
    assert_eq!(usage.source, UsageSource::Interfaces);
}

#[tokio::test]
async fn test_push_merges_usage_and_keeps_unknown_fields() {
    let mut session = FakeSession::new("kantor", "10.0.0.1")
        .lease("*1", "192.168.2.10", "nama:Andi; vlan:20; Usage: Total: 9.00 GB")
        .queue("192.168.2.10/32", "1073741824/1073741824");
    let log = session.log.clone();

    let report = push_usage_update(&mut session).await;

    assert_eq!(report.updated, 1);
    assert_eq!(report.failed, 0);
    let writes = &log.lock().unwrap().writes;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, "*1");
    assert_eq!(
        writes[0].1,
        "nama:Andi; vlan:20; Usage: Total: 2.00 GB; QueueSimple: 2.00 GB"
    );
}

#[tokio::test]
async fn test_push_is_stable_across_runs() {
    let mut session = FakeSession::new("kantor", "10.0.0.1")
        .lease("*1", "192.168.2.10", "nama:Andi")
        .queue("192.168.2.10/32", "1073741824/0");

    push_usage_update(&mut session).await;
    push_usage_update(&mut session).await;

    let comment = &session.leases[0].comment;
    let usage_segments = comment.split(';').filter(|s| s.trim().starts_with("Usage:")).count();
    assert_eq!(usage_segments, 1);
    assert!(comment.starts_with("nama:Andi; "));
}

#[tokio::test]
async fn test_push_continues_after_failed_write() {
    let mut session = FakeSession::new("kantor", "10.0.0.1")
        .lease("*1", "192.168.2.10", "nama:Andi")
        .lease("*2", "192.168.2.11", "nama:Budi")
        .lease("*3", "192.168.2.12", "nama:Citra")
        .failing_write("*2");
    let log = session.log.clone();

    let report = push_usage_update(&mut session).await;

    assert_eq!(report.updated, 2);
    assert_eq!(report.failed, 1);
    let log = log.lock().unwrap();
    let written: Vec<&str> = log.writes.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(written, vec!["*1", "*3"]);
    assert_eq!(log.disconnects, 1);
}

#[tokio::test]
async fn test_push_on_unreachable_router() {
    let mut session = FakeSession::new("kantor", "10.0.0.1")
        .lease("*1", "192.168.2.10", "nama:Andi")
        .unreachable();

    let report = push_usage_update(&mut session).await;

    assert!(matches!(report.status, SyncStatus::Unreachable { .. }));
    assert_eq!(report.updated, 0);
    assert!(session.log.lock().unwrap().writes.is_empty());
}

#[tokio::test]
async fn test_collect_orders_manual_then_routers() {
    let dir = TempDir::new().unwrap();
    let store = empty_store(&dir);
    store.add(ManualCustomer::new("Zaki", "192.168.9.9")).unwrap();

    let first = FakeSession::new("kantor", "10.0.0.1")
        .lease("*1", "192.168.2.10", "nama:Andi")
        .lease("*2", "192.168.2.11", "nama:Budi");
    let down = FakeSession::new("gudang", "10.0.0.3").unreachable();
    let second = FakeSession::new("rumah", "10.0.0.2").lease("*7", "192.168.3.10", "nama:Citra");

    let sessions: Vec<Box<dyn RouterSession>> = vec![Box::new(first), Box::new(down), Box::new(second)];
    let mut engine = BillingEngine::new(sessions, store);

    let collection = engine.collect_customers(&RouterTarget::All).await.unwrap();

    let names: Vec<&str> = collection.customers.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Zaki", "Andi", "Budi", "Citra"]);
    assert!(collection.customers[0].is_manual());

    let routers: Vec<&str> = collection.routers.iter().map(|r| r.router_id.as_str()).collect();
    assert_eq!(routers, vec!["kantor", "gudang", "rumah"]);
    let unreachable: Vec<&str> = collection.unreachable().map(|r| r.router_id.as_str()).collect();
    assert_eq!(unreachable, vec!["gudang"]);
}

#[tokio::test]
async fn test_collect_single_router() {
    let dir = TempDir::new().unwrap();
    let sessions: Vec<Box<dyn RouterSession>> = vec![
        Box::new(FakeSession::new("kantor", "10.0.0.1").lease("*1", "192.168.2.10", "nama:Andi")),
        Box::new(FakeSession::new("rumah", "10.0.0.2").lease("*7", "192.168.3.10", "nama:Citra")),
    ];
    let mut engine = BillingEngine::new(sessions, empty_store(&dir));

    let collection = engine
        .collect_customers(&RouterTarget::Router("10.0.0.2".to_string()))
        .await
        .unwrap();

    assert_eq!(collection.customers.len(), 1);
    assert_eq!(collection.customers[0].name, "Citra");
    assert_eq!(collection.routers.len(), 1);
}

#[tokio::test]
async fn test_collect_unknown_router_fails() {
    let dir = TempDir::new().unwrap();
    let sessions: Vec<Box<dyn RouterSession>> = vec![Box::new(FakeSession::new("kantor", "10.0.0.1"))];
    let mut engine = BillingEngine::new(sessions, empty_store(&dir));

    let err = engine
        .collect_customers(&RouterTarget::Router("gudang".to_string()))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("gudang"));
    assert!(err.to_string().contains("kantor"));
}

#[tokio::test]
async fn test_collect_with_no_routers_and_no_manual_file() {
    let dir = TempDir::new().unwrap();
    let mut engine = BillingEngine::new(Vec::new(), empty_store(&dir));

    let collection = engine.collect_customers(&RouterTarget::All).await.unwrap();

    assert!(collection.customers.is_empty());
    assert!(collection.routers.is_empty());
}

#[tokio::test]
async fn test_edit_lease_comment_preserves_unknown_fields() {
    let dir = TempDir::new().unwrap();
    let session = FakeSession::new("kantor", "10.0.0.1")
        .lease("*1", "192.168.2.10", "vlan:20; nama:Andi; Usage: Total: 1.00 GB");
    let log = session.log.clone();
    let mut engine = BillingEngine::new(vec![Box::new(session)], empty_store(&dir));

    let edit = CustomerEdit {
        package: Some("20Mbps".to_string()),
        price: Some("Rp 200.000".to_string()),
        ..Default::default()
    };
    let comment = engine.edit_lease_comment("kantor", "192.168.2.10", &edit).await.unwrap();

    assert_eq!(comment, "nama:Andi; paket:20Mbps; harga:200000; Usage:Total: 1.00 GB; vlan:20");
    assert_eq!(log.lock().unwrap().writes, vec![("*1".to_string(), comment)]);
}

#[tokio::test]
async fn test_edit_lease_comment_unknown_address() {
    let dir = TempDir::new().unwrap();
    let session = FakeSession::new("kantor", "10.0.0.1").lease("*1", "192.168.2.10", "nama:Andi");
    let mut engine = BillingEngine::new(vec![Box::new(session)], empty_store(&dir));

    let edit = CustomerEdit {
        phone: Some("0812".to_string()),
        ..Default::default()
    };
    let err = engine.edit_lease_comment("kantor", "192.168.2.99", &edit).await.unwrap_err();

    assert!(format!("{:#}", err).contains("no lease with address 192.168.2.99"));
}

#[tokio::test]
async fn test_edit_refuses_undecodable_comment() {
    let dir = TempDir::new().unwrap();
    let session = FakeSession::new("kantor", "10.0.0.1").lease("*1", "192.168.2.10", "nama:Jos\u{FFFD}; vlan:20");
    let log = session.log.clone();
    let mut engine = BillingEngine::new(vec![Box::new(session)], empty_store(&dir));

    let edit = CustomerEdit {
        phone: Some("0812".to_string()),
        ..Default::default()
    };
    let err = engine.edit_lease_comment("kantor", "192.168.2.10", &edit).await.unwrap_err();

    assert!(format!("{:#}", err).contains("not valid UTF-8"));
    assert!(log.lock().unwrap().writes.is_empty());
}

#[tokio::test]
async fn test_push_skips_undecodable_comment() {
    let mut session = FakeSession::new("kantor", "10.0.0.1")
        .lease("*1", "192.168.2.10", "nama:Jos\u{FFFD}; vlan:20")
        .lease("*2", "192.168.2.11", "nama:Budi");
    let log = session.log.clone();

    let report = push_usage_update(&mut session).await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.failed, 0);
    let log = log.lock().unwrap();
    assert_eq!(log.writes.len(), 1);
    assert_eq!(log.writes[0].0, "*2");
}

#[tokio::test]
async fn test_connection_check() {
    let dir = TempDir::new().unwrap();
    let sessions: Vec<Box<dyn RouterSession>> = vec![
        Box::new(FakeSession::new("kantor", "10.0.0.1")),
        Box::new(FakeSession::new("gudang", "10.0.0.3").unreachable()),
    ];
    let mut engine = BillingEngine::new(sessions, empty_store(&dir));

    let identity = engine.test_connection("kantor").await.unwrap();
    assert_eq!(identity.board_name, "RB750Gr3");

    assert!(engine.test_connection("gudang").await.is_err());
    assert!(engine.test_connection("nowhere").await.is_err());
}
