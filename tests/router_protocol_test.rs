//! MikrotikSession against an in-process RouterOS API server.

use mikrotik_billing::config::{NetworkConfig, RouterConfig};
use mikrotik_billing::reconcile::{push_usage_update, sync_router, SyncStatus};
use mikrotik_billing::router::protocol::{encode_length, parse_attributes, read_sentence, write_sentence};
use mikrotik_billing::router::{MikrotikSession, RouterError, RouterSession};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

type Writes = Arc<Mutex<Vec<(String, String)>>>;

#[derive(Clone, Copy, PartialEq, Default)]
enum LoginMode {
    #[default]
    Plain,
    Legacy,
}

#[derive(Clone, Copy, Default)]
struct Behavior {
    login: LoginMode,
    /// Lease id whose `set` is answered only after this delay.
    slow_set: Option<(&'static str, Duration)>,
    /// Send the comment of lease *1 as cp1252 bytes.
    cp1252_comment: bool,
}

struct MockRouter {
    port: u16,
    writes: Writes,
}

async fn reply(stream: &mut TcpStream, sentences: &[Vec<&str>]) {
    for sentence in sentences {
        // The client may already have hung up on a slow reply
        if write_sentence(stream, sentence).await.is_err() {
            return;
        }
    }
}

async fn reply_bytes(stream: &mut TcpStream, words: &[&[u8]]) {
    let mut buf = Vec::new();
    for word in words {
        buf.extend_from_slice(&encode_length(word.len()));
        buf.extend_from_slice(word);
    }
    buf.push(0);
    let _ = stream.write_all(&buf).await;
}

async fn serve(mut stream: TcpStream, writes: Writes, behavior: Behavior) {
    while let Ok(words) = read_sentence(&mut stream).await {
        let Some(command) = words.first().cloned() else {
            continue;
        };
        let attrs = parse_attributes(&words[1..]);

        match command.as_str() {
            "/login" if behavior.login == LoginMode::Legacy => {
                reply(&mut stream, &[vec!["!done", "=ret=9c3a1b2f4d5e6f70"]]).await;
            }
            "/login" => {
                if attrs.get("password").map(String::as_str) == Some("secret") {
                    reply(&mut stream, &[vec!["!done"]]).await;
                } else {
                    reply(
                        &mut stream,
                        &[
                            vec!["!trap", "=message=invalid user name or password (6)"],
                            vec!["!done"],
                        ],
                    )
                    .await;
                }
            }
            "/ip/dhcp-server/lease/print" => {
                let comment: &[u8] = if behavior.cp1252_comment {
                    &b"=comment=nama:Jos\xe9; vlan:20"[..]
                } else {
                    &b"=comment=nama:Andi; vlan:20"[..]
                };
                reply_bytes(&mut stream, &[&b"!re"[..], &b"=.id=*1"[..], &b"=address=192.168.2.10"[..], comment]).await;
                reply(
                    &mut stream,
                    &[
                        vec!["!re", "=.id=*2", "=address=192.168.2.11"],
                        vec!["!re", "=.id=*3", "=address=192.168.2.12", "=comment=nama:Budi; harga:150.000"],
                        vec!["!done"],
                    ],
                )
                .await;
            }
            "/queue/simple/print" => {
                assert!(attrs.contains_key("stats"));
                reply(
                    &mut stream,
                    &[
                        vec!["!re", "=name=andi", "=target=192.168.2.10/32", "=bytes=1073741824/0"],
                        vec!["!done"],
                    ],
                )
                .await;
            }
            "/interface/print" => {
                reply(
                    &mut stream,
                    &[
                        vec!["!re", "=name=ether1", "=rx-byte=536870912", "=tx-byte=0"],
                        vec!["!done"],
                    ],
                )
                .await;
            }
            "/ip/dhcp-server/lease/set" => {
                let id = attrs.get(".id").cloned().unwrap_or_default();
                if let Some((slow_id, delay)) = behavior.slow_set {
                    if id == slow_id {
                        tokio::time::sleep(delay).await;
                    }
                }
                if id == "*3" {
                    reply(&mut stream, &[vec!["!trap", "=message=no such item"], vec!["!done"]]).await;
                } else {
                    let comment = attrs.get("comment").cloned().unwrap_or_default();
                    writes.lock().unwrap().push((id, comment));
                    reply(&mut stream, &[vec!["!done"]]).await;
                }
            }
            "/system/resource/print" => {
                reply(
                    &mut stream,
                    &[
                        vec!["!re", "=board-name=hEX", "=version=7.14.2 (stable)", "=uptime=1d2h3m"],
                        vec!["!done"],
                    ],
                )
                .await;
            }
            _ => {
                reply(&mut stream, &[vec!["!trap", "=message=no such command"], vec!["!done"]]).await;
            }
        }
    }
}

async fn start_mock(login: LoginMode) -> MockRouter {
    start_mock_with(Behavior {
        login,
        ..Behavior::default()
    })
    .await
}

async fn start_mock_with(behavior: Behavior) -> MockRouter {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let writes = Writes::default();
    let server_writes = writes.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream, server_writes.clone(), behavior));
        }
    });

    MockRouter { port, writes }
}

fn session(port: u16, password: &str) -> MikrotikSession {
    session_with_io_timeout(port, password, 2)
}

fn session_with_io_timeout(port: u16, password: &str, io_timeout_secs: u64) -> MikrotikSession {
    let router = RouterConfig {
        id: "mock".to_string(),
        label: "Mock".to_string(),
        host: "127.0.0.1".to_string(),
        port,
        username: "admin".to_string(),
        password: password.to_string(),
    };
    let network = NetworkConfig {
        connect_timeout_secs: 2,
        io_timeout_secs,
    };
    MikrotikSession::new(router, &network)
}

#[tokio::test]
async fn test_login_and_identity() {
    let mock = start_mock(LoginMode::Plain).await;
    let mut session = session(mock.port, "secret");

    session.connect().await.unwrap();
    assert!(session.is_connected());

    let identity = session.identity().await.unwrap();
    assert_eq!(identity.board_name, "hEX");
    assert_eq!(identity.version, "7.14.2 (stable)");

    session.disconnect().await;
    assert!(!session.is_connected());
    // Disconnecting twice is harmless
    session.disconnect().await;
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let mock = start_mock(LoginMode::Plain).await;
    let mut session = session(mock.port, "wrong");

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, RouterError::LoginRejected(ref m) if m.contains("invalid user name")));
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_legacy_login_is_reported() {
    let mock = start_mock(LoginMode::Legacy).await;
    let mut session = session(mock.port, "secret");

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, RouterError::LegacyLogin));
}

#[tokio::test]
async fn test_requests_need_a_connection() {
    let mock = start_mock(LoginMode::Plain).await;
    let mut session = session(mock.port, "secret");

    assert!(matches!(session.list_leases().await, Err(RouterError::NotConnected)));
}

#[tokio::test]
async fn test_list_leases_with_comment() {
    let mock = start_mock(LoginMode::Plain).await;
    let mut session = session(mock.port, "secret");
    session.connect().await.unwrap();

    let all = session.list_leases().await.unwrap();
    assert_eq!(all.len(), 3);

    let leases = session.list_leases_with_comment().await.unwrap();
    let ids: Vec<&str> = leases.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["*1", "*3"]);
    assert_eq!(leases[0].metadata.passthrough_value("vlan"), Some("20"));
}

#[tokio::test]
async fn test_trap_on_set_is_an_error() {
    let mock = start_mock(LoginMode::Plain).await;
    let mut session = session(mock.port, "secret");
    session.connect().await.unwrap();

    let err = session.set_lease_comment("*3", "nama:Budi").await.unwrap_err();
    assert!(matches!(err, RouterError::Trap(ref m) if m == "no such item"));

    // The session stays usable after a trap
    session.set_lease_comment("*1", "nama:Andi").await.unwrap();
    assert_eq!(
        mock.writes.lock().unwrap().clone(),
        vec![("*1".to_string(), "nama:Andi".to_string())]
    );
}

#[tokio::test]
async fn test_set_comment_by_address() {
    let mock = start_mock(LoginMode::Plain).await;
    let mut session = session(mock.port, "secret");
    session.connect().await.unwrap();

    session
        .set_lease_comment_by_address("192.168.2.11", "nama:Dewi")
        .await
        .unwrap();
    let err = session
        .set_lease_comment_by_address("192.168.2.99", "nama:Eko")
        .await
        .unwrap_err();

    assert!(matches!(err, RouterError::LeaseNotFound(ref a) if a == "192.168.2.99"));
    assert_eq!(mock.writes.lock().unwrap()[0], ("*2".to_string(), "nama:Dewi".to_string()));
}

#[tokio::test]
async fn test_sync_over_the_wire() {
    let mock = start_mock(LoginMode::Plain).await;
    let mut session = session(mock.port, "secret");

    let sync = sync_router(&mut session).await;

    assert_eq!(sync.status, SyncStatus::Synced { leases: 2 });
    assert_eq!(sync.customers[0].name, "Andi");
    assert_eq!(sync.customers[0].usage_total, "1.00 GB");
    assert_eq!(sync.customers[1].name, "Budi");
    assert_eq!(sync.customers[1].price, 150000);
    // No queue covers Budi, so the interface total is used
    assert_eq!(sync.customers[1].usage_total, "512.00 MB");
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_push_over_the_wire() {
    let mock = start_mock(LoginMode::Plain).await;
    let mut session = session(mock.port, "secret");

    let report = push_usage_update(&mut session).await;

    assert_eq!(report.updated, 1);
    assert_eq!(report.failed, 1);
    let writes = mock.writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 1);
    assert_eq!(
        writes[0],
        (
            "*1".to_string(),
            "nama:Andi; vlan:20; Usage: Total: 1.00 GB; QueueSimple: 1.00 GB".to_string()
        )
    );
}

#[tokio::test]
async fn test_unreachable_router() {
    // Bind then drop to get a port nothing listens on
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut session = session(port, "secret");

    let sync = sync_router(&mut session).await;

    assert!(sync.customers.is_empty());
    assert!(matches!(sync.status, SyncStatus::Unreachable { .. }));
}

#[tokio::test]
async fn test_timed_out_write_drops_the_connection() {
    let mock = start_mock_with(Behavior {
        slow_set: Some(("*1", Duration::from_millis(1500))),
        ..Behavior::default()
    })
    .await;
    let mut session = session_with_io_timeout(mock.port, "secret", 1);

    let report = push_usage_update(&mut session).await;

    // The late answer to *1 must not be taken as the answer for *3
    assert_eq!(report.updated, 0);
    assert_eq!(report.failed, 2);
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_requests_after_a_timeout_fail_cleanly() {
    let mock = start_mock_with(Behavior {
        slow_set: Some(("*1", Duration::from_millis(1500))),
        ..Behavior::default()
    })
    .await;
    let mut session = session_with_io_timeout(mock.port, "secret", 1);
    session.connect().await.unwrap();

    let err = session.set_lease_comment("*1", "nama:Andi").await.unwrap_err();
    assert!(matches!(err, RouterError::Timeout(_)));
    assert!(matches!(session.list_leases().await, Err(RouterError::NotConnected)));

    // A fresh connect starts over on a clean stream
    session.connect().await.unwrap();
    assert_eq!(session.list_leases().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_push_leaves_undecodable_comment_alone() {
    let mock = start_mock_with(Behavior {
        cp1252_comment: true,
        ..Behavior::default()
    })
    .await;
    let mut session = session(mock.port, "secret");

    let report = push_usage_update(&mut session).await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(report.failed, 1);
    assert!(mock.writes.lock().unwrap().is_empty());
}
