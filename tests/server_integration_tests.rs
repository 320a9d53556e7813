// End-to-end tests against servers bound to ephemeral loopback ports.

use dns_workbench::{
    config_reload::ReloadCoordinator,
    dns::{DNSPacket, enums::DNSResourceType, enums::ResponseCode},
    metrics::DnsMetrics,
    resolver::Resolver,
    server::{QueryHandler, TcpTimeouts, serve_tcp, serve_udp},
    zone::{ZoneBuilder, ZoneDefinition, ZoneName, ZoneStore},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream, UdpSocket},
    sync::broadcast,
    task::JoinHandle,
    time::timeout,
};

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    coordinator: Arc<ReloadCoordinator>,
    metrics: Arc<DnsMetrics>,
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

fn definition() -> ZoneDefinition {
    ZoneDefinition::default()
        .with_record("example.com", "example.com", "a", "1.2.3.4")
        .with_record("example.com", "example.com", "mx", "10 mail.example.com")
        .with_record("example.com", "mail.example.com", "a", "1.2.3.5")
}

fn components() -> (Arc<ReloadCoordinator>, Arc<QueryHandler>, Arc<DnsMetrics>) {
    let metrics = Arc::new(DnsMetrics::new().unwrap());
    let store = Arc::new(ZoneStore::default());
    let builder = ZoneBuilder::new(ZoneName::parse("ns.workbench.test").unwrap()).unwrap();
    let coordinator =
        Arc::new(ReloadCoordinator::new(store.clone(), builder).with_metrics(metrics.clone()));
    coordinator.apply(&definition()).unwrap();

    let handler = Arc::new(
        QueryHandler::new(store, Resolver::new(true)).with_metrics(metrics.clone()),
    );
    (coordinator, handler, metrics)
}

async fn start_udp() -> TestServer {
    let (coordinator, handler, metrics) = components();
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = sock.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move {
        serve_udp(sock, handler, shutdown_rx).await.unwrap();
    });
    TestServer {
        addr,
        coordinator,
        metrics,
        shutdown_tx,
        handle,
    }
}

async fn start_tcp(timeouts: TcpTimeouts) -> TestServer {
    let (coordinator, handler, metrics) = components();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move {
        serve_tcp(listener, handler, timeouts, shutdown_rx)
            .await
            .unwrap();
    });
    TestServer {
        addr,
        coordinator,
        metrics,
        shutdown_tx,
        handle,
    }
}

fn default_timeouts() -> TcpTimeouts {
    TcpTimeouts {
        read: Duration::from_secs(2),
        write: Duration::from_secs(2),
        idle: Duration::from_secs(8),
    }
}

async fn udp_exchange(addr: SocketAddr, query: &[u8]) -> Option<DNSPacket> {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(query, addr).await.unwrap();
    let mut buf = vec![0u8; 4096];
    match timeout(Duration::from_millis(500), client.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => Some(DNSPacket::parse(&buf[..len]).unwrap()),
        _ => None,
    }
}

async fn tcp_send(stream: &mut TcpStream, query: &[u8]) {
    stream
        .write_all(&(query.len() as u16).to_be_bytes())
        .await
        .unwrap();
    stream.write_all(query).await.unwrap();
}

async fn tcp_receive(stream: &mut TcpStream) -> DNSPacket {
    let mut len = [0u8; 2];
    timeout(WAIT, stream.read_exact(&mut len))
        .await
        .unwrap()
        .unwrap();
    let mut message = vec![0u8; u16::from_be_bytes(len) as usize];
    timeout(WAIT, stream.read_exact(&mut message))
        .await
        .unwrap()
        .unwrap();
    DNSPacket::parse(&message).unwrap()
}

fn query_bytes(id: u16, name: &str, qtype: DNSResourceType) -> Vec<u8> {
    DNSPacket::query(id, name, qtype).serialize().unwrap()
}

#[tokio::test]
async fn test_udp_answer() {
    let server = start_udp().await;

    let response = udp_exchange(server.addr, &query_bytes(1, "example.com", DNSResourceType::A))
        .await
        .expect("no UDP response");
    assert_eq!(response.header.id, 1);
    assert!(response.header.qr);
    assert!(response.header.aa);
    assert_eq!(response.rcode(), Some(ResponseCode::NoError));
    assert_eq!(response.answers[0].to_string(), "example.com. 3600 IN A 1.2.3.4");
    assert_eq!(
        response.authorities[0].to_string(),
        "example.com. 3600 IN NS ns.workbench.test."
    );

    server.shutdown_tx.send(()).unwrap();
    timeout(WAIT, server.handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_udp_name_error_and_garbage() {
    let server = start_udp().await;

    let response = udp_exchange(server.addr, &query_bytes(2, "nowhere.test", DNSResourceType::A))
        .await
        .expect("no UDP response");
    assert_eq!(response.rcode(), Some(ResponseCode::NameError));

    // too short for a header: no reply at all
    assert!(udp_exchange(server.addr, &[0xde, 0xad]).await.is_none());

    // the server keeps answering afterwards
    let response = udp_exchange(server.addr, &query_bytes(3, "mail.example.com", DNSResourceType::A))
        .await
        .expect("no UDP response");
    assert_eq!(response.answers.len(), 1);

    let counts = server.metrics.queries_by_outcome();
    assert_eq!(counts.get("nxdomain"), Some(&1));
    assert_eq!(counts.get("answer"), Some(&1));

    server.shutdown_tx.send(()).unwrap();
}

#[tokio::test]
async fn test_udp_serves_reloaded_zones() {
    let server = start_udp().await;

    server
        .coordinator
        .apply(&ZoneDefinition::default().with_record("fresh.test", "new.fresh.test", "a", "9.9.9.9"))
        .unwrap();

    let response = udp_exchange(server.addr, &query_bytes(4, "new.fresh.test", DNSResourceType::A))
        .await
        .expect("no UDP response");
    assert_eq!(response.answers[0].to_string(), "new.fresh.test. 3600 IN A 9.9.9.9");

    let response = udp_exchange(server.addr, &query_bytes(5, "example.com", DNSResourceType::A))
        .await
        .expect("no UDP response");
    assert_eq!(response.rcode(), Some(ResponseCode::NameError));

    server.shutdown_tx.send(()).unwrap();
}

#[tokio::test]
async fn test_tcp_multiple_queries_per_connection() {
    let server = start_tcp(default_timeouts()).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    tcp_send(&mut stream, &query_bytes(10, "example.com", DNSResourceType::MX)).await;
    let first = tcp_receive(&mut stream).await;
    assert_eq!(first.header.id, 10);
    assert_eq!(first.answers[0].rdata.to_string(), "10 mail.example.com.");

    tcp_send(&mut stream, &query_bytes(11, "example.com", DNSResourceType::AAAA)).await;
    let second = tcp_receive(&mut stream).await;
    assert_eq!(second.header.id, 11);
    assert_eq!(second.rcode(), Some(ResponseCode::NoError));
    assert!(second.answers.is_empty());
    assert_eq!(second.authorities.len(), 1);

    server.shutdown_tx.send(()).unwrap();
    timeout(WAIT, server.handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_tcp_undecodable_body_gets_formerr() {
    let server = start_tcp(default_timeouts()).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    let mut query = query_bytes(12, "example.com", DNSResourceType::A);
    query.truncate(16);
    tcp_send(&mut stream, &query).await;

    let response = tcp_receive(&mut stream).await;
    assert_eq!(response.header.id, 12);
    assert_eq!(response.rcode(), Some(ResponseCode::FormatError));

    server.shutdown_tx.send(()).unwrap();
}

#[tokio::test]
async fn test_tcp_silent_client_is_disconnected() {
    let server = start_tcp(TcpTimeouts {
        read: Duration::from_millis(100),
        write: Duration::from_millis(100),
        idle: Duration::from_millis(100),
    })
    .await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    let mut buf = [0u8; 1];
    let read = timeout(WAIT, stream.read(&mut buf)).await.unwrap();
    // the server closes the connection without sending anything
    assert!(matches!(read, Ok(0) | Err(_)));

    server.shutdown_tx.send(()).unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_servers() {
    let udp = start_udp().await;
    let tcp = start_tcp(default_timeouts()).await;

    udp.shutdown_tx.send(()).unwrap();
    tcp.shutdown_tx.send(()).unwrap();

    timeout(WAIT, udp.handle).await.unwrap().unwrap();
    timeout(WAIT, tcp.handle).await.unwrap().unwrap();
}
