//! Runs the UDP/TCP transport against a server on the loopback interface.

use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use domain_parallel::base::iana::{Class, Rcode, Rtype};
use domain_parallel::base::{Dname, Message, MessageBuilder, Section};
use domain_parallel::net::client::request::{
    Connect, RequestMessage, UdpTcpConnect,
};
use domain_parallel::net::client::stream::{read_message, write_message};
use domain_parallel::rdata::{answer_data, A};
use domain_parallel::resolv::{ResolvConf, ResolverConfig};
use tokio::net::{TcpListener, UdpSocket};
use tokio::time::{timeout, Duration};

const ADDR: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 80);

/// Counts the queries the loopback server received.
#[derive(Debug, Default)]
struct Received {
    udp: AtomicUsize,
    tcp: AtomicUsize,
}

fn answer(query: &Message, truncated: bool) -> Message {
    let mut builder = MessageBuilder::start_answer(query, Rcode::NOERROR);
    if truncated {
        builder.header_mut().set_tc(true);
    } else {
        let qname = query.first_question().unwrap().qname().clone();
        builder
            .push_record(
                Section::Answer,
                &qname,
                Rtype::A,
                Class::IN,
                300,
                &ADDR.octets(),
            )
            .unwrap();
    }
    builder.into_message().unwrap()
}

/// Starts a server that truncates over UDP and answers fully over TCP.
async fn start_server() -> (SocketAddr, Arc<Received>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let udp = UdpSocket::bind(addr).await.unwrap();
    let received = Arc::new(Received::default());

    let udp_received = received.clone();
    tokio::spawn(async move {
        let mut buf = vec![0; 4096];
        loop {
            let (len, peer) = udp.recv_from(&mut buf).await.unwrap();
            udp_received.udp.fetch_add(1, Ordering::SeqCst);
            let query =
                Message::from_octets(buf[..len].to_vec().into()).unwrap();
            udp.send_to(answer(&query, true).as_slice(), peer)
                .await
                .unwrap();
        }
    });

    let tcp_received = received.clone();
    tokio::spawn(async move {
        loop {
            let (mut sock, _) = listener.accept().await.unwrap();
            let tcp_received = tcp_received.clone();
            tokio::spawn(async move {
                while let Ok(octets) = read_message(&mut sock).await {
                    tcp_received.tcp.fetch_add(1, Ordering::SeqCst);
                    let query = Message::from_octets(octets).unwrap();
                    write_message(&mut sock, answer(&query, false).as_slice())
                        .await
                        .unwrap();
                }
            });
        }
    });

    (addr, received)
}

fn query() -> Message {
    MessageBuilder::new_query(&Dname::from_str("example.com").unwrap(), Rtype::A)
        .into_message()
        .unwrap()
}

fn config() -> ResolverConfig {
    ResolverConfig::from_resolv_conf(&ResolvConf::default())
}

async fn exchange(
    addr: SocketAddr,
    config: ResolverConfig,
) -> Message {
    let conn = UdpTcpConnect.connect(addr);
    let mut request =
        conn.send_request(RequestMessage::new(query(), Arc::new(config)));
    request.get_response().await.unwrap()
}

#[tokio::test]
async fn truncated_answer_retried_over_tcp() {
    let (addr, received) = start_server().await;
    let answer = exchange(addr, config()).await;
    assert!(!answer.header().tc());
    let addrs: Vec<_> = answer_data::<A>(&answer, None)
        .unwrap()
        .into_iter()
        .map(|a| a.addr())
        .collect();
    assert_eq!(addrs, [ADDR]);
    assert_eq!(received.udp.load(Ordering::SeqCst), 1);
    assert_eq!(received.tcp.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn truncation_ignored() {
    let (addr, received) = start_server().await;
    let mut config = config();
    config.set_ignore_truncation(true);
    let answer = exchange(addr, config).await;
    assert!(answer.header().tc());
    assert!(answer.answer().is_empty());
    assert_eq!(received.tcp.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn tcp_only() {
    let (addr, received) = start_server().await;
    let mut config = config();
    config.set_use_tcp(true);
    let answer = exchange(addr, config).await;
    assert_eq!(answer.answer().len(), 1);
    assert_eq!(received.udp.load(Ordering::SeqCst), 0);
    assert_eq!(received.tcp.load(Ordering::SeqCst), 1);
}

/// Starts a UDP server answering with `count` A records and no TC bit.
async fn start_large_server(count: usize) -> SocketAddr {
    let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = udp.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = vec![0; 4096];
        loop {
            let (len, peer) = udp.recv_from(&mut buf).await.unwrap();
            let query =
                Message::from_octets(buf[..len].to_vec().into()).unwrap();
            let qname = query.first_question().unwrap().qname().clone();
            let mut builder =
                MessageBuilder::start_answer(&query, Rcode::NOERROR);
            for i in 0..count {
                builder
                    .push_record(
                        Section::Answer,
                        &qname,
                        Rtype::A,
                        Class::IN,
                        300,
                        &[10, 0, (i >> 8) as u8, i as u8],
                    )
                    .unwrap();
            }
            let answer = builder.into_message().unwrap();
            udp.send_to(answer.as_slice(), peer).await.unwrap();
        }
    });
    addr
}

#[tokio::test]
async fn answer_larger_than_default_buffer() {
    let addr = start_large_server(300).await;
    let mut config = config();
    config.set_edns(0, 8192, 0, Vec::new()).unwrap();
    let answer = timeout(Duration::from_secs(2), exchange(addr, config))
        .await
        .unwrap();
    assert!(answer.as_slice().len() > 4096);
    assert_eq!(answer_data::<A>(&answer, None).unwrap().len(), 300);
}
