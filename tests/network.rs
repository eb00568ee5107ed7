//! End-to-end over real sockets: three replicas booted through `Config`,
//! driven by a client speaking the framed wire protocol.

use std::net::SocketAddr;

use paxos_kv::{external, ClientRequest, ClientResponse, Config};

/// Reserves an ephemeral localhost port by binding and dropping a
/// listener before the replica reuses the address.
fn reserve_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("local addr")
}

async fn request(addr: SocketAddr, request: ClientRequest) -> ClientResponse {
    let stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
    let (mut rx, mut tx) = external::split::<ClientResponse, ClientRequest>(stream);
    tx.send(&request).await.expect("send");
    rx.recv().await.expect("closed").expect("decode")
}

#[tokio::test(flavor = "multi_thread")]
async fn three_replicas_over_tcp() {
    let peer_addrs = (0..3).map(|_| reserve_port()).collect::<Vec<_>>();
    let client_addrs = (0..3).map(|_| reserve_port()).collect::<Vec<_>>();

    let (a, b, c) = tokio::join!(
        Config::new(0, client_addrs[0], peer_addrs.clone()).run(),
        Config::new(1, client_addrs[1], peer_addrs.clone()).run(),
        Config::new(2, client_addrs[2], peer_addrs.clone()).run(),
    );
    a.expect("replica 0");
    b.expect("replica 1");
    c.expect("replica 2");

    assert_eq!(
        request(client_addrs[0], ClientRequest::Put {
            key: "k1".to_string(),
            value: "v1".to_string(),
        }).await,
        ClientResponse::Success,
    );
    assert_eq!(
        request(client_addrs[0], ClientRequest::Get { key: "k1".to_string() }).await,
        ClientResponse::Value("v1".to_string()),
    );
    assert_eq!(
        request(client_addrs[0], ClientRequest::Get { key: "nope".to_string() }).await,
        ClientResponse::NotFound,
    );
    assert_eq!(
        request(client_addrs[0], ClientRequest::GetAll).await,
        ClientResponse::Listing(vec![("k1".to_string(), "v1".to_string())]),
    );
    assert_eq!(
        request(client_addrs[1], ClientRequest::Delete { key: "k1".to_string() }).await,
        ClientResponse::Success,
    );
    assert_eq!(
        request(client_addrs[1], ClientRequest::Get { key: "k1".to_string() }).await,
        ClientResponse::NotFound,
    );
}
