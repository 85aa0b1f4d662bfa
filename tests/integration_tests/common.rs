// SPDX-License-Identifier: AGPL-3.0-or-later

use ens_core::endpoint::Endpoint;
use tokio::net::TcpListener;

/// Binds an ephemeral loopback listener and returns it alongside the
/// `tcp://` endpoint string pointing back at it.
pub async fn bind_loopback() -> (TcpListener, Endpoint) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener has a local addr");
    let endpoint = Endpoint::parse(&format!("tcp://{addr}")).expect("format parses");
    (listener, endpoint)
}
