// SPDX-License-Identifier: AGPL-3.0-or-later

//! Loopback tests for cloudlet selection by RTT probing (spec §4.6,
//! §8 scenario 3).

use std::collections::HashMap;
use std::time::Duration;

use ens_core::prober;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Runs a fake cloudlet probe endpoint: accepts one connection, speaks
/// `ENS-PROBE`/`ENS-RTT` with an injected per-reply delay, and returns
/// its bound address.
async fn spawn_fake_cloudlet(reply_delay: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake cloudlet");
    let addr = listener.local_addr().expect("listener has a local addr");

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else { return };
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();

        if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
            return;
        }
        let _ = write_half.write_all(b"ENS-PROBE-OK\r\n").await;

        loop {
            line.clear();
            tokio::time::sleep(reply_delay).await;
            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                break;
            }
            if write_half.write_all(b"ENS-RTT-OK\r\n").await.is_err() {
                break;
            }
        }
    });

    format!("tcp://{addr}")
}

#[tokio::test]
async fn selects_the_cloudlet_with_the_lowest_mean_rtt() {
    let fast = spawn_fake_cloudlet(Duration::from_millis(2)).await;
    let slow = spawn_fake_cloudlet(Duration::from_millis(80)).await;

    let mut candidates = HashMap::new();
    candidates.insert("fast-cloudlet".to_string(), fast);
    candidates.insert("slow-cloudlet".to_string(), slow);

    let (selected_id, probe) = prober::select_cloudlet(&candidates, "demo-app")
        .await
        .expect("at least one cloudlet responds");

    assert_eq!(selected_id, "fast-cloudlet");
    assert!(probe.mean().is_some());
}

#[tokio::test]
async fn no_cloudlets_respond_yields_none() {
    let candidates: HashMap<String, String> = HashMap::new();
    assert!(prober::select_cloudlet(&candidates, "demo-app").await.is_none());
}
