// SPDX-License-Identifier: AGPL-3.0-or-later

//! Loopback TCP tests for the event session's wire protocol: the
//! handshake, request/response correlation, and notify delivery order
//! (spec §8, scenarios 1-2).

use std::time::Duration;

use ens_core::frame::{self, MsgId};
use ens_core::session::EventSession;
use tokio::io::AsyncWriteExt;

use super::common::bind_loopback;

#[tokio::test]
async fn echo_request_response_happy_path() {
    let (listener, endpoint) = bind_loopback().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let (mut read_half, mut write_half) = stream.into_split();

        let start = frame::read_frame(&mut read_half).await.expect("read SESSION_START");
        assert_eq!(start.msg_id, MsgId::SessionStart as u32);
        frame::write_frame(&mut write_half, MsgId::SessionStarted as u32, 0, &[])
            .await
            .expect("write SESSION_STARTED");

        let req = frame::read_frame(&mut read_half).await.expect("read REQUEST");
        assert_eq!(req.msg_id, MsgId::Request as u32);
        frame::write_frame(&mut write_half, MsgId::Response as u32, req.seq, &req.payload)
            .await
            .expect("write RESPONSE");
    });

    let session = EventSession::connect(1, "robot-arm.angle".to_string(), &endpoint)
        .await
        .expect("session connects");

    let response = session.request(b"ping").await.expect("request completes");
    assert_eq!(&response[..], b"ping");
}

#[tokio::test]
async fn notifies_arrive_in_order_while_a_request_is_pending() {
    let (listener, endpoint) = bind_loopback().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let (mut read_half, mut write_half) = stream.into_split();

        frame::read_frame(&mut read_half).await.expect("read SESSION_START");
        frame::write_frame(&mut write_half, MsgId::SessionStarted as u32, 0, &[])
            .await
            .expect("write SESSION_STARTED");

        let req = frame::read_frame(&mut read_half).await.expect("read REQUEST");

        frame::write_frame(&mut write_half, MsgId::Notify as u32, 7, b"first")
            .await
            .expect("write NOTIFY 7");
        frame::write_frame(&mut write_half, MsgId::Notify as u32, 8, b"second")
            .await
            .expect("write NOTIFY 8");
        frame::write_frame(&mut write_half, MsgId::Response as u32, req.seq, b"pong")
            .await
            .expect("write RESPONSE");
    });

    let session = EventSession::connect(1, "robot-arm.angle".to_string(), &endpoint)
        .await
        .expect("session connects");

    let response = session.request(b"ping").await.expect("request completes");
    assert_eq!(&response[..], b"pong");

    let (seq1, payload1) = session
        .get_notify(true, Some(Duration::from_millis(500)))
        .await
        .expect("first notify arrives");
    assert_eq!(seq1, 7);
    assert_eq!(&payload1[..], b"first");

    let (seq2, payload2) = session
        .get_notify(true, Some(Duration::from_millis(500)))
        .await
        .expect("second notify arrives");
    assert_eq!(seq2, 8);
    assert_eq!(&payload2[..], b"second");
}

#[tokio::test]
async fn peer_disconnect_releases_pending_waiter_with_empty_payload() {
    let (listener, endpoint) = bind_loopback().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let (mut read_half, mut write_half) = stream.into_split();

        frame::read_frame(&mut read_half).await.expect("read SESSION_START");
        frame::write_frame(&mut write_half, MsgId::SessionStarted as u32, 0, &[])
            .await
            .expect("write SESSION_STARTED");

        let _req = frame::read_frame(&mut read_half).await.expect("read REQUEST");
        let _ = write_half.shutdown().await;
    });

    let session = EventSession::connect(1, "robot-arm.angle".to_string(), &endpoint)
        .await
        .expect("session connects");

    let response = session.request(b"ping").await.expect("request returns on teardown");
    assert!(response.is_empty());
}

#[tokio::test]
async fn request_with_timeout_deregisters_the_waiter() {
    let (listener, endpoint) = bind_loopback().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let (mut read_half, mut write_half) = stream.into_split();

        frame::read_frame(&mut read_half).await.expect("read SESSION_START");
        frame::write_frame(&mut write_half, MsgId::SessionStarted as u32, 0, &[])
            .await
            .expect("write SESSION_STARTED");

        // Never responds to the request; the connection stays open.
        let _req = frame::read_frame(&mut read_half).await.expect("read REQUEST");
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let session = EventSession::connect(1, "robot-arm.angle".to_string(), &endpoint)
        .await
        .expect("session connects");

    let response = session
        .request_with_timeout(b"ping", Duration::from_millis(50))
        .await;
    assert!(response.is_none());
}
