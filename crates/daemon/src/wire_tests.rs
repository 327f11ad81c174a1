// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::protocol::{Request, Response};

#[tokio::test]
async fn request_roundtrip_over_duplex() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    let request = Request::Status;
    let data = encode(&request).unwrap();
    write_message(&mut client, &data).await.unwrap();

    let received = read_request(&mut server, DEFAULT_TIMEOUT).await.unwrap();
    assert_eq!(received, request);
}

#[tokio::test]
async fn response_roundtrip_over_duplex() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    let response = Response::Accepted {
        entry_id: 7,
        dedup_key: "dk".to_string(),
        duplicate: false,
    };
    write_response(&mut server, &response, DEFAULT_TIMEOUT)
        .await
        .unwrap();

    let bytes = read_message(&mut client).await.unwrap();
    let received: Response = decode(&bytes).unwrap();
    assert_eq!(received, response);
}

#[tokio::test]
async fn closed_peer_reports_connection_closed() {
    let (client, mut server) = tokio::io::duplex(64);
    drop(client);
    let result = read_message(&mut server).await;
    assert!(matches!(result, Err(WireError::ConnectionClosed)));
}

#[tokio::test]
async fn oversized_length_prefix_rejected() {
    let (mut client, mut server) = tokio::io::duplex(64);
    let huge = (MAX_MESSAGE_SIZE as u32 + 1).to_be_bytes();
    use tokio::io::AsyncWriteExt;
    client.write_all(&huge).await.unwrap();

    let result = read_message(&mut server).await;
    assert!(matches!(result, Err(WireError::MessageTooLarge { .. })));
}

#[test]
fn encode_rejects_oversized_payload() {
    // A string bigger than the cap, in JSON form
    let big = "x".repeat(MAX_MESSAGE_SIZE + 1);
    let result = encode(&big);
    assert!(matches!(result, Err(WireError::MessageTooLarge { .. })));
}

#[tokio::test]
async fn read_request_times_out_on_silence() {
    let (_client, mut server) = tokio::io::duplex(64);
    let result = read_request(&mut server, std::time::Duration::from_millis(50)).await;
    assert!(matches!(result, Err(WireError::Timeout)));
}
