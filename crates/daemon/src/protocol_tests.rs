// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pg_core::ProcessConfig;

#[test]
fn request_roundtrips_through_the_wire_format() {
    let request = Request::Start {
        name: "web".to_string(),
        ignore_dependencies: true,
    };
    let bytes = encode(&request).unwrap();
    let back: Request = decode(&bytes).unwrap();
    assert_eq!(back, request);
}

#[test]
fn requests_are_tagged_by_type() {
    let json = serde_json::to_value(Request::Ping).unwrap();
    assert_eq!(json["type"], "Ping");

    let json = serde_json::to_value(Request::GetProcess {
        name: "db".to_string(),
    })
    .unwrap();
    assert_eq!(json["type"], "GetProcess");
    assert_eq!(json["name"], "db");
}

#[test]
fn optional_request_fields_default() {
    let request: Request =
        serde_json::from_str(r#"{"type": "Start", "name": "web"}"#).unwrap();
    assert_eq!(
        request,
        Request::Start {
            name: "web".to_string(),
            ignore_dependencies: false,
        }
    );

    let request: Request =
        serde_json::from_str(r#"{"type": "TailLog", "name": "web"}"#).unwrap();
    match request {
        Request::TailLog {
            lines, stream, ..
        } => {
            assert_eq!(lines, 100);
            assert_eq!(stream, pg_engine::LogStream::Stdout);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn add_process_carries_a_full_descriptor() {
    let request: Request = serde_json::from_str(
        r#"{"type": "AddProcess", "config": {"name": "api", "command": "node server.js"}}"#,
    )
    .unwrap();
    match request {
        Request::AddProcess { config } => {
            assert_eq!(config, ProcessConfig::new("api", "node server.js"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn error_response_has_kind_and_detail() {
    let response = Response::error("not_found", "process ghost not found");
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["type"], "Error");
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["detail"], "process ghost not found");
}

#[test]
fn supervisor_errors_map_to_stable_kinds() {
    let err = pg_engine::SupervisorError::NotFound("ghost".to_string());
    match Response::from(&err) {
        Response::Error { error, detail } => {
            assert_eq!(error, "not_found");
            assert!(detail.contains("ghost"));
        }
        other => panic!("unexpected: {other:?}"),
    }

    let err = pg_engine::SupervisorError::DependencyNotReady {
        process: "api".to_string(),
        missing: vec!["db".to_string()],
    };
    match Response::from(&err) {
        Response::Error { error, detail } => {
            assert_eq!(error, "dependency_not_ready");
            assert!(detail.contains("db"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn wire_roundtrip_over_a_duplex_stream() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    let request = Request::ListAlerts { active_only: true };
    let bytes = encode(&request).unwrap();
    write_message(&mut client, &bytes).await.unwrap();

    let received = read_request(&mut server, DEFAULT_TIMEOUT).await.unwrap();
    assert_eq!(received, request);

    write_response(&mut server, &Response::Ok, DEFAULT_TIMEOUT)
        .await
        .unwrap();
    let raw = read_message(&mut client).await.unwrap();
    let response: Response = decode(&raw).unwrap();
    assert!(matches!(response, Response::Ok));
}

#[tokio::test]
async fn oversized_length_prefix_is_rejected() {
    let (mut client, mut server) = tokio::io::duplex(64);
    let huge = (MAX_MESSAGE_SIZE as u32 + 1).to_be_bytes();
    tokio::io::AsyncWriteExt::write_all(&mut client, &huge)
        .await
        .unwrap();
    assert!(matches!(
        read_message(&mut server).await,
        Err(ProtocolError::MessageTooLarge { .. })
    ));
}

#[tokio::test]
async fn closed_connection_is_distinguished_from_io_error() {
    let (client, mut server) = tokio::io::duplex(64);
    drop(client);
    assert!(matches!(
        read_message(&mut server).await,
        Err(ProtocolError::ConnectionClosed)
    ));
}
