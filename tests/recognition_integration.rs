//! Integration tests for the recognition client
//!
//! These tests run the full client (signing, dialing, streaming, draining)
//! against an in-process WebSocket server standing in for the recognition
//! endpoint, so they need no credentials and no network.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test recognition_integration
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use iat_stream::{Credentials, Error, IatClient, RecognizeOptions};

/// Credentials pointing at an in-process server
fn local_credentials(addr: SocketAddr) -> Credentials {
    Credentials {
        scheme: "ws".to_string(),
        host: addr.to_string(),
        path: "/v1".to_string(),
        ..Credentials::new("app123", "key123", "secret456")
    }
}

/// Options tuned so tests do not sit in pacing sleeps
fn fast_options() -> RecognizeOptions {
    RecognizeOptions {
        frame_interval: Duration::from_millis(1),
        ..RecognizeOptions::default()
    }
}

/// Base64 of a recognition-update JSON document
fn text_payload(update: Value) -> String {
    STANDARD.encode(update.to_string())
}

/// One server response frame as wire JSON
fn response_frame(code: i32, sid: &str, status: u8, text: Option<String>) -> String {
    let mut frame = json!({
        "header": {"code": code, "message": if code == 0 { "success" } else { "failure" }, "sid": sid, "status": status}
    });
    if let Some(text) = text {
        frame["payload"] = json!({
            "result": {
                "compress": "raw", "encoding": "utf8", "format": "json",
                "seq": 1, "status": status, "text": text
            }
        });
    }
    frame.to_string()
}

/// Accept one session, collect inbound frames until the End frame, then
/// play back the canned responses and close. Returns what was received.
async fn run_mock_server(listener: TcpListener, responses: Vec<String>) -> Vec<Value> {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(stream).await.unwrap();

    let mut received = Vec::new();
    while let Some(message) = ws.next().await {
        match message.unwrap() {
            Message::Text(text) => {
                let frame: Value = serde_json::from_str(&text).unwrap();
                let status = frame["header"]["status"].as_u64().unwrap();
                received.push(frame);
                if status == 2 {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    for response in responses {
        ws.send(Message::Text(response)).await.unwrap();
    }
    let _ = ws.close(None).await;
    received
}

#[tokio::test]
async fn full_recognition_applies_replace_protocol() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // two provisional sentences, then a correction that merges them
    let responses = vec![
        response_frame(
            0,
            "sid-1",
            1,
            Some(text_payload(
                json!({"sn": 0, "ls": false, "ws": [{"cw": [{"w": "你"}]}]}),
            )),
        ),
        response_frame(
            0,
            "sid-1",
            1,
            Some(text_payload(
                json!({"sn": 1, "ls": false, "ws": [{"cw": [{"w": "好"}]}]}),
            )),
        ),
        response_frame(
            0,
            "sid-1",
            2,
            Some(text_payload(json!({
                "sn": 0, "ls": true, "pgs": "rpl", "rg": [0, 1],
                "ws": [{"cw": [{"w": "你"}]}, {"cw": [{"w": "好"}]}]
            }))),
        ),
    ];
    let server = tokio::spawn(run_mock_server(listener, responses));

    let client = IatClient::new(local_credentials(addr)).unwrap();
    let audio = vec![0u8; 3200];
    let result = client
        .recognize(&audio[..], fast_options())
        .await
        .unwrap();

    assert_eq!(result.sid, "sid-1");
    assert_eq!(result.text, "你好");
    assert_eq!(result.sentences.len(), 1);
    assert!(result.sentences[0].is_last);
    assert_eq!(result.frames.len(), 3);

    // 3200 bytes at 1280 per frame: Start, Continue, Continue, End
    let received = server.await.unwrap();
    assert_eq!(received.len(), 4);
    let statuses: Vec<u64> = received
        .iter()
        .map(|f| f["header"]["status"].as_u64().unwrap())
        .collect();
    assert_eq!(statuses, vec![0, 1, 1, 2]);
    let seqs: Vec<i64> = received
        .iter()
        .map(|f| f["payload"]["audio"]["seq"].as_i64().unwrap())
        .collect();
    assert_eq!(seqs, vec![1, 2, 3, 4]);

    assert!(received[0]["parameter"]["iat"].is_object());
    assert!(received[1].get("parameter").is_none());

    let chunk = |frame: &Value| {
        STANDARD
            .decode(frame["payload"]["audio"]["audio"].as_str().unwrap())
            .unwrap()
            .len()
    };
    assert_eq!(chunk(&received[0]), 1280);
    assert_eq!(chunk(&received[1]), 1280);
    assert_eq!(chunk(&received[2]), 640);
    assert_eq!(chunk(&received[3]), 0);
}

#[tokio::test]
async fn api_error_is_surfaced() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let responses = vec![response_frame(10163, "sid-err", 1, None)];
    let server = tokio::spawn(run_mock_server(listener, responses));

    let client = IatClient::new(local_credentials(addr)).unwrap();
    let audio = vec![0u8; 640];
    let err = client
        .recognize(&audio[..], fast_options())
        .await
        .unwrap_err();

    match err {
        Error::Api(api) => {
            assert_eq!(api.code, 10163);
            assert_eq!(api.sid, "sid-err");
        }
        other => panic!("expected Api error, got: {other}"),
    }

    server.await.unwrap();
}

#[tokio::test]
async fn zero_length_audio_opens_and_closes_the_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let responses = vec![response_frame(
        0,
        "sid-empty",
        2,
        Some(text_payload(
            json!({"sn": 0, "ls": true, "ws": [{"cw": [{"w": "好的"}]}]}),
        )),
    )];
    let server = tokio::spawn(run_mock_server(listener, responses));

    let client = IatClient::new(local_credentials(addr)).unwrap();
    let result = client
        .recognize(tokio::io::empty(), fast_options())
        .await
        .unwrap();

    assert_eq!(result.text, "好的");
    assert_eq!(result.sid, "sid-empty");

    let received = server.await.unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0]["header"]["status"], 0);
    assert_eq!(received[0]["payload"]["audio"]["audio"], "");
    assert!(received[0]["parameter"]["iat"].is_object());
    assert_eq!(received[1]["header"]["status"], 2);
    assert_eq!(received[1]["payload"]["audio"]["audio"], "");
    assert!(received[1].get("parameter").is_none());
}

#[tokio::test]
async fn handshake_rejection_body_reaches_the_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = stream.read(&mut request).await;
        stream
            .write_all(
                b"HTTP/1.1 401 Unauthorized\r\n\
                  Content-Type: text/plain\r\n\
                  Content-Length: 13\r\n\
                  Connection: close\r\n\r\n\
                  access denied",
            )
            .await
            .unwrap();
        let _ = stream.shutdown().await;
    });

    let client = IatClient::new(local_credentials(addr)).unwrap();
    let audio = vec![0u8; 100];
    let err = client
        .recognize(&audio[..], fast_options())
        .await
        .unwrap_err();

    match err {
        Error::ConnectionFailed(message) => {
            assert!(message.contains("401"), "message was: {message}");
            assert!(message.contains("access denied"), "message was: {message}");
        }
        other => panic!("expected ConnectionFailed, got: {other}"),
    }

    server.await.unwrap();
}

#[tokio::test]
async fn cancellation_returns_promptly_during_pacing() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // a server that reads but never answers
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(message) = ws.next().await {
            if message.is_err() {
                break;
            }
        }
    });

    let client = IatClient::new(local_credentials(addr)).unwrap();
    let cancel = CancellationToken::new();
    let cancel_for_call = cancel.clone();

    let call = tokio::spawn(async move {
        let audio = vec![0u8; 12800];
        let options = RecognizeOptions {
            frame_interval: Duration::from_secs(30),
            ..RecognizeOptions::default()
        };
        client
            .recognize_with_cancel(&audio[..], options, cancel_for_call)
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), call)
        .await
        .expect("cancellation must not wait out the pacing sleep")
        .unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));

    server.abort();
}

#[tokio::test]
async fn file_backed_audio_source() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&vec![3u8; 2000]).unwrap();
    file.flush().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let responses = vec![response_frame(
        0,
        "sid-file",
        2,
        Some(text_payload(
            json!({"sn": 0, "ls": true, "ws": [{"cw": [{"w": "文件"}]}]}),
        )),
    )];
    let server = tokio::spawn(run_mock_server(listener, responses));

    let client = IatClient::new(local_credentials(addr)).unwrap();
    let audio = tokio::fs::File::open(file.path()).await.unwrap();
    let result = client.recognize(audio, fast_options()).await.unwrap();

    assert_eq!(result.text, "文件");

    // 2000 bytes split as 1280 + 720, then the End frame
    let received = server.await.unwrap();
    assert_eq!(received.len(), 3);
    let chunk = |frame: &Value| {
        STANDARD
            .decode(frame["payload"]["audio"]["audio"].as_str().unwrap())
            .unwrap()
            .len()
    };
    assert_eq!(chunk(&received[0]), 1280);
    assert_eq!(chunk(&received[1]), 720);
    assert_eq!(chunk(&received[2]), 0);
}
