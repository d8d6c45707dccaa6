//! End-to-end synthesis session tests against a scripted in-process server.

mod support;

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};

use gradium::{Client, Error, OutputFormat, TtsConfig, TtsParams};
use support::{recv_json, send_json, send_raw, spawn_ws_server};

fn client_for(base_url: &str) -> Client {
    Client::builder()
        .api_key("test-key")
        .base_url(base_url)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_create_collects_complete_audio() {
    let (base_url, recorded) = spawn_ws_server(|mut ws| async move {
        let setup = recv_json(&mut ws).await;
        assert_eq!(setup["type"], "setup");
        assert_eq!(setup["voice_id"], "voice-1");
        assert_eq!(setup["output_format"], "pcm");

        send_json(&mut ws, json!({"type": "ready", "request_id": "req-1"})).await;

        let text = recv_json(&mut ws).await;
        assert_eq!(text["type"], "text");
        assert_eq!(text["text"], "Hello, world!");
        let eos = recv_json(&mut ws).await;
        assert_eq!(eos["type"], "end_of_stream");

        // "ab" and "cd", base64-encoded.
        send_json(&mut ws, json!({"type": "audio", "audio": "YWI="})).await;
        send_json(&mut ws, json!({"type": "audio", "audio": "Y2Q="})).await;
        send_json(&mut ws, json!({"type": "end_of_stream"})).await;
    })
    .await;

    let client = client_for(&base_url);
    let result = client
        .tts()
        .create(TtsParams {
            voice_id: "voice-1".to_string(),
            output_format: OutputFormat::Pcm,
            text: "Hello, world!".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(&result.raw_data[..], b"abcd");
    assert_eq!(result.sample_rate, 48000);
    assert_eq!(result.request_id, "req-1");

    let upgrade = recorded.lock().unwrap().clone();
    assert_eq!(upgrade.path, "/speech/tts");
    assert_eq!(upgrade.api_key.as_deref(), Some("test-key"));
}

#[tokio::test]
async fn test_stream_yields_chunks_then_closes_channel() {
    let (base_url, _) = spawn_ws_server(|mut ws| async move {
        let _setup = recv_json(&mut ws).await;
        send_json(&mut ws, json!({"type": "ready", "request_id": "req-9"})).await;
        let _text = recv_json(&mut ws).await;
        let _eos = recv_json(&mut ws).await;
        send_json(&mut ws, json!({"type": "audio", "audio": "YWI="})).await;
        send_json(&mut ws, json!({"type": "audio", "audio": "Y2Q="})).await;
        send_json(&mut ws, json!({"type": "end_of_stream"})).await;
    })
    .await;

    let client = client_for(&base_url);
    let mut stream = client
        .tts()
        .stream(TtsParams {
            voice_id: "voice-1".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    stream.wait_ready().await.unwrap();
    assert_eq!(stream.request_id().as_deref(), Some("req-9"));

    stream.send_text("Hi").await.unwrap();
    stream.send_end_of_stream().await.unwrap();

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.audio().recv().await {
        chunks.push(chunk);
    }
    assert_eq!(chunks.len(), 2);
    assert_eq!(&chunks[0][..], b"ab");
    assert_eq!(&chunks[1][..], b"cd");

    // Closed channel stays closed.
    assert!(stream.audio().recv().await.is_none());
    stream.close().unwrap();
}

#[tokio::test]
async fn test_error_before_ready_surfaces_in_wait_ready() {
    let (base_url, _) = spawn_ws_server(|mut ws| async move {
        let _setup = recv_json(&mut ws).await;
        send_json(
            &mut ws,
            json!({"type": "error", "message": "Invalid voice ID", "code": 400}),
        )
        .await;
    })
    .await;

    let client = client_for(&base_url);
    let mut stream = client
        .tts()
        .stream(TtsParams {
            voice_id: "missing".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    match stream.wait_ready().await.unwrap_err() {
        Error::WebSocket { message, code } => {
            assert_eq!(message, "Invalid voice ID");
            assert_eq!(code, Some(400));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Repeated observation sees the same outcome.
    assert!(matches!(
        stream.wait_ready().await,
        Err(Error::WebSocket { code: Some(400), .. })
    ));

    // collect reports the fatal error rather than empty audio.
    assert!(matches!(
        stream.collect().await,
        Err(Error::WebSocket { code: Some(400), .. })
    ));
}

#[tokio::test]
async fn test_wait_ready_timeout_leaves_session_running() {
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let (base_url, _) = spawn_ws_server(|mut ws| async move {
        let _setup = recv_json(&mut ws).await;
        let _ = release_rx.await;
        send_json(&mut ws, json!({"type": "ready", "request_id": "req-late"})).await;
        send_json(&mut ws, json!({"type": "end_of_stream"})).await;
    })
    .await;

    let client = client_for(&base_url);
    let stream = client
        .tts()
        .stream(TtsParams {
            voice_id: "voice-1".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(matches!(
        stream.wait_ready_timeout(Duration::from_millis(50)).await,
        Err(Error::Timeout(_))
    ));

    // The deadline did not tear the session down; readiness still arrives.
    release_tx.send(()).unwrap();
    stream.wait_ready().await.unwrap();
    assert_eq!(stream.request_id().as_deref(), Some("req-late"));
}

#[tokio::test]
async fn test_close_is_idempotent_and_done_fires() {
    let (base_url, _) = spawn_ws_server(|mut ws| async move {
        // Hold the connection until the client tears it down.
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;

    let client = client_for(&base_url);
    let mut stream = client
        .tts()
        .stream(TtsParams {
            voice_id: "voice-1".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    stream.close().unwrap();
    stream.close().unwrap();
    stream.done().await;

    // After teardown the gate resolves to the recorded failure and all
    // channels are closed.
    assert!(matches!(
        stream.wait_ready().await,
        Err(Error::WebSocket { .. })
    ));
    assert!(stream.audio().recv().await.is_none());
}

#[tokio::test]
async fn test_malformed_and_unknown_frames_are_discarded() {
    let (base_url, _) = spawn_ws_server(|mut ws| async move {
        let _setup = recv_json(&mut ws).await;
        send_raw(&mut ws, "not json at all").await;
        send_json(&mut ws, json!({"type": "future_thing", "data": 1})).await;
        send_json(&mut ws, json!({"type": "ready", "request_id": "req-2"})).await;
        let _text = recv_json(&mut ws).await;
        let _eos = recv_json(&mut ws).await;
        send_json(&mut ws, json!({"type": "audio", "audio": "!!not-base64!!"})).await;
        send_json(&mut ws, json!({"type": "audio", "audio": "b2s="})).await;
        send_json(&mut ws, json!({"type": "end_of_stream"})).await;
    })
    .await;

    let client = client_for(&base_url);
    let result = client
        .tts()
        .create(TtsParams {
            voice_id: "voice-1".to_string(),
            text: "Hi".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    // Only the decodable chunk made it through.
    assert_eq!(&result.raw_data[..], b"ok");
    assert_eq!(result.request_id, "req-2");
}

#[tokio::test]
async fn test_setup_frame_defaults_and_config() {
    let (setup_tx, mut setup_rx) = mpsc::channel::<serde_json::Value>(1);
    let (base_url, _) = spawn_ws_server(|mut ws| async move {
        let setup = recv_json(&mut ws).await;
        setup_tx.send(setup).await.unwrap();
        send_json(&mut ws, json!({"type": "ready", "request_id": "req-3"})).await;
        send_json(&mut ws, json!({"type": "end_of_stream"})).await;
    })
    .await;

    let client = client_for(&base_url);
    let stream = client
        .tts()
        .stream(TtsParams {
            voice_id: "voice-1".to_string(),
            output_format: OutputFormat::Wav,
            json_config: Some(TtsConfig { padding_bonus: -1.2 }),
            ..Default::default()
        })
        .await
        .unwrap();
    stream.wait_ready().await.unwrap();

    let setup = setup_rx.recv().await.unwrap();
    assert_eq!(setup["type"], "setup");
    assert_eq!(setup["model_name"], "default");
    assert_eq!(setup["output_format"], "wav");
    assert_eq!(setup["json_config"]["padding_bonus"], -1.2);

    stream.close().unwrap();
}
