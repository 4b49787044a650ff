//! HTTP backend tests against a mock server

use mockito::Matcher;
use recognition_client::backend::{
    HttpBackend, PersistHistoryRequest, RawInferenceResult, RecognitionBackend, RecordStatus,
};
use recognition_client::config::BackendConfig;
use recognition_client::RecognitionError;
use secrecy::SecretString;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

fn backend_for(server: &mockito::ServerGuard) -> HttpBackend {
    let config = BackendConfig {
        service_url: server.url(),
        api_key: Some(SecretString::new("secret-token".to_string())),
        timeout_ms: 5_000,
    };
    HttpBackend::new(config).unwrap()
}

#[tokio::test]
async fn test_upload_sends_raw_bytes() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/images")
        .match_query(Matcher::UrlEncoded("file_name".into(), "leaf photo.png".into()))
        .match_header("content-type", "application/octet-stream")
        .match_header("authorization", "Bearer secret-token")
        .match_body("raw-image-bytes")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"file_path": "/uploads/abc.png", "image_id": "img-42"}"#)
        .create_async()
        .await;

    let backend = backend_for(&server);
    let saved = assert_ok!(
        backend
            .upload_image(bytes::Bytes::from_static(b"raw-image-bytes"), "leaf photo.png")
            .await
    );

    assert_eq!(saved.image_id, "img-42");
    assert_eq!(saved.file_path, "/uploads/abc.png");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_inference_error_field_wins() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/inference")
        .match_body(Matcher::Json(json!({ "image_path": "/uploads/abc.png" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "model not loaded", "prediction": "cat", "confidence": 0.3}"#)
        .create_async()
        .await;

    let backend = backend_for(&server);
    let raw = assert_ok!(backend.run_inference("/uploads/abc.png").await);

    assert_eq!(raw, RawInferenceResult::Failure { error: "model not loaded".to_string() });
    mock.assert_async().await;
}

#[tokio::test]
async fn test_inference_ranked_shape() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/inference")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "prediction": "ginseng",
                "confidence": 0.81,
                "model_type": "ResNet34",
                "top_predictions": [
                    { "class": "ginseng", "probability": 0.81 },
                    { "class": "carrot", "probability": 0.12 }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let backend = backend_for(&server);
    let raw = assert_ok!(backend.run_inference("/uploads/x.png").await);

    assert_eq!(raw.model_type(), Some("ResNet34"));
    assert!(matches!(raw, RawInferenceResult::Ranked { ref ranked, .. } if ranked.len() == 2));
}

#[tokio::test]
async fn test_non_success_status_is_transport_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/history/count")
        .with_status(503)
        .with_body("database unavailable")
        .create_async()
        .await;

    let backend = backend_for(&server);
    let err = assert_err!(backend.count_history().await);

    match err {
        RecognitionError::Transport(message) => {
            assert!(message.starts_with("Status 503"));
            assert!(message.contains("database unavailable"));
        }
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/models")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"models": "not a list"}"#)
        .create_async()
        .await;

    let backend = backend_for(&server);
    let err = assert_err!(backend.list_models().await);
    assert!(matches!(err, RecognitionError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_list_history_query_params() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/history")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("limit".into(), "10".into()),
            Matcher::UrlEncoded("skip".into(), "20".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([{
                "history": {
                    "id": "h1",
                    "created_at": 1_704_412_800_000i64,
                    "image_id": "img-1",
                    "model_name": "ResNet34",
                    "result": { "prediction": "cat", "confidence": 0.9 },
                    "confidence": 0.9,
                    "status": "success"
                },
                "image": {
                    "id": "img-1",
                    "original_file_name": "cat.png",
                    "image_url": "/uploads/1.png",
                    "file_size": 2048,
                    "format": "png"
                }
            }])
            .to_string(),
        )
        .create_async()
        .await;

    let backend = backend_for(&server);
    let rows = assert_ok!(backend.list_history(10, 20).await);

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].history.id, "h1");
    assert_eq!(rows[0].image.as_ref().and_then(|i| i.format.as_deref()), Some("png"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_status_and_model_routes() {
    let mut server = mockito::Server::new_async().await;
    let by_status = server
        .mock("GET", "/api/history/by-status/failed")
        .match_query(Matcher::UrlEncoded("limit".into(), "1000".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;
    let by_model = server
        .mock("GET", "/api/history/by-model")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("model_name".into(), "MobileNetV3-Small".into()),
            Matcher::UrlEncoded("limit".into(), "50".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;

    let backend = backend_for(&server);
    assert_ok!(backend.list_history_by_status(RecordStatus::Failed, 1000).await);
    assert_ok!(backend.list_history_by_model("MobileNetV3-Small", 50).await);

    by_status.assert_async().await;
    by_model.assert_async().await;
}

#[tokio::test]
async fn test_persist_sends_lowercase_status() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/history")
        .match_body(Matcher::PartialJson(json!({
            "image_id": "img-7",
            "model_name": "ResNet34",
            "status": "success"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "message": "History saved"}"#)
        .create_async()
        .await;

    let backend = backend_for(&server);
    let response = assert_ok!(
        backend
            .persist_history(PersistHistoryRequest {
                image_id: "img-7".to_string(),
                model_name: "ResNet34".to_string(),
                result: None,
                status: RecordStatus::Success,
                error_message: None,
            })
            .await
    );

    assert!(response.success);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_delete_and_switch_model() {
    let mut server = mockito::Server::new_async().await;
    let delete = server
        .mock("DELETE", "/api/history/h-9")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("true")
        .create_async()
        .await;
    let switch = server
        .mock("POST", "/api/models/active")
        .match_body(Matcher::Json(json!({ "model_id": "mobilenet" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "mobilenet", "name": "MobileNetV3-Small", "is_active": true}"#)
        .create_async()
        .await;

    let backend = backend_for(&server);
    assert!(assert_ok!(backend.delete_history("h-9").await));

    let info = assert_ok!(backend.switch_model("mobilenet").await);
    assert_eq!(info.name, "MobileNetV3-Small");
    assert_eq!(info.num_classes, 0);

    delete.assert_async().await;
    switch.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let config = BackendConfig {
        service_url: "http://127.0.0.1:1".to_string(),
        api_key: None,
        timeout_ms: 1_000,
    };
    let backend = HttpBackend::new(config).unwrap();

    let err = assert_err!(backend.count_history().await);
    assert!(matches!(err, RecognitionError::Transport(_)));
}

#[tokio::test]
async fn test_delete_encodes_id_as_one_segment() {
    let mut server = mockito::Server::new_async().await;
    let delete = server
        .mock("DELETE", "/api/history/batch%2F7%3Fx")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("true")
        .create_async()
        .await;

    let backend = backend_for(&server);
    assert!(assert_ok!(backend.delete_history("batch/7?x").await));

    delete.assert_async().await;
}
