//! Integration tests for HTTP event delivery against an in-process backend.
//!
//! A small axum app stands in for the backend's `/api/bin-event` route and
//! records what it receives.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::routing::post;
use axum::Router;
use chrono::{TimeZone, Utc};

use binbin_core::{BinEvent, BinId, EventKind, JpegImage};
use binbin_device::{DispatchError, EventSink, HttpEventSink};

#[derive(Debug, Clone)]
struct Received {
    payload: serde_json::Value,
    image: Option<Vec<u8>>,
    image_content_type: Option<String>,
}

#[derive(Clone)]
struct Backend {
    received: Arc<Mutex<Vec<Received>>>,
    status: StatusCode,
}

async fn record(State(backend): State<Backend>, request: Request) -> StatusCode {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let received = if is_multipart {
        let mut multipart = Multipart::from_request(request, &()).await.unwrap();
        let mut payload = None;
        let mut image = None;
        let mut image_content_type = None;
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("payload") => {
                    payload = Some(serde_json::from_str(&field.text().await.unwrap()).unwrap());
                }
                Some("image") => {
                    image_content_type = field.content_type().map(str::to_string);
                    image = Some(field.bytes().await.unwrap().to_vec());
                }
                _ => {}
            }
        }
        Received {
            payload: payload.unwrap(),
            image,
            image_content_type,
        }
    } else {
        let body = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .unwrap();
        Received {
            payload: serde_json::from_slice(&body).unwrap(),
            image: None,
            image_content_type: None,
        }
    };

    backend.received.lock().unwrap().push(received);
    backend.status
}

async fn spawn_backend(status: StatusCode) -> (String, Arc<Mutex<Vec<Received>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/api/bin-event", post(record))
        .with_state(Backend {
            received: received.clone(),
            status,
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), received)
}

fn event(kind: EventKind, distance_cm: f64) -> BinEvent {
    let ts = Utc.with_ymd_and_hms(2026, 7, 14, 16, 20, 0).unwrap();
    BinEvent::new(BinId::Number(2), kind, distance_cm, ts)
}

#[tokio::test]
async fn fill_level_posted_as_json() {
    let (base_url, received) = spawn_backend(StatusCode::CREATED).await;
    let sink = HttpEventSink::new(&base_url, Duration::from_secs(5)).unwrap();

    sink.send(&event(EventKind::FillLevel, 41.25)).await.unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let payload = &received[0].payload;
    assert_eq!(payload["bin_id"], 2);
    assert_eq!(payload["event_type"], "fill_level");
    assert_eq!(payload["distance_cm"], 41.25);
    assert!(payload["timestamp"].as_str().unwrap().starts_with("2026-07-14T16:20:00"));
    assert!(received[0].image.is_none());
}

#[tokio::test]
async fn deposit_posted_with_image_part() {
    let (base_url, received) = spawn_backend(StatusCode::CREATED).await;
    let sink = HttpEventSink::new(&base_url, Duration::from_secs(5)).unwrap();

    let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x01, 0x02, 0xFF, 0xD9];
    let deposit = event(EventKind::Deposit, 29.2).with_image(JpegImage::parse(jpeg.clone()).unwrap());
    sink.send(&deposit).await.unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].payload["event_type"], "deposit");
    assert_eq!(received[0].image.as_deref(), Some(jpeg.as_slice()));
    assert_eq!(received[0].image_content_type.as_deref(), Some("image/jpeg"));
}

#[tokio::test]
async fn non_success_status_is_rejected() {
    let (base_url, received) = spawn_backend(StatusCode::NOT_FOUND).await;
    let sink = HttpEventSink::new(&base_url, Duration::from_secs(5)).unwrap();

    let err = sink.send(&event(EventKind::BinFull, 12.0)).await.unwrap_err();
    match err {
        DispatchError::Rejected { status, .. } => assert_eq!(status, 404),
        other => panic!("expected Rejected error, got: {other:?}"),
    }
    // Delivered once, never retried.
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unreachable_backend_is_http_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sink = HttpEventSink::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
    let err = sink.send(&event(EventKind::FillLevel, 30.0)).await.unwrap_err();
    assert!(matches!(err, DispatchError::Http(_)));
}

/// A backend that only reads JSON bodies, answering 400 to anything else.
async fn json_only(request: Request) -> StatusCode {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);
    if is_json {
        StatusCode::CREATED
    } else {
        StatusCode::BAD_REQUEST
    }
}

#[tokio::test]
async fn json_only_backend_rejects_deposit_with_image() {
    let app = Router::new().route("/api/bin-event", post(json_only));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let sink = HttpEventSink::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();

    // Plain deposits are JSON and accepted.
    sink.send(&event(EventKind::Deposit, 29.2)).await.unwrap();

    let jpeg = vec![0xFF, 0xD8, 0xFF, 0xD9];
    let deposit = event(EventKind::Deposit, 29.2).with_image(JpegImage::parse(jpeg).unwrap());
    match sink.send(&deposit).await.unwrap_err() {
        DispatchError::Rejected { status, .. } => assert_eq!(status, 400),
        other => panic!("expected Rejected error, got: {other:?}"),
    }
}
