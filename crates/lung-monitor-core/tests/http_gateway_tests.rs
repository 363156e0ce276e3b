//! HTTP gateway tests against a mock clinical API.

use std::time::Duration;

use bytes::Bytes;
use lung_monitor_core::gateway::{Gateway, GatewayError, HttpGateway, ImagePayload};
use lung_monitor_core::models::{NewPatient, PatientId};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_for(server: &MockServer) -> HttpGateway {
    HttpGateway::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(5)).unwrap()
}

fn patient_json(id: i64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "age": 54,
        "gender": "Female",
        "created_at": "2024-03-01T07:00:00.123456"
    })
}

fn report_json(id: i64, created_at: &str, confidence: f64) -> serde_json::Value {
    json!({
        "id": id,
        "patient_id": 1,
        "image_path": "uploads/xray.png",
        "prediction": "PNEUMONIA",
        "confidence": confidence,
        "severity": null,
        "heatmap_path": "heatmaps/heatmap_xray.png",
        "created_at": created_at
    })
}

fn vitals_json(id: i64, recorded_at: &str, spo2: f64) -> serde_json::Value {
    json!({
        "id": id,
        "patient_id": 1,
        "spo2": spo2,
        "temperature": 37.2,
        "heart_rate": 91,
        "device_id": "ESP32_01",
        "recorded_at": recorded_at,
        "alert": spo2 < 90.0
    })
}

#[tokio::test]
async fn test_list_patients() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "patients": [patient_json(1, "A. Kumar"), patient_json(2, "B. Osei")]
        })))
        .mount(&server)
        .await;

    let patients = gateway_for(&server).list_patients().await.unwrap();
    assert_eq!(patients.len(), 2);
    assert_eq!(patients[0].id, PatientId(1));
    assert_eq!(patients[1].name, "B. Osei");
}

#[tokio::test]
async fn test_patient_vitals_feed() {
    let server = MockServer::start().await;
    let latest = vitals_json(8, "2024-03-01T08:00:06", 88.5);
    Mock::given(method("GET"))
        .and(path("/api/vitals/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "patient": patient_json(1, "A. Kumar"),
            "vitals": [latest.clone(), vitals_json(7, "2024-03-01T08:00:03", 96.0)],
            "latest": latest
        })))
        .mount(&server)
        .await;

    let feed = gateway_for(&server).patient_vitals(PatientId(1)).await.unwrap();
    assert_eq!(feed.history.len(), 2);
    assert_eq!(feed.latest.as_ref().map(|s| s.id), Some(8));
    assert!(feed.history.latest().unwrap().alert);
}

#[tokio::test]
async fn test_out_of_order_reports_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/xray-reports/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reports": [
                report_json(1, "2024-03-01T08:00:00", 90.0),
                report_json(2, "2024-03-01T09:00:00", 80.0)
            ]
        })))
        .mount(&server)
        .await;

    let err = gateway_for(&server).patient_reports(PatientId(1)).await.unwrap_err();
    assert!(matches!(err, GatewayError::Ordering(_)));
}

#[tokio::test]
async fn test_confidence_out_of_range_fails_decode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/xray-reports/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reports": [report_json(1, "2024-03-01T08:00:00", 140.0)]
        })))
        .mount(&server)
        .await;

    let err = gateway_for(&server).patient_reports(PatientId(1)).await.unwrap_err();
    assert!(matches!(err, GatewayError::Decode(_)));
}

#[tokio::test]
async fn test_error_body_maps_to_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/vitals/9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Patient not found"})))
        .mount(&server)
        .await;

    let err = gateway_for(&server).patient_vitals(PatientId(9)).await.unwrap_err();
    assert_eq!(
        err,
        GatewayError::Status {
            status: 404,
            message: "Patient not found".to_string()
        }
    );
}

#[tokio::test]
async fn test_stats_and_recent_vitals() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_patients": 4, "total_reports": 9, "pneumonia_count": 3, "active_devices": 2
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/vitals/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vitals": [vitals_json(3, "2024-03-01T08:00:06", 97.0)]
        })))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let stats = gateway.facility_stats().await.unwrap();
    assert_eq!(stats.pneumonia_count, 3);
    assert_eq!(gateway.recent_vitals().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_patient_posts_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/patients"))
        .and(body_json(json!({"name": "C. Diaz", "age": 61, "gender": "Male"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "status": "success",
            "patient": patient_json(3, "C. Diaz")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let new = NewPatient::new("  C. Diaz ", 61, "Male").unwrap();
    let patient = gateway_for(&server).create_patient(&new).await.unwrap();
    assert_eq!(patient.id, PatientId(3));
}

#[tokio::test]
async fn test_submit_diagnostic_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/xray/predict"))
        .and(body_string_contains("name=\"patient_id\""))
        .and(body_string_contains("name=\"xray\"; filename=\"chest.png\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "report": report_json(5, "2024-03-01T10:00:00", 97.42),
            "result": {"prediction": "PNEUMONIA", "confidence": 0.9742},
            "heatmap": "heatmaps/heatmap_xray.png"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let image = ImagePayload {
        // Multipart matchers need a UTF-8 body
        bytes: Bytes::from_static(b"fake png bytes"),
        file_name: "chest.png".to_string(),
        mime: "image/png",
    };
    let submission = gateway_for(&server)
        .submit_diagnostic_image(PatientId(1), &image)
        .await
        .unwrap();

    assert_eq!(submission.report.id, 5);
    assert_eq!(submission.report.confidence.percent(), 97.42);
    assert_eq!(submission.heatmap.as_deref(), Some("heatmaps/heatmap_xray.png"));
}

#[tokio::test]
async fn test_submit_error_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/xray/predict"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid file type"})))
        .expect(1)
        .mount(&server)
        .await;

    let image = ImagePayload {
        bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
        file_name: "chest.png".to_string(),
        mime: "image/png",
    };
    let err = gateway_for(&server)
        .submit_diagnostic_image(PatientId(1), &image)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Status { status: 400, .. }));
}
