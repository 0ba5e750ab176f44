//! End-to-end behaviour of the HTTP surface, driven through the router.

mod common;

use axum::{body::Body, http::Request, http::StatusCode};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::{json, Value};

use common::{app, get, post_json, send};

const LABELS: [&str; 3] = ["setosa", "versicolor", "virginica"];

fn labels(body: &Value) -> Vec<&str> {
    body["prediction"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn single_sample_gets_one_label() {
    let (router, _) = app();
    let (status, body) = send(router, post_json("/predict", &json!({"input": [[5.1, 3.5, 1.4, 0.2]]}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(labels(&body), vec!["setosa"]);
}

#[tokio::test]
async fn batch_labels_keep_input_order() {
    let (router, _) = app();
    let input = json!({"input": [
        [5.1, 3.5, 1.4, 0.2],
        [6.7, 3.1, 4.4, 1.4],
        [6.3, 3.3, 6.0, 2.5]
    ]});
    let (status, body) = send(router, post_json("/predict", &input)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(labels(&body), vec!["setosa", "versicolor", "virginica"]);
}

#[tokio::test]
async fn probabilities_match_predictions() {
    let (router, _) = app();
    let input = json!({"input": [[5.1, 3.5, 1.4, 0.2], [6.3, 3.3, 6.0, 2.5]]});
    let (status, body) = send(router, post_json("/predict-proba", &input)).await;

    assert_eq!(status, StatusCode::OK);
    let predicted = labels(&body);
    let probabilities = body["probabilities"].as_array().unwrap();
    assert_eq!(probabilities.len(), 2);

    for (row, label) in probabilities.iter().zip(predicted) {
        let p = row
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(p.len(), 3);
        assert!(p.iter().all(|&x| x >= 0.0));
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-6);

        let best = (0..3).max_by(|&a, &b| p[a].partial_cmp(&p[b]).unwrap()).unwrap();
        assert_eq!(LABELS[best], label);
    }
}

#[tokio::test]
async fn invalid_inputs_map_to_fixed_statuses() {
    let cases = [
        (json!({"input": []}), StatusCode::UNPROCESSABLE_ENTITY),
        (json!({}), StatusCode::UNPROCESSABLE_ENTITY),
        (json!({"input": "not a list"}), StatusCode::BAD_REQUEST),
        (json!({"input": [[1.0, 2.0, 3.0]]}), StatusCode::UNPROCESSABLE_ENTITY),
        (json!({"input": [["a", "b", "c", "d"]]}), StatusCode::UNSUPPORTED_MEDIA_TYPE),
    ];

    for uri in ["/predict", "/predict-proba"] {
        for (input, expected) in &cases {
            let (router, _) = app();
            let (status, body) = send(router, post_json(uri, input)).await;

            assert_eq!(status, *expected, "{} {}", uri, input);
            assert!(body["error"].is_string(), "{} {}", uri, input);
        }
    }
}

#[tokio::test]
async fn body_is_decoded_without_content_type() {
    let (router, _) = app();
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .body(Body::from(r#"{"input": [[5.1, 3.5, 1.4, 0.2]]}"#))
        .unwrap();
    let (status, _) = send(router, request).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let (router, _) = app();
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .body(Body::from("{\"input\": [[1, 2"))
        .unwrap();
    let (status, body) = send(router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn boundary_values_are_accepted() {
    for row in [[0.0; 4], [100.0; 4], [-1.0; 4]] {
        let (router, _) = app();
        let (status, body) = send(router, post_json("/predict", &json!({"input": [row]}))).await;

        assert_eq!(status, StatusCode::OK);
        assert!(LABELS.contains(&labels(&body)[0]));
    }
}

#[tokio::test]
async fn hundred_random_rows() {
    let mut rng = StdRng::seed_from_u64(42);
    let rows = (0..100)
        .map(|_| (0..4).map(|_| rng.gen::<f64>()).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let (router, _) = app();
    let (status, body) = send(router, post_json("/predict", &json!({"input": rows}))).await;

    assert_eq!(status, StatusCode::OK);
    let predicted = labels(&body);
    assert_eq!(predicted.len(), 100);
    assert!(predicted.iter().all(|l| LABELS.contains(l)));
}

#[tokio::test]
async fn repeated_calls_agree() {
    let input = json!({"input": [[5.9, 3.0, 5.1, 1.8], [6.0, 2.7, 5.1, 1.6], [4.9, 2.5, 4.5, 1.7]]});

    let (router, _) = app();
    let (_, first) = send(router, post_json("/predict", &input)).await;
    for _ in 0..3 {
        let (router, _) = app();
        let (_, again) = send(router, post_json("/predict", &input)).await;
        assert_eq!(again, first);
    }
}

#[tokio::test]
async fn health_reports_service() {
    let (router, _) = app();
    let (status, body) = send(router, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "iris-prediction-api");
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn model_info_lists_labels() {
    let (router, _) = app();
    let (status, body) = send(router, get("/model-info")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["n_trees"], 30);
    assert_eq!(body["n_features"], 4);
    assert_eq!(body["labels"], json!(LABELS));
    assert!(body["metadata"].is_null());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (router, captured) = app();
    let (status, _) = send(router, get("/nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(captured.messages("Request completed")[0]["status_code"], 404);
}
