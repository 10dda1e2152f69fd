//! HTTP-level rate limiting tests: budgets, 429 responses, and headers.

mod common;
use common::*;

use axum::http::StatusCode;

fn tight_limits() -> RateLimitConfig {
    RateLimitConfig {
        activation_per_minute: 3,
        validation_per_minute: 3,
        creation_per_minute: 10_000,
        recovery_per_hour: 2,
    }
}

#[tokio::test]
async fn test_validate_within_budget_reports_remaining() {
    let state = create_test_app_state_with_limits(tight_limits());
    let (license, device_id) = {
        let mut conn = state.db.get().unwrap();
        let license = create_default_license(&conn);
        let device_id = "a".repeat(32);
        queries::activate_device_atomic(&mut conn, &license, &device_id, None).unwrap();
        (license, device_id)
    };
    let app = public_app(state);

    let body = serde_json::json!({ "licenseKey": license.license_key, "email": "user@example.com", "deviceId": device_id });

    use tower::ServiceExt;
    let response = app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/v1/validate")
                .header("content-type", "application/json")
                .header("x-forwarded-for", "203.0.113.9")
                .body(axum::body::Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    // Budget is 3; the first request leaves 2 in both dimensions.
    assert_eq!(
        response.headers().get("x-ratelimit-remaining-ip").unwrap(),
        "2"
    );
    assert_eq!(
        response
            .headers()
            .get("x-ratelimit-remaining-license")
            .unwrap(),
        "2"
    );
}

#[tokio::test]
async fn test_validate_over_budget_returns_429() {
    let state = create_test_app_state_with_limits(tight_limits());
    let (license, device_id) = {
        let mut conn = state.db.get().unwrap();
        let license = create_default_license(&conn);
        let device_id = "a".repeat(32);
        queries::activate_device_atomic(&mut conn, &license, &device_id, None).unwrap();
        (license, device_id)
    };
    let app = public_app(state);

    let body = serde_json::json!({ "licenseKey": license.license_key, "email": "user@example.com", "deviceId": device_id });

    for _ in 0..3 {
        let (status, _) = send_json(&app, "POST", "/v1/validate", &body).await;
        assert_eq!(status, StatusCode::OK);
    }

    use tower::ServiceExt;
    let response = app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/v1/validate")
                .header("content-type", "application/json")
                .header("x-forwarded-for", "203.0.113.9")
                .body(axum::body::Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get("x-ratelimit-reset").is_some());
    assert_eq!(
        response.headers().get("x-ratelimit-remaining-ip").unwrap(),
        "0"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["code"], "RATE_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn test_ip_budget_burns_before_license_budget() {
    let state = create_test_app_state_with_limits(tight_limits());
    let license = {
        let conn = state.db.get().unwrap();
        create_default_license(&conn)
    };
    let app = public_app(state);

    // Exhaust the IP budget probing nonexistent keys.
    let probe = serde_json::json!({ "licenseKey": "ZZZZ-ZZZZ-ZZZZ-ZZZZ", "email": "user@example.com", "deviceId": "a".repeat(32) });
    for _ in 0..3 {
        let (status, _) = send_json(&app, "POST", "/v1/validate", &probe).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // The real license's own budget is untouched, but this IP is done.
    let real = serde_json::json!({ "licenseKey": license.license_key, "email": "user@example.com", "deviceId": "a".repeat(32) });
    let (status, _) = send_json(&app, "POST", "/v1/validate", &real).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_separate_ips_have_separate_budgets() {
    let state = create_test_app_state_with_limits(tight_limits());
    let (license, device_id) = {
        let mut conn = state.db.get().unwrap();
        let license = create_default_license(&conn);
        let device_id = "a".repeat(32);
        queries::activate_device_atomic(&mut conn, &license, &device_id, None).unwrap();
        (license, device_id)
    };
    let app = public_app(state);

    let body = serde_json::json!({ "licenseKey": license.license_key, "email": "user@example.com", "deviceId": device_id });

    use tower::ServiceExt;
    let send_from = |ip: &'static str| {
        let app = app.clone();
        let body = body.to_string();
        async move {
            app.oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/v1/validate")
                    .header("content-type", "application/json")
                    .header("x-forwarded-for", ip)
                    .body(axum::body::Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
        }
    };

    // First IP exhausts its own budget and the license budget stays at 3
    // hits total; a second IP is blocked on the license dimension only
    // after the shared license budget is gone.
    for _ in 0..3 {
        assert_eq!(send_from("198.51.100.1").await.status(), StatusCode::OK);
    }
    assert_eq!(
        send_from("198.51.100.1").await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    // Fresh IP, but the license dimension has already used its 3 hits.
    let response = send_from("198.51.100.2").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response
            .headers()
            .get("x-ratelimit-remaining-license")
            .unwrap(),
        "0"
    );
}

#[tokio::test]
async fn test_domain_errors_still_carry_remaining_headers() {
    let state = create_test_app_state_with_limits(tight_limits());
    let license = {
        let conn = state.db.get().unwrap();
        create_default_license(&conn)
    };
    let app = public_app(state);

    // Wrong email: a 401 that still consumed budget must say so.
    let body = activate_body(&license.license_key, "wrong@example.com", "SERIAL-1");

    use tower::ServiceExt;
    let response = app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/v1/activate")
                .header("content-type", "application/json")
                .header("x-forwarded-for", "203.0.113.9")
                .body(axum::body::Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("x-ratelimit-remaining-ip").unwrap(),
        "2"
    );
    assert_eq!(
        response
            .headers()
            .get("x-ratelimit-remaining-license")
            .unwrap(),
        "2"
    );
}

#[tokio::test]
async fn test_recovery_limited_per_email_across_ips() {
    let state = create_test_app_state_with_limits(tight_limits());
    {
        let conn = state.db.get().unwrap();
        create_default_license(&conn);
    }
    let app = public_app(state);

    use tower::ServiceExt;
    let recover_from = |ip: String| {
        let app = app.clone();
        async move {
            app.oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/v1/recover")
                    .header("content-type", "application/json")
                    .header("x-forwarded-for", ip)
                    .body(axum::body::Body::from(
                        serde_json::json!({ "email": "user@example.com" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap()
        }
    };

    // Rotating IPs does not help: the email dimension still caps at 2.
    assert_eq!(recover_from("198.51.100.1".into()).await.status(), StatusCode::OK);
    assert_eq!(recover_from("198.51.100.2".into()).await.status(), StatusCode::OK);

    let response = recover_from("198.51.100.3".into()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response
            .headers()
            .get("x-ratelimit-remaining-email")
            .unwrap(),
        "0"
    );
}
