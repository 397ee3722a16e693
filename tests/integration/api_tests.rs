//! API integration tests
//!
//! These run against a live server (`cargo run`) with a seeded database:
//! agency id 1 with user id 1 (member) and user id 2 (equipment manager),
//! plus agency id 2 with user id 3 (manager) for tenancy isolation checks.
//! Tokens are minted locally with the same JWT_SECRET the server uses.
//!
//! Run with: cargo test -- --ignored

use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use gearhouse_server::models::tenant::Permission;
use gearhouse_server::models::user::UserClaims;

const BASE_URL: &str = "http://localhost:8080/api/v1";

const MEMBER_ID: i32 = 1;
const MANAGER_ID: i32 = 2;
const OTHER_AGENCY_MANAGER_ID: i32 = 3;

fn jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| "change-this-secret-in-production".to_string())
}

fn token_for_agency(agency_id: i32, user_id: i32, permissions: Vec<Permission>) -> String {
    UserClaims {
        sub: user_id,
        agency_id,
        name: format!("Test User {}", user_id),
        permissions,
        exp: Utc::now().timestamp() + 3600,
    }
    .to_token(&jwt_secret())
    .expect("Failed to sign test token")
}

fn token_for(user_id: i32, permissions: Vec<Permission>) -> String {
    token_for_agency(1, user_id, permissions)
}

fn member_token() -> String {
    token_for(MEMBER_ID, vec![])
}

fn manager_token() -> String {
    token_for(MANAGER_ID, vec![Permission::ManageEquipment])
}

async fn create_equipment(client: &Client, name: &str) -> i64 {
    let response = client
        .post(format!("{}/equipment", BASE_URL))
        .bearer_auth(manager_token())
        .json(&json!({ "name": name }))
        .send()
        .await
        .expect("Failed to create equipment");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse equipment");
    body["id"].as_i64().expect("No equipment id")
}

async fn get_equipment(client: &Client, id: i64) -> Value {
    let response = client
        .get(format!("{}/equipment/{}", BASE_URL, id))
        .bearer_auth(member_token())
        .send()
        .await
        .expect("Failed to get equipment");
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.expect("Failed to parse equipment")
}

async fn post_reservation(
    client: &Client,
    equipment_id: i64,
    start: chrono::DateTime<Utc>,
    end: chrono::DateTime<Utc>,
    waitlist: bool,
) -> (StatusCode, Value) {
    let response = client
        .post(format!("{}/reservations", BASE_URL))
        .bearer_auth(member_token())
        .json(&json!({
            "equipment_id": equipment_id,
            "start_date": start,
            "end_date": end,
            "waitlist": waitlist,
        }))
        .send()
        .await
        .expect("Failed to create reservation");
    let status = response.status();
    let body: Value = response.json().await.expect("Failed to parse response");
    (status, body)
}

async fn check_availability(
    client: &Client,
    equipment_id: i64,
    start: chrono::DateTime<Utc>,
    end: chrono::DateTime<Utc>,
) -> Value {
    let response = client
        .post(format!("{}/equipment/{}/availability", BASE_URL, equipment_id))
        .bearer_auth(member_token())
        .json(&json!({ "start_date": start, "end_date": end }))
        .send()
        .await
        .expect("Failed to check availability");
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.expect("Failed to parse availability")
}

async fn get_reservation_status(client: &Client, id: i64) -> String {
    let response = client
        .get(format!("{}/reservations/{}", BASE_URL, id))
        .bearer_auth(member_token())
        .send()
        .await
        .expect("Failed to get reservation");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse reservation");
    body["status"].as_str().expect("No status").to_string()
}

async fn transition(client: &Client, id: i64, action: &str, token: &str) -> (StatusCode, Value) {
    let response = client
        .post(format!("{}/reservations/{}/{}", BASE_URL, id, action))
        .bearer_auth(token)
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to post transition");
    let status = response.status();
    let body: Value = response.json().await.expect("Failed to parse response");
    (status, body)
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_conflicting_request_is_rejected_with_conflict_list() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "Sony A7S III").await;

    let base = Utc::now() + Duration::days(30);
    let (status, existing) =
        post_reservation(&client, equipment_id, base, base + Duration::days(2), false).await;
    assert_eq!(status, StatusCode::CREATED);
    let existing_id = existing["id"].as_i64().unwrap();

    let (status, _) = transition(&client, existing_id, "approve", &manager_token()).await;
    assert_eq!(status, StatusCode::OK);

    // Overlaps the approved reservation, no waitlist opt-in
    let (status, body) = post_reservation(
        &client,
        equipment_id,
        base - Duration::hours(14),
        base + Duration::days(1),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["can_waitlist"], true);
    let conflicts = body["conflicts"].as_array().expect("No conflict list");
    assert!(conflicts.iter().any(|c| c["id"].as_i64() == Some(existing_id)));

    // Same request with opt-in queues instead
    let (status, body) = post_reservation(
        &client,
        equipment_id,
        base - Duration::hours(14),
        base + Duration::days(1),
        true,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "waitlist");
}

#[tokio::test]
#[ignore]
async fn test_boundary_touching_intervals_do_not_conflict() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "Aputure 600d").await;

    let base = Utc::now() + Duration::days(40);
    let (status, first) =
        post_reservation(&client, equipment_id, base, base + Duration::days(2), false).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = transition(&client, first["id"].as_i64().unwrap(), "approve", &manager_token()).await;
    assert_eq!(status, StatusCode::OK);

    // Starts exactly when the first one ends
    let (status, body) = post_reservation(
        &client,
        equipment_id,
        base + Duration::days(2),
        base + Duration::days(4),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
#[ignore]
async fn test_invalid_interval_is_rejected() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "Zhiyun Crane").await;

    let base = Utc::now() + Duration::days(10);
    let (status, _) = post_reservation(&client, equipment_id, base, base, false).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        post_reservation(&client, equipment_id, base, base - Duration::hours(1), false).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_checkout_pending_is_an_invalid_transition() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "Canon C70").await;

    let start = Utc::now() - Duration::hours(1);
    let (status, reservation) =
        post_reservation(&client, equipment_id, start, start + Duration::days(1), false).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reservation["status"], "pending");

    let (status, _) = transition(
        &client,
        reservation["id"].as_i64().unwrap(),
        "checkout",
        &member_token(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Equipment untouched
    let equipment = get_equipment(&client, equipment_id).await;
    assert_eq!(equipment["status"], "available");
    assert!(equipment["current_holder_id"].is_null());
}

#[tokio::test]
#[ignore]
async fn test_early_checkout_rejected_then_allowed_after_start() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "DJI RS4").await;

    // Future reservation: checkout must fail
    let future = Utc::now() + Duration::days(5);
    let (_, future_res) =
        post_reservation(&client, equipment_id, future, future + Duration::days(1), false).await;
    let future_id = future_res["id"].as_i64().unwrap();
    let (status, _) = transition(&client, future_id, "approve", &manager_token()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = transition(&client, future_id, "checkout", &member_token()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Started reservation: checkout succeeds and custody transfers
    let started = Utc::now() - Duration::hours(2);
    let (_, res) = post_reservation(
        &client,
        equipment_id,
        started,
        started + Duration::hours(12),
        false,
    )
    .await;
    let id = res["id"].as_i64().unwrap();
    let (status, _) = transition(&client, id, "approve", &manager_token()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = transition(&client, id, "checkout", &member_token()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");

    let equipment = get_equipment(&client, equipment_id).await;
    assert_eq!(equipment["status"], "in_use");
    assert_eq!(equipment["current_holder_id"].as_i64(), Some(MEMBER_ID as i64));
}

#[tokio::test]
#[ignore]
async fn test_damaged_return_routes_equipment_to_maintenance() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "Sennheiser MKH 416").await;

    let start = Utc::now() - Duration::hours(3);
    let (_, res) =
        post_reservation(&client, equipment_id, start, start + Duration::days(1), false).await;
    let id = res["id"].as_i64().unwrap();
    transition(&client, id, "approve", &manager_token()).await;
    transition(&client, id, "checkout", &member_token()).await;

    let response = client
        .post(format!("{}/reservations/{}/return", BASE_URL, id))
        .bearer_auth(member_token())
        .json(&json!({ "condition": "damaged", "condition_notes": "XLR socket loose" }))
        .send()
        .await
        .expect("Failed to return");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "completed");

    let equipment = get_equipment(&client, equipment_id).await;
    assert_eq!(equipment["status"], "maintenance");
    assert!(equipment["current_holder_id"].is_null());
}

#[tokio::test]
#[ignore]
async fn test_unknown_return_condition_is_a_validation_error() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "Atomos Ninja").await;

    let start = Utc::now() - Duration::hours(1);
    let (_, res) =
        post_reservation(&client, equipment_id, start, start + Duration::days(1), false).await;
    let id = res["id"].as_i64().unwrap();
    transition(&client, id, "approve", &manager_token()).await;
    transition(&client, id, "checkout", &member_token()).await;

    let response = client
        .post(format!("{}/reservations/{}/return", BASE_URL, id))
        .bearer_auth(member_token())
        .json(&json!({ "condition": "broken" }))
        .send()
        .await
        .expect("Failed to post return");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Still active, still out in the field
    let response = client
        .get(format!("{}/reservations/{}", BASE_URL, id))
        .bearer_auth(member_token())
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "active");
}

#[tokio::test]
#[ignore]
async fn test_cancel_is_not_idempotent_on_terminal_state() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "Manfrotto 504X").await;

    let base = Utc::now() + Duration::days(3);
    let (_, res) =
        post_reservation(&client, equipment_id, base, base + Duration::days(1), false).await;
    let id = res["id"].as_i64().unwrap();

    let (status, body) = transition(&client, id, "cancel", &member_token()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, _) = transition(&client, id, "cancel", &member_token()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let equipment = get_equipment(&client, equipment_id).await;
    assert_eq!(equipment["status"], "available");
}

#[tokio::test]
#[ignore]
async fn test_approve_requires_manager_permission() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "Arri Skypanel").await;

    let base = Utc::now() + Duration::days(8);
    let (_, res) =
        post_reservation(&client, equipment_id, base, base + Duration::days(1), false).await;
    let id = res["id"].as_i64().unwrap();

    let (status, _) = transition(&client, id, "approve", &member_token()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_identical_requests_yield_one_booking() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "RED Komodo").await;

    let base = Utc::now() + Duration::days(15);
    let end = base + Duration::days(2);

    let (first, second) = tokio::join!(
        post_reservation(&client, equipment_id, base, end, false),
        post_reservation(&client, equipment_id, base, end, false),
    );

    let statuses = [first.0, second.0];
    assert!(
        statuses.contains(&StatusCode::CREATED),
        "one request must win: {:?}",
        statuses
    );
    assert!(
        statuses.contains(&StatusCode::CONFLICT),
        "one request must lose: {:?}",
        statuses
    );
}

#[tokio::test]
#[ignore]
async fn test_waitlisted_reservation_is_promoted_when_interval_frees() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "Blackmagic 6K").await;

    let base = Utc::now() + Duration::days(20);
    let end = base + Duration::days(2);

    let (_, holder) = post_reservation(&client, equipment_id, base, end, false).await;
    let holder_id = holder["id"].as_i64().unwrap();
    let (status, _) = transition(&client, holder_id, "approve", &manager_token()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, queued) = post_reservation(&client, equipment_id, base, end, true).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(queued["status"], "waitlist");
    let queued_id = queued["id"].as_i64().unwrap();

    // Vacate the interval
    let (status, _) = transition(&client, holder_id, "cancel", &member_token()).await;
    assert_eq!(status, StatusCode::OK);

    let response = client
        .get(format!("{}/reservations/{}", BASE_URL, queued_id))
        .bearer_auth(member_token())
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "approved");
}

#[tokio::test]
#[ignore]
async fn test_retired_equipment_rejects_reservations() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "Old Tascam").await;

    let response = client
        .post(format!("{}/equipment/{}/retire", BASE_URL, equipment_id))
        .bearer_auth(manager_token())
        .send()
        .await
        .expect("Failed to retire");
    assert_eq!(response.status(), StatusCode::OK);

    let base = Utc::now() + Duration::days(2);
    let (status, _) =
        post_reservation(&client, equipment_id, base, base + Duration::days(1), false).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_availability_check_reports_conflicts_and_pending() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "Nanlite Forza").await;

    let base = Utc::now() + Duration::days(25);
    let (_, res) =
        post_reservation(&client, equipment_id, base, base + Duration::days(2), false).await;

    // A pending request does not hold the interval, but a new submission
    // would queue behind it, so it is surfaced separately
    let body = check_availability(
        &client,
        equipment_id,
        base + Duration::days(1),
        base + Duration::days(3),
    )
    .await;
    assert_eq!(body["available"], true);
    assert_eq!(body["conflicts"].as_array().unwrap().len(), 0);
    assert_eq!(body["pending"].as_array().unwrap().len(), 1);

    let (status, _) =
        transition(&client, res["id"].as_i64().unwrap(), "approve", &manager_token()).await;
    assert_eq!(status, StatusCode::OK);

    let body = check_availability(
        &client,
        equipment_id,
        base + Duration::days(1),
        base + Duration::days(3),
    )
    .await;
    assert_eq!(body["available"], false);
    assert_eq!(body["can_waitlist"], true);
    assert_eq!(body["conflicts"].as_array().unwrap().len(), 1);
    assert_eq!(body["pending"].as_array().unwrap().len(), 0);

    // Disjoint window is free
    let body = check_availability(
        &client,
        equipment_id,
        base + Duration::days(10),
        base + Duration::days(12),
    )
    .await;
    assert_eq!(body["available"], true);
}

#[tokio::test]
#[ignore]
async fn test_promotion_skips_conflicting_and_prefers_earliest() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "Cooke S4 set").await;

    let base = Utc::now() + Duration::days(50);
    let d = |days: i64| base + Duration::days(days);

    // Two back-to-back holders
    let (_, h1) = post_reservation(&client, equipment_id, d(0), d(2), false).await;
    let h1_id = h1["id"].as_i64().unwrap();
    let (_, h2) = post_reservation(&client, equipment_id, d(2), d(4), false).await;
    let h2_id = h2["id"].as_i64().unwrap();
    let (status, _) = transition(&client, h1_id, "approve", &manager_token()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = transition(&client, h2_id, "approve", &manager_token()).await;
    assert_eq!(status, StatusCode::OK);

    // W1 straddles both holders, W2 and W3 only the first; creation order
    // fixes the queue order
    let (status, w1) = post_reservation(&client, equipment_id, d(1), d(3), true).await;
    assert_eq!(status, StatusCode::CREATED);
    let w1_id = w1["id"].as_i64().unwrap();
    let (_, w2) = post_reservation(&client, equipment_id, d(0), d(2), true).await;
    let w2_id = w2["id"].as_i64().unwrap();
    let (_, w3) = post_reservation(&client, equipment_id, d(0), d(2), true).await;
    let w3_id = w3["id"].as_i64().unwrap();

    let (status, _) = transition(&client, h1_id, "cancel", &member_token()).await;
    assert_eq!(status, StatusCode::OK);

    // W1 is oldest but still blocked by the second holder; W2 is the
    // earliest free entry and takes the one vacancy
    assert_eq!(get_reservation_status(&client, w1_id).await, "waitlist");
    assert_eq!(get_reservation_status(&client, w2_id).await, "approved");
    assert_eq!(get_reservation_status(&client, w3_id).await, "waitlist");
}

#[tokio::test]
#[ignore]
async fn test_approve_fails_when_interval_taken_while_pending() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "Alexa Mini LF").await;

    let base = Utc::now() + Duration::days(60);
    let (status, pending) =
        post_reservation(&client, equipment_id, base, base + Duration::days(2), false).await;
    assert_eq!(status, StatusCode::CREATED);
    let pending_id = pending["id"].as_i64().unwrap();

    // Same window queues behind the pending request
    let (status, queued) =
        post_reservation(&client, equipment_id, base, base + Duration::days(2), true).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(queued["status"], "waitlist");
    let queued_id = queued["id"].as_i64().unwrap();

    // Cancelling an unrelated reservation sweeps the waitlist; the queued
    // entry sees no holder on its window and gets promoted past the
    // pending request
    let (_, dummy) = post_reservation(
        &client,
        equipment_id,
        base + Duration::days(10),
        base + Duration::days(11),
        false,
    )
    .await;
    let (status, _) = transition(&client, dummy["id"].as_i64().unwrap(), "cancel", &member_token()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(get_reservation_status(&client, queued_id).await, "approved");

    // The pending request's window is now held; approval must re-check
    // and fail instead of double-booking
    let (status, body) = transition(&client, pending_id, "approve", &manager_token()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let conflicts = body["conflicts"].as_array().expect("No conflict list");
    assert!(conflicts.iter().any(|c| c["id"].as_i64() == Some(queued_id)));
    assert_eq!(get_reservation_status(&client, pending_id).await, "pending");
}

#[tokio::test]
#[ignore]
async fn test_qr_scan_does_not_cross_agencies() {
    let client = Client::new();
    let other_manager = token_for_agency(
        2,
        OTHER_AGENCY_MANAGER_ID,
        vec![Permission::ManageEquipment],
    );

    let response = client
        .post(format!("{}/equipment", BASE_URL))
        .bearer_auth(&other_manager)
        .json(&json!({ "name": "Leica Noctilux" }))
        .send()
        .await
        .expect("Failed to create equipment");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    let qr_code = body["qr_code"].as_str().expect("No qr code").to_string();

    // The owning agency resolves its own label
    let response = client
        .post(format!("{}/equipment/scan", BASE_URL))
        .bearer_auth(&other_manager)
        .json(&json!({ "qr_code": qr_code }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Another agency scanning the same label sees nothing
    let response = client
        .post(format!("{}/equipment/scan", BASE_URL))
        .bearer_auth(member_token())
        .json(&json!({ "qr_code": qr_code }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_retire_blocked_while_reservations_hold_the_calendar() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "Easyrig Vario").await;

    let base = Utc::now() + Duration::days(35);
    let (_, res) =
        post_reservation(&client, equipment_id, base, base + Duration::days(1), false).await;
    let id = res["id"].as_i64().unwrap();
    let (status, _) = transition(&client, id, "approve", &manager_token()).await;
    assert_eq!(status, StatusCode::OK);

    let response = client
        .post(format!("{}/equipment/{}/retire", BASE_URL, equipment_id))
        .bearer_auth(manager_token())
        .send()
        .await
        .expect("Failed to post retire");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Once the booking is cancelled the asset can go
    let (status, _) = transition(&client, id, "cancel", &member_token()).await;
    assert_eq!(status, StatusCode::OK);
    let response = client
        .post(format!("{}/equipment/{}/retire", BASE_URL, equipment_id))
        .bearer_auth(manager_token())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore]
async fn test_readiness_reflects_database_connectivity() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
#[ignore]
async fn test_missing_token_is_unauthorized() {
    let client = Client::new();

    let response = client
        .get(format!("{}/reservations", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
