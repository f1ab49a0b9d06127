use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use groundbook::auth;
use groundbook::config::AppConfig;
use groundbook::db::{self, queries};
use groundbook::models::{Ground, GroundStatus, Role, User};
use groundbook::router;
use groundbook::services::email::{EmailProvider, OutgoingEmail};
use groundbook::services::messaging::MessagingProvider;
use groundbook::services::notification::CommsNotifier;
use groundbook::state::AppState;

const SECRET: &str = "test-secret";

// ── Mock Providers ──

struct MockMessaging {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl MessagingProvider for MockMessaging {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

struct MockEmail {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
}

#[async_trait]
impl EmailProvider for MockEmail {
    async fn send_email(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        token_secret: SECRET.to_string(),
        twilio_account_sid: String::new(),
        twilio_auth_token: String::new(),
        twilio_phone_number: "+15551234567".to_string(),
        smtp_host: String::new(),
        smtp_port: 587,
        smtp_username: String::new(),
        smtp_password: String::new(),
        email_from: "Bookings <noreply@example.com>".to_string(),
        currency: "SAR".to_string(),
        display_utc_offset_minutes: 180,
    }
}

struct TestApp {
    app: Router,
    state: Arc<AppState>,
    sms: Arc<Mutex<Vec<(String, String)>>>,
    emails: Arc<Mutex<Vec<OutgoingEmail>>>,
}

fn test_state() -> TestApp {
    let conn = db::init_db(":memory:").unwrap();
    let sms = Arc::new(Mutex::new(vec![]));
    let emails = Arc::new(Mutex::new(vec![]));
    let notifier = CommsNotifier::new(
        Box::new(MockMessaging {
            sent: Arc::clone(&sms),
        }),
        Box::new(MockEmail {
            sent: Arc::clone(&emails),
        }),
        "SAR".to_string(),
        180,
    );
    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        notifier: Arc::new(notifier),
    });
    seed(&state);

    TestApp {
        app: router::build_router(Arc::clone(&state)),
        state,
        sms,
        emails,
    }
}

/// Users `owner` (ground), `u1`, `u2` (user), `admin`; ground `G` at 100/hour.
fn seed(state: &AppState) {
    let db = state.db();
    let now = Utc::now().naive_utc();
    for (id, role, phone) in [
        ("owner", Role::Ground, None),
        ("u1", Role::User, Some("+966 50 111 2222")),
        ("u2", Role::User, None),
        ("admin", Role::Admin, None),
    ] {
        queries::save_user(
            &db,
            &User {
                id: id.to_string(),
                first_name: format!("{id}-first"),
                last_name: "Tester".to_string(),
                email: Some(format!("{id}@example.com")),
                phone_number: phone.map(str::to_string),
                role,
                created_at: now,
            },
        )
        .unwrap();
    }
    queries::save_ground(
        &db,
        &Ground {
            id: "G".to_string(),
            owner_id: "owner".to_string(),
            name: "Central Pitch".to_string(),
            address: Some("King Fahd Rd".to_string()),
            price_per_hour: dec!(100),
            status: GroundStatus::Active,
            created_at: now,
        },
    )
    .unwrap();
}

fn token(user_id: &str, role: Role) -> String {
    auth::issue_token(SECRET, user_id, role, chrono::Duration::hours(1), Utc::now()).unwrap()
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header("Authorization", format!("Bearer {t}"));
    }
    let req = match body {
        Some(b) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Creates two slots for tomorrow and returns their ids.
async fn create_two_slots(t: &TestApp) -> Vec<String> {
    let date = (Utc::now() + chrono::Duration::days(1)).date_naive().to_string();
    let (status, json) = call(
        &t.app,
        "POST",
        "/slot",
        Some(&token("owner", Role::Ground)),
        Some(json!({
            "groundId": "G",
            "slots": [
                {"date": date, "startTime": "10:00", "endTime": "11:00"},
                {"date": date, "startTime": "11:00", "endTime": "12:00"}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap().to_string())
        .collect()
}

async fn book(t: &TestApp, user: &str, slots: &[String]) -> (StatusCode, Value) {
    call(
        &t.app,
        "POST",
        "/booking",
        Some(&token(user, Role::User)),
        Some(json!({"groundId": "G", "slots": slots, "numberOfGuests": 4})),
    )
    .await
}

// ── Envelope & Auth ──

#[tokio::test]
async fn test_health() {
    let t = test_state();
    let (status, json) = call(&t.app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_booking_requires_auth() {
    let t = test_state();
    let (status, json) = call(&t.app, "POST", "/booking", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["statusCode"], 401);
    assert_eq!(json["success"], false);

    let (status, _) = call(&t.app, "GET", "/booking/users", Some("not.a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_unknown_user_rejected() {
    let t = test_state();
    let (status, _) = call(
        &t.app,
        "GET",
        "/booking/users",
        Some(&token("ghost", Role::User)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Right user, wrong role.
    let (status, _) = call(
        &t.app,
        "GET",
        "/booking/users",
        Some(&token("u1", Role::Admin)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_forbidden_for_users() {
    let t = test_state();
    let user = token("u1", Role::User);
    for uri in ["/booking", "/booking/transactions", "/coupon"] {
        let (status, json) = call(&t.app, "GET", uri, Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(json["statusCode"], 403);
    }
}

#[tokio::test]
async fn test_malformed_body_uses_error_envelope() {
    let t = test_state();
    let req = Request::builder()
        .method("POST")
        .uri("/booking")
        .header("Authorization", format!("Bearer {}", token("u1", Role::User)))
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let res = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], false);
}

// ── Booking Flow ──

#[tokio::test]
async fn test_booking_scenario() {
    let t = test_state();
    let slots = create_two_slots(&t).await;

    let (status, json) = book(&t, "u1", &slots).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Booking created successfully");
    assert_eq!(json["data"]["totalAmount"].as_f64(), Some(200.0));
    assert_eq!(json["data"]["finalAmount"].as_f64(), Some(200.0));
    assert_eq!(json["data"]["status"], "pending");

    let (status, json) = book(&t, "u2", &slots).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["message"],
        "Some provided slot IDs are invalid or already booked"
    );

    // Notifications are delivered off the request path.
    for _ in 0..50 {
        if !t.sms.lock().unwrap().is_empty() && !t.emails.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let sms = t.sms.lock().unwrap();
    assert_eq!(sms.len(), 1);
    assert_eq!(sms[0].0, "+966501112222");
    assert!(sms[0].1.contains("Total Amount is 200"));
    let emails = t.emails.lock().unwrap();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].to, "u1@example.com");
}

#[tokio::test]
async fn test_confirm_payment_once() {
    let t = test_state();
    let slots = create_two_slots(&t).await;
    let (_, created) = book(&t, "u1", &slots).await;
    let booking_id = created["data"]["id"].as_str().unwrap().to_string();
    let user = token("u1", Role::User);

    let (status, json) = call(
        &t.app,
        "PUT",
        "/booking",
        Some(&user),
        Some(json!({"orderId": booking_id, "status": "failed"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Payment not successful");

    let (status, json) = call(
        &t.app,
        "PUT",
        "/booking",
        Some(&user),
        Some(json!({"orderId": booking_id, "status": "success", "paymentDetails": {"ref": "A1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["paymentStatus"], "paid");
    assert_eq!(json["data"]["status"], "confirmed");
    assert_eq!(json["data"]["meta"]["slots"].as_array().unwrap().len(), 2);

    let (status, json) = call(
        &t.app,
        "PUT",
        "/booking",
        Some(&user),
        Some(json!({"orderId": booking_id, "status": "success", "paymentDetails": {"ref": "B2"}})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["message"], "Booking already completed");

    let (_, json) = call(&t.app, "GET", &format!("/booking/{booking_id}"), Some(&user), None).await;
    assert_eq!(json["data"]["paymentDetails"]["ref"], "A1");
}

#[tokio::test]
async fn test_cancel_frees_slots() {
    let t = test_state();
    let slots = create_two_slots(&t).await;
    let (_, created) = book(&t, "u1", &slots).await;
    let booking_id = created["data"]["id"].as_str().unwrap().to_string();

    // Somebody else's booking.
    let (status, _) = call(
        &t.app,
        "PUT",
        "/booking/cancel",
        Some(&token("u2", Role::User)),
        Some(json!({"bookingId": booking_id})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = call(
        &t.app,
        "PUT",
        "/booking/cancel",
        Some(&token("u1", Role::User)),
        Some(json!({"bookingId": booking_id, "reason": "team unavailable"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["status"], "cancelled");
    assert_eq!(json["data"]["cancellationReason"], "team unavailable");

    let (status, _) = book(&t, "u2", &slots).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = call(
        &t.app,
        "PUT",
        "/booking/cancel",
        Some(&token("u1", Role::User)),
        Some(json!({"bookingId": booking_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["message"], "Booking is already cancelled");
}

#[tokio::test]
async fn test_reschedule_swaps_slots() {
    let t = test_state();
    let slots = create_two_slots(&t).await;
    let (_, created) = book(&t, "u1", &slots[..1]).await;
    let booking_id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, json) = call(
        &t.app,
        "PUT",
        "/booking/reschedule",
        Some(&token("u1", Role::User)),
        Some(json!({"bookingId": booking_id, "newSlotIds": [slots[1]]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["status"], "rescheduled");
    assert_eq!(json["data"]["rescheduled"], true);
    assert_eq!(json["data"]["slots"], json!([slots[1]]));

    let db = t.state.db();
    let old = queries::get_time_slot(&db, &slots[0]).unwrap().unwrap();
    let new = queries::get_time_slot(&db, &slots[1]).unwrap().unwrap();
    assert!(old.is_free());
    assert_eq!(new.booked_by.as_deref(), Some("u1"));
}

#[tokio::test]
async fn test_user_bookings_and_detail() {
    let t = test_state();
    let slots = create_two_slots(&t).await;
    let (_, created) = book(&t, "u1", &slots).await;
    let booking_id = created["data"]["id"].as_str().unwrap().to_string();
    let user = token("u1", Role::User);

    let (status, json) = call(&t.app, "GET", "/booking/users", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["groundName"], "Central Pitch");

    let (status, json) = call(&t.app, "GET", &format!("/booking/{booking_id}"), Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user"]["id"], "u1");
    assert_eq!(json["data"]["ground"]["name"], "Central Pitch");
    assert_eq!(json["data"]["slotDetails"].as_array().unwrap().len(), 2);

    let (status, _) = call(&t.app, "GET", "/booking/nope", Some(&user), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let admin = token("admin", Role::Admin);
    let (status, json) = call(&t.app, "GET", "/booking?status=pending&limit=5", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["groundOwnerName"], "owner-first Tester");

    let (status, _) = call(&t.app, "GET", "/booking?status=bogus", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = call(&t.app, "GET", "/booking/transactions", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

// ── Coupons ──

#[tokio::test]
async fn test_coupon_lifecycle() {
    let t = test_state();
    let admin = token("admin", Role::Admin);
    let start = (Utc::now() - chrono::Duration::days(1)).naive_utc();
    let end = (Utc::now() + chrono::Duration::days(7)).naive_utc();

    let coupon = json!({
        "code": "kickoff",
        "title": "Kickoff",
        "type": "percentage",
        "discountValue": 10,
        "maxDiscountAmount": 15,
        "startDate": start.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "endDate": end.format("%Y-%m-%dT%H:%M:%S").to_string()
    });
    let (status, json) = call(&t.app, "POST", "/coupon", Some(&admin), Some(coupon.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["data"]["code"], "KICKOFF");

    let (status, _) = call(&t.app, "POST", "/coupon", Some(&admin), Some(coupon)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = call(&t.app, "GET", "/coupon/public", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let slots = create_two_slots(&t).await;
    let (_, created) = book(&t, "u1", &slots).await;
    let booking_id = created["data"]["id"].as_str().unwrap().to_string();
    let user = token("u1", Role::User);

    let (status, json) = call(
        &t.app,
        "POST",
        "/booking/apply",
        Some(&user),
        Some(json!({"bookingId": booking_id, "couponCode": "KICKOFF"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["discountAmount"].as_f64(), Some(15.0));
    assert_eq!(json["data"]["finalAmount"].as_f64(), Some(185.0));

    let (status, json) = call(
        &t.app,
        "POST",
        "/booking/apply",
        Some(&user),
        Some(json!({"bookingId": booking_id, "couponCode": "NOPE"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Invalid coupon code");

    let (status, json) = call(
        &t.app,
        "POST",
        "/booking/remove",
        Some(&user),
        Some(json!({"bookingId": booking_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["discountAmount"].as_f64(), Some(0.0));
    assert_eq!(json["data"]["finalAmount"].as_f64(), Some(200.0));
    assert!(json["data"]["couponId"].is_null());
}

// ── Slots ──

#[tokio::test]
async fn test_slot_management() {
    let t = test_state();
    let slots = create_two_slots(&t).await;
    let owner = token("owner", Role::Ground);
    let date = (Utc::now() + chrono::Duration::days(1)).date_naive().to_string();

    let (status, json) = call(
        &t.app,
        "POST",
        "/slot/add",
        Some(&owner),
        Some(json!({"groundId": "G", "date": date, "startTime": "11:30", "endTime": "12:30"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Timeslot conflicts with existing timeslots");

    let (status, json) = call(
        &t.app,
        "POST",
        "/slot/add",
        Some(&owner),
        Some(json!({"groundId": "G", "date": date, "startTime": "18:00", "endTime": "19:00", "amount": 80})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");

    let (status, json) = call(
        &t.app,
        "GET",
        &format!("/slot?groundId=G&date={date}"),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["timeslots"].as_array().unwrap().len(), 3);

    let (status, json) = call(&t.app, "GET", "/slot/G", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["startTime"], "10:00");

    // Plain users cannot manage slots.
    let (status, _) = call(
        &t.app,
        "DELETE",
        "/slot",
        Some(&token("u1", Role::User)),
        Some(json!({"slotId": slots[0], "groundId": "G"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    book(&t, "u1", &slots[..1]).await;
    let (status, _) = call(
        &t.app,
        "DELETE",
        "/slot",
        Some(&owner),
        Some(json!({"slotId": slots[0], "groundId": "G"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &t.app,
        "DELETE",
        "/slot",
        Some(&owner),
        Some(json!({"slotId": slots[1], "groundId": "G"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_no_upcoming_slots() {
    let t = test_state();
    let (status, json) = call(&t.app, "GET", "/slot/G", Some(&token("u1", Role::User)), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "No slots available for the next 30 days");
}
