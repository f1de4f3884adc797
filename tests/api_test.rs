use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, FixedOffset, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

use hospital_booking::{
    auth::hash_password,
    models::{AdminCredentials, AppState},
    slots::date_key,
    store::MemoryStore,
};

const ADMIN_EMAIL: &str = "admin@clinic.test";
const ADMIN_PASSWORD: &str = "admin-password";

fn test_app() -> Router {
    let state = AppState {
        store: Arc::new(MemoryStore::new()),
        session_ttl_hours: 24,
        admin: Some(AdminCredentials {
            email: ADMIN_EMAIL.into(),
            password_hash: hash_password(ADMIN_PASSWORD).unwrap(),
        }),
        clinic_offset: FixedOffset::east_opt(0).unwrap(),
    };
    hospital_booking::app(state)
}

async fn send(app: &Router, request: Request<Body>) -> Value {
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn get(app: &Router, uri: &str, token: Option<&str>) -> Value {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

async fn post(app: &Router, uri: &str, token: Option<&str>, body: Value) -> Value {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

fn token_of(resp: &Value) -> String {
    assert_eq!(resp["success"], true, "unexpected failure: {resp}");
    resp["token"].as_str().unwrap().to_string()
}

async fn admin_token(app: &Router) -> String {
    let resp = post(
        app,
        "/api/admin/login",
        None,
        json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
    )
    .await;
    token_of(&resp)
}

async fn register_patient(app: &Router, email: &str) -> String {
    let resp = post(
        app,
        "/api/user/register",
        None,
        json!({ "name": "Jane Doe", "email": email, "password": "password123" }),
    )
    .await;
    token_of(&resp)
}

/// Adds an available doctor and returns (doctor id, doctor token).
async fn add_doctor(app: &Router, admin: &str, email: &str, fees: f64) -> (String, String) {
    let resp = post(
        app,
        "/api/admin/add-doctor",
        Some(admin),
        json!({
            "name": "Dr. Richard James",
            "email": email,
            "password": "doctor-pass",
            "speciality": "General physician",
            "degree": "MBBS",
            "experience": "4 Years",
            "about": "Preventive care.",
            "fees": fees,
            "address": { "line1": "17th Cross", "line2": "Richmond" }
        }),
    )
    .await;
    assert_eq!(resp["success"], true, "{resp}");

    let login = post(
        app,
        "/api/doctor/login",
        None,
        json!({ "email": email, "password": "doctor-pass" }),
    )
    .await;
    let token = token_of(&login);

    let profile = get(app, "/api/doctor/profile", Some(&token)).await;
    let id = profile["profileData"]["_id"].as_str().unwrap().to_string();
    (id, token)
}

async fn book(app: &Router, patient: &str, doc_id: &str, date: &str, time: &str) -> Value {
    post(
        app,
        "/api/user/book-appointment",
        Some(patient),
        json!({ "docId": doc_id, "slotDate": date, "slotTime": time }),
    )
    .await
}

async fn first_appointment_id(app: &Router, uri: &str, token: &str) -> String {
    let resp = get(app, uri, Some(token)).await;
    resp["appointments"][0]["_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_register_and_profile_defaults() {
    let app = test_app();
    let token = register_patient(&app, "jane@example.com").await;

    let resp = get(&app, "/api/user/get-profile", Some(&token)).await;
    assert_eq!(resp["success"], true);
    assert_eq!(resp["userData"]["email"], "jane@example.com");
    assert_eq!(resp["userData"]["phone"], "0000000000");
    assert_eq!(resp["userData"]["gender"], "Not Selected");
    assert!(resp["userData"].get("password_hash").is_none());

    let resp = post(
        &app,
        "/api/user/update-profile",
        Some(&token),
        json!({ "name": "Jane Roe", "phone": "5551234", "dob": "1990-01-01", "gender": "Female" }),
    )
    .await;
    assert_eq!(resp["message"], "Profile Updated");

    let resp = get(&app, "/api/user/get-profile", Some(&token)).await;
    assert_eq!(resp["userData"]["name"], "Jane Roe");
}

#[tokio::test]
async fn test_registration_validation() {
    let app = test_app();
    register_patient(&app, "jane@example.com").await;

    let resp = post(
        &app,
        "/api/user/register",
        None,
        json!({ "name": "Jane", "email": "JANE@example.com", "password": "password123" }),
    )
    .await;
    assert_eq!(resp["success"], false);
    assert_eq!(resp["code"], "EMAIL_TAKEN");

    let resp = post(
        &app,
        "/api/user/register",
        None,
        json!({ "name": "Jane", "email": "not-an-email", "password": "password123" }),
    )
    .await;
    assert_eq!(resp["code"], "VALIDATION_ERROR");

    let resp = post(
        &app,
        "/api/user/register",
        None,
        json!({ "name": "Jane", "email": "other@example.com", "password": "short" }),
    )
    .await;
    assert_eq!(resp["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_login_failures() {
    let app = test_app();
    register_patient(&app, "jane@example.com").await;

    let resp = post(
        &app,
        "/api/user/login",
        None,
        json!({ "email": "nobody@example.com", "password": "password123" }),
    )
    .await;
    assert_eq!(resp["message"], "User does not exist");

    let resp = post(
        &app,
        "/api/user/login",
        None,
        json!({ "email": "jane@example.com", "password": "wrong-password" }),
    )
    .await;
    assert_eq!(resp["message"], "Invalid credentials");

    let resp = post(
        &app,
        "/api/admin/login",
        None,
        json!({ "email": ADMIN_EMAIL, "password": "wrong-password" }),
    )
    .await;
    assert_eq!(resp["code"], "INVALID_CREDENTIAL");
}

#[tokio::test]
async fn test_booking_conflict_and_cancel_frees_slot() {
    let app = test_app();
    let admin = admin_token(&app).await;
    let (doc_id, _) = add_doctor(&app, &admin, "richard@example.com", 50.0).await;
    let alice = register_patient(&app, "alice@example.com").await;
    let bob = register_patient(&app, "bob@example.com").await;

    let resp = book(&app, &alice, &doc_id, "5_3_2030", "10:00 AM").await;
    assert_eq!(resp["message"], "Appointment Booked");

    let resp = book(&app, &bob, &doc_id, "5_3_2030", "10:00 AM").await;
    assert_eq!(resp["success"], false);
    assert_eq!(resp["code"], "SLOT_TAKEN");
    assert_eq!(resp["message"], "Slot not available");

    let list = get(&app, "/api/doctor/list", None).await;
    let doctor = &list["doctors"][0];
    assert_eq!(doctor["slots_booked"]["5_3_2030"], json!(["10:00 AM"]));
    assert!(doctor.get("email").is_none());

    let appointments = get(&app, "/api/user/appointments", Some(&alice)).await;
    let appt = &appointments["appointments"][0];
    assert_eq!(appt["amount"], 50.0);
    assert_eq!(appt["cancelled"], false);
    assert_eq!(appt["isCompleted"], false);
    assert_eq!(appt["docData"]["name"], "Dr. Richard James");
    let appointment_id = appt["_id"].as_str().unwrap().to_string();

    // bob cannot cancel alice's booking
    let resp = post(
        &app,
        "/api/user/cancel-appointment",
        Some(&bob),
        json!({ "appointmentId": appointment_id }),
    )
    .await;
    assert_eq!(resp["code"], "UNAUTHORIZED");

    for _ in 0..2 {
        let resp = post(
            &app,
            "/api/user/cancel-appointment",
            Some(&alice),
            json!({ "appointmentId": appointment_id }),
        )
        .await;
        assert_eq!(resp["message"], "Appointment Cancelled");
    }

    let list = get(&app, "/api/doctor/list", None).await;
    assert!(list["doctors"][0]["slots_booked"].get("5_3_2030").is_none());

    let resp = book(&app, &bob, &doc_id, "5_3_2030", "10:00 AM").await;
    assert_eq!(resp["success"], true);
}

#[tokio::test]
async fn test_booking_validation_and_availability() {
    let app = test_app();
    let admin = admin_token(&app).await;
    let patient = register_patient(&app, "alice@example.com").await;

    let resp = post(
        &app,
        "/api/doctor/register",
        None,
        json!({
            "name": "Dr. New",
            "email": "new@example.com",
            "password": "doctor-pass",
            "speciality": "Dermatologist"
        }),
    )
    .await;
    let doctor_token = token_of(&resp);
    let profile = get(&app, "/api/doctor/profile", Some(&doctor_token)).await;
    assert_eq!(profile["profileData"]["available"], false);
    assert_eq!(profile["profileData"]["fees"], 50.0);
    let doc_id = profile["profileData"]["_id"].as_str().unwrap().to_string();

    let resp = book(&app, &patient, &doc_id, "5_3_2030", "10:00 AM").await;
    assert_eq!(resp["code"], "DOCTOR_UNAVAILABLE");

    let resp = post(
        &app,
        "/api/admin/change-availability",
        Some(&admin),
        json!({ "docId": doc_id }),
    )
    .await;
    assert_eq!(resp["success"], true);

    let resp = book(&app, &patient, &doc_id, "5-3-2030", "10:00 AM").await;
    assert_eq!(resp["code"], "VALIDATION_ERROR");
    let resp = book(&app, &patient, &doc_id, "5_3_2030", "9:15 PM").await;
    assert_eq!(resp["code"], "VALIDATION_ERROR");

    let resp = book(&app, &patient, &doc_id, "05_03_2030", "03:30 pm").await;
    assert_eq!(resp["success"], true);
    let appts = get(&app, "/api/doctor/appointments", Some(&doctor_token)).await;
    assert_eq!(appts["appointments"][0]["slotDate"], "5_3_2030");
    assert_eq!(appts["appointments"][0]["slotTime"], "3:30 PM");

    let resp = book(
        &app,
        &patient,
        "6b1f4c52-7f2a-4b7e-9a55-0f3f8e6c2d11",
        "5_3_2030",
        "10:00 AM",
    )
    .await;
    assert_eq!(resp["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_slots_endpoint_excludes_booked_slot() {
    let app = test_app();
    let admin = admin_token(&app).await;
    let (doc_id, _) = add_doctor(&app, &admin, "richard@example.com", 50.0).await;
    let patient = register_patient(&app, "alice@example.com").await;

    let day = date_key(Utc::now().date_naive() + Duration::days(3));
    let resp = book(&app, &patient, &doc_id, &day, "10:00 AM").await;
    assert_eq!(resp["success"], true);

    let slots = get(&app, &format!("/api/doctor/slots/{doc_id}"), None).await;
    let days = slots["days"].as_array().unwrap();
    assert_eq!(days.len(), 7);
    assert_eq!(days[3]["slotDate"], day.as_str());

    let times: Vec<&str> = days[3]["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["time"].as_str().unwrap())
        .collect();
    assert_eq!(times.len(), 21);
    assert_eq!(times[0], "10:30 AM");
    assert!(!times.contains(&"10:00 AM"));
    assert_eq!(days[4]["slots"].as_array().unwrap().len(), 22);

    let resp = get(
        &app,
        "/api/doctor/slots/6b1f4c52-7f2a-4b7e-9a55-0f3f8e6c2d11",
        None,
    )
    .await;
    assert_eq!(resp["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_role_gating_and_token_headers() {
    let app = test_app();
    let admin = admin_token(&app).await;
    let (_, doctor) = add_doctor(&app, &admin, "richard@example.com", 50.0).await;
    let patient = register_patient(&app, "alice@example.com").await;

    let resp = get(&app, "/api/user/appointments", None).await;
    assert_eq!(resp["code"], "INVALID_CREDENTIAL");

    let resp = get(&app, "/api/user/appointments", Some("not-a-real-token")).await;
    assert_eq!(resp["code"], "INVALID_CREDENTIAL");

    let resp = get(&app, "/api/user/appointments", Some(&doctor)).await;
    assert_eq!(resp["code"], "FORBIDDEN");

    let resp = get(&app, "/api/admin/dashboard", Some(&patient)).await;
    assert_eq!(resp["code"], "FORBIDDEN");

    let resp = get(&app, "/api/doctor/dashboard", Some(&admin)).await;
    assert_eq!(resp["code"], "FORBIDDEN");

    // legacy per-panel headers
    let resp = send(
        &app,
        Request::builder()
            .uri("/api/user/appointments")
            .header("token", patient.as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp["success"], true);

    let resp = send(
        &app,
        Request::builder()
            .uri("/api/doctor/appointments")
            .header("dtoken", doctor.as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp["success"], true);
}

#[tokio::test]
async fn test_complete_cancel_exclusive_and_dashboards() {
    let app = test_app();
    let admin = admin_token(&app).await;
    let (doc_id, doctor) = add_doctor(&app, &admin, "richard@example.com", 50.0).await;
    let (_, other_doctor) = add_doctor(&app, &admin, "other@example.com", 80.0).await;
    let alice = register_patient(&app, "alice@example.com").await;
    let bob = register_patient(&app, "bob@example.com").await;

    assert_eq!(book(&app, &alice, &doc_id, "5_3_2030", "10:00 AM").await["success"], true);
    let first = first_appointment_id(&app, "/api/user/appointments", &alice).await;
    assert_eq!(book(&app, &bob, &doc_id, "5_3_2030", "10:30 AM").await["success"], true);
    let second = first_appointment_id(&app, "/api/user/appointments", &bob).await;

    // only the appointment's own doctor may complete it
    let resp = post(
        &app,
        "/api/doctor/complete-appointment",
        Some(&other_doctor),
        json!({ "appointmentId": first }),
    )
    .await;
    assert_eq!(resp["code"], "UNAUTHORIZED");

    let resp = post(
        &app,
        "/api/doctor/complete-appointment",
        Some(&doctor),
        json!({ "appointmentId": first }),
    )
    .await;
    assert_eq!(resp["message"], "Appointment Completed");

    let resp = post(
        &app,
        "/api/user/cancel-appointment",
        Some(&alice),
        json!({ "appointmentId": first }),
    )
    .await;
    assert_eq!(resp["code"], "INVALID_TRANSITION");

    let resp = post(
        &app,
        "/api/admin/cancel-appointment",
        Some(&admin),
        json!({ "appointmentId": second }),
    )
    .await;
    assert_eq!(resp["message"], "Appointment Cancelled");

    let resp = post(
        &app,
        "/api/doctor/complete-appointment",
        Some(&doctor),
        json!({ "appointmentId": second }),
    )
    .await;
    assert_eq!(resp["code"], "INVALID_TRANSITION");

    let dash = get(&app, "/api/doctor/dashboard", Some(&doctor)).await;
    let data = &dash["dashData"];
    assert_eq!(data["earnings"], 50.0);
    assert_eq!(data["appointments"], 2);
    assert_eq!(data["patients"], 2);
    // the doctor panel reads the singular key
    assert_eq!(data["latestAppointment"][0]["_id"], second.as_str());
    assert_eq!(data["latestAppointment"][1]["_id"], first.as_str());
    assert!(data.get("latestAppointments").is_none());
    assert!(data.get("doctors").is_none());

    let dash = get(&app, "/api/admin/dashboard", Some(&admin)).await;
    assert_eq!(dash["dashData"]["doctors"], 2);
    assert_eq!(dash["dashData"]["appointments"], 2);
    assert_eq!(dash["dashData"]["latestAppointments"][0]["_id"], second.as_str());
    assert!(dash["dashData"].get("latestAppointment").is_none());

    let all = get(&app, "/api/admin/all-doctors", Some(&admin)).await;
    assert_eq!(all["doctors"].as_array().unwrap().len(), 2);
    assert!(all["doctors"][0]["email"].is_string());
}

async fn post_raw(app: &Router, uri: &str, token: Option<&str>, body: &str) -> Value {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

fn assert_validation_error(resp: &Value) {
    assert_eq!(resp["success"], false, "{resp}");
    assert_eq!(resp["code"], "VALIDATION_ERROR", "{resp}");
    assert!(resp["message"].as_str().unwrap().starts_with("Invalid"));
}

#[tokio::test]
async fn test_malformed_requests_use_the_failure_envelope() {
    let app = test_app();
    let patient = register_patient(&app, "alice@example.com").await;

    // missing field
    let resp = post(
        &app,
        "/api/user/register",
        None,
        json!({ "name": "a", "email": "a@b.co" }),
    )
    .await;
    assert_validation_error(&resp);

    // not JSON at all
    let resp = post_raw(&app, "/api/user/login", None, "not json").await;
    assert_validation_error(&resp);

    // ids that are not UUIDs
    let resp = post(
        &app,
        "/api/user/book-appointment",
        Some(&patient),
        json!({ "docId": "64f1c2e9a1b2c3d4e5f60718", "slotDate": "5_3_2030", "slotTime": "10:00 AM" }),
    )
    .await;
    assert_validation_error(&resp);

    let resp = post(
        &app,
        "/api/user/cancel-appointment",
        Some(&patient),
        json!({ "appointmentId": "not-an-id" }),
    )
    .await;
    assert_validation_error(&resp);

    let resp = get(&app, "/api/doctor/slots/not-an-id", None).await;
    assert_validation_error(&resp);

    // missing content type
    let resp = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/doctor/login")
            .body(Body::from(r#"{"email":"x@example.com","password":"password123"}"#))
            .unwrap(),
    )
    .await;
    assert_validation_error(&resp);
}

#[tokio::test]
async fn test_me_and_logout() {
    let app = test_app();
    let token = register_patient(&app, "alice@example.com").await;

    let me = get(&app, "/api/auth/me", Some(&token)).await;
    assert_eq!(me["principal"]["role"], "patient");
    assert!(me["session"]["expiresAt"].is_string());

    let resp = post(&app, "/api/auth/logout", Some(&token), json!({})).await;
    assert_eq!(resp["success"], true);

    let resp = get(&app, "/api/auth/me", Some(&token)).await;
    assert_eq!(resp["code"], "INVALID_CREDENTIAL");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_over_http() {
    let app = test_app();
    let admin = admin_token(&app).await;
    let (doc_id, doctor) = add_doctor(&app, &admin, "richard@example.com", 50.0).await;

    let mut tokens = Vec::new();
    for i in 0..6 {
        tokens.push(register_patient(&app, &format!("p{i}@example.com")).await);
    }

    let mut handles = Vec::new();
    for token in tokens {
        let app = app.clone();
        let doc_id = doc_id.clone();
        handles.push(tokio::spawn(async move {
            book(&app, &token, &doc_id, "7_3_2030", "11:00 AM").await
        }));
    }

    let mut codes = Vec::new();
    for h in handles {
        let resp = h.await.unwrap();
        codes.push(if resp["success"] == true {
            "OK".to_string()
        } else {
            resp["code"].as_str().unwrap().to_string()
        });
    }
    assert_eq!(codes.iter().filter(|c| *c == "OK").count(), 1);
    assert_eq!(codes.iter().filter(|c| *c == "SLOT_TAKEN").count(), 5);

    let appts = get(&app, "/api/doctor/appointments", Some(&doctor)).await;
    assert_eq!(appts["appointments"].as_array().unwrap().len(), 1);
}
