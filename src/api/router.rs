//! API router.
//!
//! Returns a composable `Router` mountable on any axum server. Routes
//! are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Extension (shared context) → 2. Auth validator → 3. Audit logger

use axum::routing::{get, post};
use axum::Router;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Build the full API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost
/// layer). Endpoint handlers use `State<ApiContext>` (provided via
/// `with_state`).
pub fn api_router(ctx: ApiContext) -> Router {
    // Protected routes — require a session token.
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route(
            "/auth/me",
            get(endpoints::auth::me).patch(endpoints::auth::update_me),
        )
        // Administration
        .route("/admin/users", get(endpoints::admin::list_users))
        .route("/admin/users/stats", get(endpoints::admin::stats))
        .route("/admin/users/:id", get(endpoints::admin::get_user))
        .route("/admin/users/:id/verify", post(endpoints::admin::verify))
        .route(
            "/admin/users/:id/deactivate",
            post(endpoints::admin::deactivate),
        )
        .route(
            "/admin/users/:id/reactivate",
            post(endpoints::admin::reactivate),
        )
        .route(
            "/admin/users/:id/update-role",
            post(endpoints::admin::update_role),
        )
        // Patients and their clinical records
        .route(
            "/patients",
            get(endpoints::patients::list).post(endpoints::patients::create),
        )
        .route(
            "/patients/:id",
            get(endpoints::patients::detail).patch(endpoints::patients::update),
        )
        .route(
            "/patients/:id/notes",
            get(endpoints::patients::list_notes).post(endpoints::patients::create_note),
        )
        .route(
            "/patients/:id/allergies",
            get(endpoints::patients::list_allergies).post(endpoints::patients::create_allergy),
        )
        .route(
            "/patients/:id/medications",
            get(endpoints::patients::list_medications)
                .post(endpoints::patients::create_medication),
        )
        // Appointment negotiation
        .route(
            "/appointments",
            get(endpoints::appointments::list).post(endpoints::appointments::create),
        )
        .route(
            "/appointments/reminders/due",
            get(endpoints::appointments::reminders_due),
        )
        .route("/appointments/:id", get(endpoints::appointments::detail))
        .route(
            "/appointments/:id/propose",
            post(endpoints::appointments::propose),
        )
        .route(
            "/appointments/:id/confirm",
            post(endpoints::appointments::confirm),
        )
        .route(
            "/appointments/:id/cancel",
            post(endpoints::appointments::cancel),
        )
        .route(
            "/appointments/:id/complete",
            post(endpoints::appointments::complete),
        )
        .route(
            "/appointments/:id/no-show",
            post(endpoints::appointments::no_show),
        )
        .route(
            "/appointments/:id/reschedule",
            post(endpoints::appointments::reschedule),
        )
        .route(
            "/appointments/:id/reminder-sent",
            post(endpoints::appointments::mark_reminder_sent),
        )
        .route(
            "/appointments/:id/messages",
            get(endpoints::appointments::list_messages)
                .post(endpoints::appointments::add_message),
        )
        .route(
            "/appointments/:id/messages/:message_id/read",
            post(endpoints::appointments::mark_message_read),
        )
        .route(
            "/appointments/:id/feedback",
            get(endpoints::appointments::get_feedback)
                .post(endpoints::appointments::submit_feedback),
        )
        // Labs
        .route(
            "/labs/test-types",
            get(endpoints::labs::list_test_types).post(endpoints::labs::create_test_type),
        )
        .route(
            "/labs/orders",
            get(endpoints::labs::list_orders).post(endpoints::labs::create_order),
        )
        .route("/labs/orders/:id", get(endpoints::labs::order_detail))
        .route(
            "/labs/orders/:id/results",
            get(endpoints::labs::list_results).post(endpoints::labs::add_result),
        )
        .route("/labs/orders/:id/status", post(endpoints::labs::update_status))
        // Prescriptions
        .route(
            "/prescriptions",
            get(endpoints::prescriptions::list).post(endpoints::prescriptions::create),
        )
        .route(
            "/prescriptions/drugs",
            get(endpoints::prescriptions::list_drugs).post(endpoints::prescriptions::create_drug),
        )
        .route("/prescriptions/:id", get(endpoints::prescriptions::detail))
        .route(
            "/prescriptions/:id/dispense",
            post(endpoints::prescriptions::dispense),
        )
        .route(
            "/prescriptions/:id/dispenses",
            get(endpoints::prescriptions::list_dispenses),
        )
        // Reports
        .route(
            "/reports",
            get(endpoints::reports::list).post(endpoints::reports::create),
        )
        .route("/reports/statistics", get(endpoints::reports::statistics))
        .route(
            "/reports/:id",
            get(endpoints::reports::detail).patch(endpoints::reports::update),
        )
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes (no session yet)
    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/auth/register/patient",
            post(endpoints::auth::register_patient),
        )
        .route("/auth/register/staff", post(endpoints::auth::register_staff))
        .route("/auth/login", post(endpoints::auth::login))
        .with_state(ctx.clone())
        .layer(axum::Extension(ctx));

    Router::new().nest("/api", protected).nest("/api", unprotected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::accounts;
    use crate::db::open_memory_database;

    fn test_ctx() -> ApiContext {
        ApiContext::new(open_memory_database().unwrap())
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Register + login a patient over HTTP, returning the token.
    async fn patient_token(router: &Router, username: &str) -> String {
        let (status, _) = send(
            router,
            request(
                "POST",
                "/api/auth/register/patient",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{username}@example.org"),
                    "password": "correct-horse",
                    "password_confirm": "correct-horse",
                    "first_name": "Pat",
                    "last_name": "Example",
                    "date_of_birth": "1990-05-01",
                    "gender": "F",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            router,
            request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": "correct-horse" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    /// Register a doctor, verify them as the bootstrapped master admin,
    /// and return (doctor_token, doctor_id, admin_token).
    async fn verified_doctor(ctx: &ApiContext, router: &Router) -> (String, String, String) {
        {
            let conn = ctx.conn().unwrap();
            accounts::bootstrap_master_admin(&conn, "root", "root-password").unwrap();
        }
        let (_, admin_login) = send(
            router,
            request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "username": "root", "password": "root-password" })),
            ),
        )
        .await;
        let admin_token = admin_login["token"].as_str().unwrap().to_string();

        let (status, body) = send(
            router,
            request(
                "POST",
                "/api/auth/register/staff",
                None,
                Some(json!({
                    "username": "drjones",
                    "email": "drjones@example.org",
                    "password": "correct-horse",
                    "password_confirm": "correct-horse",
                    "first_name": "Dana",
                    "last_name": "Jones",
                    "role": "doctor",
                    "work_id": "W100",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["is_verified"], false);
        let doctor_id = body["user"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            router,
            request(
                "POST",
                &format!("/api/admin/users/{doctor_id}/verify"),
                Some(&admin_token),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_verified"], true);

        let (_, doctor_login) = send(
            router,
            request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "username": "drjones", "password": "correct-horse" })),
            ),
        )
        .await;
        let doctor_token = doctor_login["token"].as_str().unwrap().to_string();
        (doctor_token, doctor_id, admin_token)
    }

    #[tokio::test]
    async fn health_is_open() {
        let router = api_router(test_ctx());
        let (status, body) = send(&router, request("GET", "/api/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let router = api_router(test_ctx());
        let (status, body) = send(&router, request("GET", "/api/appointments", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "AUTH_REQUIRED");

        let (status, _) = send(
            &router,
            request("GET", "/api/appointments", Some("bogus-token"), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_login_me_round_trip() {
        let router = api_router(test_ctx());
        let token = patient_token(&router, "pat1").await;

        let (status, body) =
            send(&router, request("GET", "/api/auth/me", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "pat1");
        assert_eq!(body["role"], "patient");
    }

    #[tokio::test]
    async fn patients_cannot_administer_users() {
        let router = api_router(test_ctx());
        let token = patient_token(&router, "pat2").await;

        let (status, body) =
            send(&router, request("GET", "/api/admin/users", Some(&token), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn duplicate_work_id_conflicts_over_http() {
        let router = api_router(test_ctx());
        let staff = |username: &str| {
            json!({
                "username": username,
                "email": format!("{username}@example.org"),
                "password": "correct-horse",
                "password_confirm": "correct-horse",
                "first_name": "A",
                "last_name": "B",
                "role": "nurse",
                "work_id": "W-DUP",
            })
        };
        let (status, _) = send(
            &router,
            request("POST", "/api/auth/register/staff", None, Some(staff("n1"))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &router,
            request("POST", "/api/auth/register/staff", None, Some(staff("n2"))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn negotiation_flow_over_http() {
        let ctx = test_ctx();
        let router = api_router(ctx.clone());
        let (doctor_token, doctor_id, _) = verified_doctor(&ctx, &router).await;
        let patient = patient_token(&router, "pat3").await;

        // Patient requests an appointment.
        let (status, appt) = send(
            &router,
            request(
                "POST",
                "/api/appointments",
                Some(&patient),
                Some(json!({
                    "provider_id": doctor_id,
                    "title": "Annual checkup",
                    "appointment_type": "checkup",
                    "patient_suggested_time": "2025-01-10T09:00:00",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(appt["status"], "requested");
        let appt_id = appt["id"].as_str().unwrap().to_string();

        // Doctor proposes a different slot.
        let (status, appt) = send(
            &router,
            request(
                "POST",
                &format!("/api/appointments/{appt_id}/propose"),
                Some(&doctor_token),
                Some(json!({ "proposed_time": "2025-01-10T10:00:00" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(appt["status"], "proposed");

        // Patient confirms without a date; the proposal wins.
        let (status, appt) = send(
            &router,
            request(
                "POST",
                &format!("/api/appointments/{appt_id}/confirm"),
                Some(&patient),
                Some(json!({})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(appt["status"], "confirmed");
        assert_eq!(appt["confirmed_time"], "2025-01-10T10:00:00");

        // A second confirm is an invalid transition now.
        let (status, body) = send(
            &router,
            request(
                "POST",
                &format!("/api/appointments/{appt_id}/confirm"),
                Some(&patient),
                Some(json!({})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_STATE");

        // Thread carries both transition messages.
        let (status, body) = send(
            &router,
            request(
                "GET",
                &format!("/api/appointments/{appt_id}/messages"),
                Some(&patient),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);

        // Reschedule spawns a new requested appointment.
        let (status, body) = send(
            &router,
            request(
                "POST",
                &format!("/api/appointments/{appt_id}/reschedule"),
                Some(&doctor_token),
                Some(json!({ "new_time": "2025-02-01T09:00:00" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["old"]["status"], "rescheduled");
        assert_eq!(body["new"]["status"], "requested");
        assert_eq!(body["new"]["rescheduled_from"], body["old"]["id"]);
    }

    #[tokio::test]
    async fn appointment_scoping_hides_foreign_rows() {
        let ctx = test_ctx();
        let router = api_router(ctx.clone());
        let (_, doctor_id, _) = verified_doctor(&ctx, &router).await;
        let alice = patient_token(&router, "alice").await;
        let bob = patient_token(&router, "bob").await;

        let (status, appt) = send(
            &router,
            request(
                "POST",
                "/api/appointments",
                Some(&alice),
                Some(json!({
                    "provider_id": doctor_id,
                    "title": "Checkup",
                    "appointment_type": "checkup",
                    "patient_suggested_time": "2025-01-10T09:00:00",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let appt_id = appt["id"].as_str().unwrap().to_string();

        // Bob's list is empty and the direct fetch is denied.
        let (status, body) =
            send(&router, request("GET", "/api/appointments", Some(&bob), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["appointments"].as_array().unwrap().len(), 0);

        let (status, _) = send(
            &router,
            request(
                "GET",
                &format!("/api/appointments/{appt_id}"),
                Some(&bob),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unverified_staff_cannot_prescribe() {
        let router = api_router(test_ctx());
        let (status, _) = send(
            &router,
            request(
                "POST",
                "/api/auth/register/staff",
                None,
                Some(json!({
                    "username": "drnew",
                    "email": "drnew@example.org",
                    "password": "correct-horse",
                    "password_confirm": "correct-horse",
                    "first_name": "New",
                    "last_name": "Doctor",
                    "role": "doctor",
                    "work_id": "W200",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, login) = send(
            &router,
            request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "username": "drnew", "password": "correct-horse" })),
            ),
        )
        .await;
        let token = login["token"].as_str().unwrap().to_string();

        let (status, body) = send(
            &router,
            request(
                "POST",
                "/api/prescriptions",
                Some(&token),
                Some(json!({
                    "patient_id": uuid::Uuid::new_v4(),
                    "medication_name": "Amoxicillin",
                    "dosage": "500mg",
                    "frequency": "tid",
                    "quantity": 21,
                    "start_date": "2025-01-10",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }
}
