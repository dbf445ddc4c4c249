//! API Router with Swagger UI

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::application::{IdentityService, LockerService, ReservationService};
use crate::interfaces::http::common::{ApiResponse, EmptyData};
use crate::interfaces::http::middleware::{auth_middleware, require_admin, AuthState};
use crate::interfaces::http::modules::health::{self, HealthState};
use crate::interfaces::http::modules::metrics::{
    http_metrics_middleware, prometheus_metrics, MetricsState,
};
use crate::interfaces::http::modules::{auth, lockers, reservations};

/// Everything the HTTP surface needs from the application layer.
#[derive(Clone)]
pub struct ApiContext {
    pub identity: Arc<IdentityService>,
    pub lockers: Arc<LockerService>,
    pub reservations: Arc<ReservationService>,
    pub health: HealthState,
    /// `None` disables `GET /metrics`
    pub metrics: Option<MetricsState>,
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token"))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::logout,
        auth::forgot_password,
        auth::reset_password,
        auth::me,
        auth::list_users,
        lockers::list_lockers,
        lockers::get_locker,
        lockers::create_locker,
        lockers::update_locker,
        lockers::delete_locker,
        reservations::create_reservation,
        reservations::list_reservations,
        reservations::list_user_reservations,
        reservations::get_reservation,
        reservations::get_locker_reservation,
        reservations::cancel_reservation,
    ),
    components(
        schemas(
            ApiResponse<EmptyData>,
            EmptyData,
            health::HealthResponse,
            health::ComponentHealth,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::LoginResponse,
            auth::UserInfo,
            auth::ForgotPasswordRequest,
            auth::ResetPasswordRequest,
            auth::MessageResponse,
            lockers::LockerDto,
            lockers::CreateLockerRequest,
            lockers::UpdateLockerRequest,
            reservations::CreateReservationRequest,
            reservations::ReservationDto,
            reservations::LockerSummaryDto,
            reservations::UserSummaryDto,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Authentication", description = "Accounts, JWT login, logout and password reset"),
        (name = "Lockers", description = "Locker inventory; browsing is public, changes are admin-only"),
        (name = "Reservations", description = "Reserve, cancel and look up locker reservations"),
    ),
    info(
        title = "Locker Rental API",
        version = "1.0.0",
        description = "REST API for renting storage lockers by the hour",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

pub fn create_api_router(ctx: ApiContext) -> Router {
    let auth_state = AuthState {
        identity: ctx.identity.clone(),
    };

    // ── Auth ───────────────────────────────────────────────────

    let auth_handler_state = auth::AuthHandlerState {
        identity: ctx.identity.clone(),
    };

    let auth_public = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    let auth_protected = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            auth_middleware,
        ));

    let auth_admin = Router::new()
        .route("/users", get(auth::list_users))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            auth_middleware,
        ));

    let auth_routes = auth_public
        .merge(auth_protected)
        .merge(auth_admin)
        .with_state(auth_handler_state);

    // ── Lockers ────────────────────────────────────────────────

    let locker_state = lockers::LockerAppState {
        lockers: ctx.lockers.clone(),
    };

    let locker_public = Router::new()
        .route("/", get(lockers::list_lockers))
        .route("/{id}", get(lockers::get_locker));

    let locker_admin = Router::new()
        .route("/", post(lockers::create_locker))
        .route(
            "/{id}",
            axum::routing::put(lockers::update_locker).delete(lockers::delete_locker),
        )
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            auth_middleware,
        ));

    let locker_routes = locker_public.merge(locker_admin).with_state(locker_state);

    // ── Reservations ───────────────────────────────────────────

    let reservation_routes = Router::new()
        .route(
            "/",
            get(reservations::list_reservations).post(reservations::create_reservation),
        )
        .route("/user/{user_id}", get(reservations::list_user_reservations))
        .route(
            "/locker/{locker_id}",
            get(reservations::get_locker_reservation),
        )
        .route(
            "/{id}",
            get(reservations::get_reservation).delete(reservations::cancel_reservation),
        )
        .route_layer(middleware::from_fn_with_state(auth_state, auth_middleware))
        .with_state(reservations::ReservationAppState {
            reservations: ctx.reservations.clone(),
        });

    // ── Assembly ───────────────────────────────────────────────

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    let mut router = Router::new()
        .merge(swagger_routes)
        .route("/health", get(health::health_check).with_state(ctx.health))
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1/lockers", locker_routes)
        .nest("/api/v1/reservations", reservation_routes);

    if let Some(metrics_state) = ctx.metrics {
        router = router.route("/metrics", get(prometheus_metrics).with_state(metrics_state));
    }

    router
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::application::identity::service::tests::fast_settings;
    use crate::application::{ExpiryReconciler, ReconcilerSettings, ReservationSettings};
    use crate::domain::{Locker, LockerSize, RepositoryProvider};
    use crate::infrastructure::notifier::testing::RecordingNotifier;
    use crate::infrastructure::InMemoryRepositoryProvider;
    use crate::shared::time::{SharedClock, SystemClock};

    struct TestApp {
        router: Router,
        repos: Arc<InMemoryRepositoryProvider>,
        clock: SharedClock,
        notifier: Arc<RecordingNotifier>,
        admin_token: String,
    }

    async fn app() -> TestApp {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock: SharedClock = Arc::new(SystemClock);

        let identity = Arc::new(IdentityService::new(
            repos.clone(),
            notifier.clone(),
            clock.clone(),
            fast_settings(),
        ));
        identity
            .ensure_default_admin("admin", "admin@example.com", "admin-password")
            .await
            .unwrap();
        let admin_token = identity
            .login("admin", "admin-password")
            .await
            .unwrap()
            .token;

        let ctx = ApiContext {
            identity,
            lockers: Arc::new(LockerService::new(repos.clone(), clock.clone())),
            reservations: Arc::new(ReservationService::new(
                repos.clone(),
                notifier.clone(),
                clock.clone(),
                ReservationSettings::default(),
            )),
            health: HealthState {
                db: None,
                started_at: Arc::new(Instant::now()),
                reconciler_enabled: false,
            },
            metrics: None,
        };

        TestApp {
            router: create_api_router(ctx),
            repos,
            clock,
            notifier,
            admin_token,
        }
    }

    impl TestApp {
        async fn call(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let body = match body {
                Some(v) => {
                    builder = builder.header(header::CONTENT_TYPE, "application/json");
                    Body::from(serde_json::to_vec(&v).unwrap())
                }
                None => Body::empty(),
            };
            let resp = self
                .router
                .clone()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap();
            let status = resp.status();
            let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, value)
        }

        /// Register and log in a customer, returning (user_id, token)
        async fn customer(&self, name: &str) -> (String, String) {
            let (status, body) = self
                .call(
                    Method::POST,
                    "/api/v1/auth/register",
                    None,
                    Some(json!({
                        "username": name,
                        "email": format!("{}@example.com", name),
                        "password": "correct-horse",
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            let user_id = body["data"]["id"].as_str().unwrap().to_string();

            let (status, body) = self
                .call(
                    Method::POST,
                    "/api/v1/auth/login",
                    None,
                    Some(json!({ "username": name, "password": "correct-horse" })),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            (user_id, body["data"]["token"].as_str().unwrap().to_string())
        }

        async fn locker(&self, number: i32, hourly_price: i64) -> Locker {
            let locker = Locker::new(number, LockerSize::Small, hourly_price, self.clock.now());
            self.repos.lockers().save(locker.clone()).await.unwrap();
            locker
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = app().await;
        let (status, body) = app.call(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn reserve_and_cancel_over_http() {
        let app = app().await;
        let (_, token) = app.customer("alice").await;
        let locker = app.locker(1, 10).await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/v1/reservations",
                Some(&token),
                Some(json!({ "locker_id": locker.id, "duration_hours": 2 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["total_price"], 20);
        assert_eq!(body["data"]["status"], "Active");
        let reservation_id = body["data"]["id"].as_str().unwrap().to_string();

        let (_, body) = app
            .call(Method::GET, &format!("/api/v1/lockers/{}", locker.id), None, None)
            .await;
        assert_eq!(body["data"]["status"], "Reserved");

        let (status, body) = app
            .call(
                Method::GET,
                &format!("/api/v1/reservations/locker/{}", locker.id),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["locker"]["number"], 1);
        assert_eq!(body["data"]["user"]["username"], "alice");

        let (status, _) = app
            .call(
                Method::DELETE,
                &format!("/api/v1/reservations/{}", reservation_id),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = app
            .call(Method::GET, "/api/v1/lockers?status=available", None, None)
            .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let subjects: Vec<String> = app.notifier.sent().into_iter().map(|s| s.subject).collect();
        assert!(subjects.contains(&"Locker reservation confirmed".to_string()));
        assert!(subjects.contains(&"Locker reservation cancelled".to_string()));
    }

    #[tokio::test]
    async fn second_reservation_of_a_locker_conflicts() {
        let app = app().await;
        let (_, alice) = app.customer("alice").await;
        let (_, bob) = app.customer("bob").await;
        let locker = app.locker(7, 5).await;
        let body = json!({ "locker_id": locker.id, "duration_hours": 1 });

        let (status, _) = app
            .call(Method::POST, "/api/v1/reservations", Some(&alice), Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, resp) = app
            .call(Method::POST, "/api/v1/reservations", Some(&bob), Some(body))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(resp["success"], false);
        assert_eq!(resp["error"], "Locker 7 is no longer available");
    }

    #[tokio::test]
    async fn invalid_duration_is_a_bad_request() {
        let app = app().await;
        let (_, token) = app.customer("alice").await;
        let locker = app.locker(1, 10).await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/v1/reservations",
                Some(&token),
                Some(json!({ "locker_id": locker.id, "duration_hours": 0 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/v1/reservations",
                Some(&token),
                Some(json!({ "locker_id": locker.id, "duration_hours": 721 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reservations_require_a_token() {
        let app = app().await;
        let (status, body) = app.call(Method::GET, "/api/v1/reservations", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Missing authentication token");

        let (status, _) = app
            .call(Method::GET, "/api/v1/reservations", Some("not-a-jwt"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn customers_only_see_their_own_reservations() {
        let app = app().await;
        let (alice_id, alice) = app.customer("alice").await;
        let (_, bob) = app.customer("bob").await;
        let locker = app.locker(1, 10).await;

        let (_, body) = app
            .call(
                Method::POST,
                "/api/v1/reservations",
                Some(&alice),
                Some(json!({ "locker_id": locker.id, "duration_hours": 1 })),
            )
            .await;
        let reservation_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = app
            .call(
                Method::GET,
                &format!("/api/v1/reservations/{}", reservation_id),
                Some(&bob),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .call(
                Method::DELETE,
                &format!("/api/v1/reservations/{}", reservation_id),
                Some(&bob),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .call(
                Method::GET,
                &format!("/api/v1/reservations/user/{}", alice_id),
                Some(&bob),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = app
            .call(Method::GET, "/api/v1/reservations", Some(&bob), None)
            .await;
        assert!(body["data"].as_array().unwrap().is_empty());

        let (_, body) = app
            .call(Method::GET, "/api/v1/reservations", Some(&app.admin_token), None)
            .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn locker_management_is_admin_only() {
        let app = app().await;
        let (_, customer) = app.customer("alice").await;
        let body = json!({ "number": 3, "size": "large", "hourly_price": 15 });

        let (status, _) = app
            .call(Method::POST, "/api/v1/lockers", Some(&customer), Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, created) = app
            .call(Method::POST, "/api/v1/lockers", Some(&app.admin_token), Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        assert_eq!(created["data"]["size"], "large");
        assert_eq!(created["data"]["status"], "Available");
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = app
            .call(Method::POST, "/api/v1/lockers", Some(&app.admin_token), Some(body))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, updated) = app
            .call(
                Method::PUT,
                &format!("/api/v1/lockers/{}", id),
                Some(&app.admin_token),
                Some(json!({ "hourly_price": 20 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["data"]["hourly_price"], 20);

        let (status, _) = app
            .call(Method::DELETE, &format!("/api/v1/lockers/{}", id), Some(&app.admin_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .call(Method::GET, &format!("/api/v1/lockers/{}", id), None, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_status_filter_is_rejected() {
        let app = app().await;
        let (status, body) = app
            .call(Method::GET, "/api/v1/lockers?status=broken", None, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unknown locker status 'broken'");
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let app = app().await;
        let (_, token) = app.customer("alice").await;

        let (status, body) = app.call(Method::GET, "/api/v1/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["role"], "customer");

        let (status, _) = app
            .call(Method::POST, "/api/v1/auth/logout", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app.call(Method::GET, "/api/v1/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn user_listing_is_admin_only() {
        let app = app().await;
        let (_, customer) = app.customer("alice").await;

        let (status, _) = app
            .call(Method::GET, "/api/v1/auth/users", Some(&customer), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .call(Method::GET, "/api/v1/auth/users", Some(&app.admin_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn password_reset_round_trip() {
        let app = app().await;
        app.customer("alice").await;

        let (status, _) = app
            .call(
                Method::POST,
                "/api/v1/auth/forgot-password",
                None,
                Some(json!({ "email": "alice@example.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let sent = app.notifier.sent();
        let link = &sent.last().unwrap().body;
        let token = link.split("token=").nth(1).unwrap().trim().to_string();

        let (status, _) = app
            .call(
                Method::POST,
                "/api/v1/auth/reset-password",
                None,
                Some(json!({ "token": token, "new_password": "brand-new-pass" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": "alice@example.com", "password": "brand-new-pass" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn store_outage_maps_to_service_unavailable() {
        let app = app().await;
        app.repos.set_offline(true);
        let (status, body) = app.call(Method::GET, "/api/v1/lockers", None, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn expired_reservation_is_visible_as_expired() {
        let app = app().await;
        let (user_id, token) = app.customer("alice").await;
        let locker = app.locker(2, 3).await;

        let (_, body) = app
            .call(
                Method::POST,
                "/api/v1/reservations",
                Some(&token),
                Some(json!({ "locker_id": locker.id, "duration_hours": 1 })),
            )
            .await;
        let reservation_id = body["data"]["id"].as_str().unwrap().to_string();

        // Sweep as if two hours had passed
        let later: SharedClock = Arc::new(crate::shared::time::ManualClock::new(
            app.clock.now() + chrono::Duration::hours(2),
        ));
        let reconciler = ExpiryReconciler::new(
            app.repos.clone(),
            app.notifier.clone(),
            later,
            ReconcilerSettings::default(),
        );
        reconciler.run_cycle().await;

        let (_, body) = app
            .call(
                Method::GET,
                &format!("/api/v1/reservations/user/{}", user_id),
                Some(&token),
                None,
            )
            .await;
        let list = body["data"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"], reservation_id.as_str());
        assert_eq!(list[0]["status"], "Expired");
    }
}
