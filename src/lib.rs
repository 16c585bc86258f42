//! Canteen ordering backend.
//!
//! Serves a React client over JSON/HTTP: accounts and bearer-token auth,
//! canteen and menu CRUD, order placement, feedback, and per-canteen UPI/QR
//! payment configuration, all on top of MongoDB.
//!
//! Two in-process helpers shape the hot paths:
//! - [`queue::WorkQueue`] pushes order inserts through a FIFO queue with a
//!   fixed concurrency limit, so a lunch rush cannot stampede the database.
//! - [`cache::TtlCache`] keeps canteen and menu listings in memory with
//!   per-call-site TTLs; mutations invalidate by exact key or key prefix.
//!
//! # Routes
//!
//! | Method(s)        | Path                          | Access |
//! |------------------|-------------------------------|--------|
//! | POST             | `/auth/register`              | public |
//! | POST             | `/auth/login`                 | public |
//! | GET              | `/auth/me`                    | user   |
//! | GET, POST        | `/canteens`                   | public / admin |
//! | GET, PUT, DELETE | `/canteens/{id}`              | public / admin |
//! | GET, POST        | `/canteens/{id}/menu`         | public / admin |
//! | PUT, DELETE      | `/menu/{id}`                  | admin  |
//! | GET, POST        | `/canteens/{id}/feedback`     | public / user |
//! | GET, PUT         | `/canteens/{id}/payment`      | user / admin |
//! | POST, GET        | `/orders`                     | user   |
//! | GET              | `/orders/{id}`                | owner or admin |
//! | PATCH            | `/orders/{id}/status`         | admin  |

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, patch, post, put},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod queue;
pub mod routes;
pub mod state;
pub mod utils;

use routes::{
    create_canteen_handler, create_feedback_handler, create_menu_item_handler,
    create_order_handler, delete_canteen_handler, delete_menu_item_handler, get_canteen_handler,
    get_order_handler, get_payment_handler, list_canteens_handler, list_feedback_handler,
    list_menu_handler, list_my_orders_handler, login_handler, me_handler, register_handler,
    set_payment_handler, update_canteen_handler, update_menu_item_handler,
    update_order_status_handler,
};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_origin(Any);

    let app = Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/me", get(me_handler))
        .route(
            "/canteens",
            get(list_canteens_handler).post(create_canteen_handler),
        )
        .route(
            "/canteens/{id}",
            get(get_canteen_handler)
                .put(update_canteen_handler)
                .delete(delete_canteen_handler),
        )
        .route(
            "/canteens/{id}/menu",
            get(list_menu_handler).post(create_menu_item_handler),
        )
        .route(
            "/menu/{id}",
            put(update_menu_item_handler).delete(delete_menu_item_handler),
        )
        .route(
            "/canteens/{id}/feedback",
            get(list_feedback_handler).post(create_feedback_handler),
        )
        .route(
            "/canteens/{id}/payment",
            get(get_payment_handler).put(set_payment_handler),
        )
        .route(
            "/orders",
            post(create_order_handler).get(list_my_orders_handler),
        )
        .route("/orders/{id}", get(get_order_handler))
        .route("/orders/{id}/status", patch(update_order_status_handler))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
