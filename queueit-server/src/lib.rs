use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
    thread,
};

use axum::{routing::get, Router};
use queueit_collab::{CatalogProvider, Coordinator};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod auth;
mod context;
mod docs;
mod errors;
mod schemas;
mod serialized;
mod sessions;
mod songs;
mod sse;
mod tracks;

pub mod logging;

use context::ServerContext;
use sse::ServerSentEvents;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

/// Starts the queueit server
pub async fn run_server(coordinator: Arc<Coordinator>, catalog: Arc<dyn CatalogProvider>) {
    let port = env::var("QUEUEIT_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let context = ServerContext {
        coordinator,
        catalog,
        sse: ServerSentEvents::new(),
    };

    forward_events(&context);

    let version_one_router = Router::new()
        .nest("/sessions", sessions::router())
        .nest("/songs", songs::router())
        .nest("/tracks", tracks::router())
        .nest("/events", sse::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    log::info!("Listening on port {}", port);

    axum::serve(listener, root_router.into_make_service())
        .await
        .expect("serves requests");
}

/// Relays coordinator change notifications to connected SSE clients. The
/// receiver blocks, so this runs on a plain thread rather than the runtime.
fn forward_events(context: &ServerContext) {
    let receiver = context.coordinator.events();
    let sse = context.sse.clone();

    thread::spawn(move || {
        while let Ok(event) = receiver.recv() {
            sse.broadcast(event.into());
        }
    });
}
