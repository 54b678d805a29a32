use std::net::SocketAddr;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use super::v0;
use crate::error::{Error, Result};
use crate::service::AlarmHandle;
use crate::tracing::prelude::*;

/// Largest photo upload accepted.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// State shared by all handlers.
#[derive(Clone)]
pub struct SharedState {
    pub alarm: AlarmHandle,
}

#[derive(OpenApi)]
#[openapi(info(
    title = "Brushing Alarm API",
    description = "Schedule the alarm and dismiss it with a toothbrush photo."
))]
struct ApiDoc;

/// Build the full router: v0 API, OpenAPI document, and Swagger UI.
pub fn router(state: SharedState) -> Router {
    let (api_router, openapi) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api/v0", v0::routes())
        .split_for_parts();

    api_router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `addr` until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    state: SharedState,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })?;
    info!(%addr, "API server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    trace!("API server stopped.");
    Ok(())
}
