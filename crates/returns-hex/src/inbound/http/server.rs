use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    serve, Form, Json, Router,
};
use serde::Deserialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::application::analytics::AnalyticsReport;
use crate::application::return_service::{
    NewReturn, ReturnOutcome, ReturnPreview, ReturnReason, ReturnService,
};
use crate::errors::AppError;
use returns_types::domain::commerce::OrderSummary;
use returns_types::domain::product::Product;
use returns_types::domain::return_request::ReturnRequest;
use returns_types::ports::commerce_platform::CommercePlatform;
use returns_types::ports::returns_repository::ReturnsRepository;

type Service<R, C> = Arc<ReturnService<R, C>>;

#[derive(Clone)]
pub struct HttpServerConfig {
    pub port: String,
}

#[derive(Clone)]
pub struct HttpServer<R, C>
where
    R: ReturnsRepository,
    C: CommercePlatform,
{
    pub service: Service<R, C>,
    pub config: HttpServerConfig,
}

/// The staff form posts camelCase fields.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnForm {
    pub customer_id: String,
    pub order_id: String,
    pub reason: String,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub first: Option<i64>,
}

#[derive(Deserialize)]
pub struct PreviewQuery {
    /// Comma-separated line item ids.
    pub items: Option<String>,
}

impl<R, C> HttpServer<R, C>
where
    R: ReturnsRepository,
    C: CommercePlatform,
{
    pub async fn new(service: ReturnService<R, C>, config: HttpServerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            service: Arc::new(service),
            config,
        })
    }

    pub fn router(&self) -> Router {
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http_request",
                    %request_id,
                    method = %request.method(),
                    uri
                )
            })
            .on_request(
                |request: &axum::extract::Request<_>, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        method = %request.method(),
                        uri = %request.uri(),
                        "request"
                    );
                },
            )
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        status = %response.status(),
                        latency_ms = %latency.as_millis(),
                        "response"
                    );
                },
            );

        Router::new()
            .route("/health", get(health))
            .route("/returns", post(submit_form::<R, C>).get(list_returns::<R, C>))
            .route("/api/returns", post(submit_json::<R, C>))
            .route("/returns/reasons", get(return_reasons::<R, C>))
            .route("/returns/{id}", get(get_return::<R, C>))
            .route("/orders", get(list_orders::<R, C>))
            .route("/orders/{order_id}/return", get(preview_return::<R, C>))
            .route("/products", get(list_products::<R, C>))
            .route("/products/sync", post(sync_products::<R, C>))
            .route("/analytics", get(analytics::<R, C>))
            .layer(trace_layer)
            .with_state(self.service.clone())
    }

    /// Serves until Ctrl-C or SIGTERM, then closes the repository.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.port).parse()?;
        tracing::info!("starting server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("server stopped, closing repository");
        self.service.repository().close().await;
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn submit_form<R, C>(
    State(service): State<Service<R, C>>,
    form: Result<Form<ReturnForm>, FormRejection>,
) -> Result<Redirect, AppError>
where
    R: ReturnsRepository,
    C: CommercePlatform,
{
    let Form(form) = form.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let outcome = service
        .submit_return(NewReturn {
            customer_id: form.customer_id,
            order_id: form.order_id,
            reason: form.reason,
            receipts: Vec::new(),
        })
        .await?;
    Ok(Redirect::to(&format!(
        "/returns/{}",
        outcome.return_request.id
    )))
}

async fn submit_json<R, C>(
    State(service): State<Service<R, C>>,
    payload: Result<Json<NewReturn>, JsonRejection>,
) -> Result<(StatusCode, Json<ReturnOutcome>), AppError>
where
    R: ReturnsRepository,
    C: CommercePlatform,
{
    let Json(payload) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let outcome = service.submit_return(payload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn list_returns<R, C>(
    State(service): State<Service<R, C>>,
) -> Result<Json<Vec<ReturnRequest>>, AppError>
where
    R: ReturnsRepository,
    C: CommercePlatform,
{
    Ok(Json(service.list_returns().await?))
}

async fn return_reasons<R, C>(State(service): State<Service<R, C>>) -> Json<Vec<ReturnReason>>
where
    R: ReturnsRepository,
    C: CommercePlatform,
{
    Json(service.return_reasons())
}

async fn get_return<R, C>(
    State(service): State<Service<R, C>>,
    Path(id): Path<String>,
) -> Result<Json<ReturnRequest>, AppError>
where
    R: ReturnsRepository,
    C: CommercePlatform,
{
    let uuid = Uuid::parse_str(&id).map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(Json(service.get_return(uuid).await?))
}

async fn list_orders<R, C>(
    State(service): State<Service<R, C>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<OrderSummary>>, AppError>
where
    R: ReturnsRepository,
    C: CommercePlatform,
{
    Ok(Json(service.list_orders(page.first).await?))
}

async fn preview_return<R, C>(
    State(service): State<Service<R, C>>,
    Path(order_id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<ReturnPreview>, AppError>
where
    R: ReturnsRepository,
    C: CommercePlatform,
{
    let items: Vec<String> = query
        .items
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::to_string)
        .collect();
    Ok(Json(service.preview_return(&order_id, &items).await?))
}

async fn list_products<R, C>(
    State(service): State<Service<R, C>>,
) -> Result<Json<Vec<Product>>, AppError>
where
    R: ReturnsRepository,
    C: CommercePlatform,
{
    Ok(Json(service.list_products().await?))
}

async fn sync_products<R, C>(
    State(service): State<Service<R, C>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<serde_json::Value>, AppError>
where
    R: ReturnsRepository,
    C: CommercePlatform,
{
    let synced = service.sync_products(page.first).await?;
    Ok(Json(serde_json::json!({ "synced": synced })))
}

async fn analytics<R, C>(
    State(service): State<Service<R, C>>,
) -> Result<Json<AnalyticsReport>, AppError>
where
    R: ReturnsRepository,
    C: CommercePlatform,
{
    Ok(Json(service.analytics().await?))
}
