//! HTTP routes for task control
//!
//! | Method | Path | Effect |
//! |---|---|---|
//! | POST | `/task/start` | create and start a task |
//! | POST | `/task/cancel/{id}` | cancel the matching task |
//! | GET | `/task/info/{id}` | config and statistics |
//! | GET | `/task/health/{id}` | liveness |

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use task_manager::{ComponentFactory, TaskError, TaskManager};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::error::ControlPlaneError;
use crate::response::{panic_response, ApiResponse};

/// Build the control plane router around a shared manager
pub fn router<F>(manager: Arc<TaskManager<F>>) -> Router
where
    F: ComponentFactory + Send + Sync + 'static,
{
    Router::new()
        .route("/task/start", post(start_task::<F>))
        .route("/task/cancel/{id}", post(cancel_task::<F>))
        .route("/task/info/{id}", get(task_info::<F>))
        .route("/task/health/{id}", get(task_health::<F>))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(manager)
}

/// Bind `addr` and serve until `shutdown` resolves
pub async fn serve<S>(router: Router, addr: &str, shutdown: S) -> Result<(), ControlPlaneError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ControlPlaneError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    serve_on(listener, router, shutdown).await
}

/// Serve on an already bound listener
pub async fn serve_on<S>(
    listener: TcpListener,
    router: Router,
    shutdown: S,
) -> Result<(), ControlPlaneError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "control plane listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("control plane stopped");
    Ok(())
}

#[instrument(name = "api_task_start", skip_all)]
async fn start_task<F>(State(manager): State<Arc<TaskManager<F>>>, body: Bytes) -> ApiResponse
where
    F: ComponentFactory + Send + Sync + 'static,
{
    let config = match config_loader::parse_task_json(&body) {
        Ok(config) => config,
        Err(e) => return ApiResponse::error(&TaskError::InvalidConfig(e)),
    };
    let task_id = config.task_id.clone();

    manager
        .start(config)
        .await
        .map(|()| Value::String(format!("task {task_id} started")))
        .into()
}

#[instrument(name = "api_task_cancel", skip(manager))]
async fn cancel_task<F>(
    State(manager): State<Arc<TaskManager<F>>>,
    Path(id): Path<String>,
) -> ApiResponse
where
    F: ComponentFactory + Send + Sync + 'static,
{
    manager
        .cancel(&id)
        .await
        .map(|()| Value::String(format!("task {id} cancelled")))
        .into()
}

#[instrument(name = "api_task_info", skip(manager))]
async fn task_info<F>(
    State(manager): State<Arc<TaskManager<F>>>,
    Path(id): Path<String>,
) -> ApiResponse
where
    F: ComponentFactory + Send + Sync + 'static,
{
    manager
        .info(&id)
        .await
        .map(|snapshot| serde_json::to_value(snapshot).unwrap_or(Value::Null))
        .into()
}

async fn task_health<F>(
    State(manager): State<Arc<TaskManager<F>>>,
    Path(id): Path<String>,
) -> ApiResponse
where
    F: ComponentFactory + Send + Sync + 'static,
{
    manager
        .health(&id)
        .await
        .map(|()| Value::String("ok".into()))
        .into()
}
