mod conf;
pub mod dispatch;
mod error;
pub mod handler;
pub mod protocol;
pub mod route;
pub mod server;

use std::{
    future::{Future, IntoFuture},
    io,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

pub use conf::Config;
pub use error::{HandlerError, RouteError};
use kvr_backend::{BackendDirectory, DockerDiscovery, S3Connector};
use route::{RouteSettings, ShardRouter};
use server::ServerState;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::dispatch::HandlerTable;

pub fn init_tracing(json_format: bool) {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::{
        EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry().with(filter);
    if json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

pub async fn start_server(
    config: Config,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let discovery = DockerDiscovery::connect(config.docker_socket.as_deref())?;
    let router = ShardRouter::new(
        BackendDirectory::new(Arc::new(discovery)),
        Arc::new(S3Connector::new(config.node_region.clone())),
        RouteSettings::from(&config),
    );
    let handlers = handler::build_table(Arc::new(router));
    info!("registered request types {:?}", handlers.request_types());

    let listener = TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    info!(
        "start server on port {} path {}",
        config.http_port, config.ws_path
    );
    serve(
        listener,
        &config.ws_path,
        handlers,
        shutdown_signal(),
        config.shutdown_grace(),
    )
    .await?;
    Ok(())
}

/// Serves `handlers` on `listener` until `signal` resolves, then drains open
/// connections for at most `grace`.
pub async fn serve(
    listener: TcpListener,
    ws_path: &str,
    handlers: Arc<HandlerTable>,
    signal: impl Future<Output = ()> + Send,
    grace: Duration,
) -> io::Result<()> {
    let state = ServerState::new(handlers);
    let app = server::build_router(ws_path, state.clone())
        .into_make_service_with_connect_info::<SocketAddr>();
    let stop = state.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            stop.shutdown_requested().await;
        })
        .into_future();
    let mut server = tokio::spawn(server);

    tokio::select! {
        joined = &mut server => {
            return joined.map_err(io::Error::other)?;
        }
        _ = signal => {}
    }

    info!("shutting down, grace period {:?}", grace);
    state.begin_shutdown();
    let drain = async {
        let served = server.await;
        state.connections_closed().await;
        served
    };
    match tokio::time::timeout(grace, drain).await {
        Ok(served) => served.map_err(io::Error::other)?,
        Err(_) => {
            warn!("grace period elapsed with connections still open");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("unable to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("unable to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
