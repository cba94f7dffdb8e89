use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tonic::transport::Server;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conn_storage::{migrate, open_pool};

use conn_server::{
    load, reconcile_tombstones, shutdown_signal, version, App, AppConfig,
    AppRouter, AppState, PrivateService, PublicService,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = env::args().collect::<Vec<_>>();
    let config =
        if args.len() == 3 && (args[1] == "-c" || args[1] == "--config") {
            load(&args[2])?
        } else {
            AppConfig::parse()
        };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    debug!("{:#?}", &config);
    info!("{}", version());
    run_server(config).await
}

async fn run_server(config: AppConfig) -> Result<()> {
    let pool = match &config.database_url {
        Some(url) => {
            info!("initializing MySQL connection...");
            let pool = open_pool(url, config.max_size, config.min_idle)
                .await
                .context("could not initialize the database connection pool")?;
            if config.run_migrations {
                migrate(&pool).await?;
                info!("migrations successfully run");
            }
            Some(pool)
        }
        None => None,
    };

    let state = AppState(Arc::new(App::new(pool, config.clone())?));

    reconcile(state.clone());

    let public = AppRouter::build(state.clone())
        .context("could not initialize application routes")?;
    let private = AppRouter::build_private(state.clone())
        .context("could not initialize private routes")?;

    tokio::try_join!(
        serve_http("public api", config.port, public),
        serve_http("private api", config.private_port, private),
        serve_grpc_public(config.grpc_port, state.clone()),
        serve_grpc_private(config.private_grpc_port, state),
    )?;
    Ok(())
}

async fn serve_http(name: &str, port: u16, router: Router) -> Result<()> {
    let host = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&host)
        .await
        .with_context(|| format!("could not bind {} to {}", name, host))?;

    info!("{} server, listening on {}", name, host);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .with_context(|| format!("error while running {} server", name))
}

fn grpc_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

async fn serve_grpc_public(port: u16, state: AppState) -> Result<()> {
    let addr = grpc_addr(port);
    info!("public grpc server, listening on {}", addr);
    Server::builder()
        .layer(TraceLayer::new_for_grpc())
        .add_service(PublicService::new(state))
        .serve_with_shutdown(addr, shutdown_signal())
        .await
        .context("error while running public grpc server")
}

async fn serve_grpc_private(port: u16, state: AppState) -> Result<()> {
    let addr = grpc_addr(port);
    info!("private grpc server, listening on {}", addr);
    Server::builder()
        .layer(TraceLayer::new_for_grpc())
        .add_service(PrivateService::new(state))
        .serve_with_shutdown(addr, shutdown_signal())
        .await
        .context("error while running private grpc server")
}

/// Periodically tombstones resources of deprecated definitions.
fn reconcile(state: AppState) {
    let period = Duration::from_secs(state.config.tombstone_interval.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match reconcile_tombstones(&state).await {
                        Ok(0) => {}
                        Ok(changed) => info!(changed, "tombstones reconciled"),
                        Err(err) => error!("{}", err),
                    }
                },
                _ = shutdown_signal() => {
                    break;
                }
            }
        }
        info!("finish tombstone reconciliation...");
    });
}
