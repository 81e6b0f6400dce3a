//! kage: a Kubernetes-resident canary control plane.
//!
//! One process runs three concerns side by side: the xDS gRPC server the
//! Envoy proxies stream from, the watchers that turn cluster events into
//! Envoy state, and the admin HTTP API that declares and dismantles
//! canaries.

mod api;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Service};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kage_cache::SnapshotCache;
use kage_kube::informer::{spawn_watcher, WatcherSpec};
use kage_kube::{CanaryService, Reconciler, SnapshotSync};
use kage_xds::server::{ShutdownController, XdsServer};
use kage_xds::store::ConfigMapStore;
use kage_xds::SnapshotClient;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    let kube_config = match &config.kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("reading kubeconfig {}", path.display()))?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context("building client config from kubeconfig")?
        }
        None => kube::Config::infer()
            .await
            .context("inferring in-cluster client config")?,
    };
    let namespace = config
        .namespace
        .clone()
        .unwrap_or_else(|| kube_config.default_namespace.clone());
    let client = Client::try_from(kube_config).context("building kubernetes client")?;

    let cache = Arc::new(SnapshotCache::new());
    let store = Arc::new(ConfigMapStore::new(client.clone(), &namespace));
    let snapshots = Arc::new(SnapshotClient::new(cache.clone(), store));

    let loaded = snapshots
        .load()
        .await
        .context("loading persisted snapshots")?;
    info!(loaded, %namespace, "restored persisted envoy state");

    let shutdown = ShutdownController::new();

    let xds = XdsServer::builder(cache.clone())
        .bind(config.bind)
        .port(config.xds_port)
        .build();
    info!(addr = %xds.addr(), "starting xds server");
    let xds_task = xds
        .spawn(shutdown.subscribe())
        .await
        .context("starting xds server")?;

    let canaries = CanaryService::new(client.clone(), snapshots.clone(), config.canary_config());
    let reconciler = Reconciler::new(client.clone(), canaries.clone());

    let pods: Api<Pod> = Api::namespaced(client.clone(), &namespace);
    spawn_watcher(
        pods,
        WatcherSpec::new().handler(Arc::new(reconciler.pods())),
        shutdown.subscribe(),
    );

    let services: Api<Service> = Api::namespaced(client.clone(), &namespace);
    spawn_watcher(
        services,
        WatcherSpec::new().handler(Arc::new(reconciler.services())),
        shutdown.subscribe(),
    );

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &namespace);
    spawn_watcher(
        deployments,
        WatcherSpec::new().handler(Arc::new(reconciler.deployments())),
        shutdown.subscribe(),
    );

    let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), &namespace);
    let sync = Arc::new(SnapshotSync::new(snapshots.clone()));
    spawn_watcher(config_maps, sync.spec(), shutdown.subscribe());

    let admin_addr = SocketAddr::new(config.bind, config.server_port);
    let listener = tokio::net::TcpListener::bind(admin_addr)
        .await
        .with_context(|| format!("binding admin api on {admin_addr}"))?;
    info!(addr = %admin_addr, "admin api listening");

    let app = api::router(api::AppState {
        canaries,
        snapshots,
    });
    let admin_shutdown = shutdown.subscribe();
    let admin_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(admin_shutdown.wait())
            .await
    });

    tokio::signal::ctrl_c()
        .await
        .context("listening for shutdown signal")?;
    info!("shutdown signal received");
    shutdown.trigger();

    if let Err(err) = admin_task.await? {
        error!(error = %err, "admin api exited with error");
    }
    match xds_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(error = %err, "xds server exited with error"),
        Err(err) => error!(error = %err, "xds server task panicked"),
    }
    info!("shutdown complete");
    Ok(())
}
