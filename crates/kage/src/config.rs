//! Command line and environment configuration.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

use kage_kube::CanaryConfig;

/// Control plane configuration.
///
/// Every flag can also come from the environment, which is how the
/// in-cluster Deployment sets them.
#[derive(Clone, Debug, Parser)]
#[command(name = "kage", version, about = "Canary traffic-splitting control plane")]
pub struct Config {
    /// Address both servers bind.
    #[arg(long, env = "KAGE_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Admin HTTP API port.
    #[arg(long, env = "KAGE_SERVER_PORT", default_value_t = 8080)]
    pub server_port: u16,

    /// xDS gRPC port.
    #[arg(long, env = "KAGE_XDS_PORT", default_value_t = 8081)]
    pub xds_port: u16,

    /// Envoy admin listener port inside proxy pods.
    #[arg(long, env = "KAGE_ENVOY_ADMIN_PORT", default_value_t = 8082)]
    pub envoy_admin_port: u16,

    /// Address proxies resolve to reach this control plane, usually the
    /// control plane's Service name.
    #[arg(long, env = "KAGE_XDS_ADDRESS", default_value = "kage")]
    pub xds_address: String,

    /// Envoy container image for proxy Deployments.
    #[arg(
        long,
        env = "KAGE_ENVOY_IMAGE",
        default_value = "envoyproxy/envoy:v1.30-latest"
    )]
    pub envoy_image: String,

    /// Namespace to operate in; the client's default namespace when
    /// unset.
    #[arg(long, env = "KAGE_NAMESPACE")]
    pub namespace: Option<String>,

    /// Path to a kubeconfig; in-cluster configuration when unset.
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,
}

impl Config {
    /// The canary materialization settings derived from this config.
    #[must_use]
    pub fn canary_config(&self) -> CanaryConfig {
        CanaryConfig {
            xds_address: self.xds_address.clone(),
            xds_port: self.xds_port,
            admin_port: self.envoy_admin_port,
            envoy_image: self.envoy_image.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["kage"]);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.xds_port, 8081);
        assert_eq!(config.bind.to_string(), "0.0.0.0");
        assert!(config.namespace.is_none());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::parse_from([
            "kage",
            "--server-port",
            "9090",
            "--namespace",
            "kage-system",
        ]);
        assert_eq!(config.server_port, 9090);
        assert_eq!(config.namespace.as_deref(), Some("kage-system"));
    }
}
