//! The closed set of resource kinds the control plane watches.

use std::fmt;
use std::str::FromStr;

use kage_core::Error;

/// A watchable Kubernetes kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WatchKind {
    /// `v1/Pod`
    Pod,
    /// `apps/v1/Deployment`
    Deployment,
    /// `apps/v1/ReplicaSet`
    ReplicaSet,
    /// `apps/v1/StatefulSet`
    StatefulSet,
    /// `apps/v1/DaemonSet`
    DaemonSet,
    /// `v1/Service`
    Service,
    /// `v1/ConfigMap`
    ConfigMap,
    /// `v1/Endpoints`
    Endpoints,
}

impl WatchKind {
    /// Every supported kind.
    pub const ALL: [WatchKind; 8] = [
        WatchKind::Pod,
        WatchKind::Deployment,
        WatchKind::ReplicaSet,
        WatchKind::StatefulSet,
        WatchKind::DaemonSet,
        WatchKind::Service,
        WatchKind::ConfigMap,
        WatchKind::Endpoints,
    ];

    /// Canonical kind string as the API server reports it.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::Deployment => "Deployment",
            Self::ReplicaSet => "ReplicaSet",
            Self::StatefulSet => "StatefulSet",
            Self::DaemonSet => "DaemonSet",
            Self::Service => "Service",
            Self::ConfigMap => "ConfigMap",
            Self::Endpoints => "Endpoints",
        }
    }

    /// True for kinds that control pods and can be the target or canary
    /// side of a traffic split.
    #[must_use]
    pub fn is_pod_controller(&self) -> bool {
        matches!(
            self,
            Self::Deployment | Self::ReplicaSet | Self::StatefulSet | Self::DaemonSet
        )
    }
}

impl fmt::Display for WatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pod" => Ok(Self::Pod),
            "Deployment" => Ok(Self::Deployment),
            "ReplicaSet" => Ok(Self::ReplicaSet),
            "StatefulSet" => Ok(Self::StatefulSet),
            "DaemonSet" => Ok(Self::DaemonSet),
            "Service" => Ok(Self::Service),
            "ConfigMap" => Ok(Self::ConfigMap),
            "Endpoints" => Ok(Self::Endpoints),
            other => Err(Error::Unsupported(format!("kind {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kage_core::ErrorKind;

    #[test]
    fn test_parse_roundtrip() {
        for kind in WatchKind::ALL {
            assert_eq!(kind.as_str().parse::<WatchKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_unsupported() {
        let err = "CronJob".parse::<WatchKind>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_pod_controllers() {
        assert!(WatchKind::Deployment.is_pod_controller());
        assert!(WatchKind::DaemonSet.is_pod_controller());
        assert!(!WatchKind::Service.is_pod_controller());
        assert!(!WatchKind::Pod.is_pod_controller());
    }
}
