//! Connectivity Probe Abstraction
//!
//! Provides a best-effort online/offline determination for the sync engine.

use async_trait::async_trait;

/// Network reachability as observed by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// The probe endpoint answered
    Online,
    /// The probe failed, timed out, or the platform reports no network
    Offline,
}

impl NetworkStatus {
    pub fn is_online(self) -> bool {
        matches!(self, NetworkStatus::Online)
    }
}

/// Connectivity probe trait
///
/// Lets the core decide between contacting the remote source and serving the
/// local cache. Implementations must never fail: any error while probing is
/// reported as [`NetworkStatus::Offline`]. Probes are single-shot with a short
/// deadline and no retries.
///
/// # Platform Support
///
/// - **Desktop**: HEAD request against a stable endpoint (`bridge-desktop`)
/// - **iOS**: `NWPathMonitor`
/// - **Android**: `ConnectivityManager`
///
/// # Example
///
/// ```ignore
/// use bridge_traits::network::ConnectivityProbe;
///
/// async fn should_sync(probe: &dyn ConnectivityProbe) -> bool {
///     probe.is_online().await
/// }
/// ```
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Probe the network once
    async fn probe(&self) -> NetworkStatus;

    /// Convenience wrapper over [`probe`](Self::probe)
    async fn is_online(&self) -> bool {
        self.probe().await.is_online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(NetworkStatus);

    #[async_trait]
    impl ConnectivityProbe for FixedProbe {
        async fn probe(&self) -> NetworkStatus {
            self.0
        }
    }

    #[tokio::test]
    async fn test_is_online_follows_probe() {
        assert!(FixedProbe(NetworkStatus::Online).is_online().await);
        assert!(!FixedProbe(NetworkStatus::Offline).is_online().await);
    }
}
