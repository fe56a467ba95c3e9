/*!
 * Multicast-DNS service advertisement
 *
 * Publishes `<hostname>.local` under `_http._tcp` so update clients resolve
 * the endpoint without a configured address. The record is registered only
 * after the HTTP listener is bound, and withdrawn explicitly at shutdown so
 * peer caches expire promptly instead of pointing at a dead service.
 */

use std::net::IpAddr;

use crate::error::{BeaconError, Result};

/// Service type the record is published under
pub const SERVICE_TYPE: &str = "_http._tcp";

/// A live mDNS advertisement. Exclusively owned by whoever registered it;
/// dropping the inner service handle sends the goodbye packets.
pub struct Advertisement {
    // Field order matters: the service must be dropped before the responder.
    _service: libmdns::Service,
    _responder: libmdns::Responder,
    addr: IpAddr,
    hostname: String,
}

/// Pick the first non-loopback IPv4 address the OS reports.
///
/// Best-effort: multi-homed hosts advertise whichever interface enumerates
/// first. No usable interface at all is a startup-fatal condition.
pub fn resolve_local_ipv4() -> Result<IpAddr> {
    let interfaces = if_addrs::get_if_addrs()
        .map_err(|e| BeaconError::Advertise(format!("failed to enumerate interfaces: {}", e)))?;

    interfaces
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .map(|iface| iface.ip())
        .find(|ip| ip.is_ipv4())
        .ok_or_else(|| {
            BeaconError::Advertise("no non-loopback IPv4 interface available".to_string())
        })
}

impl Advertisement {
    /// Register `<hostname>.local` pointing at this host and `port`.
    ///
    /// Call only after the listener is bound: advertising an unreachable
    /// port would strand clients until their caches expire. The responder
    /// runs on the current tokio runtime.
    pub fn register(hostname: &str, port: u16) -> Result<Self> {
        let addr = resolve_local_ipv4()?;

        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            BeaconError::Advertise(format!("no async runtime for mDNS responder: {}", e))
        })?;
        let responder = libmdns::Responder::spawn_with_ip_list_and_hostname(
            &handle,
            vec![addr],
            hostname.to_string(),
        )
        .map_err(|e| BeaconError::Advertise(format!("failed to start mDNS responder: {}", e)))?;

        let service = responder.register(
            SERVICE_TYPE.to_string(),
            hostname.to_string(),
            port,
            &[],
        );

        tracing::info!(
            %addr,
            port,
            hostname,
            service_type = SERVICE_TYPE,
            "mDNS service registered"
        );

        Ok(Advertisement {
            _service: service,
            _responder: responder,
            addr,
            hostname: hostname.to_string(),
        })
    }

    /// Address the record resolves to
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// Withdraw the record. Consumes the advertisement; the drop order sends
    /// goodbye packets before the responder thread stops.
    pub fn withdraw(self) {
        let hostname = self.hostname.clone();
        drop(self);
        tracing::info!(%hostname, "mDNS advertisement withdrawn");
    }
}
