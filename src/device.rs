use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use url::Url;

use crate::common::ServiceType;

/// What a service descriptor fetch yields: enough to build a `UpnpDevice`.
#[derive(Clone, Debug, PartialEq)]
pub struct UpnpDeviceInfo {
    /// Local address the gateway was reached from
    pub local_addr: IpAddr,
    /// Location of the service descriptor document
    pub location: Url,
    /// Absolute control URL of the port mapping service
    pub control_url: Url,
    /// The port mapping service the gateway offers
    pub service_type: ServiceType,
}

/// A UPnP gateway found by a `UpnpSearcher`.
///
/// Clones share the last-seen timestamp, so a handle kept by the host sees
/// the gateway being refreshed by later replies.
#[derive(Clone, Debug)]
pub struct UpnpDevice {
    info: UpnpDeviceInfo,
    last_seen: Arc<Mutex<Instant>>,
}

impl UpnpDevice {
    /// Create a device seen just now.
    pub fn new(info: UpnpDeviceInfo) -> UpnpDevice {
        UpnpDevice {
            info,
            last_seen: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Local address the gateway was reached from.
    pub fn local_addr(&self) -> IpAddr {
        self.info.local_addr
    }

    /// Location of the service descriptor, the identity of the device.
    pub fn location(&self) -> &Url {
        &self.info.location
    }

    /// Absolute URL of the control endpoint.
    pub fn control_url(&self) -> &Url {
        &self.info.control_url
    }

    /// The port mapping service.
    pub fn service_type(&self) -> ServiceType {
        self.info.service_type
    }

    /// When a reply from this device was last analysed.
    pub fn last_seen(&self) -> Instant {
        match self.last_seen.lock() {
            Ok(last_seen) => *last_seen,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Mark the device as seen now.
    pub fn touch(&self) {
        self.touch_at(Instant::now());
    }

    pub(crate) fn touch_at(&self, now: Instant) {
        let mut last_seen = match self.last_seen.lock() {
            Ok(last_seen) => last_seen,
            Err(poisoned) => poisoned.into_inner(),
        };
        if now > *last_seen {
            *last_seen = now;
        }
    }
}

impl fmt::Display for UpnpDevice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.info.control_url, self.info.service_type)
    }
}

/// A NAT-PMP gateway, reported by a NAT-PMP searcher.
#[derive(Clone, Debug, PartialEq)]
pub struct PmpDevice {
    /// Local address the gateway was reached from
    pub local_addr: IpAddr,
    /// Address of the gateway
    pub gateway: Ipv4Addr,
    /// Public address reported by the gateway
    pub public_addr: Ipv4Addr,
}

impl fmt::Display for PmpDevice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "nat-pmp://{} (public {})", self.gateway, self.public_addr)
    }
}

/// A gateway able to perform port mappings.
#[derive(Clone, Debug)]
pub enum NatDevice {
    /// Found through SSDP
    Upnp(UpnpDevice),
    /// Found through NAT-PMP
    Pmp(PmpDevice),
}

impl NatDevice {
    /// Local address the gateway was reached from.
    pub fn local_addr(&self) -> IpAddr {
        match *self {
            NatDevice::Upnp(ref device) => device.local_addr(),
            NatDevice::Pmp(ref device) => device.local_addr,
        }
    }
}

impl fmt::Display for NatDevice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            NatDevice::Upnp(ref device) => device.fmt(f),
            NatDevice::Pmp(ref device) => device.fmt(f),
        }
    }
}
