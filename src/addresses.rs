//! Local addresses searchers bind their sockets to.

use std::io;
use std::net::IpAddr;

/// Enumerates the local unicast addresses usable for discovery sockets.
pub trait AddressProvider: Send + Sync {
    fn unicast_addresses(&self) -> io::Result<Vec<IpAddr>>;
}

/// The IPv4 addresses of the machine's non-loopback interfaces.
#[derive(Clone, Copy, Debug, Default)]
pub struct InterfaceAddresses;

impl AddressProvider for InterfaceAddresses {
    fn unicast_addresses(&self) -> io::Result<Vec<IpAddr>> {
        let interfaces = if_addrs::get_if_addrs()?;
        let mut addresses: Vec<IpAddr> = interfaces
            .iter()
            .filter(|interface| !interface.is_loopback())
            .map(|interface| interface.ip())
            .filter(|ip| match ip {
                IpAddr::V4(ip) => !ip.is_unspecified() && !ip.is_multicast() && !ip.is_broadcast(),
                // IPv6 discovery is not supported
                IpAddr::V6(_) => false,
            })
            .collect();
        addresses.dedup();
        Ok(addresses)
    }
}

/// A fixed list of addresses.
#[derive(Clone, Debug, Default)]
pub struct StaticAddresses(pub Vec<IpAddr>);

impl AddressProvider for StaticAddresses {
    fn unicast_addresses(&self) -> io::Result<Vec<IpAddr>> {
        Ok(self.0.clone())
    }
}
