use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use super::messages::SSDP_PORT;

/// Default size of the buffer a single reply is read into.
pub const MAX_RESPONSE_SIZE: usize = 1500;

/// Tuning knobs for searchers and the discovery loop.
#[derive(Clone, Debug)]
pub struct DiscoveryOptions {
    /// Where M-SEARCH requests are sent.
    pub broadcast_address: SocketAddr,
    /// Minimum time between two searches of the same searcher.
    pub search_interval: Duration,
    /// How many times each request is sent per search. UDP is unreliable.
    pub search_repeats: usize,
    /// Pause after the requests for one service type were sent.
    pub search_type_pause: Duration,
    /// Pause after every loop cycle, searching or not.
    pub loop_pause: Duration,
    /// Replies from an address fetched less than this long ago are dropped.
    pub fetch_suppression: Duration,
    /// Total timeout of a service descriptor request. `None` waits forever.
    pub fetch_timeout: Option<Duration>,
    /// Forget devices not seen for this long. `None` keeps them forever.
    pub device_expiry: Option<Duration>,
    /// Size of the receive buffer. Longer datagrams are truncated.
    pub max_response_size: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            broadcast_address: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, SSDP_PORT)),
            search_interval: Duration::from_secs(60),
            search_repeats: 2,
            search_type_pause: Duration::from_millis(10),
            loop_pause: Duration::from_millis(10),
            fetch_suppression: Duration::from_secs(20),
            fetch_timeout: Some(Duration::from_secs(5)),
            device_expiry: None,
            max_response_size: MAX_RESPONSE_SIZE,
        }
    }
}
