//! Discovery of NAT gateways on the local network.
//!
//! A `NatDiscoverer` drives a set of `Searcher`s from a background thread:
//! every cycle it drains the replies they received and lets them send new
//! discovery requests. The `UpnpSearcher` broadcasts SSDP searches for the
//! WANIPConnection and WANPPPConnection services, fetches the descriptor of
//! every gateway that answers, and reports each gateway once.
//!
//! ```no_run
//! use nat_discovery::{DiscoveryEvent, DiscoveryOptions, NatDiscoverer};
//!
//! let discoverer = NatDiscoverer::with_default_searchers(DiscoveryOptions::default());
//! let events = discoverer.subscribe();
//! discoverer.initialize().unwrap();
//! discoverer.start_discovery();
//!
//! for event in events {
//!     if let DiscoveryEvent::DeviceFound(device) = event {
//!         println!("found {}", device);
//!     }
//! }
//! ```

#[macro_use]
extern crate log;

// data structures
pub use self::device::{NatDevice, PmpDevice, UpnpDevice, UpnpDeviceInfo};
pub use self::common::{DiscoveryOptions, ServiceType};

// discovery loop
pub use self::discovery::{DiscoveryEvent, NatDiscoverer};

// searchers
pub use self::search::{Searcher, SocketSet};
pub use self::upnp::{Analysis, Ignored, UpnpSearcher};

// building blocks
pub use self::addresses::{AddressProvider, InterfaceAddresses, StaticAddresses};
pub use self::cache::DeviceCache;
pub use self::descriptor::{DescriptorFetcher, HttpFetcher};
pub use self::common::messages::format_search_request;
pub use self::common::parsing::{parse_control_service, parse_search_result, DiscoveryResponse};

// errors
pub use self::errors::{DiscoveryError, SearchError};

mod addresses;
mod cache;
mod common;
mod descriptor;
mod device;
mod discovery;
mod errors;
mod search;
mod upnp;

#[cfg(feature = "aio")]
pub mod aio;
