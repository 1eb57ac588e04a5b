use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::str;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Instant;

use url::Url;

use crate::addresses::AddressProvider;
use crate::cache::DeviceCache;
use crate::common::{messages, parsing, DiscoveryOptions, ServiceType};
use crate::descriptor::{DescriptorFetcher, HttpFetcher};
use crate::device::{NatDevice, UpnpDevice};
use crate::errors::{DiscoveryError, SearchError};
use crate::search::{Searcher, SocketSet};

/// Why a reply did not produce a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ignored {
    /// Not a reply, or not about a port mapping service.
    Irrelevant,
    /// The device is already known; it was touched.
    AlreadyKnown,
    /// The sender was asked for its descriptor too recently.
    Suppressed,
    /// Another reply for the same location was cached first.
    LostRace,
}

/// Outcome of analysing one SSDP reply.
#[derive(Debug)]
pub enum Analysis {
    /// A new gateway.
    Found(UpnpDevice),
    /// Nothing new.
    Ignored(Ignored),
    /// The reply or the descriptor fetch was broken. The failure has
    /// already been logged.
    Failed(SearchError),
}

/// Searches for UPnP gateways offering a WANIPConnection or
/// WANPPPConnection service.
pub struct UpnpSearcher {
    sockets: SocketSet,
    cache: Mutex<DeviceCache>,
    fetcher: Box<dyn DescriptorFetcher>,
    options: DiscoveryOptions,
}

impl UpnpSearcher {
    /// Bind a socket per address of `provider` and fetch descriptors over HTTP.
    pub fn new(provider: &dyn AddressProvider, options: DiscoveryOptions) -> UpnpSearcher {
        let sockets = SocketSet::bind(provider, options.search_interval);
        let fetcher = HttpFetcher::new(options.fetch_timeout);
        UpnpSearcher::with_fetcher(sockets, fetcher, options)
    }

    /// Use the given sockets and descriptor fetcher.
    pub fn with_fetcher<F>(sockets: SocketSet, fetcher: F, options: DiscoveryOptions) -> UpnpSearcher
    where
        F: DescriptorFetcher + 'static,
    {
        UpnpSearcher {
            sockets,
            cache: Mutex::new(DeviceCache::new(options.fetch_suppression)),
            fetcher: Box::new(fetcher),
            options,
        }
    }

    pub fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    /// The gateways found so far.
    pub fn devices(&self) -> Vec<UpnpDevice> {
        self.lock_cache().devices().cloned().collect()
    }

    /// Turn a reply received on `local_addr` from `from` into a device.
    ///
    /// Only the first reply for a descriptor location yields `Found`; later
    /// ones refresh the cached device. Whatever the input, this never fails
    /// nor panics: broken replies and failed fetches come back as `Failed`.
    pub fn analyse_received_response(&self, local_addr: IpAddr, response: &[u8], from: SocketAddr) -> Analysis {
        let text = str::from_utf8(response);
        let result = text
            .map_err(SearchError::from)
            .and_then(|text| self.analyse_text(local_addr, text, from));

        match result {
            Ok(analysis) => analysis,
            Err(err) => {
                error!("unable to decode the response of {}: {}", from, err);
                match text {
                    Ok(text) => error!("data string: {}", text),
                    Err(_) => error!("data string: {}", String::from_utf8_lossy(response)),
                }
                Analysis::Failed(err)
            }
        }
    }

    fn analyse_text(&self, local_addr: IpAddr, text: &str, from: SocketAddr) -> Result<Analysis, SearchError> {
        trace!("UPnP response from {}: {}", from, text);

        let message = parsing::parse_search_result(text)?;
        if message.is_request() {
            return Ok(Analysis::Ignored(Ignored::Irrelevant));
        }

        let st = message.get("ST").ok_or(SearchError::MissingHeader("ST"))?;
        let service_type = match ServiceType::matching(st) {
            Some(service_type) => service_type,
            None => {
                debug!("{}: ignoring {} reply", from, st);
                return Ok(Analysis::Ignored(Ignored::Irrelevant));
            }
        };
        info!("{}: router advertised a '{}' service", from, service_type);

        let location = message.get("LOCATION").ok_or(SearchError::MissingHeader("LOCATION"))?;
        let location = Url::parse(location)?;
        info!("found device at {}", location);

        {
            let now = Instant::now();
            let mut cache = self.lock_cache();
            if cache.touch(&location, now) {
                debug!("{}: already found, ignored", location);
                return Ok(Analysis::Ignored(Ignored::AlreadyKnown));
            }
            // devices answer each request several times
            if !cache.begin_fetch(from.ip(), now) {
                debug!("{}: descriptor fetched recently, ignored", from);
                return Ok(Analysis::Ignored(Ignored::Suppressed));
            }
        }

        let info = self.fetcher.fetch(local_addr, &location)?;
        let device = UpnpDevice::new(info);

        if self.lock_cache().insert(device.clone()) {
            info!("{}: handshake complete, control URL {}", location, device.control_url());
            Ok(Analysis::Found(device))
        } else {
            debug!("{}: found concurrently, dropping duplicate", location);
            Ok(Analysis::Ignored(Ignored::LostRace))
        }
    }

    fn lock_cache(&self) -> MutexGuard<DeviceCache> {
        match self.cache.lock() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Searcher for UpnpSearcher {
    fn search(&mut self) -> Result<(), DiscoveryError> {
        let options = &self.options;
        self.sockets.search(|socket| send_search_requests(socket, options))
    }

    fn receive(&mut self, found: &mut dyn FnMut(NatDevice)) -> Result<(), DiscoveryError> {
        if let Some(expiry) = self.options.device_expiry {
            for device in self.lock_cache().evict_idle(expiry, Instant::now()) {
                info!("{}: not seen for {:?}, forgotten", device.location(), expiry);
            }
        }

        let this = &*self;
        this.sockets
            .receive(this.options.max_response_size, |local_addr, data, from| {
                if let Analysis::Found(device) = this.analyse_received_response(local_addr, data, from) {
                    found(NatDevice::Upnp(device));
                }
            })
    }
}

fn send_search_requests(socket: &UdpSocket, options: &DiscoveryOptions) -> io::Result<()> {
    for service in ServiceType::ALL.iter() {
        let request = messages::format_search_request(*service);
        debug!(
            "sending {} search to {} from {:?}",
            service,
            options.broadcast_address,
            socket.local_addr()
        );
        for _ in 0..options.search_repeats {
            socket.send_to(request.as_bytes(), options.broadcast_address)?;
        }
        thread::sleep(options.search_type_pause);
    }
    Ok(())
}
