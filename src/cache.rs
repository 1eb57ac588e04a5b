use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use url::Url;

use crate::device::UpnpDevice;

/// Discovered devices keyed by descriptor location, and the last descriptor
/// fetch attempt per responding address.
///
/// The cache itself is not synchronised; `UpnpSearcher` keeps it behind a
/// mutex so that "check, then insert" is a single critical section.
#[derive(Debug)]
pub struct DeviceCache {
    devices: HashMap<Url, UpnpDevice>,
    last_fetched: HashMap<IpAddr, Instant>,
    suppression: Duration,
}

impl DeviceCache {
    /// Create an empty cache suppressing refetches within `suppression`.
    pub fn new(suppression: Duration) -> DeviceCache {
        DeviceCache {
            devices: HashMap::new(),
            last_fetched: HashMap::new(),
            suppression,
        }
    }

    /// The device cached for `location`, if any.
    pub fn get(&self, location: &Url) -> Option<&UpnpDevice> {
        self.devices.get(location)
    }

    pub fn contains(&self, location: &Url) -> bool {
        self.devices.contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// All cached devices.
    pub fn devices(&self) -> impl Iterator<Item = &UpnpDevice> {
        self.devices.values()
    }

    /// Refresh the device at `location`. Returns false if it is not cached.
    pub fn touch(&self, location: &Url, now: Instant) -> bool {
        match self.devices.get(location) {
            Some(device) => {
                device.touch_at(now);
                true
            }
            None => false,
        }
    }

    /// Record a fetch attempt from `addr` unless one happened within the
    /// suppression window. Returns whether the caller may fetch.
    pub fn begin_fetch(&mut self, addr: IpAddr, now: Instant) -> bool {
        if let Some(last) = self.last_fetched.get(&addr) {
            if now.saturating_duration_since(*last) < self.suppression {
                return false;
            }
        }
        self.last_fetched.insert(addr, now);
        true
    }

    /// Insert `device` unless its location is already cached.
    ///
    /// Returns false, leaving the cached device in place, when another reply
    /// for the same location got there first.
    pub fn insert(&mut self, device: UpnpDevice) -> bool {
        if self.devices.contains_key(device.location()) {
            return false;
        }
        self.devices.insert(device.location().clone(), device);
        true
    }

    /// Forget devices not seen for `max_idle`, and fetch attempts older than
    /// the suppression window. Returns the evicted devices.
    pub fn evict_idle(&mut self, max_idle: Duration, now: Instant) -> Vec<UpnpDevice> {
        let expired: Vec<Url> = self
            .devices
            .iter()
            .filter(|(_, device)| now.saturating_duration_since(device.last_seen()) > max_idle)
            .map(|(location, _)| location.clone())
            .collect();

        let suppression = self.suppression;
        self.last_fetched
            .retain(|_, last| now.saturating_duration_since(*last) < suppression);

        expired
            .iter()
            .filter_map(|location| self.devices.remove(location))
            .collect()
    }
}
