//! Search the local network for NAT gateways and print them as they show up.
//!
//! Runs until interrupted. Pass `-v` for debug logging.

extern crate nat_discovery;
extern crate simplelog;

use std::env;

use nat_discovery::{DiscoveryEvent, DiscoveryOptions, NatDiscoverer};
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};

fn main() {
    let level = match env::args().nth(1) {
        Some(ref flag) if flag == "-v" => LevelFilter::Debug,
        _ => LevelFilter::Info,
    };
    let _ = SimpleLogger::init(level, LogConfig::default());

    let discoverer = NatDiscoverer::with_default_searchers(DiscoveryOptions::default());
    let events = discoverer.subscribe();
    if let Err(err) = discoverer.initialize() {
        println!("Failed to start discovery: {}", err);
        return;
    }
    discoverer.start_discovery();

    for event in events {
        match event {
            DiscoveryEvent::DeviceFound(device) => {
                println!("Found gateway {} through {}", device, device.local_addr())
            }
            DiscoveryEvent::UnhandledError(err) => println!("Error: {}", err),
        }
    }
}
