//! Print the first NAT gateway found, using the `Stream` interface.
//!
//! Gives up after 30 seconds.
//!
//! cargo run --features aio --example discover_stream

extern crate nat_discovery;
extern crate simplelog;

use std::time::Duration;

use futures::prelude::*;
use nat_discovery::{DiscoveryOptions, NatDiscoverer};
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};

#[tokio::main]
async fn main() {
    let _ = SimpleLogger::init(LevelFilter::Debug, LogConfig::default());

    let discoverer = NatDiscoverer::with_default_searchers(DiscoveryOptions::default());
    let mut devices = Box::pin(discoverer.subscribe_stream().devices());
    if let Err(err) = discoverer.initialize() {
        println!("Failed to start discovery: {}", err);
        return;
    }
    discoverer.start_discovery();

    match tokio::time::timeout(Duration::from_secs(30), devices.next()).await {
        Ok(Some(device)) => println!("Found gateway {}", device),
        Ok(None) => println!("Discovery ended"),
        Err(_) => println!("No gateway found"),
    }
}
