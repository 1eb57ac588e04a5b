//! Async counterparts for hosts running on tokio.
//!
//! The discovery loop itself stays on its own thread; this module fetches
//! descriptors with hyper and turns discovery events into a `Stream`.

use std::net::IpAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::channel::mpsc;
use futures::future;
use futures::prelude::*;
use http::header::{HeaderValue, ACCEPT_LANGUAGE};
use hyper::{Body, Client, Request, Uri};
use tokio::time::timeout;
use url::Url;

use crate::common::parsing;
use crate::device::{NatDevice, UpnpDeviceInfo};
use crate::discovery::{DiscoveryEvent, NatDiscoverer};
use crate::errors::SearchError;

/// Fetch a service descriptor and pick its control service.
///
/// Same as `HttpFetcher`, on the current tokio runtime.
pub async fn fetch_descriptor(
    local_addr: IpAddr,
    location: &Url,
    limit: Option<Duration>,
) -> Result<UpnpDeviceInfo, SearchError> {
    let uri: Uri = location.as_str().parse()?;
    debug!("requesting service list from: {}", uri);

    let body = match limit {
        Some(limit) => timeout(limit, request_descriptor(uri)).await??,
        None => request_descriptor(uri).await?,
    };

    let (service_type, control_url) = parsing::parse_control_service(&body[..], location)?;
    debug!("{}: found {} service at {}", location, service_type, control_url);

    Ok(UpnpDeviceInfo {
        local_addr,
        location: location.clone(),
        control_url,
        service_type,
    })
}

async fn request_descriptor(uri: Uri) -> Result<Bytes, SearchError> {
    let client = Client::new();

    let mut request = Request::new(Body::empty());
    *request.uri_mut() = uri;
    request
        .headers_mut()
        .insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en"));

    let response = client.request(request).await?;
    if !response.status().is_success() {
        return Err(SearchError::HttpStatus(response.status().as_u16()));
    }
    Ok(hyper::body::to_bytes(response.into_body()).await?)
}

/// Discovery events as a `Stream`.
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<DiscoveryEvent>,
}

impl EventStream {
    /// Only the gateways found, dropping error events.
    pub fn devices(self) -> impl Stream<Item = NatDevice> {
        self.filter_map(|event| {
            future::ready(match event {
                DiscoveryEvent::DeviceFound(device) => Some(device),
                DiscoveryEvent::UnhandledError(_) => None,
            })
        })
    }
}

impl Stream for EventStream {
    type Item = DiscoveryEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<DiscoveryEvent>> {
        self.receiver.poll_next_unpin(cx)
    }
}

impl NatDiscoverer {
    /// Receive every event published from now on as a `Stream`.
    pub fn subscribe_stream(&self) -> EventStream {
        let (tx, receiver) = mpsc::unbounded();
        self.add_raw_listener(Box::new(move |event: &DiscoveryEvent| {
            tx.unbounded_send(event.clone()).is_ok()
        }));
        EventStream { receiver }
    }
}
