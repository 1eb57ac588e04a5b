use std::collections::HashMap;
use std::io;

use url::Url;
use xmltree::{Element, XMLNode};

use crate::common::messages::{ServiceType, DEVICE_NAMESPACE};
use crate::errors::SearchError;

/// The header fields of an SSDP reply.
#[derive(Clone, Debug)]
pub struct DiscoveryResponse {
    start_line: String,
    headers: HashMap<String, String>,
}

impl DiscoveryResponse {
    /// Value of a header, looked up case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_uppercase()).map(String::as_str)
    }

    /// The first line of the message, e.g. `HTTP/1.1 200 OK`.
    pub fn start_line(&self) -> &str {
        &self.start_line
    }

    /// True for M-SEARCH and NOTIFY messages, which are not replies.
    pub fn is_request(&self) -> bool {
        let line = self.start_line.to_ascii_uppercase();
        line.starts_with("M-SEARCH") || line.starts_with("NOTIFY")
    }
}

// Parse the result.
pub fn parse_search_result(text: &str) -> Result<DiscoveryResponse, SearchError> {
    let mut lines = text.lines();
    let start_line = match lines.next().map(str::trim) {
        Some(line) if !line.is_empty() => line.to_string(),
        _ => return Err(SearchError::InvalidResponse),
    };

    let mut headers = HashMap::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = match line.find(':') {
            Some(colon) => (&line[..colon], &line[colon + 1..]),
            None => (line, ""),
        };
        // first occurrence wins
        headers
            .entry(key.trim().to_ascii_uppercase())
            .or_insert_with(|| value.trim().to_string());
    }

    Ok(DiscoveryResponse { start_line, headers })
}

/// Find the first control service of a device description.
///
/// Every `service` element in the UPnP device namespace is considered, in
/// document order. The first whose `serviceType` is a known control service
/// and which carries a `controlURL` wins; the control URL is resolved against
/// `location`.
pub fn parse_control_service<R>(resp: R, location: &Url) -> Result<(ServiceType, Url), SearchError>
where
    R: io::Read,
{
    let root = Element::parse(resp)?;

    let mut services = Vec::new();
    collect_services(&root, &mut services);

    for service in services {
        let service_type = match child_text(service, "serviceType").and_then(|t| ServiceType::matching(&t)) {
            Some(service_type) => service_type,
            None => continue,
        };
        let control_url = match child_text(service, "controlURL") {
            Some(control_url) => control_url,
            None => {
                debug!("{}: {} service has no control URL, skipping", location, service_type);
                continue;
            }
        };
        let control_url = location.join(&control_url)?;
        return Ok((service_type, control_url));
    }

    Err(SearchError::NoControlService)
}

fn collect_services<'a>(element: &'a Element, services: &mut Vec<&'a Element>) {
    if element.name == "service" && element.namespace.as_deref() == Some(DEVICE_NAMESPACE) {
        services.push(element);
    }
    for node in &element.children {
        if let XMLNode::Element(child) = node {
            collect_services(child, services);
        }
    }
}

fn child_text(element: &Element, name: &str) -> Option<String> {
    let child = element.children.iter().find_map(|node| match node {
        XMLNode::Element(child) if child.name == name => Some(child),
        _ => None,
    })?;
    let text: String = child
        .children
        .iter()
        .filter_map(|node| match node {
            XMLNode::Text(text) | XMLNode::CData(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
