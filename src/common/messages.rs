use std::fmt;

/// Prefix shared by every UPnP service type URN.
pub const SERVICE_URN_PREFIX: &str = "urn:schemas-upnp-org:service:";

/// Namespace of the elements of a device description document.
pub const DEVICE_NAMESPACE: &str = "urn:schemas-upnp-org:device-1-0";

/// Port SSDP listens on.
pub const SSDP_PORT: u16 = 1900;

// Value of the HOST header. Requests are broadcast, but gateways expect the
// multicast group here.
const SSDP_HOST: &str = "239.255.255.250:1900";

/// The control services able to perform port mappings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceType {
    /// `WANIPConnection:1`
    WanIpConnection1,
    /// `WANIPConnection:2`
    WanIpConnection2,
    /// `WANPPPConnection:1`
    WanPppConnection1,
    /// `WANPPPConnection:2`
    WanPppConnection2,
}

impl ServiceType {
    /// Every control service, in the order they are searched for.
    pub const ALL: [ServiceType; 4] = [
        ServiceType::WanIpConnection1,
        ServiceType::WanIpConnection2,
        ServiceType::WanPppConnection1,
        ServiceType::WanPppConnection2,
    ];

    /// The service type id, e.g. `WANIPConnection:1`.
    pub fn id(self) -> &'static str {
        match self {
            ServiceType::WanIpConnection1 => "WANIPConnection:1",
            ServiceType::WanIpConnection2 => "WANIPConnection:2",
            ServiceType::WanPppConnection1 => "WANPPPConnection:1",
            ServiceType::WanPppConnection2 => "WANPPPConnection:2",
        }
    }

    /// The full URN, e.g. `urn:schemas-upnp-org:service:WANIPConnection:1`.
    pub fn urn(self) -> String {
        format!("{}{}", SERVICE_URN_PREFIX, self.id())
    }

    /// Find the control service advertised by `text`.
    ///
    /// The match is a case-insensitive containment check, so values such as
    /// `uuid:...::urn:schemas-upnp-org:service:WANIPConnection:1` are accepted.
    pub fn matching(text: &str) -> Option<ServiceType> {
        let text = text.to_ascii_lowercase();
        ServiceType::ALL
            .iter()
            .copied()
            .find(|service| text.contains(&service.urn().to_ascii_lowercase()))
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Build the M-SEARCH datagram asking for `service`.
pub fn format_search_request(service: ServiceType) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r
HOST: {}\r
MAN: \"ssdp:discover\"\r
MX: 3\r
ST: {}\r
\r
",
        SSDP_HOST,
        service.urn()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_names_service() {
        let request = format_search_request(ServiceType::WanPppConnection2);
        assert!(request.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(request.contains("\r\nST: urn:schemas-upnp-org:service:WANPPPConnection:2\r\n"));
        assert!(request.contains("\r\nMAN: \"ssdp:discover\"\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(
            ServiceType::matching("URN:SCHEMAS-UPNP-ORG:SERVICE:WANIPCONNECTION:1"),
            Some(ServiceType::WanIpConnection1)
        );
        assert_eq!(
            ServiceType::matching("uuid:abc::urn:schemas-upnp-org:service:WANPPPConnection:1"),
            Some(ServiceType::WanPppConnection1)
        );
    }

    #[test]
    fn test_matching_rejects_other_services() {
        assert_eq!(ServiceType::matching("urn:schemas-upnp-org:service:Layer3Forwarding:1"), None);
        assert_eq!(ServiceType::matching("urn:schemas-upnp-org:device:InternetGatewayDevice:1"), None);
        assert_eq!(ServiceType::matching("WANIPConnection:1"), None);
        assert_eq!(ServiceType::matching(""), None);
    }
}
