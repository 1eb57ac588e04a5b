use std::net::IpAddr;
use std::time::Duration;

use url::Url;

use crate::common::parsing;
use crate::device::UpnpDeviceInfo;
use crate::errors::SearchError;

/// Retrieves a gateway's service descriptor and picks its control service.
pub trait DescriptorFetcher: Send + Sync {
    fn fetch(&self, local_addr: IpAddr, location: &Url) -> Result<UpnpDeviceInfo, SearchError>;
}

/// Fetches descriptors over HTTP.
#[derive(Clone, Debug, Default)]
pub struct HttpFetcher {
    timeout: Option<Duration>,
}

impl HttpFetcher {
    pub fn new(timeout: Option<Duration>) -> HttpFetcher {
        HttpFetcher { timeout }
    }
}

impl DescriptorFetcher for HttpFetcher {
    fn fetch(&self, local_addr: IpAddr, location: &Url) -> Result<UpnpDeviceInfo, SearchError> {
        info!("{}: fetching service list", location);

        let mut request = attohttpc::get(location.as_str()).header("Accept-Language", "en");
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = match request.send() {
            Ok(response) => response,
            Err(err) => {
                error!("{}: device denied the connection attempt: {}", location, err);
                if let attohttpc::ErrorKind::Io(ref io_err) = *err.kind() {
                    if let Some(code) = io_err.raw_os_error() {
                        error!("{}: socket error code {}", location, code);
                    }
                }
                return Err(SearchError::from(err));
            }
        };

        if !response.is_success() {
            let status = response.status();
            error!("{}: couldn't get services list: {}", location, status);
            return Err(SearchError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes()?;
        let (service_type, control_url) = parsing::parse_control_service(&body[..], location)?;
        info!("{}: found {} service at {}", location, service_type, control_url);

        Ok(UpnpDeviceInfo {
            local_addr,
            location: location.clone(),
            control_url,
            service_type,
        })
    }
}
