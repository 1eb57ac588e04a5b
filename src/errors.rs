use std::error;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::str;

#[cfg(feature = "aio")]
use http::uri::InvalidUri;

/// Errors that can occur while turning an SSDP reply into a device.
#[derive(Debug)]
pub enum SearchError {
    /// Http error while fetching the service descriptor.
    HttpError(attohttpc::Error),
    /// The gateway answered the descriptor request with a non-2xx status.
    HttpStatus(u16),
    /// IO Error
    IoError(io::Error),
    /// The reply or descriptor was not valid UTF-8.
    Utf8Error(str::Utf8Error),
    /// The service descriptor could not be parsed as XML.
    XmlError(xmltree::ParseError),
    /// A location or control URL could not be parsed.
    InvalidUrl(url::ParseError),
    /// The reply is not an SSDP message.
    InvalidResponse,
    /// The reply lacks a mandatory header.
    MissingHeader(&'static str),
    /// The service descriptor has no WANIPConnection/WANPPPConnection service.
    NoControlService,
    /// Error from hyper.
    #[cfg(feature = "aio")]
    HyperError(hyper::Error),
    /// The location could not be turned into a request URI.
    #[cfg(feature = "aio")]
    InvalidUri(InvalidUri),
    /// The descriptor request did not complete in time.
    #[cfg(feature = "aio")]
    Timeout,
}

impl From<attohttpc::Error> for SearchError {
    fn from(err: attohttpc::Error) -> SearchError {
        SearchError::HttpError(err)
    }
}

impl From<io::Error> for SearchError {
    fn from(err: io::Error) -> SearchError {
        SearchError::IoError(err)
    }
}

impl From<str::Utf8Error> for SearchError {
    fn from(err: str::Utf8Error) -> SearchError {
        SearchError::Utf8Error(err)
    }
}

impl From<xmltree::ParseError> for SearchError {
    fn from(err: xmltree::ParseError) -> SearchError {
        SearchError::XmlError(err)
    }
}

impl From<url::ParseError> for SearchError {
    fn from(err: url::ParseError) -> SearchError {
        SearchError::InvalidUrl(err)
    }
}

#[cfg(feature = "aio")]
impl From<hyper::Error> for SearchError {
    fn from(err: hyper::Error) -> SearchError {
        SearchError::HyperError(err)
    }
}

#[cfg(feature = "aio")]
impl From<InvalidUri> for SearchError {
    fn from(err: InvalidUri) -> SearchError {
        SearchError::InvalidUri(err)
    }
}

#[cfg(feature = "aio")]
impl From<tokio::time::error::Elapsed> for SearchError {
    fn from(_err: tokio::time::error::Elapsed) -> SearchError {
        SearchError::Timeout
    }
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SearchError::HttpError(ref e) => write!(f, "HTTP error {}", e),
            SearchError::HttpStatus(code) => write!(f, "Couldn't get services list: status {}", code),
            SearchError::IoError(ref e) => write!(f, "IO error: {}", e),
            SearchError::Utf8Error(ref e) => write!(f, "UTF-8 error: {}", e),
            SearchError::XmlError(ref e) => write!(f, "XML error: {}", e),
            SearchError::InvalidUrl(ref e) => write!(f, "Invalid URL: {}", e),
            SearchError::InvalidResponse => write!(f, "Invalid response"),
            SearchError::MissingHeader(name) => write!(f, "Reply has no {} header", name),
            SearchError::NoControlService => write!(
                f,
                "No valid control service was found in the service descriptor document"
            ),
            #[cfg(feature = "aio")]
            SearchError::HyperError(ref e) => write!(f, "Hyper Error: {}", e),
            #[cfg(feature = "aio")]
            SearchError::InvalidUri(ref e) => write!(f, "InvalidUri Error: {}", e),
            #[cfg(feature = "aio")]
            SearchError::Timeout => write!(f, "Descriptor request timed out"),
        }
    }
}

impl error::Error for SearchError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            SearchError::HttpError(ref e) => Some(e),
            SearchError::HttpStatus(..) => None,
            SearchError::IoError(ref e) => Some(e),
            SearchError::Utf8Error(ref e) => Some(e),
            SearchError::XmlError(ref e) => Some(e),
            SearchError::InvalidUrl(ref e) => Some(e),
            SearchError::InvalidResponse => None,
            SearchError::MissingHeader(..) => None,
            SearchError::NoControlService => None,
            #[cfg(feature = "aio")]
            SearchError::HyperError(ref e) => Some(e),
            #[cfg(feature = "aio")]
            SearchError::InvalidUri(ref e) => Some(e),
            #[cfg(feature = "aio")]
            SearchError::Timeout => None,
        }
    }
}

/// Errors raised by a searcher during a discovery cycle.
///
/// These never stop the discovery loop; they are published to the host as
/// `DiscoveryEvent::UnhandledError`.
#[derive(Debug)]
pub enum DiscoveryError {
    /// IO Error
    IoError(io::Error),
    /// Sending a discovery request from the given local socket failed.
    SendFailed(SocketAddr, io::Error),
    /// Reading replies on the given local socket failed.
    ReceiveFailed(SocketAddr, io::Error),
    /// A searcher panicked while searching or receiving.
    SearcherPanicked(String),
}

impl From<io::Error> for DiscoveryError {
    fn from(err: io::Error) -> DiscoveryError {
        DiscoveryError::IoError(err)
    }
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DiscoveryError::IoError(ref e) => write!(f, "IO error: {}", e),
            DiscoveryError::SendFailed(addr, ref e) => write!(f, "Sending from {} failed: {}", addr, e),
            DiscoveryError::ReceiveFailed(addr, ref e) => write!(f, "Receiving on {} failed: {}", addr, e),
            DiscoveryError::SearcherPanicked(ref msg) => write!(f, "Searcher panicked: {}", msg),
        }
    }
}

impl error::Error for DiscoveryError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            DiscoveryError::IoError(ref e) => Some(e),
            DiscoveryError::SendFailed(_, ref e) => Some(e),
            DiscoveryError::ReceiveFailed(_, ref e) => Some(e),
            DiscoveryError::SearcherPanicked(..) => None,
        }
    }
}
