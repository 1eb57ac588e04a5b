use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use crate::addresses::AddressProvider;
use crate::device::NatDevice;
use crate::errors::DiscoveryError;

/// A discovery protocol driven by the discovery loop.
///
/// `search` sends discovery requests, at most once per search interval;
/// `receive` drains pending replies without blocking and reports every new
/// gateway through `found`.
pub trait Searcher: Send {
    fn search(&mut self) -> Result<(), DiscoveryError>;

    fn receive(&mut self, found: &mut dyn FnMut(NatDevice)) -> Result<(), DiscoveryError>;
}

/// One non-blocking UDP socket per local address, and the time the next
/// search is allowed.
#[derive(Debug)]
pub struct SocketSet {
    sockets: Vec<UdpSocket>,
    next_search: Option<Instant>,
    interval: Duration,
}

impl SocketSet {
    /// Bind a socket to each address of `provider`.
    ///
    /// Addresses that cannot be bound are skipped. If the provider fails or
    /// nothing could be bound, a single socket on `0.0.0.0` is used instead.
    pub fn bind(provider: &dyn AddressProvider, interval: Duration) -> SocketSet {
        let mut sockets = Vec::new();
        match provider.unicast_addresses() {
            Ok(addresses) => {
                for ip in addresses {
                    match bind_socket(ip) {
                        Ok(socket) => sockets.push(socket),
                        Err(err) => warn!("cannot bind discovery socket on {}: {}", ip, err),
                    }
                }
            }
            Err(err) => warn!("cannot enumerate local addresses: {}", err),
        }

        if sockets.is_empty() {
            match bind_socket(IpAddr::V4(Ipv4Addr::UNSPECIFIED)) {
                Ok(socket) => sockets.push(socket),
                Err(err) => warn!("cannot bind fallback discovery socket: {}", err),
            }
        }

        SocketSet::from_sockets(sockets, interval)
    }

    pub(crate) fn from_sockets(sockets: Vec<UdpSocket>, interval: Duration) -> SocketSet {
        SocketSet {
            sockets,
            next_search: None,
            interval,
        }
    }

    pub fn sockets(&self) -> &[UdpSocket] {
        &self.sockets
    }

    /// Run `send` on every socket, unless the search interval has not
    /// elapsed yet.
    ///
    /// A failing socket does not stop the others; the first failure is
    /// returned once all sockets were tried.
    pub fn search<F>(&mut self, mut send: F) -> Result<(), DiscoveryError>
    where
        F: FnMut(&UdpSocket) -> io::Result<()>,
    {
        let now = Instant::now();
        if let Some(next) = self.next_search {
            if now < next {
                return Ok(());
            }
        }
        self.next_search = Some(now + self.interval);

        let mut first_error = None;
        for socket in &self.sockets {
            if let Err(err) = send(socket) {
                let local = local_addr(socket);
                warn!("search from {} failed: {}", local, err);
                first_error.get_or_insert(DiscoveryError::SendFailed(local, err));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Hand every pending datagram to `analyse` along with the local address
    /// it arrived on and its sender.
    ///
    /// Datagrams longer than `max_size` are truncated. A failing socket does
    /// not stop the others; the first failure is returned once all sockets
    /// were drained.
    pub fn receive<F>(&self, max_size: usize, mut analyse: F) -> Result<(), DiscoveryError>
    where
        F: FnMut(IpAddr, &[u8], SocketAddr),
    {
        let mut buf = vec![0u8; max_size];
        let mut first_error = None;
        for socket in &self.sockets {
            let local = local_addr(socket);
            loop {
                match socket.recv_from(&mut buf) {
                    Ok((n, from)) => analyse(local.ip(), &buf[..n], from),
                    Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => break,
                    Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        warn!("receive on {} failed: {}", local, err);
                        first_error.get_or_insert(DiscoveryError::ReceiveFailed(local, err));
                        break;
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn bind_socket(ip: IpAddr) -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind(SocketAddr::new(ip, 0))?;
    socket.set_nonblocking(true)?;
    socket.set_broadcast(true)?;
    debug!("discovery socket bound on {}", socket.local_addr()?);
    Ok(socket)
}

fn local_addr(socket: &UdpSocket) -> SocketAddr {
    socket
        .local_addr()
        .unwrap_or_else(|_| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))
}
