// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 fedgate maintainers

//! Network utilities for the router connection.
//!
//! Resolution of the configured router address (symbolic names included)
//! and socket option application. Resolution failures surface as
//! configuration errors from [`Gateway::connect`].
//!
//! [`Gateway::connect`]: crate::gateway::Gateway::connect

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use socket2::SockRef;

use crate::config::WanConfig;
use crate::error::GatewayError;

/// Resolve the configured router address to a connectable endpoint.
///
/// Accepts literal `ip:port` strings or symbolic `host:port` names. When a
/// name resolves to several addresses, IPv4 is preferred for compatibility
/// with routers bound to v4 wildcard addresses.
pub fn resolve_router(address: &str) -> Result<SocketAddr, GatewayError> {
    let candidates: Vec<SocketAddr> = address
        .to_socket_addrs()
        .map_err(|e| GatewayError::BadAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?
        .collect();

    candidates
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| GatewayError::BadAddress {
            address: address.to_string(),
            reason: "name resolved to no addresses".to_string(),
        })
}

/// Open the TCP connection to the WAN router and apply socket options.
pub fn open_router_stream(addr: SocketAddr, config: &WanConfig) -> io::Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&addr, config.connect_timeout)?;
    stream.set_nodelay(config.nodelay)?;

    let sock = SockRef::from(&stream);
    if config.socket_send_buffer > 0 {
        sock.set_send_buffer_size(config.socket_send_buffer)?;
    }
    if config.socket_recv_buffer > 0 {
        sock.set_recv_buffer_size(config.socket_recv_buffer)?;
    }

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_literal_address() {
        let addr = resolve_router("127.0.0.1:23114").unwrap();
        assert_eq!(addr, "127.0.0.1:23114".parse().unwrap());
    }

    #[test]
    fn test_resolve_symbolic_name() {
        let addr = resolve_router("localhost:23114").unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 23114);
    }

    #[test]
    fn test_resolve_prefers_ipv4() {
        // localhost commonly resolves to both ::1 and 127.0.0.1
        let addr = resolve_router("localhost:9000").unwrap();
        if addr.is_ipv6() {
            // environment is v6-only; nothing more to assert
            return;
        }
        assert!(addr.is_ipv4());
    }

    #[test]
    fn test_resolve_rejects_garbage() {
        let err = resolve_router("not a router address").unwrap_err();
        assert!(matches!(err, GatewayError::BadAddress { .. }));

        let err = resolve_router("").unwrap_err();
        assert!(matches!(err, GatewayError::BadAddress { .. }));
    }

    #[test]
    fn test_open_stream_applies_buffer_options() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let config = WanConfig::for_router(addr.to_string()).with_socket_buffers(1 << 16, 1 << 16);
        let stream = open_router_stream(addr, &config).unwrap();

        // the kernel may round the values; just confirm the socket works
        assert!(stream.nodelay().unwrap());
        let sock = SockRef::from(&stream);
        assert!(sock.send_buffer_size().unwrap() > 0);
        assert!(sock.recv_buffer_size().unwrap() > 0);
    }

    #[test]
    fn test_connect_refused_surfaces_error() {
        // bind and drop to get a port that is very likely closed
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();

        let config = WanConfig::for_router(addr.to_string());
        assert!(open_router_stream(addr, &config).is_err());
    }
}
