// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! B5DC server endpoint parsing

use crate::{ConfigError, ConfigResult};
use std::fmt;

/// Remote B5DC server address as configured (`host:port`)
///
/// The host is kept unresolved; name resolution happens when the datagram
/// socket is connected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceEndpoint {
    pub host: String,
    pub port: u16,
}

impl DeviceEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse an endpoint in `host:port` form (`[v6addr]:port` for IPv6)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEndpoint` if the separator, the host or
    /// the port is missing or malformed.
    pub fn parse(endpoint: &str) -> ConfigResult<Self> {
        let invalid = |reason: &str| ConfigError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = endpoint
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;

        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid("host is empty"));
        }
        if host.contains(char::is_whitespace) {
            return Err(invalid("host contains whitespace"));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| invalid(&format!("port is not a valid u16 ({})", e)))?;
        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }

        Ok(Self::new(host, port))
    }

    /// `(host, port)` pair suitable for `ToSocketAddrs`
    pub fn as_socket_target(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_endpoint() {
        let endpoint = DeviceEndpoint::parse("127.0.0.1:10001").unwrap();
        assert_eq!(endpoint.host, "127.0.0.1");
        assert_eq!(endpoint.port, 10001);
        assert_eq!(endpoint.to_string(), "127.0.0.1:10001");
    }

    #[test]
    fn test_parse_hostname_and_ipv6() {
        let endpoint = DeviceEndpoint::parse("b5dc.local:5000").unwrap();
        assert_eq!(endpoint.as_socket_target(), ("b5dc.local", 5000));

        let endpoint = DeviceEndpoint::parse("[::1]:10001").unwrap();
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.to_string(), "[::1]:10001");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["127.0.0.1", ":10001", "127.0.0.1:", "127.0.0.1:port", "127.0.0.1:0", "a b:1"] {
            assert!(
                matches!(
                    DeviceEndpoint::parse(bad),
                    Err(ConfigError::InvalidEndpoint { .. })
                ),
                "expected '{}' to be rejected",
                bad
            );
        }
    }
}
