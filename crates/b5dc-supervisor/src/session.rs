// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! One datagram session with the B5DC server

use b5dc_config::DeviceEndpoint;
use b5dc_device::{connection_lost_pair, ConnectionLost, DeviceDriver, RegisterLink};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, info};

use crate::{SupervisorError, SupervisorResult};

/// A connected UDP socket and the register link running over it
///
/// Owned by the connection supervisor; never shared.
pub struct Session {
    socket: Arc<UdpSocket>,
    link: Arc<dyn RegisterLink>,
    lost: Option<ConnectionLost>,
    remote: SocketAddr,
}

impl Session {
    /// Bind a local socket and connect it to `endpoint`
    ///
    /// Completes once the local side is bound and connected; whether the
    /// device answers is only discovered by the first register access.
    ///
    /// # Errors
    /// * `SupervisorError::Transport` - Resolution, bind or connect failed
    pub async fn establish(
        endpoint: &DeviceEndpoint,
        driver: &dyn DeviceDriver,
    ) -> SupervisorResult<Self> {
        let remote = lookup_host(endpoint.as_socket_target())
            .await?
            .next()
            .ok_or_else(|| {
                SupervisorError::Transport(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("No address found for B5DC server {}", endpoint),
                ))
            })?;

        let local = if remote.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;
        debug!(
            target: "b5dc-supervisor",
            "Bound {} for B5DC server {}",
            socket.local_addr()?,
            remote
        );

        let socket = Arc::new(socket);
        let (notifier, lost) = connection_lost_pair();
        let link = driver.open_link(Arc::clone(&socket), notifier);

        Ok(Self {
            socket,
            link,
            lost: Some(lost),
            remote,
        })
    }

    pub fn link(&self) -> Arc<dyn RegisterLink> {
        Arc::clone(&self.link)
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Resolve when the register link signals connection loss
    ///
    /// The signal fires once per session; later calls never resolve.
    pub async fn connection_lost(&mut self) {
        match self.lost.take() {
            Some(lost) => lost.wait().await,
            None => std::future::pending().await,
        }
    }

    /// Release the socket
    pub fn close(self) {
        info!(target: "b5dc-supervisor", "Closing B5DC session with {}", self.remote);
        drop(self.link);
        drop(self.socket);
    }
}
