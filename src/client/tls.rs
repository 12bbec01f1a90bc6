// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus/TCP-over-TLS client connections

use std::{io::Error, net::SocketAddr};

pub use crate::service::tls::TlsClientConfig;

use super::*;

/// Establish a direct TLS connection to a Modbus/TCP-over-TLS gateway.
pub async fn connect(socket_addr: SocketAddr, tls_config: &TlsClientConfig) -> Result<Context, Error> {
    connect_slave(socket_addr, Slave::tcp_device(), tls_config).await
}

/// Connect to a physical, broadcast, or custom Modbus device through a
/// Modbus/TCP-over-TLS gateway.
pub async fn connect_slave(
    socket_addr: SocketAddr,
    slave: Slave,
    tls_config: &TlsClientConfig,
) -> Result<Context, Error> {
    let client = crate::service::tls::connect_slave(socket_addr, slave, tls_config).await?;
    Ok(Context {
        client: Box::new(client),
    })
}
