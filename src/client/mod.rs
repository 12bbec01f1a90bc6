// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(feature = "rtu")]
pub mod rtu;

#[cfg(feature = "sync")]
pub mod sync;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "tls")]
pub mod tls;

pub mod util;

use std::io::{Error, ErrorKind};

use crate::frame::*;
use crate::slave::*;

/// A transport independent asynchronous client trait.
#[async_trait::async_trait]
pub trait Client: SlaveContext {
    async fn call(&mut self, request: Request) -> Result<Response, Error>;

    /// Override the per-request deadline before a submission is retried or
    /// given up on. Transports that do not track outstanding transactions
    /// ignore this.
    fn set_timeout(&mut self, _timeout: std::time::Duration) {}

    /// Override the retransmission budget for each request.
    fn set_retries(&mut self, _retries: u32) {}
}

/// An asynchronous Modbus reader.
#[async_trait::async_trait]
pub trait Reader: Client {
    async fn read_coils(&mut self, _: Address, _: Quantity) -> Result<Vec<Coil>, Error>;

    async fn read_discrete_inputs(&mut self, _: Address, _: Quantity) -> Result<Vec<Coil>, Error>;

    async fn read_input_registers(&mut self, _: Address, _: Quantity) -> Result<Vec<Word>, Error>;

    async fn read_holding_registers(
        &mut self,
        _: Address,
        _: Quantity,
    ) -> Result<Vec<Word>, Error>;

    async fn read_write_multiple_registers(
        &mut self,
        _: Address,
        _: Quantity,
        _: Address,
        _: &[Word],
    ) -> Result<Vec<Word>, Error>;
}

/// An asynchronous Modbus writer.
#[async_trait::async_trait]
pub trait Writer: Client {
    async fn write_single_coil(&mut self, _: Address, _: Coil) -> Result<(), Error>;

    async fn write_multiple_coils(&mut self, _: Address, _: &[Coil]) -> Result<(), Error>;

    async fn write_single_register(&mut self, _: Address, _: Word) -> Result<(), Error>;

    async fn write_multiple_registers(&mut self, _: Address, _: &[Word]) -> Result<(), Error>;
}

/// An asynchronous Modbus client context.
///
/// Wraps a transport-specific [`Client`] (TCP, TLS, RTU/ASCII/Binary) behind
/// a single transport-agnostic surface so callers do not need to know which
/// framing is underneath.
#[derive(Debug)]
pub struct Context {
    client: Box<dyn Client>,
}

impl Context {
    /// Override the per-request deadline used by the underlying transport.
    pub fn set_timeout(&mut self, timeout: std::time::Duration) {
        self.client.set_timeout(timeout);
    }

    /// Override the retransmission budget used by the underlying transport.
    pub fn set_retries(&mut self, retries: u32) {
        self.client.set_retries(retries);
    }

    /// Gracefully release the underlying transport. The poison-pill
    /// [`Request::Disconnect`] is expected to fail: the framer's `Encoder`
    /// turns it into a `NotConnected`/`BrokenPipe` I/O error rather than
    /// ever going on the wire, which this method treats as success.
    pub async fn disconnect(&mut self) -> Result<(), Error> {
        match self.client.call(Request::Disconnect).await {
            Ok(_) => unreachable!("Request::Disconnect never yields a response"),
            Err(err) => match err.kind() {
                ErrorKind::NotConnected | ErrorKind::BrokenPipe => Ok(()),
                _ => Err(err),
            },
        }
    }
}

impl From<Box<dyn Client>> for Context {
    fn from(client: Box<dyn Client>) -> Self {
        Self { client }
    }
}

impl From<Context> for Box<dyn Client> {
    fn from(context: Context) -> Self {
        context.client
    }
}

#[async_trait::async_trait]
impl Client for Context {
    async fn call(&mut self, request: Request) -> Result<Response, Error> {
        self.client.call(request).await
    }
}

impl SlaveContext for Context {
    fn set_slave(&mut self, slave: Slave) {
        self.client.set_slave(slave);
    }
}

#[async_trait::async_trait]
impl Reader for Context {
    async fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>, Error> {
        let rsp = self.client.call(Request::ReadCoils(addr, cnt)).await?;
        if let Response::ReadCoils(mut coils) = rsp {
            debug_assert!(coils.len() >= cnt as usize);
            coils.truncate(cnt as usize);
            Ok(coils)
        } else {
            Err(Error::new(ErrorKind::InvalidData, "unexpected response"))
        }
    }

    async fn read_discrete_inputs(
        &mut self,
        addr: Address,
        cnt: Quantity,
    ) -> Result<Vec<Coil>, Error> {
        let rsp = self
            .client
            .call(Request::ReadDiscreteInputs(addr, cnt))
            .await?;
        if let Response::ReadDiscreteInputs(mut coils) = rsp {
            debug_assert!(coils.len() >= cnt as usize);
            coils.truncate(cnt as usize);
            Ok(coils)
        } else {
            Err(Error::new(ErrorKind::InvalidData, "unexpected response"))
        }
    }

    async fn read_input_registers(
        &mut self,
        addr: Address,
        cnt: Quantity,
    ) -> Result<Vec<Word>, Error> {
        let rsp = self
            .client
            .call(Request::ReadInputRegisters(addr, cnt))
            .await?;
        if let Response::ReadInputRegisters(rsp) = rsp {
            if rsp.len() != cnt as usize {
                return Err(Error::new(ErrorKind::InvalidData, "invalid response"));
            }
            Ok(rsp)
        } else {
            Err(Error::new(ErrorKind::InvalidData, "unexpected response"))
        }
    }

    async fn read_holding_registers(
        &mut self,
        addr: Address,
        cnt: Quantity,
    ) -> Result<Vec<Word>, Error> {
        let rsp = self
            .client
            .call(Request::ReadHoldingRegisters(addr, cnt))
            .await?;
        if let Response::ReadHoldingRegisters(rsp) = rsp {
            if rsp.len() != cnt as usize {
                return Err(Error::new(ErrorKind::InvalidData, "invalid response"));
            }
            Ok(rsp)
        } else {
            Err(Error::new(ErrorKind::InvalidData, "unexpected response"))
        }
    }

    async fn read_write_multiple_registers(
        &mut self,
        read_addr: Address,
        read_cnt: Quantity,
        write_addr: Address,
        write_data: &[Word],
    ) -> Result<Vec<Word>, Error> {
        let rsp = self
            .client
            .call(Request::ReadWriteMultipleRegisters(
                read_addr,
                read_cnt,
                write_addr,
                write_data.to_vec(),
            ))
            .await?;
        if let Response::ReadWriteMultipleRegisters(rsp) = rsp {
            if rsp.len() != read_cnt as usize {
                return Err(Error::new(ErrorKind::InvalidData, "invalid response"));
            }
            Ok(rsp)
        } else {
            Err(Error::new(ErrorKind::InvalidData, "unexpected response"))
        }
    }
}

#[async_trait::async_trait]
impl Writer for Context {
    async fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<(), Error> {
        let rsp = self
            .client
            .call(Request::WriteSingleCoil(addr, coil))
            .await?;
        if let Response::WriteSingleCoil(rsp_addr, _) = rsp {
            if rsp_addr != addr {
                return Err(Error::new(ErrorKind::InvalidData, "invalid response"));
            }
            Ok(())
        } else {
            Err(Error::new(ErrorKind::InvalidData, "unexpected response"))
        }
    }

    async fn write_multiple_coils(&mut self, addr: Address, coils: &[Coil]) -> Result<(), Error> {
        let cnt = coils.len();
        let rsp = self
            .client
            .call(Request::WriteMultipleCoils(addr, coils.to_vec()))
            .await?;
        if let Response::WriteMultipleCoils(rsp_addr, rsp_cnt) = rsp {
            if rsp_addr != addr || rsp_cnt as usize != cnt {
                return Err(Error::new(ErrorKind::InvalidData, "invalid response"));
            }
            Ok(())
        } else {
            Err(Error::new(ErrorKind::InvalidData, "unexpected response"))
        }
    }

    async fn write_single_register(&mut self, addr: Address, data: Word) -> Result<(), Error> {
        let rsp = self
            .client
            .call(Request::WriteSingleRegister(addr, data))
            .await?;
        if let Response::WriteSingleRegister(rsp_addr, rsp_word) = rsp {
            if rsp_addr != addr || rsp_word != data {
                return Err(Error::new(ErrorKind::InvalidData, "invalid response"));
            }
            Ok(())
        } else {
            Err(Error::new(ErrorKind::InvalidData, "unexpected response"))
        }
    }

    async fn write_multiple_registers(&mut self, addr: Address, data: &[Word]) -> Result<(), Error> {
        let cnt = data.len();
        let rsp = self
            .client
            .call(Request::WriteMultipleRegisters(addr, data.to_vec()))
            .await?;
        if let Response::WriteMultipleRegisters(rsp_addr, rsp_cnt) = rsp {
            if rsp_addr != addr || rsp_cnt as usize != cnt {
                return Err(Error::new(ErrorKind::InvalidData, "invalid response"));
            }
            Ok(())
        } else {
            Err(Error::new(ErrorKind::InvalidData, "unexpected response"))
        }
    }
}

impl std::fmt::Debug for dyn Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn Client").finish_non_exhaustive()
    }
}
