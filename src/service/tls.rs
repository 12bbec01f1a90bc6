// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus/TCP over TLS: the same MBAP ADU codec as the plain Socket
//! transport, driven over a `rustls` client connection instead of a bare
//! `TcpStream`. See `frame::tls` for why no additional framing is needed.

use std::{
    fs::File,
    io::{self, BufReader, Error, ErrorKind},
    net::SocketAddr,
    path::Path,
    sync::Arc,
    time::Duration,
};

use futures_util::{sink::SinkExt as _, stream::StreamExt as _};
use pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio::net::TcpStream;
use tokio_rustls::{rustls, TlsConnector};
use tokio_util::codec::Framed;

use crate::{
    client::Client,
    codec,
    frame::{tcp::*, *},
    slave::*,
    transaction::{MatchOutcome, TimeoutAction, TransactionManager},
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

fn load_certs(path: &Path) -> io::Result<Vec<CertificateDer<'static>>> {
    rustls_pemfile::certs(&mut BufReader::new(File::open(path)?)).collect()
}

fn load_key(path: &Path) -> io::Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut BufReader::new(File::open(path)?))?
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no private key found"))
}

/// Options needed to establish a client-side TLS connection: a CA bundle to
/// validate the server's certificate, and a client certificate/key pair for
/// mutual TLS (required by most field-deployed Modbus/TCP-over-TLS gateways).
#[derive(Debug, Clone)]
pub struct TlsClientConfig {
    pub ca_path: std::path::PathBuf,
    pub cert_path: std::path::PathBuf,
    pub key_path: std::path::PathBuf,
    pub domain: String,
}

fn build_connector(config: &TlsClientConfig) -> io::Result<TlsConnector> {
    let mut root_cert_store = rustls::RootCertStore::empty();
    let ca_certs = load_certs(&config.ca_path)?;
    for cert in ca_certs {
        root_cert_store
            .add(cert)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    }

    let certs = load_certs(&config.cert_path)?;
    let key = load_key(&config.key_path)?;

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_cert_store)
        .with_client_auth_cert(certs, key)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

    Ok(TlsConnector::from(Arc::new(tls_config)))
}

pub(crate) async fn connect_slave(
    socket_addr: SocketAddr,
    slave: Slave,
    tls_config: &TlsClientConfig,
) -> io::Result<Context> {
    let unit_id: UnitId = slave.into();
    let connector = build_connector(tls_config)?;
    let stream = TcpStream::connect(socket_addr).await?;
    let server_name = ServerName::try_from(tls_config.domain.clone())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid dnsname"))?;
    let service = connector.connect(server_name, stream).await?;
    let framed = Framed::new(service, codec::tcp::ClientCodec::default());
    Ok(Context::new(framed, unit_id))
}

/// A Modbus/TCP-over-TLS client context.
#[derive(Debug)]
pub(crate) struct Context {
    service: Framed<tokio_rustls::client::TlsStream<TcpStream>, codec::tcp::ClientCodec>,
    unit_id: UnitId,
    transactions: TransactionManager,
    timeout: Duration,
    retries: u32,
}

impl Context {
    fn new(
        service: Framed<tokio_rustls::client::TlsStream<TcpStream>, codec::tcp::ClientCodec>,
        unit_id: UnitId,
    ) -> Self {
        Self {
            service,
            unit_id,
            transactions: TransactionManager::new(),
            timeout: DEFAULT_TIMEOUT,
            retries: 0,
        }
    }

    pub(crate) async fn call(&mut self, req: Request) -> Result<Response, Error> {
        log::debug!("Call {:?}", req);
        if req == Request::Disconnect {
            let req_adu = RequestAdu {
                hdr: Header {
                    transaction_id: 0,
                    unit_id: self.unit_id,
                },
                pdu: req.into(),
                disconnect: true,
            };
            self.service.send(req_adu).await?;
            return Err(Error::from(ErrorKind::NotConnected));
        }

        let function_code = codec::req_to_fn_code(&req);
        let tid = self.transactions.submit(self.unit_id, function_code, self.retries);
        let req_adu = RequestAdu {
            hdr: Header {
                transaction_id: tid,
                unit_id: self.unit_id,
            },
            pdu: req.into(),
            disconnect: false,
        };

        self.service.send(req_adu.clone()).await?;

        loop {
            let res_adu = match tokio::time::timeout(self.timeout, self.service.next()).await {
                Ok(next) => next.ok_or_else(Error::last_os_error)??,
                Err(_elapsed) => match self.transactions.on_timeout(tid) {
                    TimeoutAction::Retry => {
                        log::warn!("transaction {tid} timed out, retrying");
                        self.service.send(req_adu.clone()).await?;
                        continue;
                    }
                    TimeoutAction::GiveUp => {
                        return Err(crate::error::Error::Timeout.into());
                    }
                },
            };

            let response_fn_code = match &res_adu.pdu {
                ResponsePdu(Ok(res)) => codec::rsp_to_fn_code(res),
                ResponsePdu(Err(err)) => err.function | 0x80,
            };
            match self.transactions.on_response(
                res_adu.hdr.transaction_id,
                res_adu.hdr.unit_id,
                response_fn_code,
            ) {
                MatchOutcome::Stale => continue,
                outcome => outcome.into_result()?,
            }

            return match res_adu.pdu {
                ResponsePdu(Ok(res)) => Ok(res),
                ResponsePdu(Err(err)) => Err(Error::new(ErrorKind::Other, err)),
            };
        }
    }

    /// Overrides the per-request deadline used by every subsequent call.
    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Overrides the retransmission budget used by every subsequent call.
    pub(crate) fn set_retries(&mut self, retries: u32) {
        self.retries = retries;
    }
}

impl SlaveContext for Context {
    fn set_slave(&mut self, slave: Slave) {
        self.unit_id = slave.into();
    }
}

#[async_trait::async_trait]
impl Client for Context {
    async fn call(&mut self, req: Request) -> Result<Response, Error> {
        Context::call(self, req).await
    }

    fn set_timeout(&mut self, timeout: Duration) {
        Context::set_timeout(self, timeout);
    }

    fn set_retries(&mut self, retries: u32) {
        Context::set_retries(self, retries);
    }
}
