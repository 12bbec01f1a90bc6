// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP-over-TLS server: the same MBAP ADU codec as `server::tcp`,
//! accepted over a `rustls` server connection.

use crate::{
    codec,
    frame::*,
    server::service::{NewService, Service},
};

use futures::{self, Future};
use futures_util::{future::FutureExt as _, sink::SinkExt as _, stream::StreamExt as _};
use pki_types::{CertificateDer, PrivateKeyDer};
use std::{
    fs::File,
    io::{self, BufReader, Error},
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::{rustls, TlsAcceptor};
use tokio_util::codec::Framed;

fn load_certs(path: &Path) -> io::Result<Vec<CertificateDer<'static>>> {
    rustls_pemfile::certs(&mut BufReader::new(File::open(path)?)).collect()
}

fn load_key(path: &Path) -> io::Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut BufReader::new(File::open(path)?))?
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no private key found"))
}

/// Server certificate/key pair used to accept incoming TLS connections.
#[derive(Debug, Clone)]
pub struct TlsServerConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

fn build_acceptor(config: &TlsServerConfig) -> io::Result<TlsAcceptor> {
    let certs = load_certs(&config.cert_path)?;
    let key = load_key(&config.key_path)?;
    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    Ok(TlsAcceptor::from(Arc::new(tls_config)))
}

#[derive(Debug, Clone)]
pub struct Server {
    socket_addr: SocketAddr,
    tls_config: TlsServerConfig,
}

impl Server {
    #[must_use]
    pub fn new(socket_addr: SocketAddr, tls_config: TlsServerConfig) -> Self {
        Self {
            socket_addr,
            tls_config,
        }
    }

    /// Start an async Modbus/TCP-over-TLS server task.
    pub async fn serve<S>(&self, service: S) -> Result<(), std::io::Error>
    where
        S: NewService<Request = SlaveRequest, Response = OptionalResponsePdu> + Send + Sync + 'static,
        S::Error: Into<Error>,
        S::Instance: Send + Sync + 'static,
    {
        let service = Arc::new(service);
        let acceptor = build_acceptor(&self.tls_config)?;
        let listener = TcpListener::bind(self.socket_addr).await?;

        loop {
            let (stream, _) = listener.accept().await?;
            let acceptor = acceptor.clone();
            let new_service = service.clone();

            tokio::spawn(Box::pin(async move {
                let stream = match acceptor.accept(stream).await {
                    Ok(stream) => stream,
                    Err(err) => {
                        log::warn!("TLS handshake failed: {err}");
                        return;
                    }
                };
                let framed = Framed::new(stream, codec::tcp::ServerCodec::default());
                let service = new_service.new_service().unwrap();
                if let Err(err) = process(framed, service).await {
                    log::warn!("TLS server connection error: {err:?}");
                }
            }));
        }
    }

    pub fn serve_until<S, Sd>(self, service: S, shutdown_signal: Sd)
    where
        S: NewService<Request = SlaveRequest, Response = OptionalResponsePdu> + Send + Sync + 'static,
        Sd: Future<Output = ()> + Sync + Send + Unpin + 'static,
        S::Error: Into<Error>,
        S::Instance: Send + Sync + 'static,
    {
        let shutdown_signal = shutdown_signal.fuse();
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_io()
            .build()
            .unwrap();

        rt.block_on(async {
            tokio::select! {
                res = self.serve(service) => if let Err(e) = res { log::error!("error: {e}") },
                _ = shutdown_signal => log::trace!("Shutdown signal received")
            }
        })
    }

    pub fn serve_forever<S>(self, service: S)
    where
        S: NewService<Request = SlaveRequest, Response = OptionalResponsePdu> + Send + Sync + 'static,
        S::Error: Into<Error>,
        S::Instance: Send + Sync + 'static,
    {
        self.serve_until(service, futures::future::pending())
    }
}

async fn process<S>(
    mut framed: Framed<tokio_rustls::server::TlsStream<TcpStream>, codec::tcp::ServerCodec>,
    service: S,
) -> io::Result<()>
where
    S: Service<Request = SlaveRequest, Response = OptionalResponsePdu> + Send + Sync + 'static,
    S::Error: Into<Error>,
{
    loop {
        let request = framed.next().await;
        let Some(request) = request else {
            break;
        };
        let request = request?;
        let hdr = request.hdr;
        let response = service.call(request.into()).await.map_err(Into::into)?;

        match response.0 {
            Some(pdu) => {
                framed.send(tcp::ResponseAdu { hdr, pdu }).await?;
            }
            None => {
                log::debug!("no response for request {hdr:?} (broadcast or dropped)");
            }
        }
    }
    Ok(())
}
