// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    fmt,
    io::{Error, ErrorKind},
    time::Duration,
};

use futures_util::{sink::SinkExt as _, stream::StreamExt as _};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::{
    codec,
    frame::{rtu::*, *},
    slave::*,
    transaction::{TimeoutAction, TransactionManager},
};

/// Default per-request deadline before a submission is retried or given up
/// on; overridden with [`Client::set_timeout`].
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Modbus RTU client.
///
/// RTU ADUs carry no transaction id on the wire: the half-duplex serial line
/// only ever has one request outstanding, and a reply is matched against the
/// request by comparing headers (`verify_response_header`) rather than a
/// tid. A [`TransactionManager`] still tracks the submission purely to own
/// its retry/timeout lifecycle, the same way the TCP and TLS clients do, so
/// a silent device is retried instead of hanging forever.
#[derive(Debug)]
pub(crate) struct Client<T> {
    framed: Framed<T, codec::rtu::ClientCodec>,
    slave_id: SlaveId,
    transactions: TransactionManager,
    timeout: Duration,
    retries: u32,
}

impl<T> Client<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(transport: T, slave: Slave) -> Self {
        let framed = Framed::new(transport, codec::rtu::ClientCodec::default());
        let slave_id = slave.into();
        Self {
            framed,
            slave_id,
            transactions: TransactionManager::new(),
            timeout: DEFAULT_TIMEOUT,
            retries: 0,
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

    fn next_request_adu<R>(&self, req: R, disconnect: bool) -> RequestAdu
    where
        R: Into<RequestPdu>,
    {
        let slave_id = self.slave_id;
        let hdr = Header { slave_id };
        let pdu = req.into();
        RequestAdu {
            hdr,
            pdu,
            disconnect,
        }
    }

    async fn call(&mut self, req: Request) -> Result<Response, Error> {
        let disconnect = req == Request::Disconnect;
        let function_code = codec::req_to_fn_code(&req);
        let tid = self
            .transactions
            .submit(self.slave_id, function_code, self.retries);
        let req_adu = self.next_request_adu(req, disconnect);
        let req_hdr = req_adu.hdr;

        self.framed.read_buffer_mut().clear();
        self.framed.send(req_adu.clone()).await?;

        loop {
            let res_adu = match tokio::time::timeout(self.timeout, self.framed.next()).await {
                Ok(next) => next.unwrap_or_else(|| Err(Error::from(ErrorKind::BrokenPipe)))?,
                Err(_elapsed) => match self.transactions.on_timeout(tid) {
                    TimeoutAction::Retry => {
                        log::warn!("transaction {tid} timed out, retrying");
                        self.framed.send(req_adu.clone()).await?;
                        continue;
                    }
                    TimeoutAction::GiveUp => {
                        return Err(crate::error::Error::Timeout.into());
                    }
                },
            };

            self.transactions.cancel(tid);

            return match res_adu.pdu {
                ResponsePdu(Ok(res)) => verify_response_header(req_hdr, res_adu.hdr).and(Ok(res)),
                ResponsePdu(Err(err)) => Err(Error::new(ErrorKind::Other, err)),
            };
        }
    }
}

fn verify_response_header(req_hdr: Header, rsp_hdr: Header) -> Result<(), Error> {
    if req_hdr != rsp_hdr {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!(
                "Invalid response header: expected/request = {req_hdr:?}, actual/response = {rsp_hdr:?}"
            ),
        ));
    }
    Ok(())
}

impl<T> SlaveContext for Client<T> {
    fn set_slave(&mut self, slave: Slave) {
        self.slave_id = slave.into();
    }
}

#[async_trait::async_trait]
impl<T> crate::client::Client for Client<T>
where
    T: fmt::Debug + AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn call(&mut self, req: Request) -> Result<Response, Error> {
        self.call(req).await
    }

    fn set_timeout(&mut self, timeout: Duration) {
        Client::set_timeout(self, timeout);
    }

    fn set_retries(&mut self, retries: u32) {
        Client::set_retries(self, retries);
    }
}

#[cfg(test)]
mod tests {

    use core::{
        pin::Pin,
        task::{Context, Poll},
    };
    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf, Result};

    #[derive(Debug)]
    struct MockTransport;

    impl Unpin for MockTransport {}

    impl AsyncRead for MockTransport {
        fn poll_read(
            self: Pin<&mut Self>,
            _: &mut Context<'_>,
            _: &mut ReadBuf<'_>,
        ) -> Poll<Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for MockTransport {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<Result<usize>> {
            Poll::Ready(Ok(2))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<()>> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn handle_broken_pipe() {
        let transport = MockTransport;
        let mut client =
            crate::service::rtu::Client::new(transport, crate::service::rtu::Slave::broadcast());
        let res = client
            .call(crate::service::rtu::Request::ReadCoils(0x00, 5))
            .await;
        assert!(res.is_err());
        let err = res.err().unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    mod timeout_retry {
        use std::{cell::Cell, pin::Pin, task::Poll, time::Duration};

        use super::super::*;

        #[derive(Debug)]
        struct FlakyTransport {
            read_calls: Cell<u32>,
            response: &'static [u8],
        }

        impl Unpin for FlakyTransport {}

        impl AsyncRead for FlakyTransport {
            fn poll_read(
                self: Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                buf: &mut tokio::io::ReadBuf<'_>,
            ) -> Poll<std::io::Result<()>> {
                let call = self.read_calls.get();
                self.read_calls.set(call + 1);
                if call == 0 {
                    Poll::Pending
                } else {
                    buf.put_slice(self.response);
                    Poll::Ready(Ok(()))
                }
            }
        }

        impl AsyncWrite for FlakyTransport {
            fn poll_write(
                self: Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                buf: &[u8],
            ) -> Poll<std::io::Result<usize>> {
                Poll::Ready(Ok(buf.len()))
            }

            fn poll_flush(
                self: Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
            ) -> Poll<std::io::Result<()>> {
                Poll::Ready(Ok(()))
            }

            fn poll_shutdown(
                self: Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
            ) -> Poll<std::io::Result<()>> {
                Poll::Ready(Ok(()))
            }
        }

        #[tokio::test]
        async fn retransmits_once_after_a_timeout_then_succeeds() {
            let transport = FlakyTransport {
                read_calls: Cell::new(0),
                // slave 1, fn 0x03, byte count 4, data [0x0020, 0x0000], CRC
                response: &[0x01, 0x03, 0x04, 0x00, 0x20, 0x00, 0x00, 0xFB, 0xF9],
            };
            let mut client = Client::new(transport, Slave(1));
            client.set_timeout(Duration::from_millis(20));
            client.set_retries(1);

            let res = client
                .call(Request::ReadHoldingRegisters(0x00, 2))
                .await
                .unwrap();
            assert_eq!(res, Response::ReadHoldingRegisters(vec![0x0020, 0x0000]));
        }

        #[tokio::test]
        async fn gives_up_with_a_timeout_error_once_retries_are_exhausted() {
            let transport = FlakyTransport {
                read_calls: Cell::new(0),
                response: &[],
            };
            let mut client = Client::new(transport, Slave(1));
            client.set_timeout(Duration::from_millis(5));
            client.set_retries(0);

            let err = client
                .call(Request::ReadHoldingRegisters(0x00, 2))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TimedOut);
        }
    }
}
