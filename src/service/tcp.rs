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
    frame::{tcp::*, *},
    slave::*,
    transaction::{MatchOutcome, TimeoutAction, TransactionManager},
};

/// Default per-request deadline before a submission is retried or given up
/// on; overridden with [`Client::set_timeout`].
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Modbus TCP (MBAP) client.
///
/// A single `&mut self` call can only have one request in flight at a time,
/// but the transaction id is still correlated through a
/// [`TransactionManager`] rather than compared positionally, so a stale or
/// duplicate response (e.g. left over from a previous aborted call) is
/// detected and dropped instead of silently matched. The manager also owns
/// the retry/timeout lifecycle: each submission arms a deadline, and a
/// timeout retransmits the same ADU until the retry budget is exhausted.
#[derive(Debug)]
pub(crate) struct Client<T> {
    framed: Framed<T, codec::tcp::ClientCodec>,
    unit_id: UnitId,
    transactions: TransactionManager,
    timeout: Duration,
    retries: u32,
}

impl<T> Client<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(transport: T, slave: Slave) -> Self {
        let framed = Framed::new(transport, codec::tcp::ClientCodec::default());
        let unit_id: UnitId = slave.into();
        Self {
            framed,
            unit_id,
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
            self.framed.send(req_adu).await?;
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

        self.framed.read_buffer_mut().clear();
        self.framed.send(req_adu.clone()).await?;

        loop {
            let res_adu = match tokio::time::timeout(self.timeout, self.framed.next()).await {
                Ok(next) => next.ok_or_else(Error::last_os_error)??,
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

            let response_fn_code = match &res_adu.pdu {
                ResponsePdu(Ok(res)) => codec::rsp_to_fn_code(res),
                ResponsePdu(Err(err)) => err.function | 0x80,
            };
            match self.transactions.on_response(
                res_adu.hdr.transaction_id,
                res_adu.hdr.unit_id,
                response_fn_code,
            ) {
                MatchOutcome::Stale => {
                    // Not the reply this call is waiting for; keep listening
                    // within the same deadline.
                    continue;
                }
                outcome => outcome.into_result()?,
            }

            return match res_adu.pdu {
                ResponsePdu(Ok(res)) => Ok(res),
                ResponsePdu(Err(err)) => Err(Error::new(ErrorKind::Other, err)),
            };
        }
    }
}

impl<T> SlaveContext for Client<T> {
    fn set_slave(&mut self, slave: Slave) {
        self.unit_id = slave.into();
    }
}

#[async_trait::async_trait]
impl<T> crate::client::Client for Client<T>
where
    T: fmt::Debug + AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn call(&mut self, req: Request) -> Result<Response, Error> {
        Client::call(self, req).await
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
    use std::{
        cell::Cell,
        pin::Pin,
        task::{Context, Poll},
    };

    use tokio::io::ReadBuf;

    use super::*;

    /// A transport whose first read never arrives in time for the test's
    /// short deadline, then succeeds on the retransmission.
    #[derive(Debug)]
    struct FlakyTransport {
        read_calls: Cell<u32>,
        response: &'static [u8],
    }

    impl Unpin for FlakyTransport {}

    impl AsyncRead for FlakyTransport {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
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
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn retransmits_once_after_a_timeout_then_succeeds() {
        let transport = FlakyTransport {
            read_calls: Cell::new(0),
            // tid=0, MBAP header for unit 1, PDU = ReadHoldingRegisters reply
            response: &[
                0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03, 0x04, 0x89, 0x02, 0x42, 0xC7,
            ],
        };
        let mut client = Client::new(transport, Slave(1));
        client.set_timeout(Duration::from_millis(20));
        client.set_retries(1);

        let res = client
            .call(Request::ReadHoldingRegisters(0x00, 2))
            .await
            .unwrap();
        assert_eq!(res, Response::ReadHoldingRegisters(vec![0x8902, 0x42C7]));
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
