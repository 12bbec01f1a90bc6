// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TLS ADU shape.
//!
//! The wire layout over TLS is the Socket/MBAP envelope unchanged: the TLS
//! record already provides integrity and confidentiality, so no additional
//! checksum or delimiter is layered on top. This module names the Socket
//! types for use by the TLS transport so `codec::tcp`'s `ClientCodec`/
//! `ServerCodec` can be driven directly over a `TlsStream`.

pub use super::tcp::{Header, RequestAdu, ResponseAdu, TransactionId, UnitId};
