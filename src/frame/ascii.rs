// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ASCII framing shares RTU's single-byte slave addressing, just encoded in
//! hex with an LRC trailer instead of a binary CRC. The ADU shape is
//! identical, so it is reused rather than duplicated.

pub use super::rtu::{Header, RequestAdu, ResponseAdu};
