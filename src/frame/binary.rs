// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Binary framing shares RTU's single-byte slave addressing and its CRC-16,
//! just delimited by `{`/`}` with byte-doubling escapes instead of being
//! length-aware. The ADU shape is identical, so it is reused rather than
//! duplicated.

pub use super::rtu::{Header, RequestAdu, ResponseAdu};
