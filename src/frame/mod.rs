// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(feature = "rtu")]
pub mod ascii;

#[cfg(feature = "rtu")]
pub mod binary;

#[cfg(feature = "rtu")]
pub mod rtu;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "tls")]
pub mod tls;

use std::{error, fmt};

/// A Modbus function code is represented by an unsigned 8 bit integer.
pub type FunctionCode = u8;

/// A Modbus protocol address is represented by 16 bit from `0` to `65535`.
///
/// This *protocol address* uses 0-based indexing, while the *coil address* or
/// *register address* is often specified as a number with 1-based indexing.
/// Please consult the specification of your devices if 1-based coil/register
/// addresses need to be converted to 0-based protocol addresses by subtracting 1.
pub type Address = u16;

/// A Coil represents a single bit.
///
/// - `true` is equivalent to `ON`, `1` and `0xFF00`.
/// - `false` is equivalent to `OFF`, `0` and `0x0000`.
pub type Coil = bool;

/// Modbus uses 16 bit for its data items (big-endian representation).
pub type Word = u16;

/// Number of items to process (`0` - `65535`).
pub type Quantity = u16;

/// A reference into a Modbus file record, used by FC 20/21.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRecordRef {
    pub file_number: u16,
    pub record_number: u16,
    /// For requests: the number of registers to read/write.
    /// For the write response echo this mirrors the request.
    pub record_data: u16,
}

/// One logged event in a Get Comm Event Log response (FC 12).
pub type CommEvent = u8;

/// An MEI Read Device Identification object (FC 43/14): `(object_id, value)`.
pub type DeviceIdObject = (u8, Vec<u8>);

/// A request represents a message from the client (master) to the server (slave).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadCoils(Address, Quantity),
    ReadDiscreteInputs(Address, Quantity),
    WriteSingleCoil(Address, Coil),
    WriteMultipleCoils(Address, Vec<Coil>),
    ReadInputRegisters(Address, Quantity),
    ReadHoldingRegisters(Address, Quantity),
    WriteSingleRegister(Address, Word),
    WriteMultipleRegisters(Address, Vec<Word>),
    ReadWriteMultipleRegisters(Address, Quantity, Address, Vec<Word>),

    /// FC 7: Read Exception Status. Takes no parameters.
    ReadExceptionStatus,
    /// FC 8: Diagnostics. `(sub_function, data)`.
    Diagnostics(u16, u16),
    /// FC 11: Get Comm Event Counter. Takes no parameters.
    GetCommEventCounter,
    /// FC 12: Get Comm Event Log. Takes no parameters.
    GetCommEventLog,
    /// FC 17: Report Slave ID. Takes no parameters.
    ReportSlaveId,
    /// FC 20: Read File Record.
    ReadFileRecord(Vec<FileRecordRef>),
    /// FC 21: Write File Record.
    WriteFileRecord(Vec<FileRecordRef>, Vec<Word>),
    /// FC 22: Mask Write Register. `(addr, and_mask, or_mask)`.
    MaskWriteRegister(Address, u16, u16),
    /// FC 24: Read FIFO Queue. `(addr)`.
    ReadFifoQueue(Address),
    /// FC 43/14: Read Device Identification (MEI type 0x0E). `(read_device_id_code, object_id)`.
    ReadDeviceIdentification(u8, u8),

    Custom(FunctionCode, Vec<u8>),
    /// A poison pill for stopping the client service and to release
    /// the underlying transport, e.g. for disconnecting from an
    /// exclusively used serial port.
    Disconnect,
}

/// The data of a successfull request.
///
/// ReadCoils/ReadDiscreteInputs: The length of the result Vec is always a
/// multiple of 8. Only the values of the first bits/coils that have actually
/// been requested are defined. The value of the remaining bits depend on the
/// server implementation and those coils should be should be ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    ReadCoils(Vec<Coil>),
    ReadDiscreteInputs(Vec<Coil>),
    WriteSingleCoil(Address, Coil),
    WriteMultipleCoils(Address, Quantity),
    ReadInputRegisters(Vec<Word>),
    ReadHoldingRegisters(Vec<Word>),
    WriteSingleRegister(Address, Word),
    WriteMultipleRegisters(Address, Quantity),
    ReadWriteMultipleRegisters(Vec<Word>),

    /// FC 7: Read Exception Status.
    ReadExceptionStatus(u8),
    /// FC 8: Diagnostics, echoing `(sub_function, data)`.
    Diagnostics(u16, u16),
    /// FC 11: Get Comm Event Counter. `(status, event_count)`.
    GetCommEventCounter(u16, u16),
    /// FC 12: Get Comm Event Log. `(status, event_count, message_count, events)`.
    GetCommEventLog(u16, u16, u16, Vec<CommEvent>),
    /// FC 17: Report Slave ID. `(id_and_status_bytes, run_indicator_status)`.
    ReportSlaveId(Vec<u8>, bool),
    /// FC 20: Read File Record. One `Vec<Word>` of register data per requested sub-request.
    ReadFileRecord(Vec<Vec<Word>>),
    /// FC 21: Write File Record (echo of the request).
    WriteFileRecord(Vec<FileRecordRef>, Vec<Word>),
    /// FC 22: Mask Write Register (echo of the request).
    MaskWriteRegister(Address, u16, u16),
    /// FC 24: Read FIFO Queue.
    ReadFifoQueue(Vec<Word>),
    /// FC 43/14: Read Device Identification.
    ReadDeviceIdentification {
        conformity_level: u8,
        more_follows: bool,
        next_object_id: u8,
        objects: Vec<DeviceIdObject>,
    },

    Custom(FunctionCode, Vec<u8>),
}

/// A server (slave) exception, per the standard Modbus exception codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetDevice = 0x0B,
}

impl Exception {
    pub(crate) fn description(&self) -> &str {
        use crate::frame::Exception::*;

        match *self {
            IllegalFunction => "Illegal function",
            IllegalDataAddress => "Illegal data address",
            IllegalDataValue => "Illegal data value",
            ServerDeviceFailure => "Server device failure",
            Acknowledge => "Acknowledge",
            ServerDeviceBusy => "Server device busy",
            MemoryParityError => "Memory parity error",
            GatewayPathUnavailable => "Gateway path unavailable",
            GatewayTargetDevice => "Gateway target device failed to respond",
        }
    }

    pub(crate) fn code(self) -> u8 {
        self as u8
    }
}

/// A server (slave) exception response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: FunctionCode,
    pub exception: Exception,
}

/// Represents a message from the client (slave) to the server (master).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestPdu(pub(crate) Request);

impl From<Request> for RequestPdu {
    fn from(from: Request) -> Self {
        RequestPdu(from)
    }
}

impl From<RequestPdu> for Request {
    fn from(from: RequestPdu) -> Self {
        from.0
    }
}

/// Represents a message from the server (slave) to the client (master).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponsePdu(pub(crate) Result<Response, ExceptionResponse>);

impl From<Response> for ResponsePdu {
    fn from(from: Response) -> Self {
        ResponsePdu(Ok(from))
    }
}

impl From<ExceptionResponse> for ResponsePdu {
    fn from(from: ExceptionResponse) -> Self {
        ResponsePdu(Err(from))
    }
}

impl From<Result<Response, ExceptionResponse>> for ResponsePdu {
    fn from(from: Result<Response, ExceptionResponse>) -> Self {
        ResponsePdu(from.map(Into::into).map_err(Into::into))
    }
}

impl From<ResponsePdu> for Result<Response, ExceptionResponse> {
    fn from(from: ResponsePdu) -> Self {
        from.0
    }
}

/// A response that may be absent: a broadcast request (serial unit id `0`)
/// is never answered, so the server dispatcher signals "no response" rather
/// than constructing a `ResponsePdu` nobody asked for.
#[cfg(feature = "server")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalResponsePdu(pub(crate) Option<ResponsePdu>);

#[cfg(feature = "server")]
impl From<Response> for OptionalResponsePdu {
    fn from(from: Response) -> Self {
        Self(Some(from.into()))
    }
}

#[cfg(feature = "server")]
impl From<ExceptionResponse> for OptionalResponsePdu {
    fn from(from: ExceptionResponse) -> Self {
        Self(Some(from.into()))
    }
}

#[cfg(feature = "server")]
impl From<Result<Response, ExceptionResponse>> for OptionalResponsePdu {
    fn from(from: Result<Response, ExceptionResponse>) -> Self {
        Self(Some(from.into()))
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl error::Error for Exception {}

impl fmt::Display for ExceptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Modbus function {}: {}", self.function, self.exception)
    }
}

impl error::Error for ExceptionResponse {}

/// Addressable unit/slave identifying information, carried alongside a
/// decoded request on the server side. Owned, copied freely per the PDU
/// value-type convention used throughout this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveRequest {
    pub slave_id: crate::slave::SlaveId,
    pub request: Request,
}
