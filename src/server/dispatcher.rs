// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes a decoded request to a [`Datastore`] and turns the outcome into a
//! response or exception PDU, including unit-id routing and broadcast
//! turnaround.

use std::{
    collections::HashMap,
    future::Future,
    io,
    pin::Pin,
    sync::Arc,
};

use tokio::sync::Mutex;

use crate::{
    datastore::{Datastore, DatastoreError, Space, Value},
    frame::*,
    server::service::{NewService, Service},
    slave::{Slave, SlaveId},
};

type CustomHandler =
    Box<dyn Fn(FunctionCode, &[u8]) -> Result<Vec<u8>, Exception> + Send + Sync>;

/// A `Service`/`NewService` implementation backed by a single shared
/// [`Datastore`]. One [`Dispatcher`] is handed to `server::tcp::Server`/
/// `server::rtu::Server`; `new_service` clones its `Arc`s so every
/// connection shares the same underlying register map.
pub struct Dispatcher<D> {
    datastore: Arc<Mutex<D>>,
    unit_ids: Option<Vec<SlaveId>>,
    ignore_missing_slaves: bool,
    custom: Arc<HashMap<FunctionCode, CustomHandler>>,
}

impl<D> std::fmt::Debug for Dispatcher<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("unit_ids", &self.unit_ids)
            .field("ignore_missing_slaves", &self.ignore_missing_slaves)
            .field("custom_function_codes", &self.custom.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<D> Clone for Dispatcher<D> {
    fn clone(&self) -> Self {
        Self {
            datastore: Arc::clone(&self.datastore),
            unit_ids: self.unit_ids.clone(),
            ignore_missing_slaves: self.ignore_missing_slaves,
            custom: Arc::clone(&self.custom),
        }
    }
}

impl<D> Dispatcher<D>
where
    D: Datastore + Send + 'static,
{
    #[must_use]
    pub fn new(datastore: D) -> Self {
        Self {
            datastore: Arc::new(Mutex::new(datastore)),
            unit_ids: None,
            ignore_missing_slaves: false,
            custom: Arc::new(HashMap::new()),
        }
    }

    /// Restrict the unit ids this dispatcher answers for. By default every
    /// unit id is accepted (a single-slave gateway, the common case).
    #[must_use]
    pub fn with_unit_ids(mut self, unit_ids: Vec<SlaveId>) -> Self {
        self.unit_ids = Some(unit_ids);
        self
    }

    /// Drop requests for an unrecognized unit id silently instead of
    /// answering `GATEWAY_PATH_UNAVAILABLE`. Serial multi-drop gateways
    /// typically want this on.
    #[must_use]
    pub fn ignore_missing_slaves(mut self, ignore: bool) -> Self {
        self.ignore_missing_slaves = ignore;
        self
    }

    /// Register a handler for a vendor-specific function code (`Request::Custom`).
    /// Panics if called after this `Dispatcher` has been cloned for a
    /// connection, since the underlying registry is then shared.
    #[must_use]
    pub fn register_custom_function<F>(mut self, code: FunctionCode, handler: F) -> Self
    where
        F: Fn(FunctionCode, &[u8]) -> Result<Vec<u8>, Exception> + Send + Sync + 'static,
    {
        Arc::get_mut(&mut self.custom)
            .expect("register_custom_function called after the dispatcher was shared")
            .insert(code, Box::new(handler));
        self
    }

    fn accepts(&self, unit_id: SlaveId) -> bool {
        match &self.unit_ids {
            None => true,
            Some(ids) => ids.contains(&unit_id),
        }
    }
}

impl<D> Service for Dispatcher<D>
where
    D: Datastore + Send + 'static,
{
    type Request = SlaveRequest;
    type Response = OptionalResponsePdu;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = Result<OptionalResponsePdu, io::Error>> + Send + Sync>>;

    fn call(&self, req: SlaveRequest) -> Self::Future {
        let SlaveRequest { slave_id, request } = req;
        let function = crate::codec::req_to_fn_code(&request);
        let is_broadcast = Slave(slave_id).is_broadcast();

        if !self.accepts(slave_id) {
            return if self.ignore_missing_slaves || is_broadcast {
                Box::pin(std::future::ready(Ok(OptionalResponsePdu(None))))
            } else {
                Box::pin(std::future::ready(Ok(OptionalResponsePdu(Some(
                    ResponsePdu(Err(ExceptionResponse {
                        function,
                        exception: Exception::GatewayPathUnavailable,
                    })),
                )))))
            };
        }

        let datastore = Arc::clone(&self.datastore);
        let custom = Arc::clone(&self.custom);
        Box::pin(async move {
            let outcome = dispatch(&datastore, &custom, request).await;
            if is_broadcast {
                // A broadcast write was still applied above; the protocol
                // just never turns it around into a response.
                return Ok(OptionalResponsePdu(None));
            }
            let pdu = match outcome {
                Ok(response) => ResponsePdu(Ok(response)),
                Err(exception) => ResponsePdu(Err(ExceptionResponse { function, exception })),
            };
            Ok(OptionalResponsePdu(Some(pdu)))
        })
    }
}

impl<D> NewService for Dispatcher<D>
where
    D: Datastore + Send + 'static,
{
    type Request = SlaveRequest;
    type Response = OptionalResponsePdu;
    type Error = io::Error;
    type Instance = Dispatcher<D>;

    fn new_service(&self) -> io::Result<Self::Instance> {
        Ok(self.clone())
    }
}

async fn dispatch<D: Datastore>(
    datastore: &Mutex<D>,
    custom: &HashMap<FunctionCode, CustomHandler>,
    request: Request,
) -> Result<Response, Exception> {
    if let Request::Custom(code, data) = &request {
        return match custom.get(code) {
            Some(handler) => handler(*code, data).map(|bytes| Response::Custom(*code, bytes)),
            None => Err(Exception::IllegalFunction),
        };
    }
    let mut store = datastore.lock().await;
    dispatch_datastore(&mut *store, request)
}

fn dispatch_datastore<D: Datastore>(store: &mut D, request: Request) -> Result<Response, Exception> {
    match request {
        Request::ReadCoils(addr, cnt) => {
            read_bits(store, Space::Coils, addr, cnt).map(Response::ReadCoils)
        }
        Request::ReadDiscreteInputs(addr, cnt) => {
            read_bits(store, Space::DiscreteInputs, addr, cnt).map(Response::ReadDiscreteInputs)
        }
        Request::ReadHoldingRegisters(addr, cnt) => {
            read_words(store, Space::HoldingRegisters, addr, cnt).map(Response::ReadHoldingRegisters)
        }
        Request::ReadInputRegisters(addr, cnt) => {
            read_words(store, Space::InputRegisters, addr, cnt).map(Response::ReadInputRegisters)
        }
        Request::WriteSingleCoil(addr, value) => {
            store
                .set(Space::Coils, addr, &[Value::Bit(value)])
                .map_err(map_datastore_err)?;
            Ok(Response::WriteSingleCoil(addr, value))
        }
        Request::WriteSingleRegister(addr, value) => {
            store
                .set(Space::HoldingRegisters, addr, &[Value::Word(value)])
                .map_err(map_datastore_err)?;
            Ok(Response::WriteSingleRegister(addr, value))
        }
        Request::WriteMultipleCoils(addr, values) => {
            let cnt = u16::try_from(values.len()).unwrap_or(u16::MAX);
            let values: Vec<Value> = values.into_iter().map(Value::Bit).collect();
            store.set(Space::Coils, addr, &values).map_err(map_datastore_err)?;
            Ok(Response::WriteMultipleCoils(addr, cnt))
        }
        Request::WriteMultipleRegisters(addr, values) => {
            let cnt = u16::try_from(values.len()).unwrap_or(u16::MAX);
            let values: Vec<Value> = values.into_iter().map(Value::Word).collect();
            store
                .set(Space::HoldingRegisters, addr, &values)
                .map_err(map_datastore_err)?;
            Ok(Response::WriteMultipleRegisters(addr, cnt))
        }
        Request::ReadWriteMultipleRegisters(read_addr, read_cnt, write_addr, write_values) => {
            let to_write: Vec<Value> = write_values.into_iter().map(Value::Word).collect();
            store
                .set(Space::HoldingRegisters, write_addr, &to_write)
                .map_err(map_datastore_err)?;
            let read = read_words(store, Space::HoldingRegisters, read_addr, read_cnt)?;
            Ok(Response::ReadWriteMultipleRegisters(read))
        }
        Request::MaskWriteRegister(addr, and_mask, or_mask) => {
            let current = read_words(store, Space::HoldingRegisters, addr, 1)?[0];
            let updated = (current & and_mask) | (or_mask & !and_mask);
            store
                .set(Space::HoldingRegisters, addr, &[Value::Word(updated)])
                .map_err(map_datastore_err)?;
            Ok(Response::MaskWriteRegister(addr, and_mask, or_mask))
        }
        Request::ReadFifoQueue(addr) => {
            let values = read_words(store, Space::HoldingRegisters, addr, 1)?;
            Ok(Response::ReadFifoQueue(values))
        }
        Request::ReadExceptionStatus => Ok(Response::ReadExceptionStatus(0)),
        Request::Diagnostics(sub_function, data) => Ok(Response::Diagnostics(sub_function, data)),
        Request::GetCommEventCounter => Ok(Response::GetCommEventCounter(0, 0)),
        Request::GetCommEventLog => Ok(Response::GetCommEventLog(0, 0, 0, Vec::new())),
        Request::ReportSlaveId => Ok(Response::ReportSlaveId(vec![0x01, 0xFF], true)),
        Request::ReadDeviceIdentification(..) => Ok(Response::ReadDeviceIdentification {
            conformity_level: 0x01,
            more_follows: false,
            next_object_id: 0,
            objects: Vec::new(),
        }),
        Request::ReadFileRecord(refs) => {
            let results = refs.iter().map(|_| Vec::new()).collect();
            Ok(Response::ReadFileRecord(results))
        }
        Request::WriteFileRecord(refs, data) => Ok(Response::WriteFileRecord(refs, data)),
        Request::Custom(..) => unreachable!("handled before taking the datastore lock"),
        Request::Disconnect => unreachable!("intercepted by the transport loop"),
    }
}

fn map_datastore_err(err: DatastoreError) -> Exception {
    match err {
        DatastoreError::Unmapped { .. } => Exception::IllegalDataAddress,
        DatastoreError::ReadOnly { .. } => Exception::IllegalFunction,
    }
}

fn read_bits<D: Datastore>(
    store: &D,
    space: Space,
    addr: u16,
    cnt: u16,
) -> Result<Vec<bool>, Exception> {
    let values = store.get(space, addr, cnt).map_err(map_datastore_err)?;
    Ok(values.into_iter().map(|v| v.as_bit().unwrap_or(false)).collect())
}

fn read_words<D: Datastore>(
    store: &D,
    space: Space,
    addr: u16,
    cnt: u16,
) -> Result<Vec<u16>, Exception> {
    let values = store.get(space, addr, cnt).map_err(map_datastore_err)?;
    Ok(values.into_iter().map(|v| v.as_word().unwrap_or(0)).collect())
}
