// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The server-side register map: a narrow synchronous contract over the four
//! Modbus address spaces (coils, discrete inputs, holding registers, input
//! registers), plus two reference implementations.
//!
//! The dispatcher (`server::service`) performs exactly one `validate` and one
//! `get`/`set` per incoming frame and holds no other locks, so any
//! [`Datastore`] shared across connections only needs internal
//! synchronization at that granularity — a `Mutex<impl Datastore>` is
//! sufficient and is how `server::tcp`/`server::rtu` consume it.

use std::collections::HashMap;

/// One of the four address spaces a Modbus datastore exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Space {
    Coils,
    DiscreteInputs,
    HoldingRegisters,
    InputRegisters,
}

impl Space {
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(self, Space::Coils | Space::HoldingRegisters)
    }

    #[must_use]
    pub fn is_bit(self) -> bool {
        matches!(self, Space::Coils | Space::DiscreteInputs)
    }
}

/// A single value in either a bit space or a register space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Bit(bool),
    Word(u16),
}

impl Value {
    #[must_use]
    pub fn as_bit(self) -> Option<bool> {
        match self {
            Value::Bit(b) => Some(b),
            Value::Word(_) => None,
        }
    }

    #[must_use]
    pub fn as_word(self) -> Option<u16> {
        match self {
            Value::Word(w) => Some(w),
            Value::Bit(_) => None,
        }
    }
}

/// A failure raised by a [`Datastore`] operation. The dispatcher maps any
/// `Err` from `get`/`set` to a `SERVER_DEVICE_FAILURE` exception and any
/// out-of-range `validate` result to `ILLEGAL_DATA_ADDRESS` before the
/// operation is even attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatastoreError {
    #[error("address {address} in {space:?} is not mapped")]
    Unmapped { space: Space, address: u16 },
    #[error("{space:?} is read-only")]
    ReadOnly { space: Space },
}

/// The narrow contract the dispatcher calls to read and write register
/// state. Implementations need not be `Send`/`Sync` themselves; the server
/// wraps a shared datastore in a `Mutex` at the call site.
pub trait Datastore {
    /// Whether `count` consecutive values starting at `address` lie within
    /// this datastore's declared extent for `space`. This governs
    /// `ILLEGAL_DATA_ADDRESS`; it does not guarantee every address in the
    /// range is individually mapped (a sparse implementation may still
    /// reject an unmapped read inside a valid range via `get`).
    fn validate(&self, space: Space, address: u16, count: u16) -> bool;

    /// Read `count` consecutive values starting at `address`.
    fn get(&self, space: Space, address: u16, count: u16) -> Result<Vec<Value>, DatastoreError>;

    /// Overwrite `count` consecutive values starting at `address`.
    fn set(&mut self, space: Space, address: u16, values: &[Value]) -> Result<(), DatastoreError>;

    /// The inclusive `(min, max)` address bounds this datastore declares for
    /// `space`, if any. Used by introspection and by sparse implementations
    /// to report their mapped extent; a contiguous datastore derives this
    /// from its block length.
    fn address_bounds(&self, space: Space) -> Option<(u16, u16)>;
}

/// A contiguous, zero-initialized block of `len` values for one address
/// space, addressed `0..len`.
#[derive(Debug, Clone)]
struct SequentialBlock {
    values: Vec<Value>,
}

impl SequentialBlock {
    fn new(len: u16, fill: Value) -> Self {
        Self {
            values: vec![fill; usize::from(len)],
        }
    }
}

/// A reference [`Datastore`] backed by four contiguous, zero-default
/// vectors — the shape most PLC/RTU simulators use, and the simplest
/// correct implementation of the interface.
#[derive(Debug, Clone)]
pub struct SequentialTable {
    coils: SequentialBlock,
    discrete_inputs: SequentialBlock,
    holding_registers: SequentialBlock,
    input_registers: SequentialBlock,
}

impl SequentialTable {
    #[must_use]
    pub fn new(coils: u16, discrete_inputs: u16, holding_registers: u16, input_registers: u16) -> Self {
        Self {
            coils: SequentialBlock::new(coils, Value::Bit(false)),
            discrete_inputs: SequentialBlock::new(discrete_inputs, Value::Bit(false)),
            holding_registers: SequentialBlock::new(holding_registers, Value::Word(0)),
            input_registers: SequentialBlock::new(input_registers, Value::Word(0)),
        }
    }

    fn block(&self, space: Space) -> &SequentialBlock {
        match space {
            Space::Coils => &self.coils,
            Space::DiscreteInputs => &self.discrete_inputs,
            Space::HoldingRegisters => &self.holding_registers,
            Space::InputRegisters => &self.input_registers,
        }
    }

    fn block_mut(&mut self, space: Space) -> &mut SequentialBlock {
        match space {
            Space::Coils => &mut self.coils,
            Space::DiscreteInputs => &mut self.discrete_inputs,
            Space::HoldingRegisters => &mut self.holding_registers,
            Space::InputRegisters => &mut self.input_registers,
        }
    }
}

impl Datastore for SequentialTable {
    fn validate(&self, space: Space, address: u16, count: u16) -> bool {
        if count == 0 {
            return false;
        }
        let len = self.block(space).values.len();
        let Some(end) = address.checked_add(count) else {
            return false;
        };
        usize::from(end) <= len
    }

    fn get(&self, space: Space, address: u16, count: u16) -> Result<Vec<Value>, DatastoreError> {
        if !self.validate(space, address, count) {
            return Err(DatastoreError::Unmapped { space, address });
        }
        let start = usize::from(address);
        let end = start + usize::from(count);
        Ok(self.block(space).values[start..end].to_vec())
    }

    fn set(&mut self, space: Space, address: u16, values: &[Value]) -> Result<(), DatastoreError> {
        if !space.is_writable() {
            return Err(DatastoreError::ReadOnly { space });
        }
        let count = u16::try_from(values.len()).unwrap_or(u16::MAX);
        if !self.validate(space, address, count) {
            return Err(DatastoreError::Unmapped { space, address });
        }
        let start = usize::from(address);
        let block = self.block_mut(space);
        for (offset, value) in values.iter().enumerate() {
            block.values[start + offset] = *value;
        }
        Ok(())
    }

    fn address_bounds(&self, space: Space) -> Option<(u16, u16)> {
        let len = self.block(space).values.len();
        if len == 0 {
            None
        } else {
            Some((0, u16::try_from(len - 1).unwrap_or(u16::MAX)))
        }
    }
}

/// A reference [`Datastore`] backed by an explicit address-to-value map per
/// space. Unlike [`SequentialTable`], reading an address inside a
/// `validate`-passing range that was never explicitly mapped is a
/// `DatastoreError::Unmapped` failure rather than a silent zero — this
/// models real devices whose register map has gaps.
#[derive(Debug, Clone, Default)]
pub struct SparseTable {
    coils: HashMap<u16, bool>,
    discrete_inputs: HashMap<u16, bool>,
    holding_registers: HashMap<u16, u16>,
    input_registers: HashMap<u16, u16>,
}

impl SparseTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_coil(mut self, address: u16, value: bool) -> Self {
        self.coils.insert(address, value);
        self
    }

    #[must_use]
    pub fn with_discrete_input(mut self, address: u16, value: bool) -> Self {
        self.discrete_inputs.insert(address, value);
        self
    }

    #[must_use]
    pub fn with_holding_register(mut self, address: u16, value: u16) -> Self {
        self.holding_registers.insert(address, value);
        self
    }

    #[must_use]
    pub fn with_input_register(mut self, address: u16, value: u16) -> Self {
        self.input_registers.insert(address, value);
        self
    }

    fn bit_map(&self, space: Space) -> &HashMap<u16, bool> {
        match space {
            Space::Coils => &self.coils,
            Space::DiscreteInputs => &self.discrete_inputs,
            Space::HoldingRegisters | Space::InputRegisters => unreachable!("not a bit space"),
        }
    }

    fn word_map(&self, space: Space) -> &HashMap<u16, u16> {
        match space {
            Space::HoldingRegisters => &self.holding_registers,
            Space::InputRegisters => &self.input_registers,
            Space::Coils | Space::DiscreteInputs => unreachable!("not a register space"),
        }
    }
}

impl Datastore for SparseTable {
    fn validate(&self, space: Space, address: u16, count: u16) -> bool {
        if count == 0 {
            return false;
        }
        let Some((min, max)) = self.address_bounds(space) else {
            return false;
        };
        let Some(end) = address.checked_add(count - 1) else {
            return false;
        };
        address >= min && end <= max
    }

    fn get(&self, space: Space, address: u16, count: u16) -> Result<Vec<Value>, DatastoreError> {
        if !self.validate(space, address, count) {
            return Err(DatastoreError::Unmapped { space, address });
        }
        (address..address + count)
            .map(|addr| {
                if space.is_bit() {
                    self.bit_map(space)
                        .get(&addr)
                        .map(|&b| Value::Bit(b))
                        .ok_or(DatastoreError::Unmapped { space, address: addr })
                } else {
                    self.word_map(space)
                        .get(&addr)
                        .map(|&w| Value::Word(w))
                        .ok_or(DatastoreError::Unmapped { space, address: addr })
                }
            })
            .collect()
    }

    fn set(&mut self, space: Space, address: u16, values: &[Value]) -> Result<(), DatastoreError> {
        if !space.is_writable() {
            return Err(DatastoreError::ReadOnly { space });
        }
        for (offset, value) in values.iter().enumerate() {
            let addr = address + u16::try_from(offset).unwrap_or(u16::MAX);
            match (space, value) {
                (Space::Coils, Value::Bit(b)) => {
                    self.coils.insert(addr, *b);
                }
                (Space::HoldingRegisters, Value::Word(w)) => {
                    self.holding_registers.insert(addr, *w);
                }
                _ => return Err(DatastoreError::ReadOnly { space }),
            }
        }
        Ok(())
    }

    fn address_bounds(&self, space: Space) -> Option<(u16, u16)> {
        let keys: Box<dyn Iterator<Item = &u16>> = match space {
            Space::Coils => Box::new(self.coils.keys()),
            Space::DiscreteInputs => Box::new(self.discrete_inputs.keys()),
            Space::HoldingRegisters => Box::new(self.holding_registers.keys()),
            Space::InputRegisters => Box::new(self.input_registers.keys()),
        };
        keys.fold(None, |acc, &k| match acc {
            None => Some((k, k)),
            Some((min, max)) => Some((min.min(k), max.max(k))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_table_defaults_to_zero() {
        let table = SequentialTable::new(8, 0, 8, 0);
        assert_eq!(
            table.get(Space::Coils, 0, 8).unwrap(),
            vec![Value::Bit(false); 8]
        );
    }

    #[test]
    fn sequential_table_rejects_out_of_range() {
        let table = SequentialTable::new(8, 0, 0, 0);
        assert!(!table.validate(Space::Coils, 4, 8));
        assert!(table.get(Space::Coils, 4, 8).is_err());
    }

    #[test]
    fn sequential_table_round_trips_writes() {
        let mut table = SequentialTable::new(0, 0, 4, 0);
        table
            .set(Space::HoldingRegisters, 1, &[Value::Word(7), Value::Word(9)])
            .unwrap();
        assert_eq!(
            table.get(Space::HoldingRegisters, 1, 2).unwrap(),
            vec![Value::Word(7), Value::Word(9)]
        );
    }

    #[test]
    fn sequential_table_rejects_write_to_read_only_space() {
        let mut table = SequentialTable::new(0, 4, 0, 0);
        let err = table
            .set(Space::DiscreteInputs, 0, &[Value::Bit(true)])
            .unwrap_err();
        assert_eq!(err, DatastoreError::ReadOnly { space: Space::DiscreteInputs });
    }

    #[test]
    fn sparse_table_rejects_unmapped_read_inside_bounds() {
        let table = SparseTable::new()
            .with_holding_register(0, 1)
            .with_holding_register(5, 2);
        assert!(table.validate(Space::HoldingRegisters, 0, 6));
        assert!(table.get(Space::HoldingRegisters, 0, 6).is_err());
        assert_eq!(
            table.get(Space::HoldingRegisters, 0, 1).unwrap(),
            vec![Value::Word(1)]
        );
    }

    #[test]
    fn sparse_table_write_extends_the_map() {
        let mut table = SparseTable::new().with_coil(0, false);
        table.set(Space::Coils, 1, &[Value::Bit(true)]).unwrap();
        assert_eq!(table.get(Space::Coils, 1, 1).unwrap(), vec![Value::Bit(true)]);
    }

    #[test]
    fn address_bounds_reflects_mapped_extent() {
        let table = SparseTable::new()
            .with_input_register(10, 1)
            .with_input_register(20, 2);
        assert_eq!(table.address_bounds(Space::InputRegisters), Some((10, 20)));
        assert_eq!(table.address_bounds(Space::Coils), None);
    }
}
