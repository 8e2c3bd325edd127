// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Mock register source
//!
//! An in-memory register map that stands in for the field device. Blocks can
//! be marked as failing to reproduce an unreachable or misbehaving meter.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use log::debug;

use super::RegisterSource;
use crate::error::TransportError;
use crate::registers::{block_fits, encode_block};

/// Register source backed by a map of register values.
///
/// Every read is counted, which lets tests assert on how many cycles ran.
#[derive(Debug, Default, Clone)]
pub struct MockRegisterSource {
    registers: BTreeMap<u16, u16>,
    failing: HashSet<u16>,
    reads: usize,
}

impl MockRegisterSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw registers starting at `address`.
    pub fn set_registers(&mut self, address: u16, values: &[u16]) {
        for (reg_addr, value) in (address..=u16::MAX).zip(values) {
            self.registers.insert(reg_addr, *value);
        }
    }

    /// Store channel values starting at `address`, two registers per channel.
    pub fn set_block(&mut self, address: u16, channels: &[f32]) {
        self.set_registers(address, &encode_block(channels));
    }

    /// Builder flavour of [`MockRegisterSource::set_block`].
    pub fn with_block(mut self, address: u16, channels: &[f32]) -> Self {
        self.set_block(address, channels);
        self
    }

    /// Make every read starting at `address` fail with a transport error.
    pub fn fail_at(&mut self, address: u16) {
        self.failing.insert(address);
    }

    /// Let reads starting at `address` succeed again.
    pub fn recover_at(&mut self, address: u16) {
        self.failing.remove(&address);
    }

    /// Number of read requests served so far, failed ones included.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

#[async_trait]
impl RegisterSource for MockRegisterSource {
    async fn read_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        self.reads += 1;

        if self.failing.contains(&address) {
            debug!("Mock source failing read at address {}", address);
            return Err(TransportError::Read {
                address,
                count,
                reason: "simulated transport failure".to_string(),
            });
        }

        if !block_fits(address, count) {
            return Err(TransportError::Read {
                address,
                count,
                reason: "block runs past the last register".to_string(),
            });
        }

        // Unset registers read as zero, like a freshly powered device
        Ok((address..=u16::MAX)
            .take(count as usize)
            .map(|reg_addr| self.registers.get(&reg_addr).copied().unwrap_or(0))
            .collect())
    }

    fn describe(&self) -> String {
        format!("mock ({} registers)", self.registers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::decode_f32;

    #[tokio::test]
    async fn reads_back_stored_blocks() {
        let mut source = MockRegisterSource::new().with_block(352, &[230.0, 231.5]);
        let registers = source.read_registers(352, 4).await.unwrap();
        assert_eq!(registers.len(), 4);
        assert_eq!(decode_f32(&registers[0..2]).unwrap(), 230.0);
        assert_eq!(decode_f32(&registers[2..4]).unwrap(), 231.5);
    }

    #[tokio::test]
    async fn failing_address_can_recover() {
        let mut source = MockRegisterSource::new().with_block(424, &[50.0]);
        source.fail_at(424);
        assert!(source.read_registers(424, 2).await.is_err());

        source.recover_at(424);
        assert_eq!(source.read_registers(424, 2).await.unwrap(), vec![0, 16968]);
        assert_eq!(source.reads(), 2);
    }
}
