//! In-crate test doubles

use std::vec;
use std::vec::Vec;

use embedded_io::{ErrorKind, ErrorType};
use maybe_async::maybe_async;

use crate::error::{Error, Result};
use crate::flash::{FlashDevice, ERASED_VALUE};
use crate::partition::{AppSubtype, Partition, PartitionKind, PartitionTable};
use crate::transport::{Transport, STATUS_OK};

/// factory at 0x0, P0 at 0x10000, P1 at 0x20000, 64 KiB each
pub fn two_slot_table() -> PartitionTable {
    let mut table = PartitionTable::new();
    table
        .push(Partition::new(PartitionKind::App(AppSubtype::Factory), 0x0, 0x10000))
        .unwrap();
    table.push(Partition::ota(0, 0x10000, 0x10000)).unwrap();
    table.push(Partition::ota(1, 0x20000, 0x10000)).unwrap();
    table
}

/// Byte-addressable flash, erase granularity 1 unless changed
pub struct MockFlash {
    pub data: Vec<u8>,
    pub granularity: u32,
    pub writes: Vec<(u32, usize)>,
    pub erase_log: Vec<(u32, u32)>,
    pub erases: usize,
}

impl MockFlash {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![ERASED_VALUE; size],
            granularity: 1,
            writes: Vec::new(),
            erase_log: Vec::new(),
            erases: 0,
        }
    }

    pub fn fill(&mut self, addr: usize, len: usize, value: u8) {
        self.data[addr..addr + len].fill(value);
    }
}

#[maybe_async(AFIT)]
impl FlashDevice for MockFlash {
    fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn erase_granularity(&self) -> u32 {
        self.granularity
    }

    async fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        if !self.is_valid_range(addr, buf.len()) {
            return Err(Error::AddressOutOfBounds);
        }
        let start = addr as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    async fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if !self.is_valid_range(addr, data.len()) {
            return Err(Error::AddressOutOfBounds);
        }
        let start = addr as usize;
        for (cell, byte) in self.data[start..start + data.len()].iter_mut().zip(data) {
            *cell &= *byte;
        }
        self.writes.push((addr, data.len()));
        Ok(())
    }

    async fn erase(&mut self, addr: u32, len: u32) -> Result<()> {
        if !self.is_valid_range(addr, len as usize) {
            return Err(Error::AddressOutOfBounds);
        }
        self.fill(addr as usize, len as usize, ERASED_VALUE);
        self.erase_log.push((addr, len));
        self.erases += 1;
        Ok(())
    }
}

/// Serves one fixed body in chunks of at most 1 KiB
pub struct MockTransport {
    body: Vec<u8>,
    pos: usize,
    pub status: u16,
    pub complete_at_end: bool,
    pub connected: bool,
    pub closed: bool,
}

impl MockTransport {
    pub fn new(body: &[u8]) -> Self {
        Self {
            body: body.to_vec(),
            pos: 0,
            status: STATUS_OK,
            complete_at_end: true,
            connected: false,
            closed: false,
        }
    }
}

impl ErrorType for MockTransport {
    type Error = ErrorKind;
}

#[maybe_async(AFIT)]
impl Transport for MockTransport {
    type Config = ();

    async fn open(&mut self, _config: &()) -> core::result::Result<(), ErrorKind> {
        self.pos = 0;
        self.connected = true;
        self.closed = false;
        Ok(())
    }

    async fn fetch_headers(&mut self) -> core::result::Result<u16, ErrorKind> {
        Ok(self.status)
    }

    async fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, ErrorKind> {
        let len = (self.body.len() - self.pos).min(buf.len());
        buf[..len].copy_from_slice(&self.body[self.pos..self.pos + len]);
        self.pos += len;
        if len == 0 && !self.complete_at_end {
            self.connected = false;
        }
        Ok(len)
    }

    fn is_complete(&self) -> bool {
        self.complete_at_end && self.pos == self.body.len()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self) {
        self.connected = false;
        self.closed = true;
    }
}
