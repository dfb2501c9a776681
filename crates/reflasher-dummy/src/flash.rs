//! Flash emulator

use alloc::vec;
use alloc::vec::Vec;

use maybe_async::maybe_async;
use reflasher_core::error::{Error, Result};
use reflasher_core::flash::{FlashDevice, ERASED_VALUE};

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Flash size in bytes
    pub size: usize,
    /// Sector size for smallest erase
    pub sector_size: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            size: 4 * 1024 * 1024,
            sector_size: 4096,
        }
    }
}

/// A flash operation, as recorded by [`DummyFlash::ops`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOp {
    /// `read(addr, len)`
    Read { addr: u32, len: u32 },
    /// `write(addr, len)`
    Write { addr: u32, len: u32 },
    /// `erase(addr, len)`
    Erase { addr: u32, len: u32 },
}

/// An injected failure
///
/// The next operation of the given kind whose range contains the address
/// fails once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail a read covering this address
    Read(u32),
    /// Fail a write covering this address
    Write(u32),
    /// Fail an erase covering this address
    Erase(u32),
}

/// Dummy flash device
///
/// Emulates NOR flash in memory: erased bytes read as 0xFF, writes can only
/// clear bits, and erases must be sector aligned.
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    ops: Vec<FlashOp>,
    faults: Vec<Fault>,
    overwrites: usize,
}

impl DummyFlash {
    /// Create a new, fully erased dummy flash
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![ERASED_VALUE; config.size];
        Self {
            config,
            data,
            ops: Vec::new(),
            faults: Vec::new(),
            overwrites: 0,
        }
    }

    /// Create a new dummy flash with default configuration (4 MiB, 4 KiB sectors)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy flash with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Every operation performed so far, oldest first
    pub fn ops(&self) -> &[FlashOp] {
        &self.ops
    }

    /// Forget recorded operations
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Recorded writes as `(addr, len)`
    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.ops
            .iter()
            .filter_map(|op| match *op {
                FlashOp::Write { addr, len } => Some((addr, len)),
                _ => None,
            })
            .collect()
    }

    /// Recorded erases as `(addr, len)`
    pub fn erases(&self) -> Vec<(u32, u32)> {
        self.ops
            .iter()
            .filter_map(|op| match *op {
                FlashOp::Erase { addr, len } => Some((addr, len)),
                _ => None,
            })
            .collect()
    }

    /// Number of writes that landed on bytes that were not erased
    pub fn overwrites(&self) -> usize {
        self.overwrites
    }

    /// Make a future operation fail
    pub fn inject(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<()> {
        if self.is_valid_range(addr, len) {
            Ok(())
        } else {
            Err(Error::AddressOutOfBounds)
        }
    }

    fn take_fault(&mut self, op: FlashOp) -> Result<()> {
        let hit = self.faults.iter().position(|fault| {
            let (at, addr, len) = match (*fault, op) {
                (Fault::Read(at), FlashOp::Read { addr, len })
                | (Fault::Write(at), FlashOp::Write { addr, len })
                | (Fault::Erase(at), FlashOp::Erase { addr, len }) => (at, addr, len),
                _ => return false,
            };
            at >= addr && (at as u64) < addr as u64 + len as u64
        });

        match hit {
            Some(index) => {
                let fault = self.faults.remove(index);
                log::debug!("dummy: injected {:?} on {:?}", fault, op);
                Err(Error::WriteProtected)
            }
            None => Ok(()),
        }
    }
}

#[maybe_async(AFIT)]
impl FlashDevice for DummyFlash {
    fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn erase_granularity(&self) -> u32 {
        self.config.sector_size as u32
    }

    async fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.check_range(addr, buf.len())?;
        let op = FlashOp::Read {
            addr,
            len: buf.len() as u32,
        };
        self.take_fault(op)?;
        self.ops.push(op);

        let start = addr as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    async fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.check_range(addr, data.len())?;
        let op = FlashOp::Write {
            addr,
            len: data.len() as u32,
        };
        self.take_fault(op)?;
        self.ops.push(op);

        let start = addr as usize;
        let cells = &mut self.data[start..start + data.len()];
        if cells.iter().any(|&b| b != ERASED_VALUE) {
            log::warn!("dummy: write at 0x{:08X} over non-erased flash", addr);
            self.overwrites += 1;
        }
        // Flash programming: can only change 1 -> 0
        for (cell, &byte) in cells.iter_mut().zip(data) {
            *cell &= byte;
        }
        Ok(())
    }

    async fn erase(&mut self, addr: u32, len: u32) -> Result<()> {
        self.check_range(addr, len as usize)?;
        let sector = self.erase_granularity();
        if addr % sector != 0 || len % sector != 0 {
            log::error!(
                "dummy: erase 0x{:X} bytes at 0x{:08X} is not {}-byte aligned",
                len,
                addr,
                sector
            );
            return Err(Error::InvalidAlignment);
        }
        let op = FlashOp::Erase { addr, len };
        self.take_fault(op)?;
        self.ops.push(op);

        let start = addr as usize;
        self.data[start..start + len as usize].fill(ERASED_VALUE);
        Ok(())
    }
}
