//! Request envelope.
//!
//! A [`Request`] describes one transfer of a bus transaction. Single transfers (READ,
//! WRITE) and block/burst reads are carried by one request; block/burst writes and RCW are
//! carried by one request per transfer, all sharing the same `tag`, with
//! `last_transfer` set on the final one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::ProtocolError;

/// Largest supported transfer size in bytes (512-bit data bus).
pub const MAX_BYTE_SIZE: u32 = 64;

/// Largest number of transfers in one block or burst transaction.
pub const MAX_TRANSFERS: u32 = 16;

static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

/// Returns a fresh transaction tag, unique for the lifetime of the process.
pub fn next_tag() -> u64 {
    NEXT_TAG.fetch_add(1, Ordering::Relaxed)
}

/// Kind of bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestType {
    /// Single read of up to one bus width.
    #[default]
    Read,
    /// Single write of up to one bus width.
    Write,
    /// Wrapping multi-beat read; responses arrive critical beat first.
    BlockRead,
    /// Multi-beat write; one request per beat, addresses increment from the block base.
    BlockWrite,
    /// Burst read (incrementing, wrapping or fixed per `burst`).
    BurstRead,
    /// Burst write; one request per beat.
    BurstWrite,
    /// Read-conditional-write: compare transfer followed by write transfer.
    Rcw,
    /// Snoop request (coherence traffic).
    Snoop,
}

impl RequestType {
    /// Returns `true` for transactions whose data flows on the response path.
    #[inline]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::Read | Self::BlockRead | Self::BurstRead | Self::Snoop)
    }

    /// Returns `true` for transactions whose data flows on the request path.
    #[inline]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Write | Self::BlockWrite | Self::BurstWrite | Self::Rcw)
    }

    /// Returns `true` for block reads and writes.
    #[inline]
    pub const fn is_block(self) -> bool {
        matches!(self, Self::BlockRead | Self::BlockWrite)
    }

    /// Returns `true` for burst reads and writes.
    #[inline]
    pub const fn is_burst(self) -> bool {
        matches!(self, Self::BurstRead | Self::BurstWrite)
    }

    /// Returns `true` when the request thread sees one request per transfer.
    #[inline]
    pub const fn is_multi_request(self) -> bool {
        matches!(self, Self::BlockWrite | Self::BurstWrite | Self::Rcw)
    }

    /// Parses the upper-case mnemonic used in traffic scripts.
    pub fn from_mnemonic(text: &str) -> Option<Self> {
        Some(match text {
            "READ" => Self::Read,
            "WRITE" => Self::Write,
            "BLOCK_READ" => Self::BlockRead,
            "BLOCK_WRITE" => Self::BlockWrite,
            "BURST_READ" => Self::BurstRead,
            "BURST_WRITE" => Self::BurstWrite,
            "RCW" => Self::Rcw,
            "SNOOP" => Self::Snoop,
            _ => return None,
        })
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::BlockRead => "BLOCK_READ",
            Self::BlockWrite => "BLOCK_WRITE",
            Self::BurstRead => "BURST_READ",
            Self::BurstWrite => "BURST_WRITE",
            Self::Rcw => "RCW",
            Self::Snoop => "SNOOP",
        })
    }
}

/// Address sequencing of a burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BurstType {
    /// Addresses increment by the transfer size.
    #[default]
    Incr,
    /// Addresses increment and wrap at the total burst size.
    Wrap,
    /// Every beat uses the same address.
    Fixed,
}

/// Payload family a request was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BusProtocol {
    /// Processor interface (PIF) or generic TLM payload.
    #[default]
    #[serde(alias = "Pif")]
    Pif,
    /// AMBA AXI payload.
    #[serde(alias = "Axi")]
    Axi,
    /// AMBA APB payload.
    #[serde(alias = "Apb")]
    Apb,
}

/// One transfer of a bus transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Request {
    /// Transaction type.
    pub kind: RequestType,
    /// Byte address of this transfer (first beat for reads).
    pub address: u64,
    /// Transfer size in bytes; a power of two no larger than the port width.
    pub size: u32,
    /// Byte lane enables; bit `i` enables byte `address + i`.
    pub byte_enables: u64,
    /// Number of transfers in the transaction.
    pub num_transfers: u32,
    /// One-based number of this transfer.
    pub transfer_number: u32,
    /// Transaction ID.
    pub id: u8,
    /// Route ID used to steer the response back through interconnect.
    pub route_id: u32,
    /// Request priority (0 = lowest).
    pub priority: u8,
    /// Set on the final transfer of the transaction.
    pub last_transfer: bool,
    /// Correlates every transfer (and response) of one logical transaction.
    pub tag: u64,
    /// Address sequencing for bursts.
    pub burst: BurstType,
    /// Exclusive access.
    pub exclusive: bool,
    /// Payload family.
    pub protocol: BusProtocol,
    /// Transfer-enable flag (designated transfer-enable arbitration).
    pub xfer_en: bool,
    /// Request originates from an instruction fetch.
    pub instruction_fetch: bool,
    /// Write payload (`size` bytes) or empty for reads.
    pub buffer: Vec<u8>,
}

/// Returns a byte-enable mask with the low `size` bits set.
#[inline]
pub const fn full_enables(size: u32) -> u64 {
    if size >= 64 { u64::MAX } else { (1u64 << size) - 1 }
}

impl Request {
    fn single(kind: RequestType, address: u64, size: u32) -> Self {
        Self {
            kind,
            address,
            size,
            byte_enables: full_enables(size),
            num_transfers: 1,
            transfer_number: 1,
            last_transfer: true,
            tag: next_tag(),
            ..Self::default()
        }
    }

    /// Creates a READ of `size` bytes.
    pub fn read(address: u64, size: u32) -> Self {
        Self::single(RequestType::Read, address, size)
    }

    /// Creates a WRITE carrying `data` (its length is the transfer size).
    pub fn write(address: u64, data: &[u8]) -> Self {
        let mut req = Self::single(RequestType::Write, address, data.len() as u32);
        req.buffer = data.to_vec();
        req
    }

    /// Creates a wrapping BLOCK_READ of `num_transfers` beats of `size` bytes.
    pub fn block_read(address: u64, size: u32, num_transfers: u32) -> Self {
        let mut req = Self::single(RequestType::BlockRead, address, size);
        req.num_transfers = num_transfers;
        req
    }

    /// Creates an incrementing BURST_READ of `num_transfers` beats of `size` bytes.
    pub fn burst_read(address: u64, size: u32, num_transfers: u32) -> Self {
        let mut req = Self::single(RequestType::BurstRead, address, size);
        req.num_transfers = num_transfers;
        req
    }

    /// Splits `data` into the per-beat requests of a BLOCK_WRITE starting at `address`.
    ///
    /// `address` must be aligned to the total block size; every beat shares one tag.
    pub fn block_write(address: u64, size: u32, data: &[u8]) -> Vec<Self> {
        Self::multi_write(RequestType::BlockWrite, address, size, data)
    }

    /// Splits `data` into the per-beat requests of an incrementing BURST_WRITE.
    pub fn burst_write(address: u64, size: u32, data: &[u8]) -> Vec<Self> {
        Self::multi_write(RequestType::BurstWrite, address, size, data)
    }

    fn multi_write(kind: RequestType, address: u64, size: u32, data: &[u8]) -> Vec<Self> {
        let tag = next_tag();
        let beats = data.chunks(size as usize).count() as u32;
        data.chunks(size as usize)
            .enumerate()
            .map(|(i, chunk)| {
                let number = i as u32 + 1;
                Self {
                    kind,
                    address: address + u64::from(size) * i as u64,
                    size,
                    byte_enables: full_enables(size),
                    num_transfers: beats,
                    transfer_number: number,
                    last_transfer: number == beats,
                    tag,
                    buffer: chunk.to_vec(),
                    ..Self::default()
                }
            })
            .collect()
    }

    /// Sets the transaction ID.
    #[must_use]
    pub const fn with_id(mut self, id: u8) -> Self {
        self.id = id;
        self
    }

    /// Sets the route ID.
    #[must_use]
    pub const fn with_route_id(mut self, route_id: u32) -> Self {
        self.route_id = route_id;
        self
    }

    /// Sets the byte enables.
    #[must_use]
    pub const fn with_byte_enables(mut self, byte_enables: u64) -> Self {
        self.byte_enables = byte_enables;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the last-transfer flag.
    #[must_use]
    pub const fn with_last_transfer(mut self, last: bool) -> Self {
        self.last_transfer = last;
        self
    }

    /// Sets the payload family.
    #[must_use]
    pub const fn with_protocol(mut self, protocol: BusProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets the transaction tag.
    #[must_use]
    pub const fn with_tag(mut self, tag: u64) -> Self {
        self.tag = tag;
        self
    }

    /// Total bytes moved by the whole transaction.
    #[inline]
    pub fn total_bytes(&self) -> u64 {
        if self.kind.is_block() || self.kind.is_burst() {
            u64::from(self.size) * u64::from(self.num_transfers.max(1))
        } else {
            u64::from(self.size)
        }
    }

    /// Returns `true` for the transfer that opens a transaction.
    #[inline]
    pub const fn is_first_transfer(&self) -> bool {
        self.transfer_number <= 1
    }

    /// Address of beat `beat` (zero based) of this transaction.
    ///
    /// Block transactions and wrapping bursts wrap at the total transaction size; fixed
    /// bursts repeat the start address.
    pub fn beat_address(&self, beat: u32) -> u64 {
        let size = u64::from(self.size);
        let step = size * u64::from(beat);
        let wraps = self.kind.is_block() || (self.kind.is_burst() && self.burst == BurstType::Wrap);
        if wraps {
            let span = self.total_bytes();
            let base = self.address & !(span - 1);
            base + (self.address - base + step) % span
        } else if self.kind.is_burst() && self.burst == BurstType::Fixed {
            self.address
        } else {
            self.address + step
        }
    }

    /// Checks the envelope invariants.
    pub fn validate(&self, port_width: u32) -> Result<(), ProtocolError> {
        let fail = |reason: String| ProtocolError::MalformedRequest {
            tag: self.tag,
            reason,
        };
        if self.size == 0 || !self.size.is_power_of_two() {
            return Err(fail(format!("byte_size {} is not a power of two", self.size)));
        }
        if self.size > port_width {
            return Err(fail(format!(
                "byte_size {} exceeds port width {port_width}",
                self.size
            )));
        }
        if self.address % u64::from(self.size) != 0 {
            return Err(fail(format!(
                "address {:#x} not aligned to byte_size {}",
                self.address, self.size
            )));
        }
        if self.num_transfers == 0 || self.num_transfers > MAX_TRANSFERS {
            return Err(fail(format!("num_transfers {} out of range", self.num_transfers)));
        }
        if self.kind.is_block() && !self.num_transfers.is_power_of_two() {
            return Err(fail(format!(
                "block num_transfers {} is not a power of two",
                self.num_transfers
            )));
        }
        if self.transfer_number == 0 || self.transfer_number > self.num_transfers {
            return Err(fail(format!(
                "transfer_number {} outside 1..={}",
                self.transfer_number, self.num_transfers
            )));
        }
        if self.kind.is_multi_request()
            && self.last_transfer != (self.transfer_number == self.num_transfers)
        {
            return Err(fail(format!(
                "last_transfer={} on transfer {} of {}",
                self.last_transfer, self.transfer_number, self.num_transfers
            )));
        }
        if self.kind.is_write() && self.buffer.len() != self.size as usize {
            return Err(fail(format!(
                "write payload holds {} bytes, byte_size is {}",
                self.buffer.len(),
                self.size
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:#010x}/{}] be={:#x} id={} route={} tag={} xfer={}/{}{}",
            self.kind,
            self.address,
            self.size,
            self.byte_enables,
            self.id,
            self.route_id,
            self.tag,
            self.transfer_number,
            self.num_transfers,
            if self.last_transfer { " last" } else { "" }
        )
    }
}
