//! Pin-level signals.
//!
//! A [`Signal`] is a named, runtime-sized bit vector; a [`SignalBank`] is the set of signals
//! one side of an interface drives. Widths are constructor arguments, so one transactor
//! type serves every bus width.

use std::fmt;

use bitvec::field::BitField;
use bitvec::order::Lsb0;
use bitvec::vec::BitVec;

/// One named wire or bus.
#[derive(Clone, PartialEq, Eq)]
pub struct Signal {
    name: &'static str,
    bits: BitVec<u64, Lsb0>,
}

impl Signal {
    /// Creates a signal of `width` bits, all low.
    pub fn new(name: &'static str, width: usize) -> Self {
        Self {
            name,
            bits: BitVec::repeat(false, width),
        }
    }

    /// Signal name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Width in bits.
    pub fn width(&self) -> usize {
        self.bits.len()
    }

    /// Returns `true` if any bit is set.
    pub fn is_high(&self) -> bool {
        self.bits.any()
    }

    /// Drives all bits low.
    pub fn clear(&mut self) {
        self.bits.fill(false);
    }

    /// Drives the low bits from `value`; bits above 64 are cleared.
    pub fn set_u64(&mut self, value: u64) {
        self.clear();
        let n = self.bits.len().min(64);
        if n > 0 {
            self.bits[..n].store_le(value & mask(n));
        }
    }

    /// Low 64 bits as an integer.
    pub fn to_u64(&self) -> u64 {
        let n = self.bits.len().min(64);
        if n == 0 { 0 } else { self.bits[..n].load_le() }
    }

    /// Places `data` starting at byte lane `lane`; bytes beyond the width are dropped.
    pub fn set_bytes(&mut self, lane: usize, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            let start = (lane + i) * 8;
            if start + 8 > self.bits.len() {
                break;
            }
            self.bits[start..start + 8].store_le(*byte);
        }
    }

    /// Reads `len` bytes starting at byte lane `lane`; lanes beyond the width read as zero.
    pub fn bytes(&self, lane: usize, len: usize) -> Vec<u8> {
        (lane..lane + len)
            .map(|l| {
                let start = l * 8;
                if start + 8 > self.bits.len() {
                    0
                } else {
                    self.bits[start..start + 8].load_le()
                }
            })
            .collect()
    }
}

const fn mask(bits: usize) -> u64 {
    if bits >= 64 { u64::MAX } else { (1 << bits) - 1 }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]={:#x}", self.name, self.width(), self.to_u64())
    }
}

/// Signals driven by one side of a pin interface.
///
/// Accesses to undeclared names read as low and ignore writes, which lets a protocol
/// family skip optional signals (e.g. a local memory without busy).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalBank {
    signals: Vec<Signal>,
}

impl SignalBank {
    /// Creates an empty bank.
    pub const fn new() -> Self {
        Self {
            signals: Vec::new(),
        }
    }

    /// Declares `name` with `width` bits.
    #[must_use]
    pub fn with(mut self, name: &'static str, width: usize) -> Self {
        self.signals.push(Signal::new(name, width));
        self
    }

    /// Looks up a signal.
    pub fn get(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Signal> {
        self.signals.iter_mut().find(|s| s.name == name)
    }

    /// Iterates over every declared signal.
    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter()
    }

    /// Drives a one-bit (or any-width) flag.
    pub fn drive(&mut self, name: &str, high: bool) {
        self.drive_u64(name, u64::from(high));
    }

    /// Drives an integer value.
    pub fn drive_u64(&mut self, name: &str, value: u64) {
        if let Some(signal) = self.get_mut(name) {
            signal.set_u64(value);
        }
    }

    /// Drives `data` onto a data bus starting at byte lane `lane`; other lanes go low.
    pub fn drive_bytes(&mut self, name: &str, lane: usize, data: &[u8]) {
        if let Some(signal) = self.get_mut(name) {
            signal.clear();
            signal.set_bytes(lane, data);
        }
    }

    /// Returns `true` if `name` is declared and any of its bits is set.
    pub fn is_high(&self, name: &str) -> bool {
        self.get(name).is_some_and(Signal::is_high)
    }

    /// Integer value of `name` (zero when undeclared).
    pub fn value(&self, name: &str) -> u64 {
        self.get(name).map_or(0, Signal::to_u64)
    }

    /// Bytes of data bus `name` starting at lane `lane`.
    pub fn bytes(&self, name: &str, lane: usize, len: usize) -> Vec<u8> {
        self.get(name)
            .map_or_else(|| vec![0; len], |s| s.bytes(lane, len))
    }

    /// Drives every signal low.
    pub fn clear_all(&mut self) {
        self.signals.iter_mut().for_each(Signal::clear);
    }

    /// Drives the listed signals low.
    pub fn clear(&mut self, names: &[&str]) {
        for name in names {
            if let Some(signal) = self.get_mut(name) {
                signal.clear();
            }
        }
    }
}
