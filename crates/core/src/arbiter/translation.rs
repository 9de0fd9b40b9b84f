//! Address translation.
//!
//! A translation script remaps upstream address ranges before requests go downstream.
//! Each non-comment line reads `<low> <high> <new_base>`; numbers are hex (`0x` prefix) or
//! decimal. `#` and `//` start comments. An address in `[low, high]` becomes
//! `new_base + (address - low)`; addresses outside every range pass through unchanged.

use std::fs;
use std::path::Path;

use crate::common::ConfigError;

/// One remapped range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationEntry {
    /// First upstream address.
    pub low: u64,
    /// Last upstream address (inclusive).
    pub high: u64,
    /// Downstream address of `low`.
    pub new_base: u64,
}

impl TranslationEntry {
    #[inline]
    const fn contains(&self, address: u64) -> bool {
        address >= self.low && address <= self.high
    }
}

/// Sorted, non-overlapping translation table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressTranslator {
    entries: Vec<TranslationEntry>,
}

fn parse_number(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

impl AddressTranslator {
    /// Loads a translation script from `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses a translation script.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut entries: Vec<(usize, TranslationEntry)> = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let code = raw.split('#').next().unwrap_or_default();
            let code = code.split("//").next().unwrap_or_default().trim();
            if code.is_empty() {
                continue;
            }
            let fields: Vec<&str> = code.split_whitespace().collect();
            let [low, high, new_base] = fields.as_slice() else {
                return Err(ConfigError::Translation {
                    line,
                    reason: format!("expected `<low> <high> <new_base>`, found `{code}`"),
                });
            };
            let number = |field: &str| {
                parse_number(field).ok_or_else(|| ConfigError::Translation {
                    line,
                    reason: format!("`{field}` is not a number"),
                })
            };
            let entry = TranslationEntry {
                low: number(low)?,
                high: number(high)?,
                new_base: number(new_base)?,
            };
            if entry.high < entry.low {
                return Err(ConfigError::Translation {
                    line,
                    reason: format!("high {:#x} is below low {:#x}", entry.high, entry.low),
                });
            }
            if entry.new_base.checked_add(entry.high - entry.low).is_none() {
                return Err(ConfigError::Translation {
                    line,
                    reason: "translated range overflows the address space".to_owned(),
                });
            }
            if let Some((other, _)) = entries
                .iter()
                .find(|(_, e)| e.low <= entry.high && entry.low <= e.high)
            {
                return Err(ConfigError::Translation {
                    line,
                    reason: format!("range overlaps the range on line {other}"),
                });
            }
            entries.push((line, entry));
        }
        let mut entries: Vec<TranslationEntry> = entries.into_iter().map(|(_, e)| e).collect();
        entries.sort_by_key(|e| e.low);
        Ok(Self { entries })
    }

    /// Returns `true` when no range is remapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remapped ranges in ascending order.
    pub fn entries(&self) -> &[TranslationEntry] {
        &self.entries
    }

    fn entry_for(&self, address: u64) -> Option<&TranslationEntry> {
        let index = self.entries.partition_point(|e| e.high < address);
        self.entries.get(index).filter(|e| e.contains(address))
    }

    /// Translates `address`.
    pub fn translate(&self, address: u64) -> u64 {
        self.entry_for(address)
            .map_or(address, |e| e.new_base + (address - e.low))
    }

    /// Upstream range that translates contiguously around `address`.
    ///
    /// # Returns
    ///
    /// `(low, high, downstream_low)`: inside a remapped range that range; otherwise the
    /// identity gap between neighbouring ranges.
    pub fn window(&self, address: u64) -> (u64, u64, u64) {
        if let Some(e) = self.entry_for(address) {
            return (e.low, e.high, e.new_base);
        }
        let index = self.entries.partition_point(|e| e.high < address);
        let low = index
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map_or(0, |e| e.high + 1);
        let high = self.entries.get(index).map_or(u64::MAX, |e| e.low - 1);
        (low, high, low)
    }
}
