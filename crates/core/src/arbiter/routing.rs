//! Response routing.
//!
//! Responses find their way back to the originating port through the route ID:
//! 1. **Port bits:** the port number is ORed into the route ID at `route_id_lsb` on the way
//!    down and stripped on the way up.
//! 2. **Autonomous:** a bounded pool of route-ID slots; each in-flight transaction owns one
//!    slot from admission until its last-transfer response is retired.

use std::collections::HashMap;

use tracing::trace;

use crate::bus::{Request, Response};

/// Owner record of one autonomous route-ID slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    /// Port the transaction arrived on.
    pub port: usize,
    /// Route ID the master supplied.
    pub original_route_id: u32,
    /// Tag of the owning transaction.
    pub tag: u64,
}

/// Bounded route-ID pool.
#[derive(Debug, Clone)]
pub struct RouteTable {
    slots: Vec<Option<RouteEntry>>,
    by_tag: HashMap<(usize, u64), u32>,
    high_water: usize,
}

impl RouteTable {
    /// Creates a pool of `size` route IDs (`0..size`).
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
            by_tag: HashMap::with_capacity(size),
            high_water: 0,
        }
    }

    /// Number of slots currently owned.
    pub fn in_use(&self) -> usize {
        self.by_tag.len()
    }

    /// Largest simultaneous occupancy.
    pub const fn high_water(&self) -> usize {
        self.high_water
    }

    /// Returns `true` if transaction `tag` from `port` already owns a slot.
    pub fn owns(&self, port: usize, tag: u64) -> bool {
        self.by_tag.contains_key(&(port, tag))
    }

    /// Allocates the lowest free slot for `request` arriving on `port`.
    ///
    /// Returns the slot, or `None` when the pool is exhausted.
    pub fn reserve(&mut self, port: usize, request: &Request) -> Option<u32> {
        if let Some(slot) = self.by_tag.get(&(port, request.tag)) {
            return Some(*slot);
        }
        let slot = self.slots.iter().position(Option::is_none)?;
        self.slots[slot] = Some(RouteEntry {
            port,
            original_route_id: request.route_id,
            tag: request.tag,
        });
        let _ = self.by_tag.insert((port, request.tag), slot as u32);
        self.high_water = self.high_water.max(self.by_tag.len());
        trace!(port, tag = request.tag, slot, "route id reserved");
        Some(slot as u32)
    }

    /// Slot owned by transaction `tag` from `port`.
    pub fn slot_of(&self, port: usize, tag: u64) -> Option<u32> {
        self.by_tag.get(&(port, tag)).copied()
    }

    /// Owner of `slot`.
    pub fn entry(&self, slot: u32) -> Option<RouteEntry> {
        self.slots.get(slot as usize).copied().flatten()
    }

    /// Frees `slot`.
    pub fn release(&mut self, slot: u32) -> Option<RouteEntry> {
        let entry = self.slots.get_mut(slot as usize)?.take()?;
        let _ = self.by_tag.remove(&(entry.port, entry.tag));
        trace!(port = entry.port, tag = entry.tag, slot, "route id released");
        Some(entry)
    }

    /// Frees every slot.
    pub fn clear(&mut self) {
        self.slots.fill(None);
        self.by_tag.clear();
    }
}

/// Route-ID rewriting strategy of one arbiter.
#[derive(Debug, Clone)]
pub enum Routing {
    /// Port number encoded in `bits` route-ID bits starting at `lsb`.
    PortBits {
        /// Lowest bit of the port field.
        lsb: u32,
        /// Width of the port field.
        bits: u32,
    },
    /// Autonomous route-ID pool.
    Autonomous(RouteTable),
}

impl Routing {
    /// Creates port-bit routing.
    pub const fn port_bits(lsb: u32, bits: u32) -> Self {
        Self::PortBits { lsb, bits }
    }

    /// Creates autonomous routing with `size` route IDs.
    pub fn autonomous(size: usize) -> Self {
        Self::Autonomous(RouteTable::new(size))
    }

    const fn mask(bits: u32) -> u32 {
        if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 }
    }

    /// Admission check: reserves a route ID for a new transaction.
    ///
    /// Returns `false` when the pool is exhausted.
    pub fn admit(&mut self, port: usize, request: &Request) -> bool {
        match self {
            Self::PortBits { .. } => true,
            Self::Autonomous(table) => {
                if !request.is_first_transfer() && table.owns(port, request.tag) {
                    return true;
                }
                table.reserve(port, request).is_some()
            }
        }
    }

    /// Rewrites the route ID of a request heading downstream from `port`.
    pub fn outbound(&self, port: usize, request: &mut Request) {
        match self {
            Self::PortBits { lsb, bits } => {
                if *bits > 0 {
                    request.route_id |= ((port as u32) & Self::mask(*bits)) << lsb;
                }
            }
            Self::Autonomous(table) => {
                if let Some(slot) = table.slot_of(port, request.tag) {
                    request.route_id = slot;
                }
            }
        }
    }

    /// Resolves the port of a response heading upstream and restores its route ID.
    ///
    /// Frees an autonomous slot when `retire` is set and the response is a last transfer.
    /// Returns `None` when the route ID names no port or free slot.
    pub fn inbound(&mut self, response: &mut Response, retire: bool) -> Option<usize> {
        match self {
            Self::PortBits { lsb, bits } => {
                let mask = Self::mask(*bits);
                let port = if *bits == 0 { 0 } else { (response.route_id >> *lsb) & mask };
                if *bits > 0 {
                    response.route_id &= !(mask << *lsb);
                }
                Some(port as usize)
            }
            Self::Autonomous(table) => {
                let slot = response.route_id;
                let entry = table.entry(slot)?;
                response.route_id = entry.original_route_id;
                if retire && response.last_transfer && !response.is_nacc() {
                    let _ = table.release(slot);
                }
                Some(entry.port)
            }
        }
    }

    /// Resolves the port of a response without changing any state.
    pub fn port_of(&self, response: &Response) -> Option<usize> {
        match self {
            Self::PortBits { lsb, bits } => Some(if *bits == 0 {
                0
            } else {
                ((response.route_id >> *lsb) & Self::mask(*bits)) as usize
            }),
            Self::Autonomous(table) => table.entry(response.route_id).map(|e| e.port),
        }
    }

    /// Route IDs currently owned (always zero for port-bit routing).
    pub fn in_use(&self) -> usize {
        match self {
            Self::PortBits { .. } => 0,
            Self::Autonomous(table) => table.in_use(),
        }
    }

    /// Largest simultaneous route-ID occupancy.
    pub const fn high_water(&self) -> usize {
        match self {
            Self::PortBits { .. } => 0,
            Self::Autonomous(table) => table.high_water(),
        }
    }

    /// Frees every autonomous slot.
    pub fn reset(&mut self) {
        if let Self::Autonomous(table) = self {
            table.clear();
        }
    }
}
