//! Bus-width conversion.
//!
//! When a master port is wider or narrower than the slave, every transaction that does not
//! fit the slave as-is is rewritten. This module provides:
//! 1. **Fan-out:** wide transfers are split into slave-width beats (zero-enable beats are
//!    skipped), optionally coalesced into block or burst transactions.
//! 2. **Fan-in:** narrow block/burst transfers are accumulated into a nascent wide request
//!    that is emitted when full or on the last transfer.
//! 3. **Reassembly:** downstream read data is gathered in a per-transaction byte image and
//!    upstream beats are released in upstream (wrap) order as soon as their bytes are present.
//! 4. **Completion:** write transactions answer upstream once every downstream last-transfer
//!    response has arrived and the upstream last transfer has been seen.
//!
//! Every downstream piece keeps the tag of its upstream transaction; the record of a
//! transaction is keyed by `(port, tag)` and lives until its final response is produced.

use std::collections::HashMap;

use bitvec::prelude::*;
use tracing::{debug, trace};

use crate::bus::request::MAX_TRANSFERS;
use crate::bus::{BurstType, Request, RequestType, Response, ResponseStatus, full_enables};
use crate::common::ProtocolError;

/// Outcome of converting one upstream transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// The transfer fits the slave unchanged.
    PassThrough,
    /// Downstream requests to dispatch in order (possibly none while accumulating).
    Pieces(Vec<Request>),
}

/// Pre-wrap and post-wrap beat counts of a wrapping transaction.
///
/// # Arguments
///
/// * `address` - Critical (first) address.
/// * `span` - Total bytes; a power of two.
/// * `width` - Beat size in bytes.
///
/// # Returns
///
/// `(pre, post)`: beats from `address` to the end of the span, then beats from the span
/// base back up to `address`.
pub const fn wrap_counts(address: u64, span: u64, width: u64) -> (u32, u32) {
    let base = address & !(span - 1);
    let pre = (base + span - address) / width;
    let post = (address - base) / width;
    (pre as u32, post as u32)
}

const fn merge_status(held: ResponseStatus, new: ResponseStatus) -> ResponseStatus {
    match (held, new) {
        (ResponseStatus::Ok | ResponseStatus::Nacc, other) => other,
        (held, ResponseStatus::Ok | ResponseStatus::Nacc) => held,
        (ResponseStatus::DataError, ResponseStatus::DataError) => ResponseStatus::DataError,
        _ => ResponseStatus::AddressDataError,
    }
}

/// Builds a downstream request carrying the identity of `from`.
fn piece(from: &Request, kind: RequestType, address: u64, size: u32, num_transfers: u32) -> Request {
    Request {
        kind,
        address,
        size,
        byte_enables: full_enables(size),
        num_transfers,
        transfer_number: 1,
        last_transfer: true,
        buffer: Vec::new(),
        ..from.clone()
    }
}

/// Correlation record of one transaction undergoing width conversion.
#[derive(Debug, Clone)]
struct ReqRspInfo {
    first: Request,
    coalesce: bool,
    base: u64,
    span: u64,
    num_last_xfer_rsp_expected: u32,
    num_last_xfer_rsp_received: u32,
    upstream_last_seen: bool,
    status: ResponseStatus,
    address_error_sent: bool,
    nascent: Option<Request>,
    cursor: u64,
    image: Vec<u8>,
    filled: BitVec,
    next_beat: u32,
    beats: u32,
}

impl ReqRspInfo {
    fn new(first: &Request, use_blocks: bool) -> Self {
        let span = first.total_bytes();
        let wraps = first.kind.is_block() || (first.kind.is_burst() && first.burst == BurstType::Wrap);
        let base = if wraps { first.address & !(span - 1) } else { first.address };
        let enables = full_enables(first.size);
        let coalesce = use_blocks && first.byte_enables & enables == enables;
        let beats = if first.kind.is_block() || first.kind.is_burst() {
            first.num_transfers.max(1)
        } else {
            1
        };
        let (image, mut filled) = if first.kind.is_read() {
            (vec![0u8; span as usize], bitvec![0; span as usize])
        } else {
            (Vec::new(), BitVec::new())
        };
        if first.kind == RequestType::Read {
            for lane in 0..first.size as usize {
                if first.byte_enables >> lane & 1 == 0 {
                    filled.set(lane, true);
                }
            }
        }
        Self {
            first: first.clone(),
            coalesce,
            base,
            span,
            num_last_xfer_rsp_expected: 0,
            num_last_xfer_rsp_received: 0,
            upstream_last_seen: false,
            status: ResponseStatus::Ok,
            address_error_sent: false,
            nascent: None,
            cursor: first.address,
            image,
            filled,
            next_beat: 0,
            beats,
        }
    }

    /// Downstream read windows `(address, size)` in the order the upstream needs them.
    fn read_windows(&self, request: &Request, width: u32) -> Vec<(u64, u32)> {
        let size = request.size;
        if request.kind.is_block() && size > width {
            // Critical word first: the pre-wrap run up to the span end, then the post-wrap
            // run from the span base.
            let step = u64::from(width);
            let (pre, post) = wrap_counts(request.address, self.span, step);
            trace!(tag = request.tag, pre, post, "wrapping block read split");
            return (0..u64::from(pre))
                .map(|i| (request.address + step * i, width))
                .chain((0..u64::from(post)).map(|i| (self.base + step * i, width)))
                .collect();
        }
        let mut windows = Vec::new();
        if size >= width {
            let lanes = size / width;
            for beat in 0..self.beats {
                let address = request.beat_address(beat);
                for lane in 0..lanes {
                    let enables = request.byte_enables >> (lane * width) & full_enables(width);
                    if request.kind == RequestType::Read && enables == 0 {
                        continue;
                    }
                    windows.push((address + u64::from(lane * width), width));
                }
            }
            if windows.is_empty() {
                windows.push((request.address, width));
            }
        } else if request.kind.is_block() && self.span <= u64::from(width) {
            windows.push((self.base, self.span as u32));
        } else {
            let mask = !(u64::from(width) - 1);
            for beat in 0..self.beats {
                let window = request.beat_address(beat) & mask;
                if !windows.iter().any(|(a, _)| *a == window) {
                    windows.push((window, width));
                }
            }
        }
        windows
    }

    fn read_pieces(&mut self, request: &Request, width: u32) -> Vec<Request> {
        let windows = self.read_windows(request, width);
        let full_width = windows.iter().all(|(_, size)| *size == width);
        let mut pieces = Vec::new();
        if self.coalesce && windows.len() > 1 && full_width {
            if request.kind.is_burst() && request.burst == BurstType::Incr {
                for chunk in windows.chunks(MAX_TRANSFERS as usize) {
                    pieces.push(piece(request, RequestType::BurstRead, chunk[0].0, width, chunk.len() as u32));
                }
            } else if let Some(groups) = Self::block_groups(&windows, width) {
                for group in groups {
                    pieces.push(piece(request, RequestType::BlockRead, group.0, width, group.1));
                }
            }
        }
        if pieces.is_empty() {
            for (address, size) in windows {
                let mut single = piece(request, RequestType::Read, address, size, 1);
                if request.kind == RequestType::Read && size <= request.size {
                    let lane = (address - request.address) as u32;
                    single.byte_enables = request.byte_enables >> lane & full_enables(size);
                }
                pieces.push(single);
            }
        }
        self.num_last_xfer_rsp_expected += pieces.len() as u32;
        pieces
    }

    /// Groups wrap-ordered windows into aligned blocks of up to 16 beats.
    fn block_groups(windows: &[(u64, u32)], width: u32) -> Option<Vec<(u64, u32)>> {
        let count = windows.len() as u32;
        if !count.is_power_of_two() {
            return None;
        }
        let beats = count.min(MAX_TRANSFERS);
        let span = u64::from(beats) * u64::from(width);
        let mut groups: Vec<(u64, u32)> = Vec::new();
        for (address, _) in windows {
            match groups.iter_mut().find(|(start, _)| start / span == address / span) {
                Some(group) => group.1 += 1,
                None => groups.push((*address, 1)),
            }
        }
        groups.iter().all(|(_, n)| *n == beats).then(|| {
            groups.iter_mut().for_each(|group| group.1 = beats);
            groups
        })
    }

    fn write_fan_out(&mut self, request: &Request, width: u32) -> Vec<Request> {
        let lanes = request.size / width;
        let mut pieces = Vec::new();
        let total = (self.span / u64::from(width)) as u32;
        let chunk = total.min(MAX_TRANSFERS);
        for lane in 0..lanes {
            let address = request.address + u64::from(lane * width);
            let enables = request.byte_enables >> (lane * width) & full_enables(width);
            let start = (lane * width) as usize;
            let data = request
                .buffer
                .get(start..start + width as usize)
                .map(<[u8]>::to_vec)
                .unwrap_or_else(|| vec![0; width as usize]);
            if self.coalesce && chunk > 1 {
                let index = ((address - self.base) / u64::from(width)) as u32;
                let number = index % chunk + 1;
                let kind = if request.kind.is_burst() {
                    RequestType::BurstWrite
                } else {
                    RequestType::BlockWrite
                };
                let mut beat = piece(request, kind, address, width, chunk);
                beat.transfer_number = number;
                beat.last_transfer = number == chunk;
                beat.byte_enables = enables;
                beat.buffer = data;
                pieces.push(beat);
            } else {
                if enables == 0 {
                    continue;
                }
                let mut single = piece(request, RequestType::Write, address, width, 1);
                single.byte_enables = enables;
                single.buffer = data;
                pieces.push(single);
            }
        }
        if pieces.is_empty() {
            let mut single = piece(request, RequestType::Write, request.address, width, 1);
            single.byte_enables = 0;
            single.buffer = vec![0; width as usize];
            pieces.push(single);
        }
        self.num_last_xfer_rsp_expected += pieces.iter().filter(|p| p.last_transfer).count() as u32;
        pieces
    }

    fn write_fan_in(&mut self, request: &Request, width: u32) -> Vec<Request> {
        let whole_block = request.kind.is_block() && self.span <= u64::from(width);
        let (window, window_size) = if whole_block {
            (self.base, self.span as u32)
        } else {
            (request.address & !(u64::from(width) - 1), width)
        };
        let mut pieces = Vec::new();
        if self.nascent.as_ref().is_some_and(|n| n.address != window) {
            pieces.extend(self.finish_nascent(width));
        }
        let nascent = self.nascent.get_or_insert_with(|| {
            let mut wide = piece(request, RequestType::Write, window, window_size, 1);
            wide.byte_enables = 0;
            wide.buffer = vec![0; window_size as usize];
            wide
        });
        let offset = (request.address - window) as usize;
        let size = request.size as usize;
        if let Some(slot) = nascent.buffer.get_mut(offset..offset + size) {
            let len = request.buffer.len().min(size);
            slot[..len].copy_from_slice(&request.buffer[..len]);
        }
        nascent.byte_enables |= (request.byte_enables & full_enables(request.size)) << offset;
        self.cursor = request.address + u64::from(request.size);
        if self.cursor >= window + u64::from(window_size) || request.last_transfer {
            pieces.extend(self.finish_nascent(width));
        }
        pieces
    }

    fn finish_nascent(&mut self, width: u32) -> Option<Request> {
        let mut wide = self.nascent.take()?;
        let total = (self.span / u64::from(width)) as u32;
        if self.coalesce && self.first.kind.is_block() && total > 1 {
            let index = ((wide.address - self.base) / u64::from(width)) as u32;
            wide.kind = RequestType::BlockWrite;
            wide.num_transfers = total;
            wide.transfer_number = index + 1;
            wide.last_transfer = index + 1 == total;
        }
        if wide.last_transfer {
            self.num_last_xfer_rsp_expected += 1;
        }
        Some(wide)
    }

    fn absorb_read(&mut self, response: &Response) {
        let start = response.address.max(self.base);
        let end = (response.address + u64::from(response.size)).min(self.base + self.span);
        for address in start..end {
            let index = (address - self.base) as usize;
            let byte = response
                .buffer
                .get((address - response.address) as usize)
                .copied()
                .unwrap_or(0);
            self.image[index] = byte;
            self.filled.set(index, true);
        }
    }

    fn ready_beats(&mut self) -> Vec<Response> {
        let mut out = Vec::new();
        while self.next_beat < self.beats {
            let address = self.first.beat_address(self.next_beat);
            let start = (address - self.base) as usize;
            let end = start + self.first.size as usize;
            if !self.filled[start..end].all() {
                break;
            }
            self.next_beat += 1;
            out.push(Response {
                status: self.status,
                address,
                size: self.first.size,
                transfer_number: self.next_beat,
                last_transfer: self.next_beat == self.beats,
                buffer: self.image[start..end].to_vec(),
                ..Response::from_request(&self.first, self.status)
            });
        }
        out
    }

    fn write_complete(&self) -> bool {
        self.upstream_last_seen && self.num_last_xfer_rsp_received == self.num_last_xfer_rsp_expected
    }

    fn finished(&self) -> bool {
        if !self.write_complete() {
            return false;
        }
        self.address_error_sent || !self.first.kind.is_read() || self.next_beat == self.beats
    }
}

/// Width converter of one arbiter.
#[derive(Debug, Clone)]
pub struct WidthConverter {
    slave_width: u32,
    master_widths: Vec<u32>,
    use_blocks: bool,
    open: HashMap<(usize, u64), ReqRspInfo>,
    high_water: usize,
}

impl WidthConverter {
    /// Creates a converter between `master_widths` (one per port) and `slave_width`.
    pub fn new(slave_width: u32, master_widths: Vec<u32>, use_blocks: bool) -> Self {
        Self {
            slave_width,
            master_widths,
            use_blocks,
            open: HashMap::new(),
            high_water: 0,
        }
    }

    /// Returns `true` if `port` differs in width from the slave.
    pub fn converts_port(&self, port: usize) -> bool {
        self.master_widths
            .get(port)
            .is_some_and(|width| *width != self.slave_width)
    }

    /// Number of transactions currently open.
    pub fn open_transactions(&self) -> usize {
        self.open.len()
    }

    /// Largest number of simultaneously open transactions.
    pub const fn high_water(&self) -> usize {
        self.high_water
    }

    /// Returns `true` if transaction `tag` from `port` is open.
    pub fn is_open(&self, port: usize, tag: u64) -> bool {
        self.open.contains_key(&(port, tag))
    }

    /// Drops every open transaction.
    pub fn reset(&mut self) {
        self.open.clear();
    }

    fn needs_conversion(&self, request: &Request) -> bool {
        let multi_beat = request.kind.is_block() || request.kind.is_burst();
        request.size > self.slave_width || (request.size < self.slave_width && multi_beat)
    }

    /// Converts one upstream transfer from `port`.
    pub fn convert_request(&mut self, port: usize, request: &Request) -> Result<Conversion, ProtocolError> {
        if !self.converts_port(port) {
            return Ok(Conversion::PassThrough);
        }
        let width = self.slave_width;
        let unsupported = |reason: &str| ProtocolError::UnsupportedConversion {
            port,
            kind: request.kind,
            reason: reason.to_owned(),
        };
        if request.kind == RequestType::Snoop {
            return Err(unsupported("snoop traffic cannot cross a width converter"));
        }
        if request.kind == RequestType::Rcw && request.size > width {
            return Err(unsupported("read-conditional-write wider than the slave"));
        }
        if !self.needs_conversion(request) {
            return Ok(Conversion::PassThrough);
        }
        if request.kind.is_burst() && request.burst == BurstType::Fixed {
            return Err(unsupported("fixed bursts cannot change width"));
        }

        let key = (port, request.tag);
        if request.is_first_transfer() {
            if self.open.contains_key(&key) {
                return Err(ProtocolError::DuplicateTag { port, tag: request.tag });
            }
            let _ = self.open.insert(key, ReqRspInfo::new(request, self.use_blocks));
            self.high_water = self.high_water.max(self.open.len());
        }
        let Some(info) = self.open.get_mut(&key) else {
            return Err(ProtocolError::MalformedRequest {
                tag: request.tag,
                reason: format!(
                    "transfer {} arrived with no open transaction",
                    request.transfer_number
                ),
            });
        };

        let pieces = if request.kind.is_read() {
            info.read_pieces(request, width)
        } else if request.size > width {
            info.write_fan_out(request, width)
        } else {
            info.write_fan_in(request, width)
        };
        if request.last_transfer {
            info.upstream_last_seen = true;
        }
        debug!(
            port,
            tag = request.tag,
            kind = %request.kind,
            pieces = pieces.len(),
            "width converted"
        );
        Ok(Conversion::Pieces(pieces))
    }

    /// Converts one downstream response for `port`.
    ///
    /// Read responses must carry the address of the data of each beat.
    ///
    /// # Returns
    ///
    /// `None` if the response belongs to no open transaction (pass it through unchanged);
    /// otherwise the upstream responses it completes, possibly none.
    pub fn convert_response(&mut self, port: usize, response: &Response) -> Option<Vec<Response>> {
        let key = (port, response.tag);
        let info = self.open.get_mut(&key)?;
        let mut out = Vec::new();
        if response.last_transfer {
            info.num_last_xfer_rsp_received += 1;
        }
        if info.address_error_sent {
            trace!(port, tag = response.tag, "absorbed response after address error");
        } else if response.status.is_address_error() {
            info.address_error_sent = true;
            let mut error = Response::from_request(&info.first, response.status);
            error.transfer_number = info.next_beat + 1;
            out.push(error);
        } else {
            info.status = merge_status(info.status, response.status);
            if info.first.kind.is_read() {
                info.absorb_read(response);
                out.extend(info.ready_beats());
            } else if info.write_complete() {
                out.push(Response::from_request(&info.first, info.status));
            }
        }
        if info.finished() {
            let _ = self.open.remove(&key);
        }
        Some(out)
    }
}
