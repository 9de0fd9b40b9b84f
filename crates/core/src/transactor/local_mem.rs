//! Local memory load/store port.
//!
//! Master driven: `En`, `Wr`, `Addr`, `ByteEn`, `WrData`. Slave driven: `Busy`, `Data`.
//! There is no response handshake: writes complete when accepted and read data is valid a
//! fixed number of cycles after the read was accepted. Only one address can be presented at
//! a time, so a busy refusal NACCs the whole port queue.

use super::{ADDRESS_BITS, Completion, PinInterface, SignalBank, WireResponse};
use crate::bus::{Request, RequestType, Response, full_enables};
use crate::config::PinProtocol;

const EN: &str = "En";
const WR: &str = "Wr";
const ADDR: &str = "Addr";
const BYTE_EN: &str = "ByteEn";
const WR_DATA: &str = "WrData";
const BUSY: &str = "Busy";
const DATA: &str = "Data";

/// Local memory pin encoding.
#[derive(Debug, Clone, Copy)]
pub struct LocalMemoryPins {
    byte_width: u32,
    has_busy: bool,
    read_delay: u64,
}

impl LocalMemoryPins {
    /// Creates the encoding for a `byte_width` wide memory.
    pub const fn new(byte_width: u32, has_busy: bool, read_delay: u64) -> Self {
        Self {
            byte_width,
            has_busy,
            read_delay,
        }
    }

    /// Cycles from acceptance to valid read data.
    pub const fn read_delay(&self) -> u64 {
        self.read_delay
    }

    fn lane(&self, address: u64) -> usize {
        (address % u64::from(self.byte_width)) as usize
    }
}

impl PinInterface for LocalMemoryPins {
    fn protocol(&self) -> PinProtocol {
        PinProtocol::LocalMemory
    }

    fn byte_width(&self) -> u32 {
        self.byte_width
    }

    fn declare(&self) -> (SignalBank, SignalBank) {
        let bits = self.byte_width as usize * 8;
        let out = SignalBank::new()
            .with(EN, 1)
            .with(WR, 1)
            .with(ADDR, ADDRESS_BITS)
            .with(BYTE_EN, self.byte_width as usize)
            .with(WR_DATA, bits);
        let mut inp = SignalBank::new().with(DATA, bits);
        if self.has_busy {
            inp = inp.with(BUSY, 1);
        }
        (out, inp)
    }

    fn supports(&self, kind: RequestType) -> bool {
        matches!(kind, RequestType::Read | RequestType::Write)
    }

    fn completion(&self, request: &Request) -> Completion {
        if request.kind.is_read() {
            Completion::AfterCycles(self.read_delay)
        } else {
            Completion::OnAccept
        }
    }

    fn nacc_on_refusal(&self) -> bool {
        true
    }

    fn drive_request(&self, request: &Request, out: &mut SignalBank) {
        let lane = self.lane(request.address);
        out.drive(EN, true);
        out.drive(WR, request.kind.is_write());
        out.drive_u64(ADDR, request.address);
        out.drive_u64(BYTE_EN, request.byte_enables << lane);
        if request.kind.is_write() {
            out.drive_bytes(WR_DATA, lane, &request.buffer);
        }
    }

    fn release_request(&self, out: &mut SignalBank) {
        out.clear(&[EN, WR, BYTE_EN, WR_DATA]);
    }

    fn request_ready(&self, _request: &Request, inp: &SignalBank) -> bool {
        !(self.has_busy && inp.is_high(BUSY))
    }

    fn drive_response_ready(&self, _out: &mut SignalBank, _ready: bool) {}

    fn sample_responses(&self, _out: &SignalBank, _inp: &SignalBank) -> Vec<WireResponse> {
        Vec::new()
    }

    fn read_data_signal(&self) -> &'static str {
        DATA
    }

    fn decode_request(&self, out: &SignalBank, _open: Option<&Request>) -> Option<Request> {
        if !out.is_high(EN) {
            return None;
        }
        let width = u64::from(self.byte_width);
        let address = out.value(ADDR) & !(width - 1);
        let byte_enables = out.value(BYTE_EN) & full_enables(self.byte_width);
        let request = if out.is_high(WR) {
            Request::write(address, &out.bytes(WR_DATA, 0, self.byte_width as usize))
        } else {
            Request::read(address, self.byte_width)
        };
        Some(request.with_byte_enables(byte_enables))
    }

    fn drive_request_ready(&self, inp: &mut SignalBank, _request: &Request, ready: bool) {
        inp.drive(BUSY, !ready);
    }

    fn drive_response(&self, inp: &mut SignalBank, response: &Response, _write: bool) {
        let lane = self.lane(response.address);
        inp.drive_bytes(DATA, lane, &response.buffer);
    }

    fn release_response(&self, inp: &mut SignalBank) {
        inp.clear(&[DATA]);
    }

    fn response_ready(&self, _out: &SignalBank, _write: bool) -> bool {
        true
    }
}
