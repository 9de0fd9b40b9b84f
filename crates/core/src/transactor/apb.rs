//! AMBA APB.
//!
//! A transfer spends one cycle in the setup phase (`PSEL` high, `PENABLE` low) and then
//! stays in the access phase until `PREADY`. The response (`PRDATA`, `PSLVERR`) is sampled
//! in the cycle `PREADY` is seen, so every request completes on acceptance.

use super::{ADDRESS_BITS, Completion, PinInterface, SignalBank, WireResponse};
use crate::bus::{Request, RequestType, Response, ResponseStatus, full_enables};
use crate::config::PinProtocol;

const PSEL: &str = "PSEL";
const PENABLE: &str = "PENABLE";
const PWRITE: &str = "PWRITE";
const PADDR: &str = "PADDR";
const PWDATA: &str = "PWDATA";
const PSTRB: &str = "PSTRB";
const PREADY: &str = "PREADY";
const PRDATA: &str = "PRDATA";
const PSLVERR: &str = "PSLVERR";

/// APB pin encoding.
#[derive(Debug, Clone, Copy)]
pub struct ApbPins {
    byte_width: u32,
}

impl ApbPins {
    /// Creates the encoding for a `byte_width` wide APB.
    pub const fn new(byte_width: u32) -> Self {
        Self { byte_width }
    }

    fn lane(&self, address: u64) -> usize {
        (address % u64::from(self.byte_width)) as usize
    }
}

impl PinInterface for ApbPins {
    fn protocol(&self) -> PinProtocol {
        PinProtocol::Apb
    }

    fn byte_width(&self) -> u32 {
        self.byte_width
    }

    fn declare(&self) -> (SignalBank, SignalBank) {
        let bits = self.byte_width as usize * 8;
        let out = SignalBank::new()
            .with(PSEL, 1)
            .with(PENABLE, 1)
            .with(PWRITE, 1)
            .with(PADDR, ADDRESS_BITS)
            .with(PWDATA, bits)
            .with(PSTRB, self.byte_width as usize);
        let inp = SignalBank::new()
            .with(PREADY, 1)
            .with(PRDATA, bits)
            .with(PSLVERR, 1);
        (out, inp)
    }

    fn supports(&self, kind: RequestType) -> bool {
        matches!(kind, RequestType::Read | RequestType::Write)
    }

    fn completion(&self, _request: &Request) -> Completion {
        Completion::OnAccept
    }

    fn setup_cycles(&self) -> u32 {
        1
    }

    fn nacc_on_refusal(&self) -> bool {
        false
    }

    fn drive_request(&self, request: &Request, out: &mut SignalBank) {
        let lane = self.lane(request.address);
        out.drive(PSEL, true);
        out.drive(PENABLE, false);
        out.drive(PWRITE, request.kind.is_write());
        out.drive_u64(PADDR, request.address);
        if request.kind.is_write() {
            out.drive_bytes(PWDATA, lane, &request.buffer);
            out.drive_u64(PSTRB, request.byte_enables << lane);
        } else {
            out.drive_u64(PSTRB, 0);
        }
    }

    fn enter_access(&self, out: &mut SignalBank) {
        out.drive(PENABLE, true);
    }

    fn release_request(&self, out: &mut SignalBank) {
        out.clear(&[PSEL, PENABLE, PWRITE, PSTRB]);
    }

    fn request_ready(&self, _request: &Request, inp: &SignalBank) -> bool {
        inp.is_high(PREADY)
    }

    fn drive_response_ready(&self, _out: &mut SignalBank, _ready: bool) {}

    fn sample_responses(&self, _out: &SignalBank, _inp: &SignalBank) -> Vec<WireResponse> {
        Vec::new()
    }

    fn sample_completion(&self, request: &Request, inp: &SignalBank) -> Response {
        let status = if inp.is_high(PSLVERR) {
            ResponseStatus::DataError
        } else {
            ResponseStatus::Ok
        };
        let mut response = Response::from_request(request, status);
        if request.kind.is_read() {
            let lane = self.lane(request.address);
            response.buffer = inp.bytes(PRDATA, lane, request.size as usize);
        }
        response
    }

    fn read_data_signal(&self) -> &'static str {
        PRDATA
    }

    fn decode_request(&self, out: &SignalBank, _open: Option<&Request>) -> Option<Request> {
        if !(out.is_high(PSEL) && out.is_high(PENABLE)) {
            return None;
        }
        let width = u64::from(self.byte_width);
        let address = out.value(PADDR) & !(width - 1);
        let request = if out.is_high(PWRITE) {
            Request::write(address, &out.bytes(PWDATA, 0, self.byte_width as usize))
                .with_byte_enables(out.value(PSTRB) & full_enables(self.byte_width))
        } else {
            Request::read(address, self.byte_width)
        };
        Some(request)
    }

    fn drive_request_ready(&self, inp: &mut SignalBank, _request: &Request, ready: bool) {
        inp.drive(PREADY, ready);
    }

    fn drive_response(&self, inp: &mut SignalBank, response: &Response, _write: bool) {
        inp.drive(PSLVERR, response.status.is_error());
        if !response.buffer.is_empty() {
            inp.drive_bytes(PRDATA, self.lane(response.address), &response.buffer);
        }
    }

    fn release_response(&self, inp: &mut SignalBank) {
        inp.clear(&[PSLVERR, PRDATA]);
    }

    fn response_ready(&self, _out: &SignalBank, _write: bool) -> bool {
        true
    }
}
