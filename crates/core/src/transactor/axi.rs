//! AMBA AXI.
//!
//! Reads use the AR and R channels; writes use AW, W and B. The first transfer of a write
//! drives AW and W together and is accepted when both are ready; later transfers drive W
//! only. Route IDs travel in the `*USER` fields. Valid is held until ready, never NACCed.

use super::{ADDRESS_BITS, Channel, Completion, MatchKey, PinInterface, SignalBank, WireResponse};
use crate::bus::{BurstType, Request, RequestType, Response, ResponseStatus, full_enables};
use crate::config::PinProtocol;

const ID_BITS: usize = 8;
const USER_BITS: usize = 16;

const AR_VALID: &str = "ARVALID";
const AR_ADDR: &str = "ARADDR";
const AR_ID: &str = "ARID";
const AR_LEN: &str = "ARLEN";
const AR_SIZE: &str = "ARSIZE";
const AR_BURST: &str = "ARBURST";
const AR_USER: &str = "ARUSER";
const R_READY: &str = "RREADY";
const AW_VALID: &str = "AWVALID";
const AW_ADDR: &str = "AWADDR";
const AW_ID: &str = "AWID";
const AW_LEN: &str = "AWLEN";
const AW_SIZE: &str = "AWSIZE";
const AW_BURST: &str = "AWBURST";
const AW_USER: &str = "AWUSER";
const W_VALID: &str = "WVALID";
const W_DATA: &str = "WDATA";
const W_STRB: &str = "WSTRB";
const W_LAST: &str = "WLAST";
const B_READY: &str = "BREADY";

const AR_READY: &str = "ARREADY";
const R_VALID: &str = "RVALID";
const R_DATA: &str = "RDATA";
const R_ID: &str = "RID";
const R_RESP: &str = "RRESP";
const R_LAST: &str = "RLAST";
const R_USER: &str = "RUSER";
const AW_READY: &str = "AWREADY";
const W_READY: &str = "WREADY";
const B_VALID: &str = "BVALID";
const B_ID: &str = "BID";
const B_RESP: &str = "BRESP";
const B_USER: &str = "BUSER";

/// `OKAY`, `SLVERR` and `DECERR` response codes.
pub fn resp_code(status: ResponseStatus) -> u64 {
    match status {
        ResponseStatus::Ok | ResponseStatus::Nacc => 0b00,
        ResponseStatus::DataError => 0b10,
        ResponseStatus::AddressError | ResponseStatus::AddressDataError => 0b11,
    }
}

/// Decodes `RRESP`/`BRESP`; `EXOKAY` reads as success.
pub const fn status_of(code: u64) -> ResponseStatus {
    match code & 0b11 {
        0b10 => ResponseStatus::DataError,
        0b11 => ResponseStatus::AddressError,
        _ => ResponseStatus::Ok,
    }
}

const fn burst_code(request: &Request) -> u64 {
    if request.kind.is_block() {
        return 0b10;
    }
    match request.burst {
        BurstType::Fixed => 0b00,
        BurstType::Incr => 0b01,
        BurstType::Wrap => 0b10,
    }
}

/// AXI pin encoding.
#[derive(Debug, Clone, Copy)]
pub struct AxiPins {
    byte_width: u32,
}

impl AxiPins {
    /// Creates the encoding for a `byte_width` wide data bus.
    pub const fn new(byte_width: u32) -> Self {
        Self { byte_width }
    }

    fn lane(&self, address: u64) -> usize {
        (address % u64::from(self.byte_width)) as usize
    }

    fn decode_read(&self, out: &SignalBank) -> Request {
        let len = out.value(AR_LEN) as u32 + 1;
        let size = 1u32 << out.value(AR_SIZE);
        let address = out.value(AR_ADDR);
        let mut request = match (len, out.value(AR_BURST)) {
            (1, _) => Request::read(address, size),
            (n, 0b10) => Request::block_read(address, size, n),
            (n, burst) => {
                let mut req = Request::burst_read(address, size, n);
                if burst == 0 {
                    req.burst = BurstType::Fixed;
                }
                req
            }
        };
        request.id = out.value(AR_ID) as u8;
        request.route_id = out.value(AR_USER) as u32;
        request
    }

    fn decode_write(&self, out: &SignalBank, open: Option<&Request>) -> Option<Request> {
        let mut request = if out.is_high(AW_VALID) {
            let len = out.value(AW_LEN) as u32 + 1;
            let size = 1u32 << out.value(AW_SIZE);
            let mut req = Request::write(out.value(AW_ADDR), &vec![0; size as usize]);
            req.kind = match (len, out.value(AW_BURST)) {
                (1, _) => RequestType::Write,
                (_, 0b10) => RequestType::BlockWrite,
                _ => RequestType::BurstWrite,
            };
            if out.value(AW_BURST) == 0 {
                req.burst = BurstType::Fixed;
            }
            req.num_transfers = len;
            req.id = out.value(AW_ID) as u8;
            req.route_id = out.value(AW_USER) as u32;
            req
        } else {
            let previous = open?;
            let mut req = previous.clone();
            req.transfer_number = previous.transfer_number + 1;
            req.address = previous.beat_address(1);
            req
        };
        let lane = self.lane(request.address);
        request.buffer = out.bytes(W_DATA, lane, request.size as usize);
        request.byte_enables = out.value(W_STRB) >> lane & full_enables(request.size);
        request.last_transfer = out.is_high(W_LAST);
        Some(request)
    }
}

impl PinInterface for AxiPins {
    fn protocol(&self) -> PinProtocol {
        PinProtocol::Axi
    }

    fn byte_width(&self) -> u32 {
        self.byte_width
    }

    fn declare(&self) -> (SignalBank, SignalBank) {
        let bits = self.byte_width as usize * 8;
        let out = SignalBank::new()
            .with(AR_VALID, 1)
            .with(AR_ADDR, ADDRESS_BITS)
            .with(AR_ID, ID_BITS)
            .with(AR_LEN, 8)
            .with(AR_SIZE, 3)
            .with(AR_BURST, 2)
            .with(AR_USER, USER_BITS)
            .with(R_READY, 1)
            .with(AW_VALID, 1)
            .with(AW_ADDR, ADDRESS_BITS)
            .with(AW_ID, ID_BITS)
            .with(AW_LEN, 8)
            .with(AW_SIZE, 3)
            .with(AW_BURST, 2)
            .with(AW_USER, USER_BITS)
            .with(W_VALID, 1)
            .with(W_DATA, bits)
            .with(W_STRB, self.byte_width as usize)
            .with(W_LAST, 1)
            .with(B_READY, 1);
        let inp = SignalBank::new()
            .with(AR_READY, 1)
            .with(R_VALID, 1)
            .with(R_DATA, bits)
            .with(R_ID, ID_BITS)
            .with(R_RESP, 2)
            .with(R_LAST, 1)
            .with(R_USER, USER_BITS)
            .with(AW_READY, 1)
            .with(W_READY, 1)
            .with(B_VALID, 1)
            .with(B_ID, ID_BITS)
            .with(B_RESP, 2)
            .with(B_USER, USER_BITS);
        (out, inp)
    }

    fn supports(&self, kind: RequestType) -> bool {
        kind != RequestType::Rcw
    }

    fn completion(&self, _request: &Request) -> Completion {
        Completion::Handshake
    }

    fn route_id_bits(&self) -> Option<usize> {
        Some(USER_BITS)
    }

    fn nacc_on_refusal(&self) -> bool {
        false
    }

    fn drive_request(&self, request: &Request, out: &mut SignalBank) {
        if request.kind.is_read() {
            let len = if request.kind.is_block() || request.kind.is_burst() {
                request.num_transfers.max(1) - 1
            } else {
                0
            };
            out.drive(AR_VALID, true);
            out.drive_u64(AR_ADDR, request.address);
            out.drive_u64(AR_ID, u64::from(request.id));
            out.drive_u64(AR_LEN, u64::from(len));
            out.drive_u64(AR_SIZE, u64::from(request.size.trailing_zeros()));
            out.drive_u64(AR_BURST, burst_code(request));
            out.drive_u64(AR_USER, u64::from(request.route_id));
            return;
        }
        if request.is_first_transfer() {
            out.drive(AW_VALID, true);
            out.drive_u64(AW_ADDR, request.address);
            out.drive_u64(AW_ID, u64::from(request.id));
            out.drive_u64(AW_LEN, u64::from(request.num_transfers.max(1) - 1));
            out.drive_u64(AW_SIZE, u64::from(request.size.trailing_zeros()));
            out.drive_u64(AW_BURST, burst_code(request));
            out.drive_u64(AW_USER, u64::from(request.route_id));
        }
        let lane = self.lane(request.address);
        out.drive(W_VALID, true);
        out.drive_bytes(W_DATA, lane, &request.buffer);
        out.drive_u64(W_STRB, request.byte_enables << lane);
        out.drive(W_LAST, request.last_transfer);
    }

    fn release_request(&self, out: &mut SignalBank) {
        out.clear(&[AR_VALID, AW_VALID, W_VALID, W_LAST, W_STRB]);
    }

    fn request_ready(&self, request: &Request, inp: &SignalBank) -> bool {
        if request.kind.is_read() {
            inp.is_high(AR_READY)
        } else if request.is_first_transfer() {
            inp.is_high(AW_READY) && inp.is_high(W_READY)
        } else {
            inp.is_high(W_READY)
        }
    }

    fn drive_response_ready(&self, out: &mut SignalBank, ready: bool) {
        out.drive(R_READY, ready);
        out.drive(B_READY, ready);
    }

    fn sample_responses(&self, out: &SignalBank, inp: &SignalBank) -> Vec<WireResponse> {
        let mut wires = Vec::new();
        if inp.is_high(R_VALID) && out.is_high(R_READY) {
            wires.push(WireResponse {
                key: MatchKey {
                    channel: Channel::Read,
                    id: inp.value(R_ID) as u8,
                    route_id: inp.value(R_USER) as u32,
                },
                status: status_of(inp.value(R_RESP)),
                data: inp.bytes(R_DATA, 0, self.byte_width as usize),
                last: inp.is_high(R_LAST),
            });
        }
        if inp.is_high(B_VALID) && out.is_high(B_READY) {
            wires.push(WireResponse {
                key: MatchKey {
                    channel: Channel::Write,
                    id: inp.value(B_ID) as u8,
                    route_id: inp.value(B_USER) as u32,
                },
                status: status_of(inp.value(B_RESP)),
                data: Vec::new(),
                last: true,
            });
        }
        wires
    }

    fn read_data_signal(&self) -> &'static str {
        R_DATA
    }

    fn decode_request(&self, out: &SignalBank, open: Option<&Request>) -> Option<Request> {
        if out.is_high(AR_VALID) {
            Some(self.decode_read(out))
        } else if out.is_high(W_VALID) {
            self.decode_write(out, open)
        } else {
            None
        }
    }

    fn drive_request_ready(&self, inp: &mut SignalBank, request: &Request, ready: bool) {
        if request.kind.is_read() {
            inp.drive(AR_READY, ready);
        } else {
            inp.drive(AW_READY, ready);
            inp.drive(W_READY, ready);
        }
    }

    fn drive_response(&self, inp: &mut SignalBank, response: &Response, write: bool) {
        self.release_response(inp);
        if write {
            inp.drive(B_VALID, true);
            inp.drive_u64(B_ID, u64::from(response.id));
            inp.drive_u64(B_RESP, resp_code(response.status));
            inp.drive_u64(B_USER, u64::from(response.route_id));
        } else {
            let lane = self.lane(response.address);
            inp.drive(R_VALID, true);
            inp.drive_bytes(R_DATA, lane, &response.buffer);
            inp.drive_u64(R_ID, u64::from(response.id));
            inp.drive_u64(R_RESP, resp_code(response.status));
            inp.drive(R_LAST, response.last_transfer);
            inp.drive_u64(R_USER, u64::from(response.route_id));
        }
    }

    fn release_response(&self, inp: &mut SignalBank) {
        inp.clear(&[R_VALID, R_LAST, B_VALID]);
    }

    fn response_ready(&self, out: &SignalBank, write: bool) -> bool {
        out.is_high(if write { B_READY } else { R_READY })
    }
}
