//! Processor interface (PIF).
//!
//! One request channel (`POReq*`, ready `PIReqRdy`) and one response channel (`PIResp*`,
//! ready `PORespRdy`). Every transfer of a multi-transfer write is a separate request
//! carrying its own address. `POReqCntl` layout:
//!
//! | bits  | field                 |
//! |-------|-----------------------|
//! | 3:0   | transfers - 1         |
//! | 4     | last transfer         |
//! | 7:5   | log2(transfer size)   |
//! | 11:8  | request type          |
//!
//! `PIRespCntl` carries the last flag in bit 0 and the status encoding in bits 2:1.

use super::{ADDRESS_BITS, Channel, Completion, MatchKey, PinInterface, SignalBank, WireResponse};
use crate::bus::{Request, RequestType, Response, ResponseStatus, full_enables};
use crate::config::PinProtocol;

const REQ_VALID: &str = "POReqValid";
const REQ_CNTL: &str = "POReqCntl";
const REQ_ADRS: &str = "POReqAdrs";
const REQ_DATA: &str = "POReqData";
const REQ_DATA_BE: &str = "POReqDataBE";
const REQ_ID: &str = "POReqId";
const REQ_PRIORITY: &str = "POReqPriority";
const REQ_ROUTE_ID: &str = "POReqRouteId";
const RESP_RDY: &str = "PORespRdy";

const REQ_RDY: &str = "PIReqRdy";
const RESP_VALID: &str = "PIRespValid";
const RESP_CNTL: &str = "PIRespCntl";
const RESP_DATA: &str = "PIRespData";
const RESP_ID: &str = "PIRespId";
const RESP_PRIORITY: &str = "PIRespPriority";
const RESP_ROUTE_ID: &str = "PIRespRouteId";

const ROUTE_ID_BITS: usize = 16;

const fn type_code(kind: RequestType) -> u64 {
    match kind {
        RequestType::Read => 0x0,
        RequestType::BlockRead => 0x1,
        RequestType::Snoop => 0x2,
        RequestType::BurstRead => 0x3,
        RequestType::Rcw => 0x5,
        RequestType::Write => 0x8,
        RequestType::BlockWrite => 0x9,
        RequestType::BurstWrite => 0xb,
    }
}

const fn kind_of(code: u64) -> Option<RequestType> {
    Some(match code {
        0x0 => RequestType::Read,
        0x1 => RequestType::BlockRead,
        0x2 => RequestType::Snoop,
        0x3 => RequestType::BurstRead,
        0x5 => RequestType::Rcw,
        0x8 => RequestType::Write,
        0x9 => RequestType::BlockWrite,
        0xb => RequestType::BurstWrite,
        _ => return None,
    })
}

/// Encodes the request control field.
pub fn request_cntl(request: &Request) -> u64 {
    let transfers = u64::from(request.num_transfers.clamp(1, 16) - 1);
    transfers
        | u64::from(request.last_transfer) << 4
        | u64::from(request.size.trailing_zeros()) << 5
        | type_code(request.kind) << 8
}

/// PIF pin encoding.
#[derive(Debug, Clone, Copy)]
pub struct PifPins {
    byte_width: u32,
}

impl PifPins {
    /// Creates the encoding for a `byte_width` wide PIF.
    pub const fn new(byte_width: u32) -> Self {
        Self { byte_width }
    }

    fn lane(&self, address: u64) -> usize {
        (address % u64::from(self.byte_width)) as usize
    }
}

impl PinInterface for PifPins {
    fn protocol(&self) -> PinProtocol {
        PinProtocol::Pif
    }

    fn byte_width(&self) -> u32 {
        self.byte_width
    }

    fn declare(&self) -> (SignalBank, SignalBank) {
        let bits = self.byte_width as usize * 8;
        let out = SignalBank::new()
            .with(REQ_VALID, 1)
            .with(REQ_CNTL, 12)
            .with(REQ_ADRS, ADDRESS_BITS)
            .with(REQ_DATA, bits)
            .with(REQ_DATA_BE, self.byte_width as usize)
            .with(REQ_ID, 8)
            .with(REQ_PRIORITY, 2)
            .with(REQ_ROUTE_ID, ROUTE_ID_BITS)
            .with(RESP_RDY, 1);
        let inp = SignalBank::new()
            .with(REQ_RDY, 1)
            .with(RESP_VALID, 1)
            .with(RESP_CNTL, 3)
            .with(RESP_DATA, bits)
            .with(RESP_ID, 8)
            .with(RESP_PRIORITY, 2)
            .with(RESP_ROUTE_ID, ROUTE_ID_BITS);
        (out, inp)
    }

    fn supports(&self, _kind: RequestType) -> bool {
        true
    }

    fn completion(&self, _request: &Request) -> Completion {
        Completion::Handshake
    }

    fn match_key(&self, request: &Request) -> MatchKey {
        MatchKey {
            channel: Channel::Shared,
            id: request.id,
            route_id: request.route_id,
        }
    }

    fn route_id_bits(&self) -> Option<usize> {
        Some(ROUTE_ID_BITS)
    }

    fn nacc_on_refusal(&self) -> bool {
        true
    }

    fn drive_request(&self, request: &Request, out: &mut SignalBank) {
        let lane = self.lane(request.address);
        out.drive(REQ_VALID, true);
        out.drive_u64(REQ_CNTL, request_cntl(request));
        out.drive_u64(REQ_ADRS, request.address);
        out.drive_u64(REQ_DATA_BE, request.byte_enables << lane);
        out.drive_bytes(REQ_DATA, lane, &request.buffer);
        out.drive_u64(REQ_ID, u64::from(request.id));
        out.drive_u64(REQ_PRIORITY, u64::from(request.priority));
        out.drive_u64(REQ_ROUTE_ID, u64::from(request.route_id));
    }

    fn release_request(&self, out: &mut SignalBank) {
        out.clear(&[REQ_VALID, REQ_CNTL, REQ_DATA, REQ_DATA_BE]);
    }

    fn request_ready(&self, _request: &Request, inp: &SignalBank) -> bool {
        inp.is_high(REQ_RDY)
    }

    fn drive_response_ready(&self, out: &mut SignalBank, ready: bool) {
        out.drive(RESP_RDY, ready);
    }

    fn sample_responses(&self, out: &SignalBank, inp: &SignalBank) -> Vec<WireResponse> {
        if !(inp.is_high(RESP_VALID) && out.is_high(RESP_RDY)) {
            return Vec::new();
        }
        let cntl = inp.value(RESP_CNTL);
        vec![WireResponse {
            key: MatchKey {
                channel: Channel::Shared,
                id: inp.value(RESP_ID) as u8,
                route_id: inp.value(RESP_ROUTE_ID) as u32,
            },
            status: ResponseStatus::from_encoding(cntl >> 1),
            data: inp.bytes(RESP_DATA, 0, self.byte_width as usize),
            last: cntl & 1 == 1,
        }]
    }

    fn read_data_signal(&self) -> &'static str {
        RESP_DATA
    }

    fn decode_request(&self, out: &SignalBank, _open: Option<&Request>) -> Option<Request> {
        if !out.is_high(REQ_VALID) {
            return None;
        }
        let cntl = out.value(REQ_CNTL);
        let kind = kind_of(cntl >> 8 & 0xf)?;
        let size = 1u32 << (cntl >> 5 & 0x7);
        let address = out.value(REQ_ADRS);
        let lane = self.lane(address);
        let mut request = Request::read(address, size)
            .with_byte_enables(out.value(REQ_DATA_BE) >> lane & full_enables(size))
            .with_id(out.value(REQ_ID) as u8)
            .with_priority(out.value(REQ_PRIORITY) as u8)
            .with_route_id(out.value(REQ_ROUTE_ID) as u32)
            .with_last_transfer(cntl >> 4 & 1 == 1);
        request.kind = kind;
        request.num_transfers = (cntl & 0xf) as u32 + 1;
        if kind.is_write() {
            request.buffer = out.bytes(REQ_DATA, lane, size as usize);
        }
        Some(request)
    }

    fn drive_request_ready(&self, inp: &mut SignalBank, _request: &Request, ready: bool) {
        inp.drive(REQ_RDY, ready);
    }

    fn drive_response(&self, inp: &mut SignalBank, response: &Response, _write: bool) {
        let lane = self.lane(response.address);
        inp.drive(RESP_VALID, true);
        inp.drive_u64(
            RESP_CNTL,
            response.status.encoding() << 1 | u64::from(response.last_transfer),
        );
        inp.drive_bytes(RESP_DATA, lane, &response.buffer);
        inp.drive_u64(RESP_ID, u64::from(response.id));
        inp.drive_u64(RESP_ROUTE_ID, u64::from(response.route_id));
    }

    fn release_response(&self, inp: &mut SignalBank) {
        inp.clear(&[RESP_VALID, RESP_CNTL, RESP_DATA]);
    }

    fn response_ready(&self, out: &SignalBank, _write: bool) -> bool {
        out.is_high(RESP_RDY)
    }
}
