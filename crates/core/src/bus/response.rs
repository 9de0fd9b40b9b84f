//! Response envelope.

use std::fmt;

use super::request::Request;

/// Completion status of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResponseStatus {
    /// Transfer completed.
    #[default]
    Ok,
    /// Not accepted: retry the same request later. Never carries payload.
    Nacc,
    /// Data error (e.g. ECC failure).
    DataError,
    /// Address error (decode failure).
    AddressError,
    /// Both address and data error.
    AddressDataError,
}

impl ResponseStatus {
    /// Returns `true` for the address-error family, which ends a transaction immediately.
    #[inline]
    pub const fn is_address_error(self) -> bool {
        matches!(self, Self::AddressError | Self::AddressDataError)
    }

    /// Returns `true` for any error status.
    #[inline]
    pub const fn is_error(self) -> bool {
        matches!(
            self,
            Self::DataError | Self::AddressError | Self::AddressDataError
        )
    }

    /// Two-bit encoding used by the PIF and AXI response channels.
    #[inline]
    pub const fn encoding(self) -> u64 {
        match self {
            Self::Ok | Self::Nacc => 0,
            Self::AddressError => 1,
            Self::DataError => 2,
            Self::AddressDataError => 3,
        }
    }

    /// Decodes the two-bit response encoding.
    #[inline]
    pub const fn from_encoding(bits: u64) -> Self {
        match bits & 0b11 {
            0 => Self::Ok,
            1 => Self::AddressError,
            2 => Self::DataError,
            _ => Self::AddressDataError,
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "RSP_OK",
            Self::Nacc => "RSP_NACC",
            Self::DataError => "RSP_DATA_ERROR",
            Self::AddressError => "RSP_ADDRESS_ERROR",
            Self::AddressDataError => "RSP_ADDRESS_DATA_ERROR",
        })
    }
}

/// One response beat.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    /// Completion status.
    pub status: ResponseStatus,
    /// Address of the data carried by this beat.
    pub address: u64,
    /// Beat size in bytes.
    pub size: u32,
    /// Tag of the transaction being answered.
    pub tag: u64,
    /// Transaction ID copied from the request.
    pub id: u8,
    /// Route ID copied from the request.
    pub route_id: u32,
    /// One-based beat number.
    pub transfer_number: u32,
    /// Set on the final beat of the response.
    pub last_transfer: bool,
    /// Read data (`size` bytes) or empty.
    pub buffer: Vec<u8>,
}

impl Response {
    /// Builds the (first) response to `request`.
    pub fn from_request(request: &Request, status: ResponseStatus) -> Self {
        Self {
            status,
            address: request.address,
            size: request.size,
            tag: request.tag,
            id: request.id,
            route_id: request.route_id,
            transfer_number: 1,
            last_transfer: true,
            buffer: Vec::new(),
        }
    }

    /// Builds the NACC answer to `request`: same identity, no payload.
    pub fn nacc(request: &Request) -> Self {
        let mut rsp = Self::from_request(request, ResponseStatus::Nacc);
        rsp.transfer_number = request.transfer_number;
        rsp.last_transfer = request.last_transfer;
        rsp
    }

    /// Builds beat `beat` (zero based) of the read response to `request`.
    pub fn read_beat(request: &Request, beat: u32, data: Vec<u8>) -> Self {
        let beats = if request.kind.is_block() || request.kind.is_burst() {
            request.num_transfers.max(1)
        } else {
            1
        };
        Self {
            address: request.beat_address(beat),
            transfer_number: beat + 1,
            last_transfer: beat + 1 == beats,
            buffer: data,
            ..Self::from_request(request, ResponseStatus::Ok)
        }
    }

    /// Returns `true` if this is a NACC.
    #[inline]
    pub fn is_nacc(&self) -> bool {
        self.status == ResponseStatus::Nacc
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:#010x}/{}] id={} route={} tag={} xfer={}{}",
            self.status,
            self.address,
            self.size,
            self.id,
            self.route_id,
            self.tag,
            self.transfer_number,
            if self.last_transfer { " last" } else { "" }
        )
    }
}
