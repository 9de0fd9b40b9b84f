//! Scripted traffic master.
//!
//! A traffic script lists requests, one per line:
//!
//! ```text
//! # <cycle> <port> <TYPE> <address> <size> [<num_transfers>] [<byte>...] [key=value...]
//! 0   0 READ        0x1000 4
//! 2   1 BLOCK_WRITE 0x2000 4 4 0x11 0x22
//! 5   2 WRITE       0x3000 4 last=0 priority=1
//! ```
//!
//! `cycle` is the earliest clock cycle at which the request is offered. Missing write data
//! bytes follow the address pattern `(address + i) as u8`. Supported keys are `id`,
//! `route`, `priority`, `be` (byte enables) and `last`.
//!
//! Each [`TrafficMaster`] offers its port's requests in script order, retries a NACC one
//! clock period later, and records every response it receives.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::arbiter::Arbiter;
use crate::bus::{Request, RequestType, Response, ResponseSink, next_tag};
use crate::common::{ConfigError, ProtocolError, Time};
use crate::transactor::Transactor;

/// A component that takes requests from numbered upstream ports.
pub trait Ingress {
    /// Offers `request` on `port`; `Ok(false)` means NACC.
    fn offer(&mut self, now: Time, port: usize, request: &Request) -> Result<bool, ProtocolError>;
}

impl Ingress for Arbiter {
    fn offer(&mut self, now: Time, port: usize, request: &Request) -> Result<bool, ProtocolError> {
        Ok(self.nb_request(now, port, request)?.is_accepted())
    }
}

impl Ingress for Transactor {
    fn offer(&mut self, now: Time, port: usize, request: &Request) -> Result<bool, ProtocolError> {
        self.nb_request(now, port, request)
    }
}

/// One parsed script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    /// Earliest issue cycle.
    pub cycle: u64,
    /// Issuing port.
    pub port: usize,
    /// Transfers of the transaction, in issue order.
    pub requests: Vec<Request>,
}

fn script_error(line: usize, reason: impl Into<String>) -> ConfigError {
    ConfigError::Script {
        line,
        reason: reason.into(),
    }
}

fn parse_number(line: usize, text: &str) -> Result<u64, ConfigError> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| script_error(line, format!("`{text}` is not a number")))
}

fn narrow<T: TryFrom<u64>>(line: usize, what: &str, value: u64) -> Result<T, ConfigError> {
    T::try_from(value).map_err(|_| script_error(line, format!("{what} {value} out of range")))
}

/// Parses a whole traffic script.
pub fn parse_script(text: &str) -> Result<Vec<ScriptEntry>, ConfigError> {
    text.lines()
        .enumerate()
        .map(|(i, raw)| (i + 1, raw.split('#').next().unwrap_or_default().trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(number, line)| parse_line(number, line))
        .collect()
}

fn parse_line(line: usize, text: &str) -> Result<ScriptEntry, ConfigError> {
    let (options, fields): (Vec<&str>, Vec<&str>) =
        text.split_whitespace().partition(|w| w.contains('='));
    let [cycle, port, kind, address, size, rest @ ..] = fields.as_slice() else {
        return Err(script_error(line, "expected <cycle> <port> <TYPE> <address> <size>"));
    };
    let cycle = parse_number(line, cycle)?;
    let port = narrow(line, "port", parse_number(line, port)?)?;
    let kind = RequestType::from_mnemonic(kind)
        .ok_or_else(|| script_error(line, format!("unknown request type `{kind}`")))?;
    let address = parse_number(line, address)?;
    let size: u32 = narrow(line, "size", parse_number(line, size)?)?;

    let (num_transfers, data) = if kind.is_block() || kind.is_burst() {
        match rest.split_first() {
            Some((n, data)) => (narrow(line, "num_transfers", parse_number(line, n)?)?, data),
            None => (1, rest),
        }
    } else {
        (1, rest)
    };
    let data = data
        .iter()
        .map(|b| narrow::<u8>(line, "data byte", parse_number(line, b)?))
        .collect::<Result<Vec<u8>, _>>()?;
    let fill = |len: usize| -> Vec<u8> {
        (0..len)
            .map(|i| data.get(i).copied().unwrap_or((address + i as u64) as u8))
            .collect()
    };

    let write_bytes = size as usize * num_transfers as usize;
    let mut requests = match kind {
        RequestType::Read => vec![Request::read(address, size)],
        RequestType::Snoop => {
            let mut req = Request::read(address, size);
            req.kind = RequestType::Snoop;
            vec![req]
        }
        RequestType::BlockRead => vec![Request::block_read(address, size, num_transfers)],
        RequestType::BurstRead => vec![Request::burst_read(address, size, num_transfers)],
        RequestType::Write => vec![Request::write(address, &fill(size as usize))],
        RequestType::BlockWrite => Request::block_write(address, size, &fill(write_bytes)),
        RequestType::BurstWrite => Request::burst_write(address, size, &fill(write_bytes)),
        RequestType::Rcw => rcw(address, &fill(size as usize * 2)),
    };

    for option in options {
        let Some((key, value)) = option.split_once('=') else {
            continue;
        };
        let value = parse_number(line, value)?;
        for req in &mut requests {
            match key {
                "id" => req.id = narrow(line, "id", value)?,
                "route" => req.route_id = narrow(line, "route", value)?,
                "priority" => req.priority = narrow(line, "priority", value)?,
                "be" => req.byte_enables = value,
                "last" => req.last_transfer = value != 0,
                other => return Err(script_error(line, format!("unknown option `{other}`"))),
            }
        }
    }

    Ok(ScriptEntry {
        cycle,
        port,
        requests,
    })
}

/// Builds the compare and swap transfers of a read-conditional-write.
fn rcw(address: u64, data: &[u8]) -> Vec<Request> {
    let tag = next_tag();
    let half = data.len() / 2;
    [&data[..half], &data[half..]]
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut req = Request::write(address, chunk).with_tag(tag);
            req.kind = RequestType::Rcw;
            req.num_transfers = 2;
            req.transfer_number = i as u32 + 1;
            req.last_transfer = i == 1;
            req
        })
        .collect()
}

#[derive(Debug, Clone)]
struct Pending {
    at: Time,
    request: Request,
    retry: bool,
}

/// Master driving one port from a script.
#[derive(Debug, Clone)]
pub struct TrafficMaster {
    port: usize,
    period: Time,
    queue: VecDeque<Pending>,
    accepted: Vec<(Time, Request)>,
    responses: Vec<(Time, Response)>,
    naccs: u64,
    refuse_responses: u32,
}

impl TrafficMaster {
    /// Creates an idle master for `port`.
    pub const fn new(port: usize, period: Time) -> Self {
        Self {
            port,
            period,
            queue: VecDeque::new(),
            accepted: Vec::new(),
            responses: Vec::new(),
            naccs: 0,
            refuse_responses: 0,
        }
    }

    /// Port driven by this master.
    pub const fn port(&self) -> usize {
        self.port
    }

    /// Queues `request` for issue no earlier than `at`.
    pub fn push(&mut self, at: Time, request: Request) {
        self.queue.push_back(Pending {
            at,
            request,
            retry: false,
        });
    }

    /// Refuses the next `count` responses offered to this master.
    pub const fn refuse_responses(&mut self, count: u32) {
        self.refuse_responses = count;
    }

    /// Requests accepted by the arbiter, with their acceptance time.
    pub fn accepted(&self) -> &[(Time, Request)] {
        &self.accepted
    }

    /// Responses received, with their arrival time.
    pub fn responses(&self) -> &[(Time, Response)] {
        &self.responses
    }

    /// Number of NACCs received at admission.
    pub const fn naccs(&self) -> u64 {
        self.naccs
    }

    /// Returns `true` when every scripted request was accepted.
    pub fn is_done(&self) -> bool {
        self.queue.is_empty()
    }

    /// Time the next request will be offered.
    pub fn next_wakeup(&self) -> Option<Time> {
        self.queue.front().map(|p| p.at)
    }

    /// Offers due requests to `ingress`; a NACC defers the head one period.
    pub fn advance(&mut self, now: Time, ingress: &mut dyn Ingress) -> Result<(), ProtocolError> {
        while let Some(head) = self.queue.front() {
            if head.at > now {
                break;
            }
            if ingress.offer(now, self.port, &head.request)? {
                if let Some(head) = self.queue.pop_front() {
                    self.accepted.push((now, head.request));
                }
                // Transfers of one port go out at most one per cycle.
                if let Some(next) = self.queue.front_mut() {
                    next.at = next.at.max(now + self.period);
                }
            } else {
                self.naccs += 1;
                debug!(port = self.port, "request NACCed, retrying next cycle");
                if let Some(head) = self.queue.front_mut() {
                    head.at = now + self.period;
                }
                break;
            }
        }
        Ok(())
    }
}

impl ResponseSink for TrafficMaster {
    fn nb_respond(&mut self, now: Time, response: &Response) -> bool {
        if self.refuse_responses > 0 {
            self.refuse_responses -= 1;
            return false;
        }
        if response.is_nacc() {
            // A late NACC returns the transfer to the queue, ahead of fresh work but
            // behind transfers NACCed before it.
            self.naccs += 1;
            let Some(request) = self
                .accepted
                .iter()
                .rev()
                .find(|(_, r)| r.tag == response.tag && r.transfer_number == response.transfer_number)
                .map(|(_, r)| r.clone())
            else {
                return true;
            };
            debug!(port = self.port, %request, "transfer NACCed after acceptance, requeued");
            let position = self.queue.iter().take_while(|p| p.retry).count();
            self.queue.insert(
                position,
                Pending {
                    at: now + self.period,
                    request,
                    retry: true,
                },
            );
            return true;
        }
        trace!(port = self.port, %response, "master received response");
        self.responses.push((now, response.clone()));
        true
    }
}
