//! Pin-level memory target.
//!
//! [`PinMemory`] sits on the slave side of the pins. It decodes what the transactor drives,
//! answers ready, and returns responses on the family's response signals:
//! - handshake families (PIF, AXI) go through the timed behavioural [`Memory`];
//! - APB and local memory writes are served in the accepting cycle;
//! - local memory reads drive read data a fixed number of cycles after acceptance.

use std::collections::{HashMap, VecDeque};

use tracing::trace;

use super::{Completion, PinInterface, PinTarget, SignalBank};
use crate::bus::{Request, RequestSink, Response, ResponseStatus};
use crate::common::{ProtocolError, Time};
use crate::sim::memory::Memory;

#[derive(Debug, Clone, Default)]
struct TargetPort {
    open: Option<Request>,
    responses: VecDeque<(Response, bool)>,
    fixed: VecDeque<(Time, Response)>,
}

/// Memory answering pin-level transactions on every transactor port.
#[derive(Debug)]
pub struct PinMemory {
    interface: Box<dyn PinInterface>,
    memory: Memory,
    period: Time,
    ports: Vec<TargetPort>,
    routes: HashMap<u64, (usize, bool)>,
    busy: u32,
}

impl PinMemory {
    /// Serves `num_ports` ports of `interface` from `memory`.
    pub fn new(interface: Box<dyn PinInterface>, memory: Memory, num_ports: usize, period: Time) -> Self {
        Self {
            interface,
            memory,
            period,
            ports: vec![TargetPort::default(); num_ports],
            routes: HashMap::new(),
            busy: 0,
        }
    }

    /// Refuses the next `samples` requests seen on any port.
    pub const fn refuse_next(&mut self, samples: u32) {
        self.busy = samples;
    }

    /// The memory behind the pins.
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    /// The memory behind the pins, mutably (for preloading).
    pub const fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Moves due memory responses to the queue of the port that issued them.
    fn collect_memory_responses(&mut self, now: Time) {
        while let Some(response) = self.memory.pop_due(now) {
            let Some(&(port, write)) = self.routes.get(&response.tag) else {
                continue;
            };
            if response.last_transfer || response.status.is_address_error() {
                let _ = self.routes.remove(&response.tag);
            }
            if let Some(target) = self.ports.get_mut(port) {
                target.responses.push_back((response, write));
            }
        }
    }

    /// Serves `request` immediately through debug access.
    fn access_now(&mut self, request: &Request) -> Response {
        if !self.memory.decodes(request.address, u64::from(request.size)) {
            return Response::from_request(request, ResponseStatus::AddressError);
        }
        if request.kind.is_write() {
            for (lane, byte) in request.buffer.iter().enumerate() {
                if request.byte_enables >> lane & 1 == 1 {
                    self.memory.nb_poke(request.address + lane as u64, &[*byte]);
                }
            }
            Response::from_request(request, ResponseStatus::Ok)
        } else {
            let mut data = vec![0; request.size as usize];
            self.memory.nb_peek(request.address, &mut data);
            Response::read_beat(request, 0, data)
        }
    }

    fn accept(&mut self, now: Time, port: usize, request: &Request, inp: &mut SignalBank) -> bool {
        match self.interface.completion(request) {
            Completion::Handshake => {
                if !self.memory.nb_request(now, request) {
                    return false;
                }
                let _ = self
                    .routes
                    .insert(request.tag, (port, request.kind.is_write()));
            }
            Completion::OnAccept => {
                let response = self.access_now(request);
                self.interface.drive_response(inp, &response, request.kind.is_write());
            }
            Completion::AfterCycles(cycles) => {
                let response = self.access_now(request);
                self.ports[port]
                    .fixed
                    .push_back((now + self.period * cycles, response));
            }
        }
        true
    }
}

impl PinTarget for PinMemory {
    fn evaluate(
        &mut self,
        now: Time,
        port: usize,
        outputs: &SignalBank,
        inputs: &mut SignalBank,
    ) -> Result<(), ProtocolError> {
        if port >= self.ports.len() {
            return Err(ProtocolError::InvalidPort {
                port,
                num_ports: self.ports.len(),
            });
        }
        self.collect_memory_responses(now);
        self.interface.release_response(inputs);

        if let Some((response, write)) = self.ports[port].responses.front() {
            self.interface.drive_response(inputs, response, *write);
            if self.interface.response_ready(outputs, *write) {
                trace!(port, %response, "pin response transferred");
                let _ = self.ports[port].responses.pop_front();
            }
        }

        let open = self.ports[port].open.clone();
        if let Some(mut request) = self.interface.decode_request(outputs, open.as_ref()) {
            if let Some(previous) = open.filter(|p| p.kind == request.kind && request.kind.is_multi_request()) {
                request.tag = previous.tag;
                request.transfer_number = previous.transfer_number + 1;
            }
            let ready = if self.busy > 0 {
                self.busy -= 1;
                false
            } else {
                self.accept(now, port, &request, inputs)
            };
            self.interface.drive_request_ready(inputs, &request, ready);
            if ready {
                trace!(port, %request, "pin request served");
                self.ports[port].open =
                    (request.kind.is_multi_request() && !request.last_transfer).then_some(request);
            }
        }

        while let Some((due, _)) = self.ports[port].fixed.front() {
            if *due > now {
                break;
            }
            if let Some((_, response)) = self.ports[port].fixed.pop_front() {
                self.interface.drive_response(inputs, &response, false);
            }
        }
        Ok(())
    }
}
