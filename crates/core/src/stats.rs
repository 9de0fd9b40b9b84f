//! Arbiter statistics collection and reporting.
//!
//! This module tracks the traffic seen by one arbiter. It provides:
//! 1. **Admission:** Accepted requests per port and rejections per cause.
//! 2. **Dispatch:** Arbitration rounds, downstream requests, downstream NACCs and retries.
//! 3. **Width conversion:** Converted transactions and the pieces they produced.
//! 4. **Responses:** Responses received from downstream and delivered upstream.
//! 5. **Buffers:** Queue, pool and route-ID high-water marks (`profile_buffers`).

use std::fmt::Write as _;

use crate::arbiter::queue::RejectCause;

/// Section names for selective stats output.
///
/// Valid section identifiers: `"admission"`, `"dispatch"`, `"conversion"`, `"response"`,
/// `"buffers"`. Pass an empty slice to `render_sections` to render all sections.
pub const STATS_SECTIONS: &[&str] = &["admission", "dispatch", "conversion", "response", "buffers"];

/// Occupancy snapshot used by the `buffers` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferProfile {
    /// Configured request FIFO depth per port.
    pub request_fifo_depths: Vec<usize>,
    /// Request FIFO high-water mark per port.
    pub request_fifo_high_water: Vec<usize>,
    /// Response FIFO high-water mark per port.
    pub response_fifo_high_water: Vec<usize>,
    /// Request-info pool high-water mark.
    pub request_pool_high_water: usize,
    /// Response-info pool high-water mark.
    pub response_pool_high_water: usize,
    /// Autonomous route-ID high-water mark.
    pub route_id_high_water: usize,
    /// Simultaneously open width-converted transactions, at most.
    pub converter_high_water: usize,
}

/// Counters of one arbiter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArbiterStats {
    /// Requests accepted, per port.
    pub accepted: Vec<u64>,
    /// Requests refused at admission, indexed by [`RejectCause::index`].
    pub rejected: [u64; RejectCause::ALL.len()],
    /// Arbitration rounds that selected a port.
    pub arbitrations: u64,
    /// Downstream `nb_request` calls, retries included.
    pub dispatched: u64,
    /// Dispatches refused downstream (synchronously or through a NACC response).
    pub downstream_naccs: u64,
    /// Upstream transfers rewritten by the width converter.
    pub converted: u64,
    /// Downstream requests produced by the width converter.
    pub converted_pieces: u64,
    /// Responses accepted from downstream.
    pub responses_received: u64,
    /// Responses delivered upstream.
    pub responses_delivered: u64,
    /// Upstream response offers that were refused and retried.
    pub upstream_retries: u64,
}

impl ArbiterStats {
    /// Creates zeroed counters for `num_ports` ports.
    pub fn new(num_ports: usize) -> Self {
        Self {
            accepted: vec![0; num_ports],
            ..Self::default()
        }
    }

    /// Counts an admission refusal.
    #[inline]
    pub fn record_reject(&mut self, cause: RejectCause) {
        self.rejected[cause.index()] += 1;
    }

    /// Total refusals for `cause`.
    #[inline]
    pub const fn rejected_for(&self, cause: RejectCause) -> u64 {
        self.rejected[cause.index()]
    }

    /// Total refusals for every cause.
    pub fn total_rejected(&self) -> u64 {
        self.rejected.iter().sum()
    }

    /// Renders only the requested sections.
    ///
    /// # Arguments
    ///
    /// * `sections` - Section names to render, or empty for all.
    /// * `profile` - Buffer occupancy; the `buffers` section is skipped without it.
    pub fn render_sections(&self, sections: &[String], profile: Option<&BufferProfile>) -> String {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let mut out = String::new();
        let _ = writeln!(out, "==========================================================");
        let _ = writeln!(out, "BUS ARBITER STATISTICS");
        let _ = writeln!(out, "==========================================================");
        if want("admission") {
            let accepted: u64 = self.accepted.iter().sum();
            let offered = accepted + self.total_rejected();
            let rate = if offered > 0 {
                100.0 * accepted as f64 / offered as f64
            } else {
                0.0
            };
            let _ = writeln!(out, "ADMISSION");
            let _ = writeln!(out, "  req.accepted           {accepted} ({rate:.2}%)");
            for (port, count) in self.accepted.iter().enumerate() {
                let _ = writeln!(out, "  req.accepted.port{port:<5} {count}");
            }
            for cause in RejectCause::ALL {
                let _ = writeln!(
                    out,
                    "  req.rejected           {:<10} | {cause}",
                    self.rejected_for(cause)
                );
            }
            let _ = writeln!(out, "----------------------------------------------------------");
        }
        if want("dispatch") {
            let _ = writeln!(out, "DISPATCH");
            let _ = writeln!(out, "  arb.rounds             {}", self.arbitrations);
            let _ = writeln!(out, "  down.requests          {}", self.dispatched);
            let _ = writeln!(out, "  down.nacc              {}", self.downstream_naccs);
            let _ = writeln!(out, "----------------------------------------------------------");
        }
        if want("conversion") {
            let _ = writeln!(out, "WIDTH CONVERSION");
            let _ = writeln!(out, "  pwc.transfers          {}", self.converted);
            let _ = writeln!(out, "  pwc.pieces             {}", self.converted_pieces);
            let _ = writeln!(out, "----------------------------------------------------------");
        }
        if want("response") {
            let _ = writeln!(out, "RESPONSES");
            let _ = writeln!(out, "  rsp.received           {}", self.responses_received);
            let _ = writeln!(out, "  rsp.delivered          {}", self.responses_delivered);
            let _ = writeln!(out, "  rsp.upstream_retries   {}", self.upstream_retries);
            let _ = writeln!(out, "----------------------------------------------------------");
        }
        if let Some(profile) = profile.filter(|_| want("buffers")) {
            let _ = writeln!(out, "BUFFERS");
            for (port, depth) in profile.request_fifo_depths.iter().enumerate() {
                let req = profile.request_fifo_high_water.get(port).copied().unwrap_or(0);
                let rsp = profile.response_fifo_high_water.get(port).copied().unwrap_or(0);
                let _ = writeln!(
                    out,
                    "  port{port:<4} req_fifo: {req:>3}/{depth:<3} | rsp_fifo: {rsp:>3}"
                );
            }
            let _ = writeln!(out, "  pool.request           {}", profile.request_pool_high_water);
            let _ = writeln!(out, "  pool.response          {}", profile.response_pool_high_water);
            let _ = writeln!(out, "  route_ids              {}", profile.route_id_high_water);
            let _ = writeln!(out, "  pwc.open               {}", profile.converter_high_water);
        }
        let _ = writeln!(out, "==========================================================");
        out
    }

    /// Renders every section.
    pub fn render(&self, profile: Option<&BufferProfile>) -> String {
        self.render_sections(&[], profile)
    }

    /// Prints every section to stdout.
    pub fn print(&self, profile: Option<&BufferProfile>) {
        print!("{}", self.render(profile));
    }
}
