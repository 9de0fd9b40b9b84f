//! Arbitration engine.
//!
//! Chooses which port's oldest request advances next. The engine sees only a summary of
//! each port's head request (`Contender`), so it can be exercised without pools or queues.
//! Selection proceeds in this order:
//! 1. **Lock:** while a port holds the lock only its lock group competes.
//! 2. **External order:** the granted port is served once it has a request.
//! 3. **Transfer enable:** the designated port preempts when its head carries `xfer_en`.
//! 4. **Priority with decay** or **round-robin** from the token.
//! 5. **Duplex pairing:** a WRITE picked on port 0/1 yields to a same-cycle overlapping READ
//!    on the paired port.

use std::collections::VecDeque;

use tracing::debug;

use crate::bus::RequestType;

/// Priority state of one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPolicy {
    /// Priority after winning (and initially).
    pub start: u32,
    /// Floor the priority decays toward.
    pub end: u32,
    /// Amount subtracted each time the port loses on priority.
    pub decrement: u32,
    /// Current priority; lower wins.
    pub current: u32,
}

impl PortPolicy {
    /// Creates a policy starting at `start`.
    pub const fn new(start: u32, end: u32, decrement: u32) -> Self {
        Self {
            start,
            end,
            decrement,
            current: start,
        }
    }

    /// Resets the current priority after a win.
    #[inline]
    pub const fn reset(&mut self) {
        self.current = self.start;
    }

    /// Moves the current priority toward `end` after a loss.
    #[inline]
    pub fn decay(&mut self) {
        self.current = self.current.saturating_sub(self.decrement).max(self.end);
    }
}

/// Summary of a port's oldest queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contender {
    /// Request type.
    pub kind: RequestType,
    /// First byte address.
    pub address: u64,
    /// Total bytes touched.
    pub total_bytes: u64,
    /// Clock cycle in which the request arrived.
    pub arrival_cycle: u64,
    /// Transfer-enable flag.
    pub xfer_en: bool,
}

impl Contender {
    fn overlaps(&self, other: &Self) -> bool {
        self.address < other.address + other.total_bytes.max(1)
            && other.address < self.address + self.total_bytes.max(1)
    }
}

/// Arbitration state shared by all ports of one arbiter.
#[derive(Debug, Clone)]
pub struct ArbitrationEngine {
    num_ports: usize,
    token: usize,
    policies: Option<Vec<PortPolicy>>,
    initial_policies: Option<Vec<PortPolicy>>,
    grants: Option<VecDeque<usize>>,
    groups: Vec<usize>,
    lock_owner: Option<usize>,
    duplex: bool,
    xfer_en_port: Option<usize>,
}

impl ArbitrationEngine {
    /// Creates a round-robin engine over `num_ports` ports, each in its own lock group.
    pub fn new(num_ports: usize) -> Self {
        Self {
            num_ports,
            token: num_ports.saturating_sub(1),
            policies: None,
            initial_policies: None,
            grants: None,
            groups: (0..num_ports).collect(),
            lock_owner: None,
            duplex: false,
            xfer_en_port: None,
        }
    }

    /// Switches to priority-with-decay arbitration.
    #[must_use]
    pub fn with_policies(mut self, policies: Vec<PortPolicy>) -> Self {
        self.initial_policies = Some(policies.clone());
        self.policies = Some(policies);
        self
    }

    /// Assigns lock groups (`groups[port]` is the group leader of `port`).
    #[must_use]
    pub fn with_lock_groups(mut self, groups: Vec<usize>) -> Self {
        self.groups = groups;
        self
    }

    /// Serves ports only in the order supplied through [`Self::push_grant`].
    #[must_use]
    pub fn with_external_order(mut self) -> Self {
        self.grants = Some(VecDeque::new());
        self
    }

    /// Enables read-over-write pairing of ports 0 and 1.
    #[must_use]
    pub const fn with_duplex_pairing(mut self, enabled: bool) -> Self {
        self.duplex = enabled;
        self
    }

    /// Lets `port` preempt arbitration with `xfer_en` requests.
    #[must_use]
    pub const fn with_xfer_en_port(mut self, port: Option<usize>) -> Self {
        self.xfer_en_port = port;
        self
    }

    /// Port served most recently.
    #[inline]
    pub const fn token(&self) -> usize {
        self.token
    }

    /// Port currently holding the lock.
    #[inline]
    pub const fn lock_owner(&self) -> Option<usize> {
        self.lock_owner
    }

    /// Current priority of every port, if priority arbitration is active.
    pub fn priorities(&self) -> Option<Vec<u32>> {
        self.policies
            .as_ref()
            .map(|policies| policies.iter().map(|p| p.current).collect())
    }

    /// Returns `true` if `a` and `b` share a lock group.
    #[inline]
    pub fn same_group(&self, a: usize, b: usize) -> bool {
        self.groups.get(a) == self.groups.get(b)
    }

    /// Returns `true` if `port` may be served while the lock state is what it is.
    pub fn may_serve(&self, port: usize) -> bool {
        self.lock_owner.is_none_or(|owner| self.same_group(owner, port))
    }

    /// Grants the lock to `port`.
    pub fn lock(&mut self, port: usize) {
        if self.lock_owner != Some(port) {
            debug!(port, "arbitration locked");
        }
        self.lock_owner = Some(port);
    }

    /// Releases the lock.
    pub fn unlock(&mut self) {
        if let Some(port) = self.lock_owner.take() {
            debug!(port, "arbitration unlocked");
        }
    }

    /// Appends `port` to the external grant sequence.
    pub fn push_grant(&mut self, port: usize) {
        if let Some(grants) = self.grants.as_mut() {
            grants.push_back(port);
        }
    }

    /// Number of grants not yet consumed.
    pub fn pending_grants(&self) -> usize {
        self.grants.as_ref().map_or(0, VecDeque::len)
    }

    /// Chooses the next port to serve.
    ///
    /// # Arguments
    ///
    /// * `heads` - One entry per port: the summary of its oldest request, if any.
    ///
    /// # Returns
    ///
    /// The selected port (the token has been advanced to it), or `None` when no eligible
    /// port has a request.
    pub fn select(&mut self, heads: &[Option<Contender>]) -> Option<usize> {
        let eligible = |port: usize| heads.get(port).is_some_and(Option::is_some);

        if let Some(owner) = self.lock_owner {
            let pick = self.round_robin(|p| eligible(p) && self.same_group(owner, p))?;
            return Some(self.grant(pick));
        }

        if let Some(grants) = self.grants.as_mut() {
            let port = *grants.front()?;
            if !eligible(port) {
                return None;
            }
            let _ = grants.pop_front();
            return Some(self.grant(port));
        }

        if let Some(port) = self.xfer_en_port {
            if heads.get(port).copied().flatten().is_some_and(|head| head.xfer_en) {
                return Some(self.grant(port));
            }
        }

        let pick = if self.policies.is_some() {
            self.by_priority(heads)?
        } else {
            self.round_robin(eligible)?
        };
        let pick = self.duplex_override(pick, heads);
        Some(self.grant(pick))
    }

    fn grant(&mut self, port: usize) -> usize {
        self.token = port;
        port
    }

    /// First port after the token satisfying `wanted`, scanning the full ring.
    fn round_robin(&self, wanted: impl Fn(usize) -> bool) -> Option<usize> {
        (1..=self.num_ports)
            .map(|step| (self.token + step) % self.num_ports)
            .find(|port| wanted(*port))
    }

    fn by_priority(&mut self, heads: &[Option<Contender>]) -> Option<usize> {
        let policies = self.policies.as_ref()?;
        let contenders: Vec<usize> = (0..self.num_ports)
            .filter(|p| heads.get(*p).is_some_and(Option::is_some))
            .collect();
        let best = contenders.iter().map(|p| policies[*p].current).min()?;
        let winner = self.round_robin(|p| contenders.contains(&p) && policies[p].current == best)?;
        if let Some(policies) = self.policies.as_mut() {
            for port in contenders {
                if port == winner {
                    policies[port].reset();
                } else if policies[port].current > best {
                    policies[port].decay();
                }
            }
        }
        Some(winner)
    }

    fn duplex_override(&self, pick: usize, heads: &[Option<Contender>]) -> usize {
        if !self.duplex || pick > 1 {
            return pick;
        }
        let other = 1 - pick;
        match (heads[pick], heads.get(other).copied().flatten()) {
            (Some(chosen), Some(paired))
                if chosen.kind.is_write()
                    && paired.kind.is_read()
                    && paired.arrival_cycle == chosen.arrival_cycle
                    && paired.overlaps(&chosen) =>
            {
                debug!(read_port = other, write_port = pick, "read overtakes overlapping write");
                other
            }
            _ => pick,
        }
    }

    /// Restores token, lock, priorities and grant sequence.
    pub fn reset(&mut self) {
        self.token = self.num_ports.saturating_sub(1);
        self.lock_owner = None;
        self.policies.clone_from(&self.initial_policies);
        if let Some(grants) = self.grants.as_mut() {
            grants.clear();
        }
    }
}
