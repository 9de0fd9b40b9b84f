//! Top-level simulator.
//!
//! Wires scripted masters, the arbiter and a behavioural memory together and runs them in
//! time order. Each step executes, at the earliest pending wake time:
//! 1. **Masters:** offer due requests to the arbiter.
//! 2. **Memory:** deliver due responses to the arbiter, deferring refused ones a period.
//! 3. **Arbiter:** run its request and response threads.
//!
//! A wake time earlier than the current time is treated as the current time.
//!
//! [`PinSimulator`] runs the same masters against the pin transactor and a pin-level
//! memory instead.

use tracing::{debug, info};

use super::clock::Clock;
use super::master::{TrafficMaster, parse_script};
use super::memory::Memory;
use crate::arbiter::Arbiter;
use crate::common::{ConfigError, SimError, Time};
use crate::config::Config;
use crate::transactor::{PinMemory, Transactor, interface_for};

/// Default bound on simulated steps when running to completion.
pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

/// Arbiter, memory and masters advanced in lockstep.
#[derive(Debug)]
pub struct Simulator {
    /// Arbiter under test.
    pub arbiter: Arbiter,
    /// Downstream memory.
    pub memory: Memory,
    /// One master per arbiter port.
    pub masters: Vec<TrafficMaster>,
    now: Time,
    steps: u64,
}

impl Simulator {
    /// Builds the system described by `config`.
    pub fn new(config: &Config) -> Result<Self, SimError> {
        config.validate()?;
        let arbiter = Arbiter::new(config.arbiter.clone())?;
        let period = arbiter.clock().period();
        let masters = (0..arbiter.num_ports())
            .map(|port| TrafficMaster::new(port, period))
            .collect();
        Ok(Self {
            memory: Memory::new(config.memory.clone(), period),
            arbiter,
            masters,
            now: 0,
            steps: 0,
        })
    }

    /// Current simulation time.
    pub const fn now(&self) -> Time {
        self.now
    }

    /// Steps executed so far.
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Parses `text` and queues every entry on its master.
    pub fn load_script(&mut self, text: &str) -> Result<(), SimError> {
        load_script(&mut self.masters, self.arbiter.clock(), text)
    }

    /// Earliest pending wake time of any component.
    pub fn next_event(&self) -> Option<Time> {
        self.masters
            .iter()
            .filter_map(TrafficMaster::next_wakeup)
            .chain(self.memory.next_wakeup())
            .chain(self.arbiter.next_wakeup())
            .min()
    }

    /// Advances to the next event; returns `false` once nothing is pending.
    pub fn step(&mut self) -> Result<bool, SimError> {
        let Some(at) = self.next_event() else {
            return Ok(false);
        };
        let now = at.max(self.now);
        self.now = now;
        self.steps += 1;

        for master in &mut self.masters {
            master.advance(now, &mut self.arbiter)?;
        }
        while let Some(response) = self.memory.due(now) {
            if self.arbiter.nb_respond(now, response)? {
                let _ = self.memory.pop_front();
            } else {
                self.memory.defer_front(now + self.arbiter.clock().period());
                break;
            }
        }
        self.arbiter.advance(now, &mut self.memory, &mut self.masters)?;
        Ok(true)
    }

    /// Runs until idle, until time `until`, or until `max_steps` steps, whichever comes first.
    ///
    /// # Returns
    ///
    /// The simulation time reached.
    pub fn run(&mut self, until: Option<Time>, max_steps: u64) -> Result<Time, SimError> {
        let start = self.steps;
        while self.steps - start < max_steps {
            if until.is_some_and(|limit| self.next_event().is_some_and(|at| at > limit)) {
                break;
            }
            if !self.step()? {
                break;
            }
        }
        if self.steps - start >= max_steps {
            debug!(max_steps, "step limit reached");
        }
        info!(now = self.now, steps = self.steps, "simulation stopped");
        Ok(self.now)
    }

    /// Runs until nothing is pending.
    pub fn run_to_completion(&mut self) -> Result<Time, SimError> {
        self.run(None, DEFAULT_STEP_LIMIT)
    }

    /// Executes a runtime command against the arbiter.
    pub fn execute_line(&mut self, line: &str) -> Result<String, SimError> {
        Ok(self.arbiter.execute_line(line)?)
    }
}

fn load_script(masters: &mut [TrafficMaster], clock: &Clock, text: &str) -> Result<(), SimError> {
    for entry in parse_script(text)? {
        let Some(master) = masters.get_mut(entry.port) else {
            return Err(ConfigError::invalid(
                "traffic script",
                format!("port {} does not exist", entry.port),
            )
            .into());
        };
        let at = clock.posedge_offset() + clock.cycles(entry.cycle);
        for request in entry.requests {
            master.push(at, request);
        }
    }
    Ok(())
}

/// Masters driving the pin transactor, answered by a pin-level memory.
#[derive(Debug)]
pub struct PinSimulator {
    /// Transactor under test.
    pub transactor: Transactor,
    /// Slave side of the pins.
    pub target: PinMemory,
    /// One master per transactor port.
    pub masters: Vec<TrafficMaster>,
    clock: Clock,
    now: Time,
    steps: u64,
}

impl PinSimulator {
    /// Builds the pin-level system described by `config`.
    pub fn new(config: &Config) -> Result<Self, SimError> {
        config.validate()?;
        let transactor = Transactor::new(config.transactor.clone())?;
        let clock = Clock::new(&config.transactor.clock);
        let ports = transactor.num_ports();
        let memory = Memory::new(config.memory.clone(), clock.period());
        Ok(Self {
            target: PinMemory::new(interface_for(&config.transactor), memory, ports, clock.period()),
            masters: (0..ports).map(|p| TrafficMaster::new(p, clock.period())).collect(),
            transactor,
            clock,
            now: 0,
            steps: 0,
        })
    }

    /// Current simulation time.
    pub const fn now(&self) -> Time {
        self.now
    }

    /// Parses `text` and queues every entry on its master.
    pub fn load_script(&mut self, text: &str) -> Result<(), SimError> {
        load_script(&mut self.masters, &self.clock, text)
    }

    /// Earliest pending wake time of any component.
    pub fn next_event(&self) -> Option<Time> {
        self.masters
            .iter()
            .filter_map(TrafficMaster::next_wakeup)
            .chain(self.transactor.next_wakeup())
            .min()
    }

    /// Advances to the next event; returns `false` once nothing is pending.
    pub fn step(&mut self) -> Result<bool, SimError> {
        let Some(at) = self.next_event() else {
            return Ok(false);
        };
        let now = at.max(self.now);
        self.now = now;
        self.steps += 1;
        for master in &mut self.masters {
            master.advance(now, &mut self.transactor)?;
        }
        self.transactor
            .advance(now, &mut self.target, &mut self.masters)?;
        Ok(true)
    }

    /// Runs until nothing is pending or `max_steps` steps were taken.
    pub fn run(&mut self, max_steps: u64) -> Result<Time, SimError> {
        let start = self.steps;
        while self.steps - start < max_steps && self.step()? {}
        info!(now = self.now, steps = self.steps, "pin simulation stopped");
        Ok(self.now)
    }
}
