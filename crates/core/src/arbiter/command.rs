//! Runtime command surface.
//!
//! Commands are single text lines:
//! 1. **`change_clock_period <factor> [<phase-factor>]`:** period becomes `factor` system
//!    periods; the rising edge moves to `phase-factor` system periods. Prints the previous factor.
//! 2. **`dump_profile_results`:** renders statistics, plus buffer high-water marks when
//!    `profile_buffers` is set.
//! 3. **`reset [hard]`:** drains and reinitializes the arbiter.
//! 4. **`dump_lock`:** reports the port holding the arbitration lock.

use std::fmt;

use tracing::info;

use super::Arbiter;
use crate::common::{CommandError, ConfigError};

/// A parsed runtime command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Rescale the clock period.
    ChangeClockPeriod {
        /// New period in system clock periods.
        factor: u64,
        /// New rising-edge offset in system clock periods.
        phase_factor: Option<u64>,
    },
    /// Render statistics.
    DumpProfileResults,
    /// Reset the arbiter.
    Reset {
        /// Also clear statistics and restore the configured clock.
        hard: bool,
    },
    /// Report the lock owner.
    DumpLock,
}

fn number(command: &'static str, text: &str) -> Result<u64, CommandError> {
    text.parse().map_err(|_| CommandError::BadArgument {
        command,
        value: text.to_owned(),
    })
}

impl Command {
    /// Command words understood by [`Command::parse`].
    pub const NAMES: &'static [&'static str] =
        &["change_clock_period", "dump_profile_results", "reset", "dump_lock"];

    /// Parses one command line.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Err(CommandError::Unknown(String::new()));
        };
        let args: Vec<&str> = words.collect();
        match word {
            "change_clock_period" => {
                const NAME: &str = "change_clock_period";
                let factor = args.first().ok_or(CommandError::MissingArgument {
                    command: NAME,
                    argument: "factor",
                })?;
                Ok(Self::ChangeClockPeriod {
                    factor: number(NAME, factor)?,
                    phase_factor: args.get(1).map(|p| number(NAME, p)).transpose()?,
                })
            }
            "dump_profile_results" => Ok(Self::DumpProfileResults),
            "reset" => match args.first() {
                None => Ok(Self::Reset { hard: false }),
                Some(&"hard") => Ok(Self::Reset { hard: true }),
                Some(other) => Err(CommandError::BadArgument {
                    command: "reset",
                    value: (*other).to_owned(),
                }),
            },
            "dump_lock" => Ok(Self::DumpLock),
            other => Err(CommandError::Unknown(other.to_owned())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChangeClockPeriod {
                factor,
                phase_factor: Some(phase),
            } => write!(f, "change_clock_period {factor} {phase}"),
            Self::ChangeClockPeriod { factor, .. } => write!(f, "change_clock_period {factor}"),
            Self::DumpProfileResults => f.write_str("dump_profile_results"),
            Self::Reset { hard: true } => f.write_str("reset hard"),
            Self::Reset { hard: false } => f.write_str("reset"),
            Self::DumpLock => f.write_str("dump_lock"),
        }
    }
}

impl Arbiter {
    /// Parses and executes one command line, returning its printable result.
    pub fn execute_line(&mut self, line: &str) -> Result<String, CommandError> {
        let command = Command::parse(line)?;
        self.execute(command)
    }

    /// Executes `command`, returning its printable result.
    pub fn execute(&mut self, command: Command) -> Result<String, CommandError> {
        match command {
            Command::ChangeClockPeriod { factor, phase_factor } => {
                let mut clock = self.clock;
                let previous = clock.change_period(factor, phase_factor)?;
                if self.config.arbitration_phase >= clock.period() {
                    return Err(ConfigError::invalid(
                        "arbitration_phase",
                        format!(
                            "{} does not fit the new period {}",
                            self.config.arbitration_phase,
                            clock.period()
                        ),
                    )
                    .into());
                }
                if self.config.nacc_wait_time.is_some_and(|t| t > clock.period()) {
                    return Err(ConfigError::invalid(
                        "nacc_wait_time",
                        format!("exceeds the new period {}", clock.period()),
                    )
                    .into());
                }
                self.clock = clock;
                info!(factor, period = clock.period(), "clock period changed");
                Ok(previous.to_string())
            }
            Command::DumpProfileResults => {
                let profile = self.config.profile_buffers.then(|| self.buffer_profile());
                Ok(self.stats.render(profile.as_ref()))
            }
            Command::Reset { hard } => {
                self.reset(hard);
                Ok(String::new())
            }
            Command::DumpLock => Ok(match self.engine.lock_owner() {
                Some(port) => format!("locked by port {port}"),
                None => "unlocked".to_owned(),
            }),
        }
    }
}
