use busarb_core::bus::Request;
use busarb_core::common::{CommandError, ConfigError};
use pretty_assertions::assert_eq;

use crate::common::builder::ArbiterBuilder;
use crate::common::harness::Bench;

#[test]
fn change_clock_period_reports_previous_factor() {
    let mut bench = Bench::new(ArbiterBuilder::new().build());
    assert_eq!(bench.arbiter.execute_line("change_clock_period 4").unwrap(), "1");
    assert_eq!(bench.period(), 4000);
    assert_eq!(bench.arbiter.execute_line("change_clock_period 2 1").unwrap(), "4");
    assert_eq!(bench.period(), 2000);
    assert_eq!(bench.arbiter.clock().posedge_offset(), 1000);
}

#[test]
fn clock_change_that_strands_the_arbitration_phase_is_refused() {
    let config = ArbiterBuilder::new()
        .arbitration_phase(600)
        .with(|c| c.clock.system_clock_period = Some(250))
        .build();
    let mut bench = Bench::new(config);
    let err = bench
        .arbiter
        .execute_line("change_clock_period 2")
        .unwrap_err();
    assert!(matches!(
        err,
        CommandError::Config(ConfigError::Invalid {
            param: "arbitration_phase",
            ..
        })
    ));
    assert_eq!(bench.period(), 1000);
}

#[test]
fn slower_clock_stretches_dispatch() {
    let mut bench = Bench::new(ArbiterBuilder::new().build());
    let _ = bench.arbiter.execute_line("change_clock_period 3").unwrap();
    assert!(bench.submit(0, &Request::read(0x40, 4)).is_accepted());
    bench.run_cycles(2);
    assert_eq!(bench.target.accepted[0].0, 3000);
}

#[test]
fn profile_dump_includes_buffers_when_enabled() {
    let config = ArbiterBuilder::new()
        .with(|c| c.profile_buffers = true)
        .build();
    let mut bench = Bench::new(config);
    assert!(bench.submit(1, &Request::read(0, 4)).is_accepted());
    bench.run_cycles(2);
    let report = bench.arbiter.execute_line("dump_profile_results").unwrap();
    assert!(report.contains("BUS ARBITER STATISTICS"));
    assert!(report.contains("BUFFERS"));

    let mut plain = Bench::new(ArbiterBuilder::new().build());
    let report = plain.arbiter.execute_line("dump_profile_results").unwrap();
    assert!(!report.contains("BUFFERS"));
}

#[test]
fn reset_drains_queues_and_hard_reset_clears_stats() {
    let mut bench = Bench::new(ArbiterBuilder::new().build());
    assert!(bench.submit(0, &Request::read(0, 4)).is_accepted());
    assert!(bench.submit(0, &Request::read(4, 4)).is_accepted());

    assert_eq!(bench.arbiter.execute_line("reset").unwrap(), "");
    assert!(bench.arbiter.is_idle());
    assert_eq!(bench.arbiter.request_records_in_use(), 0);
    assert_eq!(bench.arbiter.next_wakeup(), None);
    assert_eq!(bench.arbiter.stats().accepted, vec![2, 0]);

    let _ = bench.arbiter.execute_line("change_clock_period 5").unwrap();
    let _ = bench.arbiter.execute_line("reset hard").unwrap();
    assert_eq!(bench.arbiter.stats().accepted, vec![0, 0]);
    assert_eq!(bench.period(), 1000);
}

#[test]
fn unknown_and_malformed_commands_fail() {
    let mut bench = Bench::new(ArbiterBuilder::new().build());
    assert!(matches!(
        bench.arbiter.execute_line("dump_everything"),
        Err(CommandError::Unknown(word)) if word == "dump_everything"
    ));
    assert!(matches!(
        bench.arbiter.execute_line("change_clock_period fast"),
        Err(CommandError::BadArgument { .. })
    ));
    assert!(matches!(
        bench.arbiter.execute_line("reset soft"),
        Err(CommandError::BadArgument { command: "reset", .. })
    ));
    assert_eq!(bench.arbiter.execute_line("dump_lock").unwrap(), "unlocked");
}
