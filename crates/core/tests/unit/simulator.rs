use busarb_core::bus::{RequestSink, ResponseStatus};
use busarb_core::common::{ConfigError, SimError};
use busarb_core::sim::Simulator;
use pretty_assertions::assert_eq;

use crate::common::builder::ArbiterBuilder;

fn default_simulator() -> Simulator {
    Simulator::new(&ArbiterBuilder::new().system()).unwrap()
}

#[test]
fn scripted_read_completes_after_three_cycles() {
    let mut sim = default_simulator();
    sim.memory.nb_poke(0x1000, &[9, 8, 7, 6]);
    sim.load_script("# cycle port type address size\n0 0 READ 0x1000 4\n").unwrap();
    let end = sim.run_to_completion().unwrap();

    let (at, response) = &sim.masters[0].responses()[0];
    assert_eq!(*at, 3000);
    assert_eq!(response.buffer, vec![9, 8, 7, 6]);
    assert_eq!(end, 3000);
    assert!(sim.arbiter.is_idle());
}

#[test]
fn written_data_reads_back() {
    let mut sim = default_simulator();
    sim.load_script(
        "0 1 WRITE 0x40 4 0xde 0xad 0xbe 0xef\n\
         2 1 READ  0x40 4\n",
    )
    .unwrap();
    let _ = sim.run_to_completion().unwrap();

    let responses = sim.masters[1].responses();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[1].1.buffer, vec![0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn block_read_beats_arrive_in_wrap_order() {
    let mut sim = default_simulator();
    sim.memory.nb_poke(0x20, &(0u8..16).collect::<Vec<_>>());
    sim.load_script("0 0 BLOCK_READ 0x28 4 4").unwrap();
    let _ = sim.run_to_completion().unwrap();

    let beats: Vec<u64> = sim.masters[0].responses().iter().map(|(_, r)| r.address).collect();
    assert_eq!(beats, vec![0x28, 0x2c, 0x20, 0x24]);
    assert!(sim.masters[0].responses()[3].1.last_transfer);
}

#[test]
fn read_conditional_write_swaps_on_match() {
    let mut sim = default_simulator();
    sim.memory.nb_poke(0x80, &[5, 5, 5, 5]);
    sim.load_script(
        "0 0 RCW  0x80 4 5 5 5 5 1 2 3 4\n\
         4 0 READ 0x80 4\n",
    )
    .unwrap();
    let _ = sim.run_to_completion().unwrap();

    let responses = sim.masters[0].responses();
    assert_eq!(responses[0].1.buffer, vec![5, 5, 5, 5]);
    assert_eq!(responses[1].1.buffer, vec![1, 2, 3, 4]);
}

#[test]
fn downstream_nacc_is_retried() {
    let mut config = ArbiterBuilder::new().system();
    config.memory.nacc_first = 1;
    let mut sim = Simulator::new(&config).unwrap();
    sim.load_script("0 0 READ 0x10 4").unwrap();
    let _ = sim.run_to_completion().unwrap();

    assert_eq!(sim.memory.refused(), 1);
    assert_eq!(sim.arbiter.stats().downstream_naccs, 1);
    assert_eq!(sim.masters[0].responses()[0].0, 4000);
}

#[test]
fn access_outside_memory_is_an_address_error() {
    let mut config = ArbiterBuilder::new().system();
    config.memory.size = 0x100;
    let mut sim = Simulator::new(&config).unwrap();
    sim.load_script("0 0 READ 0x100 4").unwrap();
    let _ = sim.run_to_completion().unwrap();
    assert_eq!(
        sim.masters[0].responses()[0].1.status,
        ResponseStatus::AddressError
    );
}

#[test]
fn script_naming_a_missing_port_is_rejected() {
    let mut sim = default_simulator();
    assert!(matches!(
        sim.load_script("0 5 READ 0 4"),
        Err(SimError::Config(ConfigError::Invalid { param: "traffic script", .. }))
    ));
    assert!(matches!(
        sim.load_script("0 0 FETCH 0 4"),
        Err(SimError::Config(ConfigError::Script { line: 1, .. }))
    ));
}

#[test]
fn run_stops_at_the_requested_time() {
    let mut sim = default_simulator();
    sim.load_script("0 0 READ 0 4\n5 1 READ 4 4").unwrap();
    let stopped = sim.run(Some(1500), u64::MAX).unwrap();
    assert!(stopped <= 1500);
    assert!(sim.masters[0].responses().is_empty());

    let _ = sim.run_to_completion().unwrap();
    assert_eq!(sim.masters[1].responses()[0].0, 8000);
    assert!(sim.masters.iter().all(|m| m.is_done()));
}

#[test]
fn step_limit_bounds_the_run() {
    let mut sim = default_simulator();
    sim.load_script("0 0 READ 0 4").unwrap();
    let _ = sim.run(None, 2).unwrap();
    assert_eq!(sim.steps(), 2);
    assert!(sim.next_event().is_some());
}

#[test]
fn commands_reach_the_arbiter() {
    let mut sim = default_simulator();
    assert_eq!(sim.execute_line("dump_lock").unwrap(), "unlocked");
    assert!(matches!(sim.execute_line("explode"), Err(SimError::Command(_))));
}
