//! Randomized Properties.
//!
//! Invariants that must hold for any traffic mix: per-port ordering, clock-phase
//! alignment, width-conversion data integrity, bounded priority starvation, unbroken
//! locked sequences and route-ID pool bounds.

use std::collections::HashMap;

use busarb_core::arbiter::policy::{ArbitrationEngine, Contender, PortPolicy};
use busarb_core::bus::{Request, RequestType};
use busarb_core::common::Time;
use busarb_core::config::ClockConfig;
use busarb_core::sim::{Clock, Simulator};
use proptest::prelude::*;

use crate::common::builder::ArbiterBuilder;

fn contender() -> Option<Contender> {
    Some(Contender {
        kind: RequestType::Read,
        address: 0,
        total_bytes: 4,
        arrival_cycle: 0,
        xfer_en: false,
    })
}

fn arb_clock() -> impl Strategy<Value = (Time, Time, Time)> {
    (1u64..5000).prop_flat_map(|period| (Just(period), 0..period, 0..period))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_requests_leave_each_port_in_order(
        traffic in prop::collection::vec((0usize..3, 0u64..4), 1..24)
    ) {
        let config = ArbiterBuilder::new().ports(3).fifo_depth(3).system();
        let mut sim = Simulator::new(&config).unwrap();
        let mut expected: Vec<Vec<u64>> = vec![Vec::new(); 3];
        for (i, (port, gap)) in traffic.iter().enumerate() {
            let address = 0x1000 * (*port as u64 + 1) + 4 * i as u64;
            sim.masters[*port].push(gap * 1000, Request::read(address, 4));
            expected[*port].push(address);
        }
        let _ = sim.run_to_completion().unwrap();

        let mut seen: Vec<Vec<u64>> = vec![Vec::new(); 3];
        for (_, request) in sim.memory.accepted() {
            seen[request.route_id as usize].push(request.address);
        }
        prop_assert_eq!(&seen, &expected);
        for (port, master) in sim.masters.iter().enumerate() {
            prop_assert_eq!(master.responses().len(), expected[port].len());
        }
        prop_assert!(sim.arbiter.is_idle());
        prop_assert_eq!(sim.arbiter.request_records_in_use(), 0);
    }

    #[test]
    fn prop_phase_alignment_lands_on_phase(
        (period, posedge, phase) in arb_clock(),
        now in 0u64..1_000_000_000,
    ) {
        let clock = Clock::new(&ClockConfig {
            clock_period: period,
            system_clock_period: None,
            posedge_offset: posedge,
        });
        let at = clock.at_phase(now, phase);
        prop_assert!(at >= now && at < now + period);
        prop_assert_eq!((at + period - posedge) % period, phase);
        let after = clock.after_phase(now, phase);
        prop_assert!(after > now && after <= now + period);
    }

    #[test]
    fn prop_converted_write_reads_back(
        master_log in 2u32..6,
        slave_log in 0u32..4,
        slot in 0u64..64,
        seed in any::<u8>(),
    ) {
        let master = 1u32 << master_log;
        let slave = 1u32 << slave_log;
        let config = ArbiterBuilder::new().widths(&[master, master], slave).system();
        let mut sim = Simulator::new(&config).unwrap();
        let address = slot * u64::from(master);
        let data: Vec<u8> = (0..master).map(|i| seed.wrapping_add(i as u8)).collect();

        sim.masters[0].push(0, Request::write(address, &data));
        sim.masters[0].push(0, Request::read(address, master));
        let _ = sim.run_to_completion().unwrap();

        let responses = sim.masters[0].responses();
        prop_assert_eq!(responses.len(), 2);
        prop_assert_eq!(&responses[1].1.buffer, &data);
        prop_assert_eq!(sim.arbiter.open_conversions(), 0);
    }

    #[test]
    fn prop_priority_decay_bounds_starvation(
        policies in prop::collection::vec((0u32..=8, 1u32..=3), 2..6),
    ) {
        let ports = policies.len();
        let mut engine = ArbitrationEngine::new(ports).with_policies(
            policies.iter().map(|(start, decrement)| PortPolicy::new(*start, 0, *decrement)).collect(),
        );
        let heads = vec![contender(); ports];
        let window = 9 * ports;
        let mut last_win = vec![0usize; ports];
        for round in 1..=(window * 4) {
            let winner = engine.select(&heads).unwrap();
            last_win[winner] = round;
            for (port, last) in last_win.iter().enumerate() {
                prop_assert!(round - last <= window, "port {} starved at round {}", port, round);
            }
        }
    }

    #[test]
    fn prop_locked_sequences_are_not_interleaved(
        traffic in prop::collection::vec((0usize..3, prop::bool::ANY), 1..12)
    ) {
        let config = ArbiterBuilder::new().ports(3).fifo_depth(4).system();
        let mut sim = Simulator::new(&config).unwrap();
        for (i, (port, block)) in traffic.iter().enumerate() {
            let address = 0x100 * i as u64;
            if *block {
                for beat in Request::block_write(address, 4, &[i as u8; 16]) {
                    sim.masters[*port].push(0, beat);
                }
            } else {
                sim.masters[*port].push(0, Request::read(address, 4));
            }
        }
        let _ = sim.run_to_completion().unwrap();

        let accepted = sim.memory.accepted();
        for pair in accepted.windows(2) {
            let (current, next) = (&pair[0].1, &pair[1].1);
            if !current.last_transfer {
                prop_assert_eq!(next.tag, current.tag);
            }
        }
        prop_assert_eq!(sim.arbiter.lock_owner(), None);
    }

    #[test]
    fn prop_route_ids_stay_within_the_pool(
        route_ids in 1usize..4,
        traffic in prop::collection::vec((0usize..2, 0u64..3), 1..16),
    ) {
        let config = ArbiterBuilder::new().route_ids(route_ids).system();
        let mut sim = Simulator::new(&config).unwrap();
        let mut originals = HashMap::new();
        for (i, (port, gap)) in traffic.iter().enumerate() {
            let request = Request::read(4 * i as u64, 4).with_route_id(i as u32 + 100);
            let _ = originals.insert(request.tag, request.route_id);
            sim.masters[*port].push(gap * 1000, request);
        }
        while sim.step().unwrap() {
            prop_assert!(sim.arbiter.route_ids_in_use() <= route_ids);
        }

        prop_assert_eq!(sim.arbiter.route_ids_in_use(), 0);
        let delivered: usize = sim.masters.iter().map(|m| m.responses().len()).sum();
        prop_assert_eq!(delivered, traffic.len());
        for master in &sim.masters {
            for (_, response) in master.responses() {
                prop_assert_eq!(Some(&response.route_id), originals.get(&response.tag));
            }
        }
    }
}
