use busarb_core::arbiter::RequestState;
use busarb_core::bus::{Request, Response};
use busarb_core::common::Time;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::builder::ArbiterBuilder;
use crate::common::harness::Bench;

fn dispatch_times(bench: &Bench) -> Vec<Time> {
    bench.target.accepted.iter().map(|(t, _)| *t).collect()
}

#[rstest]
#[case(1, 1000)]
#[case(3, 3000)]
#[case(0, 0)]
fn request_delay_postpones_dispatch(#[case] delay: u64, #[case] expected: Time) {
    let mut bench = Bench::new(ArbiterBuilder::new().delays(delay, 1).build());
    assert!(bench.submit(0, &Request::read(0, 4)).is_accepted());
    bench.run_cycles(5);
    assert_eq!(dispatch_times(&bench), vec![expected]);
}

#[test]
fn arbitration_waits_for_its_phase() {
    let mut bench = Bench::new(ArbiterBuilder::new().arbitration_phase(400).build());
    bench.now = 100;
    assert!(bench.submit(0, &Request::read(0, 4)).is_accepted());
    assert_eq!(
        bench.arbiter.request_state(),
        RequestState::WaitingArbitrationPhase { at: 400 }
    );
    bench.run_cycles(3);
    assert_eq!(dispatch_times(&bench), vec![1100]);
}

#[test]
fn aligned_dispatch_lands_on_the_arbitration_phase() {
    let config = ArbiterBuilder::new()
        .arbitration_phase(400)
        .with(|c| c.align_request_phase = true)
        .build();
    let mut bench = Bench::new(config);
    bench.now = 100;
    assert!(bench.submit(0, &Request::read(0, 4)).is_accepted());
    bench.run_cycles(3);
    assert_eq!(dispatch_times(&bench), vec![1400]);
}

#[test]
fn back_to_back_dispatches_are_one_period_apart() {
    let mut bench = Bench::new(ArbiterBuilder::new().build());
    assert!(bench.submit(0, &Request::read(0, 4)).is_accepted());
    assert!(bench.submit(0, &Request::read(4, 4)).is_accepted());
    bench.run_cycles(5);
    assert_eq!(dispatch_times(&bench), vec![1000, 2000]);
}

#[test]
fn short_nacc_window_closes_early() {
    let config = ArbiterBuilder::new()
        .with(|c| c.nacc_wait_time = Some(500))
        .build();
    let mut bench = Bench::new(config);
    assert!(bench.submit(1, &Request::read(0, 4)).is_accepted());
    bench.run_until(1000);
    assert_eq!(
        bench.arbiter.request_state(),
        RequestState::WaitingNaccWindow { until: 1500 }
    );
    bench.run_until(1500);
    assert_eq!(bench.arbiter.request_state(), RequestState::Idle);
    assert!(bench.arbiter.is_idle());
}

#[test]
fn response_delay_postpones_delivery() {
    let mut bench = Bench::new(ArbiterBuilder::new().delays(1, 2).build());
    let read = Request::read(0x10, 4);
    assert!(bench.respond(&Response::read_beat(&read, 0, vec![1, 2, 3, 4])).unwrap());
    bench.run_cycles(1);
    assert!(bench.masters[0].responses().is_empty());
    bench.run_cycles(2);
    let (at, response) = &bench.masters[0].responses()[0];
    assert_eq!(*at, 2000);
    assert_eq!(response.buffer, vec![1, 2, 3, 4]);
}

#[test]
fn beats_repeat_and_transactions_recover() {
    let config = ArbiterBuilder::new()
        .with(|c| {
            c.response_repeat = 2;
            c.recovery_time = 4;
        })
        .build();
    let mut bench = Bench::new(config);
    let block = Request::block_read(0, 4, 2);
    assert!(bench.respond(&Response::read_beat(&block, 0, vec![0; 4])).unwrap());
    assert!(bench.respond(&Response::read_beat(&block, 1, vec![0; 4])).unwrap());
    bench.run_until(1500);
    let single = Request::read(0x40, 4);
    assert!(bench.respond(&Response::read_beat(&single, 0, vec![0; 4])).unwrap());
    bench.run_cycles(10);

    let times: Vec<Time> = bench.masters[0].responses().iter().map(|(t, _)| *t).collect();
    assert_eq!(times, vec![1000, 3000, 7000]);
    assert_eq!(bench.arbiter.stats().responses_delivered, 3);
}
