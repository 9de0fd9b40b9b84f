// Expectation builders return `&mut Expectation`.
#![allow(unused_results)]

use busarb_core::Arbiter;
use busarb_core::arbiter::translation::AddressTranslator;
use busarb_core::bus::{FastAccess, Request, RequestSink, Response, ResponseStatus, UpstreamPorts};
use busarb_core::common::{ProtocolError, Time};
use mockall::Sequence;
use pretty_assertions::assert_eq;

use crate::common::builder::ArbiterBuilder;
use crate::common::harness::Bench;
use crate::common::mocks::ports::{MockDownstream, MockUpstream};

fn run(
    arbiter: &mut Arbiter,
    until: Time,
    downstream: &mut dyn RequestSink,
    upstream: &mut dyn UpstreamPorts,
) {
    while let Some(at) = arbiter.next_wakeup().filter(|at| *at <= until) {
        arbiter.advance(at, downstream, upstream).unwrap();
    }
}

fn idle_upstream() -> Vec<MockUpstream> {
    (0..2).map(|_| MockUpstream::new()).collect()
}

#[test]
fn downstream_refusal_is_retried_one_period_later() {
    let mut arbiter = Arbiter::new(ArbiterBuilder::new().build()).unwrap();
    let mut downstream = MockDownstream::new();
    let mut seq = Sequence::new();
    downstream
        .expect_nb_request()
        .withf(|now, _| *now == 1000)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| false);
    downstream
        .expect_nb_request()
        .withf(|now, request| *now == 2000 && request.address == 0x80)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| true);

    assert!(arbiter.nb_request(0, 0, &Request::read(0x80, 4)).unwrap().is_accepted());
    run(&mut arbiter, 5000, &mut downstream, &mut idle_upstream());
    assert_eq!(arbiter.stats().downstream_naccs, 1);
    assert_eq!(arbiter.stats().dispatched, 2);
    assert!(arbiter.is_idle());
}

#[test]
fn lock_changes_are_forwarded_downstream() {
    let mut arbiter = Arbiter::new(ArbiterBuilder::new().build()).unwrap();
    let mut downstream = MockDownstream::new();
    let mut seq = Sequence::new();
    downstream
        .expect_nb_lock()
        .withf(|lock| *lock)
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    downstream
        .expect_nb_lock()
        .withf(|lock| !*lock)
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());

    arbiter.nb_lock(0, 1, true).unwrap();
    run(&mut arbiter, 0, &mut downstream, &mut idle_upstream());
    arbiter.nb_lock(1000, 1, false).unwrap();
    run(&mut arbiter, 1000, &mut downstream, &mut idle_upstream());
    assert_eq!(arbiter.next_wakeup(), None);
}

#[test]
fn debug_access_is_translated() {
    let translator = AddressTranslator::parse("0x1000 0x1fff 0x8000").unwrap();
    let mut arbiter = Arbiter::new(ArbiterBuilder::new().build())
        .unwrap()
        .with_translator(translator);
    let mut downstream = MockDownstream::new();
    downstream
        .expect_nb_poke()
        .withf(|address, data| *address == 0x8010 && data.to_vec() == vec![1, 2])
        .times(1)
        .return_const(());
    downstream
        .expect_nb_peek()
        .times(1)
        .returning(|address, buffer| {
            assert_eq!(address, 0x8010);
            buffer.fill(0xaa);
        });

    arbiter.nb_poke(1, 0x1010, &[1, 2], &mut downstream).unwrap();
    let mut buffer = [0u8; 2];
    arbiter.nb_peek(0, 0x1010, &mut buffer, &mut downstream).unwrap();
    assert_eq!(buffer, [0xaa, 0xaa]);
    assert_eq!(
        arbiter.nb_poke(2, 0, &[0], &mut downstream),
        Err(ProtocolError::InvalidPort { port: 2, num_ports: 2 })
    );
}

#[test]
fn fast_access_window_maps_back_through_translation() {
    let translator = AddressTranslator::parse("0x1000 0x1fff 0x8000").unwrap();
    let mut arbiter = Arbiter::new(ArbiterBuilder::new().build())
        .unwrap()
        .with_translator(translator);
    let mut downstream = MockDownstream::new();
    downstream
        .expect_nb_fast_access()
        .withf(|access| access.address == 0x8040)
        .times(1)
        .returning(|access| {
            access.clamp(0x7000, 0x8fff);
            true
        });

    let mut access = FastAccess::new(0x1040);
    assert!(arbiter.nb_fast_access(0, &mut access, &mut downstream).unwrap());
    assert!(access.granted);
    assert_eq!((access.start, access.end), (0x1000, 0x1fff));
}

#[test]
fn fast_access_is_denied_on_converting_ports() {
    let mut arbiter = Arbiter::new(ArbiterBuilder::new().widths(&[16, 4], 4).build()).unwrap();
    let mut downstream = MockDownstream::new();
    downstream.expect_nb_fast_access().never();

    let mut access = FastAccess::new(0x40);
    assert!(!arbiter.nb_fast_access(0, &mut access, &mut downstream).unwrap());
    assert!(!access.granted);
}

#[test]
fn upstream_refusal_is_offered_again() {
    let mut arbiter = Arbiter::new(ArbiterBuilder::new().build()).unwrap();
    let mut refusing = MockUpstream::new();
    let mut seq = Sequence::new();
    refusing
        .expect_nb_respond()
        .withf(|now, _| *now == 1000)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| false);
    refusing
        .expect_nb_respond()
        .withf(|now, response| *now == 2000 && response.address == 0x20)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| true);
    let mut upstream = vec![refusing, MockUpstream::new()];

    let read = Request::read(0x20, 4);
    assert!(arbiter.nb_respond(0, &Response::read_beat(&read, 0, vec![0; 4])).unwrap());
    run(&mut arbiter, 5000, &mut MockDownstream::new(), &mut upstream);
    assert_eq!(arbiter.stats().upstream_retries, 1);
    assert_eq!(arbiter.stats().responses_delivered, 1);
}

#[test]
fn nacc_inside_the_window_retries_the_piece() {
    let mut bench = Bench::new(ArbiterBuilder::new().build());
    assert!(bench.submit(0, &Request::read(0x30, 4)).is_accepted());
    bench.run_until(1000);
    let sent = bench.target.accepted[0].1.clone();

    assert!(bench.respond(&Response::nacc(&sent)).unwrap());
    bench.run_until(3000);
    let offers: Vec<Time> = bench.target.offered.iter().map(|(t, _)| *t).collect();
    assert_eq!(offers, vec![1000, 2000]);
    assert_eq!(bench.arbiter.stats().downstream_naccs, 1);
    assert!(bench.arbiter.is_idle());

    assert_eq!(
        bench.respond(&Response::nacc(&sent)),
        Err(ProtocolError::UnexpectedNacc { tag: sent.tag })
    );
}

#[test]
fn error_status_is_passed_upstream() {
    let mut bench = Bench::new(ArbiterBuilder::new().build());
    let write = Request::write(0x50, &[1, 2, 3, 4]);
    let response = Response::from_request(&write, ResponseStatus::DataError);
    assert!(bench.respond(&response).unwrap());
    bench.run_cycles(2);
    assert_eq!(bench.masters[0].responses()[0].1.status, ResponseStatus::DataError);
}
