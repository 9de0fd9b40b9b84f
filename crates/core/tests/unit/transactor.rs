use busarb_core::Transactor;
use busarb_core::bus::{Request, RequestSink, RequestType, Response, ResponseStatus};
use busarb_core::common::{ProtocolError, Time};
use busarb_core::config::{PinProtocol, TransactorConfig};
use busarb_core::sim::{PinSimulator, TrafficMaster, parse_script};
use busarb_core::transactor::{PinInterface, PinState, PinTarget, SignalBank, interface_for};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::builder::pin_system;

const STEPS: u64 = 10_000;

fn pins(protocol: PinProtocol) -> PinSimulator {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    PinSimulator::new(&pin_system(protocol)).unwrap()
}

#[rstest]
#[case::local_memory(PinProtocol::LocalMemory)]
#[case::pif(PinProtocol::Pif)]
#[case::axi(PinProtocol::Axi)]
#[case::apb(PinProtocol::Apb)]
fn write_then_read_round_trips(#[case] protocol: PinProtocol) {
    let mut sim = pins(protocol);
    sim.masters[0].push(0, Request::write(0x40, &[0xca, 0xfe, 0xf0, 0x0d]));
    sim.masters[0].push(5000, Request::read(0x40, 4));
    let _ = sim.run(STEPS).unwrap();

    let responses = sim.masters[0].responses();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[1].1.buffer, vec![0xca, 0xfe, 0xf0, 0x0d]);
    assert_eq!(sim.transactor.stats().accepted, 2);
    assert_eq!(sim.transactor.stats().naccs, 0);
    assert_eq!(sim.transactor.next_wakeup(), None);
    assert_eq!(sim.transactor.pin_state(0), Some(PinState::Idle));
}

#[test]
fn pif_write_is_sampled_mid_cycle() {
    let mut sim = pins(PinProtocol::Pif);
    sim.load_script("0 0 WRITE 0x10 4").unwrap();
    let _ = sim.run(STEPS).unwrap();
    assert_eq!(sim.target.memory().accepted()[0].0, 500);
    assert_eq!(sim.masters[0].responses()[0].0, 1500);
}

#[test]
fn apb_spends_a_setup_cycle() {
    let mut sim = pins(PinProtocol::Apb);
    sim.load_script("0 0 WRITE 0x10 4").unwrap();
    let _ = sim.run(STEPS).unwrap();
    assert_eq!(sim.masters[0].responses()[0].0, 1500);

    let mut local = pins(PinProtocol::LocalMemory);
    local.load_script("0 0 WRITE 0x10 4").unwrap();
    let _ = local.run(STEPS).unwrap();
    assert_eq!(local.masters[0].responses()[0].0, 500);
}

#[test]
fn pif_block_transfers_cross_the_pins() {
    let mut sim = pins(PinProtocol::Pif);
    sim.load_script(
        "0  0 BLOCK_WRITE 0x20 4 4 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15\n\
         20 0 BLOCK_READ  0x28 4 4\n",
    )
    .unwrap();
    let _ = sim.run(STEPS).unwrap();

    let responses = sim.masters[0].responses();
    assert_eq!(responses.len(), 5);
    let beats: Vec<(u64, Vec<u8>)> = responses[1..]
        .iter()
        .map(|(_, r)| (r.address, r.buffer.clone()))
        .collect();
    assert_eq!(
        beats,
        vec![
            (0x28, vec![8, 9, 10, 11]),
            (0x2c, vec![12, 13, 14, 15]),
            (0x20, vec![0, 1, 2, 3]),
            (0x24, vec![4, 5, 6, 7]),
        ]
    );
    assert!(responses[4].1.last_transfer);
}

#[test]
fn pif_refusal_nacks_and_the_master_retries() {
    let mut sim = pins(PinProtocol::Pif);
    sim.target.refuse_next(1);
    sim.load_script("0 0 READ 0x80 4").unwrap();
    let _ = sim.run(STEPS).unwrap();

    assert_eq!(sim.transactor.stats().naccs, 1);
    assert_eq!(sim.masters[0].naccs(), 1);
    assert_eq!(sim.masters[0].responses().len(), 1);
    assert!(!sim.masters[0].responses()[0].1.is_nacc());
}

#[test]
fn axi_refusal_holds_the_request() {
    let mut sim = pins(PinProtocol::Axi);
    sim.target.refuse_next(2);
    sim.load_script("0 0 READ 0x80 4").unwrap();
    let _ = sim.run(STEPS).unwrap();

    assert_eq!(sim.transactor.stats().naccs, 0);
    assert_eq!(sim.masters[0].naccs(), 0);
    assert_eq!(sim.target.memory().accepted()[0].0, 2500);
    assert_eq!(sim.masters[0].responses().len(), 1);
}

#[test]
fn axi_cannot_carry_read_conditional_write() {
    let mut transactor = Transactor::new(TransactorConfig {
        protocol: PinProtocol::Axi,
        ..TransactorConfig::default()
    })
    .unwrap();
    let rcw = parse_script("0 0 RCW 0x40 4").unwrap()[0].requests[0].clone();
    assert!(matches!(
        transactor.nb_request(0, 0, &rcw),
        Err(ProtocolError::UnsupportedConversion {
            kind: RequestType::Rcw,
            ..
        })
    ));
}

#[test]
fn full_port_fifo_refuses_and_bad_ports_fail() {
    let mut transactor = Transactor::new(TransactorConfig::default()).unwrap();
    assert!(transactor.nb_request(0, 0, &Request::read(0, 4)).unwrap());
    assert!(transactor.nb_request(0, 0, &Request::read(4, 4)).unwrap());
    assert!(!transactor.nb_request(0, 0, &Request::read(8, 4)).unwrap());
    assert_eq!(transactor.queued(0), 2);
    assert_eq!(
        transactor.nb_request(0, 3, &Request::read(0, 4)),
        Err(ProtocolError::InvalidPort { port: 3, num_ports: 1 })
    );
    assert!(matches!(
        transactor.nb_request(0, 0, &Request::read(0, 8)),
        Err(ProtocolError::MalformedRequest { .. })
    ));
}

#[test]
fn port_sink_defers_protocol_errors_to_advance() {
    let mut sim = pins(PinProtocol::Apb);
    let block = Request::block_read(0, 4, 2);
    assert!(!sim.transactor.port(0).nb_request(0, &block));
    assert!(sim.step().is_err());
}

#[test]
fn reset_drops_queued_work() {
    let mut transactor = Transactor::new(TransactorConfig::default()).unwrap();
    assert!(transactor.nb_request(0, 0, &Request::read(0, 4)).unwrap());
    transactor.reset();
    assert_eq!(transactor.queued(0), 0);
    assert_eq!(transactor.next_wakeup(), None);
    assert_eq!(transactor.stats().queued, 0);
}

#[rstest]
#[case::pif(PinProtocol::Pif)]
#[case::axi(PinProtocol::Axi)]
#[case::apb(PinProtocol::Apb)]
#[case::local_memory(PinProtocol::LocalMemory)]
fn addresses_beyond_the_pins_are_refused(#[case] protocol: PinProtocol) {
    let mut transactor = Transactor::new(TransactorConfig {
        protocol,
        ..TransactorConfig::default()
    })
    .unwrap();
    let high = Request::write(0x1_0000_0040, &[0xde, 0xad, 0xbe, 0xef]);
    assert!(matches!(
        transactor.nb_request(0, 0, &high),
        Err(ProtocolError::MalformedRequest { .. })
    ));
    assert!(matches!(
        transactor.nb_request(0, 0, &Request::read(0xffff_fffc, 4)),
        Ok(true)
    ));
    assert_eq!(transactor.queued(0), 1);
}

#[rstest]
#[case::pif(PinProtocol::Pif)]
#[case::axi(PinProtocol::Axi)]
fn route_ids_wider_than_the_route_field_are_refused(#[case] protocol: PinProtocol) {
    let mut transactor = Transactor::new(TransactorConfig {
        protocol,
        ..TransactorConfig::default()
    })
    .unwrap();
    let wide = Request::read(0x40, 4).with_route_id(0x1_0000);
    assert!(matches!(
        transactor.nb_request(0, 0, &wide),
        Err(ProtocolError::MalformedRequest { .. })
    ));
    let widest = Request::read(0x40, 4).with_route_id(0xffff);
    assert!(transactor.nb_request(0, 0, &widest).unwrap());
}

#[test]
fn widest_route_id_survives_the_round_trip() {
    let mut sim = pins(PinProtocol::Pif);
    sim.masters[0].push(0, Request::read(0x40, 4).with_route_id(0xffff));
    let _ = sim.run(STEPS).unwrap();
    let responses = sim.masters[0].responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].1.route_id, 0xffff);
}

/// Slave that answers every sample with a response nobody asked for.
#[derive(Debug)]
struct StrayResponder {
    pins: Box<dyn PinInterface>,
}

impl PinTarget for StrayResponder {
    fn evaluate(
        &mut self,
        _now: Time,
        _port: usize,
        _outputs: &SignalBank,
        inputs: &mut SignalBank,
    ) -> Result<(), ProtocolError> {
        let mut stray = Response::from_request(&Request::read(0x40, 4).with_id(5), ResponseStatus::Ok);
        stray.buffer = vec![0; 4];
        PinInterface::drive_response(self.pins.as_ref(), inputs, &stray, false);
        Ok(())
    }
}

fn stray_run(discard: bool) -> (Transactor, Result<(), ProtocolError>) {
    let config = TransactorConfig {
        discard_unknown_responses: discard,
        ..TransactorConfig::default()
    };
    let mut target = StrayResponder {
        pins: interface_for(&config),
    };
    let mut transactor = Transactor::new(config).unwrap();
    let mut masters = vec![TrafficMaster::new(0, 1000)];
    assert!(transactor.nb_request(0, 0, &Request::read(0x80, 4)).unwrap());
    let result = transactor.advance(500, &mut target, &mut masters);
    (transactor, result)
}

#[test]
fn unknown_response_is_fatal_unless_discarded() {
    let (_, fatal) = stray_run(false);
    assert_eq!(
        fatal,
        Err(ProtocolError::UnknownResponse {
            tag: 0,
            id: 5,
            route_id: 0
        })
    );

    let (transactor, tolerated) = stray_run(true);
    assert_eq!(tolerated, Ok(()));
    assert_eq!(transactor.stats().discarded, 1);
}

#[test]
fn pif_refusal_drains_every_queued_request() {
    let mut sim = pins(PinProtocol::Pif);
    sim.target.refuse_next(1);
    assert!(sim.transactor.nb_request(0, 0, &Request::read(0x80, 4)).unwrap());
    assert!(sim.transactor.nb_request(0, 0, &Request::read(0x84, 4)).unwrap());
    let _ = sim.run(STEPS).unwrap();

    assert_eq!(sim.transactor.stats().naccs, 2);
    assert_eq!(sim.transactor.stats().accepted, 0);
    assert_eq!(sim.transactor.queued(0), 0);
    assert_eq!(sim.masters[0].naccs(), 2);
    assert!(sim.target.memory().accepted().is_empty());
    assert_eq!(sim.transactor.pin_state(0), Some(PinState::Idle));
}
