use busarb_core::bus::{Request, RequestSink, RequestType, Response, ResponseStatus};
use busarb_core::common::ProtocolError;
use busarb_core::sim::Simulator;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::builder::ArbiterBuilder;
use crate::common::harness::Bench;

const DATA: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
];

fn simulator(builder: ArbiterBuilder) -> Simulator {
    Simulator::new(&builder.system()).unwrap()
}

#[test]
fn wide_block_write_splits_into_slave_width_writes() {
    let mut sim = simulator(ArbiterBuilder::new().widths(&[16, 16], 4));
    let upstream = Request::block_write(0x100, 16, &DATA);
    assert_eq!(upstream.len(), 1);
    sim.masters[0].push(0, upstream[0].clone());
    let _ = sim.run_to_completion().unwrap();

    let pieces: Vec<&Request> = sim.memory.accepted().iter().map(|(_, r)| r).collect();
    assert_eq!(pieces.len(), 4);
    for (i, piece) in pieces.iter().enumerate() {
        assert_eq!(piece.kind, RequestType::Write);
        assert_eq!(piece.size, 4);
        assert_eq!(piece.address, 0x100 + 4 * i as u64);
        assert_eq!(piece.buffer, DATA[4 * i..4 * i + 4].to_vec());
        assert_eq!(piece.tag, upstream[0].tag);
    }
    assert!(pieces[3].last_transfer);

    let responses = sim.masters[0].responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].1.status, ResponseStatus::Ok);
    assert_eq!(responses[0].1.tag, upstream[0].tag);
    assert_eq!(sim.arbiter.stats().converted, 1);
    assert_eq!(sim.arbiter.stats().converted_pieces, 4);
    assert_eq!(sim.arbiter.open_conversions(), 0);

    let mut stored = [0u8; 16];
    sim.memory.nb_peek(0x100, &mut stored);
    assert_eq!(stored, DATA);
}

#[test]
fn block_mode_coalesces_pieces_into_one_block() {
    let mut sim = simulator(ArbiterBuilder::new().widths(&[16, 16], 4).block_requests());
    sim.masters[0].push(0, Request::block_write(0x200, 16, &DATA)[0].clone());
    let _ = sim.run_to_completion().unwrap();

    let pieces: Vec<&Request> = sim.memory.accepted().iter().map(|(_, r)| r).collect();
    let numbers: Vec<u32> = pieces.iter().map(|p| p.transfer_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert!(pieces.iter().all(|p| p.kind == RequestType::BlockWrite && p.num_transfers == 4));
    let last: Vec<bool> = pieces.iter().map(|p| p.last_transfer).collect();
    assert_eq!(last, vec![false, false, false, true]);
    assert_eq!(sim.masters[0].responses().len(), 1);
}

#[test]
fn wide_read_is_reassembled_from_narrow_beats() {
    let mut sim = simulator(ArbiterBuilder::new().widths(&[16, 4], 4));
    sim.memory.nb_poke(0x300, &DATA);
    sim.masters[0].push(0, Request::read(0x300, 16));
    sim.masters[1].push(0, Request::read(0x304, 4));
    let _ = sim.run_to_completion().unwrap();

    let wide = sim.masters[0].responses();
    assert_eq!(wide.len(), 1);
    assert_eq!(wide[0].1.buffer, DATA.to_vec());
    assert!(wide[0].1.last_transfer);

    let narrow = sim.masters[1].responses();
    assert_eq!(narrow[0].1.buffer, DATA[4..8].to_vec());
    assert_eq!(sim.arbiter.stats().converted, 1);
}

#[test]
fn narrow_block_read_is_widened() {
    let mut sim = simulator(ArbiterBuilder::new().widths(&[4, 4], 16));
    sim.memory.nb_poke(0x20, &DATA);
    sim.masters[1].push(0, Request::block_read(0x28, 4, 4));
    let _ = sim.run_to_completion().unwrap();

    let downstream = sim.memory.accepted();
    assert_eq!(downstream.len(), 1);
    assert_eq!((downstream[0].1.address, downstream[0].1.size), (0x20, 16));

    let beats: Vec<(u64, Vec<u8>)> = sim.masters[1]
        .responses()
        .iter()
        .map(|(_, r)| (r.address, r.buffer.clone()))
        .collect();
    assert_eq!(
        beats,
        vec![
            (0x28, DATA[8..12].to_vec()),
            (0x2c, DATA[12..16].to_vec()),
            (0x20, DATA[0..4].to_vec()),
            (0x24, DATA[4..8].to_vec()),
        ]
    );
}

#[test]
fn address_error_is_reported_once() {
    let mut config = ArbiterBuilder::new().widths(&[16, 16], 4).system();
    config.memory.size = 0x108;
    let mut sim = Simulator::new(&config).unwrap();
    sim.masters[0].push(0, Request::read(0x100, 16));
    let _ = sim.run_to_completion().unwrap();

    let responses = sim.masters[0].responses();
    assert_eq!(responses.len(), 1);
    assert!(responses[0].1.status.is_address_error());
    assert_eq!(sim.arbiter.open_conversions(), 0);
}

#[test]
fn snoop_on_converting_port_is_fatal() {
    let mut bench = Bench::new(ArbiterBuilder::new().widths(&[16, 4], 4).build());
    let mut snoop = Request::read(0x40, 16);
    snoop.kind = RequestType::Snoop;
    assert!(bench.submit(0, &snoop).is_accepted());
    let err = bench
        .arbiter
        .advance(0, &mut bench.target, &mut bench.masters)
        .unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::UnsupportedConversion {
            port: 0,
            kind: RequestType::Snoop,
            ..
        }
    ));
}

#[test]
fn same_width_port_passes_through() {
    let mut bench = Bench::new(ArbiterBuilder::new().widths(&[16, 4], 4).build());
    assert!(bench.submit(1, &Request::read(0x40, 4)).is_accepted());
    bench.run_cycles(2);
    assert_eq!(bench.target.accepted.len(), 1);
    assert_eq!(bench.arbiter.stats().converted, 0);
}

#[test]
fn data_error_still_yields_one_full_response() {
    let mut bench = Bench::new(ArbiterBuilder::new().widths(&[16, 4], 4).build());
    assert!(bench.submit(0, &Request::read(0x100, 16)).is_accepted());
    bench.run_cycles(10);
    let pieces: Vec<Request> = bench.target.accepted.iter().map(|(_, r)| r.clone()).collect();
    assert_eq!(pieces.len(), 4);

    for (i, piece) in pieces.iter().enumerate() {
        let mut response = Response::read_beat(piece, 0, DATA[4 * i..4 * i + 4].to_vec());
        if i == 1 {
            response.status = ResponseStatus::DataError;
        }
        assert!(bench.respond(&response).unwrap());
    }
    bench.run_cycles(4);

    let responses = bench.masters[0].responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].1.status, ResponseStatus::DataError);
    assert_eq!(responses[0].1.buffer, DATA.to_vec());
    assert!(responses[0].1.last_transfer);
    assert_eq!(bench.arbiter.open_conversions(), 0);
}

#[test]
fn narrow_block_write_is_gathered_into_wide_writes() {
    let data: Vec<u8> = (0..32).collect();
    let mut sim = simulator(ArbiterBuilder::new().widths(&[4, 4], 16));
    for beat in Request::block_write(0x40, 4, &data) {
        sim.masters[1].push(0, beat);
    }
    let _ = sim.run_to_completion().unwrap();

    let wide: Vec<(u64, u32, u64)> = sim
        .memory
        .accepted()
        .iter()
        .map(|(_, r)| (r.address, r.size, r.byte_enables))
        .collect();
    assert_eq!(wide, vec![(0x40, 16, 0xffff), (0x50, 16, 0xffff)]);
    assert_eq!(sim.masters[1].responses().len(), 1);
    assert_eq!(sim.masters[1].responses()[0].1.status, ResponseStatus::Ok);

    let mut stored = [0u8; 32];
    sim.memory.nb_peek(0x40, &mut stored);
    assert_eq!(stored.to_vec(), data);
}

#[rstest]
#[case::single_reads(false)]
#[case::one_block(true)]
fn wide_wrapping_block_read_returns_in_wrap_order(#[case] blocks: bool) {
    let image: Vec<u8> = (0..32).map(|i| 0xa0 ^ i).collect();
    let mut builder = ArbiterBuilder::new().widths(&[16, 16], 4);
    if blocks {
        builder = builder.block_requests();
    }
    let mut sim = simulator(builder);
    sim.memory.nb_poke(0x20, &image);
    sim.masters[0].push(0, Request::block_read(0x30, 16, 2));
    let _ = sim.run_to_completion().unwrap();

    let downstream: Vec<&Request> = sim.memory.accepted().iter().map(|(_, r)| r).collect();
    if blocks {
        assert_eq!(downstream.len(), 1);
        assert_eq!(downstream[0].kind, RequestType::BlockRead);
        assert_eq!((downstream[0].address, downstream[0].num_transfers), (0x30, 8));
    } else {
        let addresses: Vec<u64> = downstream.iter().map(|r| r.address).collect();
        assert_eq!(addresses, vec![0x30, 0x34, 0x38, 0x3c, 0x20, 0x24, 0x28, 0x2c]);
    }

    let beats: Vec<(u64, Vec<u8>)> = sim.masters[0]
        .responses()
        .iter()
        .map(|(_, r)| (r.address, r.buffer.clone()))
        .collect();
    assert_eq!(
        beats,
        vec![(0x30, image[16..32].to_vec()), (0x20, image[0..16].to_vec())]
    );
    assert!(sim.masters[0].responses()[1].1.last_transfer);
}
