use std::io::Write as _;
use std::path::Path;

use busarb_core::Config;
use busarb_core::bus::BusProtocol;
use busarb_core::common::ConfigError;
use busarb_core::config::{ArbiterConfig, PinProtocol, TransactorConfig, parse_port_policies};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn rejected_param(config: &ArbiterConfig) -> &'static str {
    match config.validate() {
        Err(ConfigError::Invalid { param, .. }) => param,
        other => panic!("expected an invalid parameter, got {other:?}"),
    }
}

#[test]
fn empty_json_yields_defaults() {
    let config = Config::from_json("{}").unwrap();
    assert_eq!(config.arbiter.num_masters, 2);
    assert_eq!(config.arbiter.request_fifo_depth, 2);
    assert_eq!(config.arbiter.response_fifo_depth, 2);
    assert_eq!(config.arbiter.clock.clock_period, 1000);
    assert_eq!(config.arbiter.nacc_window(), 1000);
    assert_eq!(config.memory.byte_width, 4);
    assert_eq!(config.transactor.protocol, PinProtocol::Pif);
    assert_eq!(config.transactor.sample_phase(), 500);
}

#[test]
fn json_sections_override_fields() {
    let config = Config::from_json(
        r#"{
            "arbiter": {
                "num_masters": 4,
                "master_byte_widths": [16, 8, 4, 4],
                "slave_byte_width": 4,
                "use_block_requests": true,
                "port_protocols": ["Pif", "Pif", "Apb", "Pif"],
                "posedge_offset": 250
            },
            "transactor": { "protocol": "AXI", "num_ports": 2, "byte_width": 8 },
            "memory": { "size": 65536, "nacc_first": 1 }
        }"#,
    )
    .unwrap();
    let arbiter = &config.arbiter;
    assert!(arbiter.width_conversion_enabled());
    assert_eq!(arbiter.master_width_of(0), 16);
    assert_eq!(arbiter.protocol_of(2), BusProtocol::Apb);
    assert_eq!(arbiter.route_id_bits(), 2);
    assert_eq!(arbiter.clock.posedge_offset, 250);
    assert_eq!(config.transactor.protocol, PinProtocol::Axi);
    assert_eq!(config.memory.nacc_first, 1);
}

#[rstest]
#[case::no_masters(|c: &mut ArbiterConfig| c.num_masters = 0, "num_masters")]
#[case::too_many_masters(|c: &mut ArbiterConfig| c.num_masters = 33, "num_masters")]
#[case::zero_depth(|c: &mut ArbiterConfig| c.request_fifo_depth = 0, "request_fifo_depth")]
#[case::short_depth_list(|c: &mut ArbiterConfig| c.request_fifo_depths = Some(vec![2]), "request_fifo_depths")]
#[case::zero_response_depth(|c: &mut ArbiterConfig| c.response_fifo_depth = 0, "response_fifo_depth")]
#[case::phase_past_period(|c: &mut ArbiterConfig| c.arbitration_phase = 1000, "arbitration_phase")]
#[case::long_nacc_window(|c: &mut ArbiterConfig| c.nacc_wait_time = Some(1001), "nacc_wait_time")]
#[case::width_count(|c: &mut ArbiterConfig| {
    c.master_byte_widths = Some(vec![8]);
    c.slave_byte_width = 4;
}, "master_byte_widths")]
#[case::odd_width(|c: &mut ArbiterConfig| {
    c.master_byte_widths = Some(vec![8, 6]);
    c.slave_byte_width = 4;
}, "master_byte_widths")]
#[case::missing_slave_width(|c: &mut ArbiterConfig| c.master_byte_widths = Some(vec![8, 4]), "slave_byte_width")]
#[case::aligned_conversion(|c: &mut ArbiterConfig| {
    c.master_byte_widths = Some(vec![8, 4]);
    c.slave_byte_width = 4;
    c.align_request_phase = true;
}, "align_request_phase")]
#[case::cbox_ports(|c: &mut ArbiterConfig| {
    c.num_masters = 3;
    c.external_cbox = true;
}, "external_cbox")]
#[case::xfer_en_port(|c: &mut ArbiterConfig| c.xfer_en_port = Some(2), "xfer_en_port")]
#[case::order_and_policy(|c: &mut ArbiterConfig| {
    c.external_order = true;
    c.arbitration_policy = Some("0,0,0;0,0,0".to_owned());
}, "external_order")]
#[case::fail_percentage(|c: &mut ArbiterConfig| c.fault.fail_percentage = 101, "fail_percentage")]
#[case::routing_and_conversion(|c: &mut ArbiterConfig| {
    c.master_byte_widths = Some(vec![8, 4]);
    c.slave_byte_width = 4;
    c.num_route_ids = 4;
}, "num_route_ids")]
#[case::route_bits(|c: &mut ArbiterConfig| c.route_id_lsb = 32, "route_id_lsb")]
#[case::protocol_count(|c: &mut ArbiterConfig| c.port_protocols = Some(vec![BusProtocol::Pif]), "port_protocols")]
#[case::policy_count(|c: &mut ArbiterConfig| c.arbitration_policy = Some("1,0,1".to_owned()), "arbitration_policy")]
#[case::policy_range(|c: &mut ArbiterConfig| c.arbitration_policy = Some("1,2,1;0,0,0".to_owned()), "arbitration_policy")]
#[case::lock_groups(|c: &mut ArbiterConfig| c.lock_port_groups = Some("0,5".to_owned()), "lock_port_groups")]
fn contradictory_settings_name_the_parameter(
    #[case] edit: fn(&mut ArbiterConfig),
    #[case] param: &str,
) {
    let mut config = ArbiterConfig::default();
    edit(&mut config);
    assert_eq!(rejected_param(&config), param);
}

#[rstest]
#[case::no_ports(TransactorConfig { num_ports: 0, ..TransactorConfig::default() }, "num_ports")]
#[case::width(TransactorConfig { byte_width: 3, ..TransactorConfig::default() }, "byte_width")]
#[case::sample_phase(TransactorConfig { sample_phase: Some(1000), ..TransactorConfig::default() }, "sample_phase")]
#[case::read_delay(TransactorConfig {
    protocol: PinProtocol::LocalMemory,
    read_delay: 0,
    ..TransactorConfig::default()
}, "read_delay")]
fn transactor_settings_are_checked(#[case] config: TransactorConfig, #[case] param: &str) {
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { param: p, .. }) if p == param));
}

#[test]
fn policies_parse_with_whitespace() {
    let policies = parse_port_policies(" 3, 0, 1 ; 0,0,0 ;").unwrap();
    assert_eq!(policies.len(), 2);
    assert!(parse_port_policies("3,0").is_err());
}

#[test]
fn config_file_is_read_and_validated() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{ "arbiter": {{ "num_masters": 5 }} }}"#).unwrap();
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.arbiter.num_masters, 5);

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    writeln!(bad, r#"{{ "arbiter": {{ "num_masters": 40 }} }}"#).unwrap();
    assert!(matches!(
        Config::from_file(bad.path()),
        Err(ConfigError::Invalid { param: "num_masters", .. })
    ));
}

#[test]
fn unreadable_or_malformed_files_are_reported() {
    let missing = Path::new("/nonexistent/busarb/config.json");
    match Config::from_file(missing) {
        Err(ConfigError::Io { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected an IO error, got {other:?}"),
    }
    assert!(matches!(
        Config::from_json(r#"{ "arbiter": { "num_masters": "two" } }"#),
        Err(ConfigError::Json(_))
    ));
}
