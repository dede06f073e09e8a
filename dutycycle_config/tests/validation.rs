use dutycycle_config::{Weekday, load_file, load_toml};
use rstest::rstest;
use std::fs;

const BASE: &str = r#"
[peer]
id = 12
address = "0x1F0A22"
serial = "JEQ0123456"
"#;

#[test]
fn accepts_full_config() {
    let toml = r#"
[peer]
id = 12
address = "0x1F0A22"

[timing]
time_offset_us = 3000
coarse_lead_ticks = 80
fine_lead_ticks = 40
precision_leads_ms = [5000, 2000]
transmission_leads_ms = [1000, 500, 100, 30]

[decalcification]
weekday = "sunday"
hour = 3
start_minute = 10
end_minute = 13

[persistence]
state_file = "/var/lib/dutycycle/peer12.toml"

[rt]
enabled = true
scheduler_priority = 35
transmission_priority = 99

[valve]
initial_percent = 40

[[valve_drives]]
address = "0x2B0001"
channels = [1]

[[valve_drives]]
address = 2818050
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.decalcification.weekday, Weekday::Sunday);
    assert_eq!(cfg.valve_drives.len(), 2);
    assert_eq!(cfg.valve_drives[0].address, 0x2B0001);
    assert_eq!(cfg.valve_drives[1].address, 2_818_050);
    assert!(cfg.valve_drives[1].channels.is_empty());
}

#[rstest]
#[case("[timing]\nfine_lead_ticks = 0\n", "fine_lead_ticks")]
#[case("[timing]\nprecision_leads_ms = [12000, 2000]\n", "fine wait window")]
#[case("[timing]\ncoarse_lead_ticks = 30\nfine_lead_ticks = 40\n", "coarse_lead_ticks")]
#[case("[timing]\nprecision_leads_ms = [2000, 5000]\n", "precision_leads_ms")]
#[case("[timing]\ntransmission_leads_ms = [1000, 2500]\n", "transmission_leads_ms")]
#[case("[timing]\nresync_threshold_ms = 1000\n", "resync_threshold_ms")]
#[case("[decalcification]\nhour = 24\n", "decalcification.hour")]
#[case("[decalcification]\nstart_minute = 5\nend_minute = 2\n", "minutes")]
#[case("[persistence.ids]\nvalve_state = 1000\n", "distinct")]
#[case("[rt]\ntransmission_priority = 0\n", "rt.transmission_priority")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation")]
#[case("[valve]\ninitial_percent = 101\n", "initial_percent")]
#[case("[[valve_drives]]\naddress = \"0x1F0A22\"\n", "must differ")]
#[case(
    "[[valve_drives]]\naddress = 5\n[[valve_drives]]\naddress = 5\n",
    "listed twice"
)]
fn rejects_invalid_sections(#[case] extra: &str, #[case] needle: &str) {
    let toml = format!("{BASE}\n{extra}");
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "error {err} does not mention {needle}"
    );
}

#[test]
fn rejects_out_of_range_peer_address() {
    let cfg = load_toml("[peer]\nid = 1\naddress = \"0x1000000\"\n").expect("parse TOML");
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_unparseable_address() {
    assert!(load_toml("[peer]\nid = 1\naddress = \"0xZZ\"\n").is_err());
}

#[test]
fn load_file_reports_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("peer.toml");
    fs::write(&path, BASE).expect("write");
    let cfg = load_file(&path).expect("load");
    assert_eq!(cfg.peer.id, 12);

    let missing = dir.path().join("missing.toml");
    let err = load_file(&missing).expect_err("missing file");
    assert!(format!("{err}").contains("missing.toml"));
}
