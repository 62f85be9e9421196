use domain::{Event, EventValue};
use otgw_protocol::{IDENTIFIERS, decode};

#[test]
fn flame_status_fans_out_bits() {
    let events = decode("B4000000E");
    assert_eq!(
        events,
        vec![
            Event::int("flame_status", 14),
            Event::flag("flame_status_ch", true),
            Event::flag("flame_status_dhw", true),
            Event::flag("flame_status_bit", true),
        ]
    );

    let events = decode("B40000000");
    assert_eq!(
        events,
        vec![
            Event::int("flame_status", 0),
            Event::flag("flame_status_ch", false),
            Event::flag("flame_status_dhw", false),
            Event::flag("flame_status_bit", false),
        ]
    );
}

#[test]
fn flame_status_single_bits() {
    // 只有 bit 2（生活热水）
    let events = decode("B40000004");
    assert_eq!(events[1], Event::flag("flame_status_ch", false));
    assert_eq!(events[2], Event::flag("flame_status_dhw", true));
    assert_eq!(events[3], Event::flag("flame_status_bit", false));
}

#[test]
fn fixed_point_value_is_rounded() {
    assert_eq!(
        decode("T10180514"),
        vec![Event::float("room_temperature", 5.08)]
    );
    assert_eq!(
        decode("B40191400"),
        vec![Event::float("boiler_water_temperature", 20.0)]
    );
}

#[test]
fn counter_value_is_raw() {
    assert_eq!(
        decode("B40740539"),
        vec![Event::int("burner_starts", 0x0539)]
    );
}

#[test]
fn answer_source_is_decoded() {
    assert_eq!(
        decode("A40180A00"),
        vec![Event::float("room_temperature", 10.0)]
    );
}

#[test]
fn parity_bit_does_not_change_type() {
    // 0xC & 0b0111 = 4 (read-ack)
    assert_eq!(
        decode("BC0180A00"),
        vec![Event::float("room_temperature", 10.0)]
    );
}

#[test]
fn irrelevant_lines_yield_nothing() {
    // 词法不匹配
    assert!(decode("T109E4B2").is_empty());
    assert!(decode("").is_empty());
    assert!(decode("OT=12.50").is_empty());
    assert!(decode("Error 01").is_empty());
    // 网关请求来源
    assert!(decode("R40180A00").is_empty());
    // 读请求 (type 0) 与 write-ack (type 5)
    assert!(decode("T00180000").is_empty());
    assert!(decode("B50010A00").is_empty());
    // 未知数据 ID
    assert!(decode("B40020000").is_empty());
    assert!(decode("B40FF0000").is_empty());
}

#[test]
fn decode_is_pure() {
    let line = "B4000000A";
    assert_eq!(decode(line), decode(line));
}

#[test]
fn every_identifier_decodes() {
    for identifier in IDENTIFIERS.iter() {
        let line = format!("B40{:02X}0100", identifier.id);
        let events = decode(&line);
        assert!(!events.is_empty(), "no events for {}", identifier.name);
        assert_eq!(events[0].topic, identifier.name);
        if let EventValue::Float(value) = events[0].value {
            assert_eq!(value, 1.0);
        }
    }
}
