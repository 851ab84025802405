use sorter_core::hw_error::map_hw_error;
use sorter_core::SorterError;
use sorter_hardware::HwError;

#[test]
fn hardware_timeouts_map_to_timeout() {
    let e = HwError::DataReadyTimeout;
    assert!(matches!(map_hw_error(&e), SorterError::Timeout));
    assert!(matches!(map_hw_error(&HwError::Timeout), SorterError::Timeout));
}

#[test]
fn other_hardware_errors_are_faults() {
    let e = HwError::I2c("nack at 0x29".into());
    match map_hw_error(&e) {
        SorterError::HardwareFault(msg) => assert!(msg.contains("0x29")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn foreign_errors_fall_back_to_message() {
    let timeout = std::io::Error::other("read timeout on bus 1");
    assert!(matches!(map_hw_error(&timeout), SorterError::Timeout));
    let other = std::io::Error::other("motor stalled");
    assert!(matches!(map_hw_error(&other), SorterError::Hardware(m) if m == "motor stalled"));
}
