use std::thread;
use std::time::Duration;

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use rstest::rstest;
use sensors::bme280::{Bme280, Mode, Oversampling, DEFAULT_ADDRESS};
use sensors::{Error, SharedBus};

mod common;
use common::{RecordingDelay, RegisterMap};

const CTRL_HUM: u8 = 0xF2;
const CTRL_MEAS: u8 = 0xF4;

/// Trim values and an adc burst from the datasheet's compensation example,
/// with humidity trim values of a typical part.
fn sensor_on_bus() -> RegisterMap {
    let map = RegisterMap::new(DEFAULT_ADDRESS);
    map.set(
        0x88,
        &[
            0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC, 0x7D, 0x8E, 0x43, 0xD6, 0xD0, 0x0B, 0x27, 0x0B,
            0x8C, 0x00, 0xF9, 0xFF, 0x8C, 0x3C, 0xF8, 0xC6, 0x70, 0x17,
        ],
    );
    map.set(0xA1, &[0x4B]);
    map.set(0xE1, &[0x6A, 0x01, 0x00, 0x13, 0x29, 0x03, 0x1E]);
    map.set(0xD0, &[0x60]);
    map.set(0xF7, &[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x75, 0x30]);
    map
}

#[test]
fn reads_compensated_sample() {
    let map = sensor_on_bus();
    let delay = RecordingDelay::default();
    let mut sensor = Bme280::new(map.clone(), DEFAULT_ADDRESS, delay.clone()).unwrap();

    let measurements = sensor.read_all().unwrap();
    assert_eq!(measurements.temperature, 25.08);
    assert!((measurements.pressure - 1006.5326).abs() < 1e-2);
    assert!((measurements.humidity - 55.0007).abs() < 1e-2);

    assert_eq!(delay.waits(), [Duration::from_micros(16_200)]);
}

#[test]
fn configures_2x_forced_on_creation() {
    let map = sensor_on_bus();
    let sensor = Bme280::new(map.clone(), DEFAULT_ADDRESS, RecordingDelay::default()).unwrap();

    // humidity first, it only takes effect after the ctrl_meas write
    assert_eq!(
        map.writes(),
        [
            (CTRL_HUM, 0x02),
            (CTRL_MEAS, 0x00),
            (CTRL_MEAS, 0x08),
            (CTRL_MEAS, 0x48),
            (CTRL_MEAS, 0x49),
        ]
    );
    assert_eq!(sensor.config().temperature, Oversampling::X2);
    assert_eq!(sensor.config().mode, Mode::Forced);
    assert_eq!(sensor.settling_delay(), Duration::from_micros(16_200));
}

#[test]
fn keeps_reserved_bits() {
    let map = sensor_on_bus();
    map.set(CTRL_HUM, &[0b1111_1000]);
    let mut sensor = Bme280::new(map.clone(), DEFAULT_ADDRESS, RecordingDelay::default()).unwrap();
    assert_eq!(map.get(CTRL_HUM), 0b1111_1010);

    sensor.set_humidity_oversampling(16).unwrap();
    assert_eq!(map.get(CTRL_HUM), 0b1111_1101);
}

#[rstest]
fn ignores_illegal_settings(#[values(0, 3, 5, 7, 17, 32)] factor: u8) {
    let map = sensor_on_bus();
    let mut sensor = Bme280::new(map.clone(), DEFAULT_ADDRESS, RecordingDelay::default()).unwrap();
    let config = sensor.config();
    let settling = sensor.settling_delay();
    let transfers = map.transfers();

    sensor.set_humidity_oversampling(factor).unwrap();
    sensor.set_pressure_oversampling(factor).unwrap();
    sensor.set_temperature_oversampling(factor).unwrap();

    assert_eq!(sensor.config(), config);
    assert_eq!(sensor.settling_delay(), settling);
    assert_eq!(map.transfers(), transfers);
}

#[rstest]
fn ignores_illegal_mode(#[values(2, 4, 0xff)] code: u8) {
    let map = sensor_on_bus();
    let mut sensor = Bme280::new(map.clone(), DEFAULT_ADDRESS, RecordingDelay::default()).unwrap();
    let writes = map.writes();

    sensor.set_control_mode(code).unwrap();
    assert_eq!(sensor.config().mode, Mode::Forced);
    assert_eq!(map.writes(), writes);
}

#[test]
fn oversampling_changes_registers_and_delay() {
    let map = sensor_on_bus();
    let delay = RecordingDelay::default();
    let mut sensor = Bme280::new(map.clone(), DEFAULT_ADDRESS, delay.clone()).unwrap();

    sensor.set_temperature_oversampling(16).unwrap();
    assert_eq!(map.get(CTRL_MEAS), 0b101_010_01);
    assert_eq!(sensor.settling_delay(), Duration::from_micros(48_400));

    sensor.set_pressure_oversampling(1).unwrap();
    assert_eq!(map.get(CTRL_MEAS), 0b101_001_01);
    assert_eq!(sensor.config().pressure, Oversampling::X1);

    sensor.set_humidity_oversampling(4).unwrap();
    assert_eq!(map.get(CTRL_HUM), 0b011);
    assert_eq!(map.writes().last(), Some(&(CTRL_MEAS, 0b101_001_01)));

    sensor.read_all().unwrap();
    // 1.25 + 2.3*16 + 2.3*1 + 0.575 + 2.3*4 + 0.575 ms
    assert_eq!(delay.waits(), [Duration::from_micros(50_700)]);
}

#[test]
fn normal_mode_is_not_retriggered() {
    let map = sensor_on_bus();
    let mut sensor = Bme280::new(map.clone(), DEFAULT_ADDRESS, RecordingDelay::default()).unwrap();

    sensor.set_control_mode(0b11).unwrap();
    assert_eq!(map.get(CTRL_MEAS), 0x4B);
    let writes = map.writes();

    sensor.read_all().unwrap();
    assert_eq!(map.writes(), writes);
}

#[test]
fn sleep_mode_read_forces_one_conversion() {
    let map = sensor_on_bus();
    let mut sensor = Bme280::new(map.clone(), DEFAULT_ADDRESS, RecordingDelay::default()).unwrap();

    sensor.set_control_mode(0b00).unwrap();
    assert_eq!(map.get(CTRL_MEAS), 0x48);

    let measurements = sensor.read_all().unwrap();
    assert_eq!(measurements.temperature, 25.08);
    assert_eq!(map.writes().last(), Some(&(CTRL_MEAS, 0x49)));
    assert_eq!(sensor.config().mode, Mode::Sleep);
}

#[test]
fn reads_chip_id() {
    let map = sensor_on_bus();
    let mut sensor = Bme280::new(map, DEFAULT_ADDRESS, RecordingDelay::default()).unwrap();
    assert_eq!(sensor.read_id().unwrap(), (0x60, 0x00));
}

#[test]
fn bus_errors_are_passed_on() {
    let map = sensor_on_bus();
    let mut sensor = Bme280::new(map.clone(), DEFAULT_ADDRESS, RecordingDelay::default()).unwrap();

    map.break_bus();
    let err = sensor.read_all().unwrap_err();
    assert!(matches!(err, Error::Transport(ErrorKind::Bus)), "{err:?}");
}

#[test]
fn failed_setting_keeps_config() {
    let map = sensor_on_bus();
    let mut sensor = Bme280::new(map.clone(), DEFAULT_ADDRESS, RecordingDelay::default()).unwrap();
    let config = sensor.config();
    let ctrl_meas = map.get(CTRL_MEAS);

    map.break_bus();
    assert!(sensor.set_temperature_oversampling(16).is_err());
    assert!(sensor.set_pressure_oversampling(1).is_err());
    assert!(sensor.set_humidity_oversampling(8).is_err());
    assert!(sensor.set_control_mode(0b11).is_err());

    assert_eq!(map.get(CTRL_MEAS), ctrl_meas);
    assert_eq!(sensor.config(), config);
    assert_eq!(sensor.settling_delay(), Duration::from_micros(16_200));
}

#[test]
fn wrong_address_fails_creation() {
    let map = sensor_on_bus();
    let Err(err) = Bme280::new(map, 0x77, RecordingDelay::default()) else {
        panic!("created a driver for an absent sensor");
    };
    assert_eq!(
        *err.bus_error(),
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    );
}

#[test]
fn shared_between_threads() {
    let bus = SharedBus::new(sensor_on_bus());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let mut sensor =
                Bme280::new(bus.clone(), DEFAULT_ADDRESS, RecordingDelay::default()).unwrap();
            thread::spawn(move || {
                for _ in 0..25 {
                    let measurements = sensor.read_all().unwrap();
                    assert_eq!(measurements.temperature, 25.08);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
