use std::time::Duration;

use rppal::i2c::I2c;
use sorter_traits::{ColorSensor, HwResult, Rgb};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::wait_until_ready_with_timeout;

const ADDRESS: u16 = 0x29;
const CMD: u8 = 0x80;
const AUTO_INC: u8 = 0x20;

const REG_ENABLE: u8 = 0x00;
const REG_ATIME: u8 = 0x01;
const REG_CONTROL: u8 = 0x0F;
const REG_STATUS: u8 = 0x13;
const REG_CDATA: u8 = 0x14;

const ENABLE_PON: u8 = 0x01;
const ENABLE_AEN: u8 = 0x02;
const STATUS_AVALID: u8 = 0x01;

/// 2.4 ms integration, one cycle.
const ATIME_FASTEST: u8 = 0xFF;
/// 4x analog gain.
const GAIN_4X: u8 = 0x01;

fn i2c_err(e: rppal::i2c::Error) -> HwError {
    HwError::I2c(e.to_string())
}

/// TCS34725 color sensor on a Linux I2C bus.
///
/// Readings are scaled to 0..=100 percent of the full-scale count for the
/// configured integration time.
pub struct Tcs34725 {
    bus: I2c,
    timeout: Duration,
    full_scale: u32,
}

impl Tcs34725 {
    pub fn new(bus: u8, timeout: Duration) -> Result<Self> {
        let mut i2c = I2c::with_bus(bus).map_err(i2c_err)?;
        i2c.set_slave_address(ADDRESS).map_err(i2c_err)?;
        i2c.smbus_write_byte(CMD | REG_ATIME, ATIME_FASTEST)
            .map_err(i2c_err)?;
        i2c.smbus_write_byte(CMD | REG_CONTROL, GAIN_4X)
            .map_err(i2c_err)?;
        i2c.smbus_write_byte(CMD | REG_ENABLE, ENABLE_PON)
            .map_err(i2c_err)?;
        std::thread::sleep(Duration::from_millis(3));
        i2c.smbus_write_byte(CMD | REG_ENABLE, ENABLE_PON | ENABLE_AEN)
            .map_err(i2c_err)?;
        let cycles = 256 - u32::from(ATIME_FASTEST);
        Ok(Self {
            bus: i2c,
            timeout,
            full_scale: (cycles * 1024).min(65_535),
        })
    }

    fn read_raw(&mut self) -> Result<[u16; 4]> {
        let bus = &self.bus;
        wait_until_ready_with_timeout(
            || {
                let status = bus.smbus_read_byte(CMD | REG_STATUS).map_err(i2c_err)?;
                Ok(status & STATUS_AVALID != 0)
            },
            self.timeout,
            Duration::from_micros(500),
        )?;
        let mut buf = [0u8; 8];
        self.bus
            .block_read(CMD | AUTO_INC | REG_CDATA, &mut buf)
            .map_err(i2c_err)?;
        let word = |i: usize| u16::from_le_bytes([buf[i], buf[i + 1]]);
        Ok([word(0), word(2), word(4), word(6)])
    }

    fn scale(&self, raw: u16) -> i32 {
        (u32::from(raw) * 100 / self.full_scale).min(100) as i32
    }
}

impl ColorSensor for Tcs34725 {
    fn rgb(&mut self) -> HwResult<Rgb> {
        let [c, r, g, b] = self.read_raw()?;
        trace!(c, r, g, b, "tcs34725 raw read");
        Ok(Rgb::new(self.scale(r), self.scale(g), self.scale(b)))
    }
}
