use serde::Serialize;

use crate::decode::{signed16_le, signed8, unsigned16_le, unsigned8};

use super::Measurements;

/// Factory trim values, read once from the sensor's NVM.
///
/// `p` holds the words at offsets 8 through 22 of the first block, in the
/// datasheet's naming these are `dig_P2` up to and including `dig_P9`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p: [i16; 8],
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

/// The adc words from a single burst read of the data registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub pressure: i32,
    pub temperature: i32,
    pub humidity: i32,
}

impl RawSample {
    /// Pressure and temperature are 20 bit, the low nibble of their last
    /// byte is not part of the value. Humidity is a plain 16 bit word.
    pub fn from_burst(data: &[u8; 8]) -> Self {
        let [p0, p1, p2, t0, t1, t2, h0, h1] = data.map(i32::from);
        Self {
            pressure: (p0 << 12) | (p1 << 4) | (p2 >> 4),
            temperature: (t0 << 12) | (t1 << 4) | (t2 >> 4),
            humidity: (h0 << 8) | h1,
        }
    }
}

impl Calibration {
    /// `cal1` is read from 0x88, `cal2` from 0xA1 and `cal3` from 0xE1.
    pub fn from_blocks(cal1: &[u8; 24], cal2: &[u8; 1], cal3: &[u8; 7]) -> Self {
        let mut p = [0i16; 8];
        for (word, offset) in p.iter_mut().zip((8..=22).step_by(2)) {
            *word = signed16_le(cal1, offset);
        }

        // h4 and h5 are 12 bit, they share the nibbles of cal3[4]
        let h4 = (i32::from(signed8(cal3, 3)) << 24 >> 20) | (i32::from(signed8(cal3, 4)) & 0x0F);
        let h5 = (i32::from(signed8(cal3, 5)) << 24 >> 20)
            | ((i32::from(unsigned8(cal3, 4)) >> 4) & 0x0F);

        Self {
            t1: unsigned16_le(cal1, 0),
            t2: signed16_le(cal1, 2),
            t3: signed16_le(cal1, 4),
            p1: unsigned16_le(cal1, 6),
            p,
            h1: unsigned8(cal2, 0),
            h2: signed16_le(cal3, 0),
            h3: unsigned8(cal3, 2),
            h4: h4 as i16,
            h5: h5 as i16,
            h6: signed8(cal3, 6),
        }
    }

    pub fn compensate(&self, raw: RawSample) -> Measurements {
        let t_fine = self.t_fine(raw.temperature);
        Measurements {
            temperature: temperature(t_fine),
            pressure: self.pressure(t_fine, raw.pressure),
            humidity: self.humidity(t_fine, raw.humidity),
        }
    }

    /// Fine resolution temperature the pressure and humidity formulas take
    /// as input. Integer math with the shifts of the datasheet, the outcome
    /// depends on where the rounding happens.
    pub fn t_fine(&self, adc_t: i32) -> i32 {
        let adc_t = i64::from(adc_t);
        let t1 = i64::from(self.t1);
        let t2 = i64::from(self.t2);
        let t3 = i64::from(self.t3);

        let var1 = (((adc_t >> 3) - (t1 << 1)) * t2) >> 11;
        let var2 = (((((adc_t >> 4) - t1) * ((adc_t >> 4) - t1)) >> 12) * t3) >> 14;
        (var1 + var2) as i32
    }

    /// Pressure in hPa.
    pub fn pressure(&self, t_fine: i32, adc_p: i32) -> f64 {
        let [p2, p3, p4, p5, p6, p7, p8, p9] = self.p.map(f64::from);

        let mut var1 = f64::from(t_fine) / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * p6 / 32768.0;
        var2 += var1 * p5 * 2.0;
        var2 = var2 / 4.0 + p4 * 65536.0;
        var1 = (p3 * var1 * var1 / 524288.0 + p2 * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * f64::from(self.p1);
        if var1 == 0.0 {
            // would divide by zero, the sensor can not give a value
            return 0.0;
        }

        let mut pressure = 1048576.0 - f64::from(adc_p);
        pressure = ((pressure - var2 / 4096.0) * 6250.0) / var1;
        var1 = p9 * pressure * pressure / 2147483648.0;
        var2 = pressure * p8 / 32768.0;
        pressure += (var1 + var2 + p7) / 16.0;
        pressure / 100.0
    }

    /// Relative humidity in percent, clamped to 0..=100 as the polynomial
    /// overshoots near the edges.
    pub fn humidity(&self, t_fine: i32, adc_h: i32) -> f64 {
        let h1 = f64::from(self.h1);
        let h2 = f64::from(self.h2);
        let h3 = f64::from(self.h3);
        let h4 = f64::from(self.h4);
        let h5 = f64::from(self.h5);
        let h6 = f64::from(self.h6);

        let mut humidity = f64::from(t_fine) - 76800.0;
        humidity = (f64::from(adc_h) - (h4 * 64.0 + h5 / 16384.0 * humidity))
            * (h2 / 65536.0 * (1.0 + h6 / 67108864.0 * humidity * (1.0 + h3 / 67108864.0 * humidity)));
        humidity *= 1.0 - h1 * humidity / 524288.0;
        humidity.clamp(0.0, 100.0)
    }
}

/// Degrees celsius, with the 0.01 resolution of the integer formula.
pub fn temperature(t_fine: i32) -> f64 {
    let centi_celsius = (i64::from(t_fine) * 5 + 128) >> 8;
    centi_celsius as f64 / 100.0
}
