//! APDS-9960 ambient light / gesture sensor driver
//!
//! Minimal register-level driver covering what the mirror needs: the clear
//! channel as ambient light, and horizontal swipe detection from the gesture
//! FIFO. Gesture decoding follows the usual first-sample / last-sample ratio
//! comparison on the left and right photodiodes.

use crate::sensor::{RawGesture, SensorError, SensorPort};
use crate::LightLevel;
use embedded_hal::i2c::I2c;

const REG_ENABLE: u8 = 0x80;
const REG_ATIME: u8 = 0x81;
const REG_PPULSE: u8 = 0x8E;
const REG_CONTROL: u8 = 0x8F;
const REG_ID: u8 = 0x92;
const REG_CDATAL: u8 = 0x94;
const REG_GPENTH: u8 = 0xA0;
const REG_GEXTH: u8 = 0xA1;
const REG_GCONF1: u8 = 0xA2;
const REG_GCONF2: u8 = 0xA3;
const REG_GPULSE: u8 = 0xA6;
const REG_GCONF4: u8 = 0xAB;
const REG_GFLVL: u8 = 0xAE;
const REG_GSTATUS: u8 = 0xAF;
const REG_GFIFO_U: u8 = 0xFC;

const ENABLE_PON: u8 = 0x01;
const ENABLE_AEN: u8 = 0x02;
const ENABLE_PEN: u8 = 0x04;
const ENABLE_GEN: u8 = 0x40;
const GCONF4_GMODE: u8 = 0x01;
const GSTATUS_GVALID: u8 = 0x01;

/// Part IDs reported by genuine APDS-9960 dies.
const KNOWN_IDS: [u8; 2] = [0xAB, 0xA8];

/// Left/right ratio change (percent) that counts as a swipe.
const SWIPE_SENSITIVITY: i32 = 50;
/// Samples where every photodiode is below this are ignored.
const FIFO_NOISE_FLOOR: u8 = 10;

pub struct Apds9960<I2C> {
    i2c: I2C,
    address: u8,
}

#[derive(Clone, Copy)]
struct GestureSample {
    left: u8,
    right: u8,
}

impl GestureSample {
    fn lr_ratio(self) -> i32 {
        let (l, r) = (self.left as i32, self.right as i32);
        if l + r == 0 {
            0
        } else {
            (l - r) * 100 / (l + r)
        }
    }
}

fn read_err<E: core::fmt::Debug>(e: E) -> SensorError {
    SensorError::Read(format!("{e:?}"))
}

impl<I2C: I2c> Apds9960<I2C> {
    /// Probe the chip and enable the light and gesture engines.
    pub fn new(i2c: I2C, address: u8) -> Result<Self, SensorError> {
        let mut dev = Self { i2c, address };
        dev.init().map_err(|e| match e {
            SensorError::Read(msg) => SensorError::Init(msg),
            init => init,
        })?;
        Ok(dev)
    }

    fn init(&mut self) -> Result<(), SensorError> {
        let id = self.read_reg(REG_ID)?;
        if !KNOWN_IDS.contains(&id) {
            return Err(SensorError::Init(format!("unexpected part id {id:#04x}")));
        }

        self.write_reg(REG_ENABLE, 0x00)?;
        self.write_reg(REG_ATIME, 0xDB)?; // 103 ms integration
        self.write_reg(REG_CONTROL, 0x01)?; // 4x ALS gain, 100 mA LED
        self.write_reg(REG_PPULSE, 0x89)?;
        self.write_reg(REG_GPENTH, 40)?;
        self.write_reg(REG_GEXTH, 30)?;
        self.write_reg(REG_GCONF1, 0x40)?; // interrupt after 4 datasets
        self.write_reg(REG_GCONF2, 0x41)?; // 4x gain, 2.8 ms wait
        self.write_reg(REG_GPULSE, 0xC9)?; // 32 us, 10 pulses
        self.write_reg(REG_GCONF4, 0x00)?;
        self.write_reg(
            REG_ENABLE,
            ENABLE_PON | ENABLE_AEN | ENABLE_PEN | ENABLE_GEN,
        )?;
        Ok(())
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(read_err)?;
        Ok(buf[0])
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(read_err)
    }

    /// Drain the gesture FIFO and return the first and last useful samples.
    fn drain_fifo(&mut self) -> Result<Option<(GestureSample, GestureSample)>, SensorError> {
        let mut first = None;
        let mut last = None;

        while self.read_reg(REG_GSTATUS)? & GSTATUS_GVALID != 0 {
            let level = self.read_reg(REG_GFLVL)? as usize;
            if level == 0 {
                break;
            }
            let mut fifo = vec![0u8; level * 4];
            self.i2c
                .write_read(self.address, &[REG_GFIFO_U], &mut fifo)
                .map_err(read_err)?;

            for chunk in fifo.chunks_exact(4) {
                // FIFO order: up, down, left, right
                if chunk.iter().all(|&v| v < FIFO_NOISE_FLOOR) {
                    continue;
                }
                let sample = GestureSample {
                    left: chunk[2],
                    right: chunk[3],
                };
                first.get_or_insert(sample);
                last = Some(sample);
            }
        }

        // Leave gesture mode so the engine re-arms on the next approach.
        let gconf4 = self.read_reg(REG_GCONF4)?;
        self.write_reg(REG_GCONF4, gconf4 & !GCONF4_GMODE)?;

        Ok(first.zip(last))
    }
}

impl<I2C: I2c + Send> SensorPort for Apds9960<I2C> {
    fn read_ambient_light(&mut self) -> Result<LightLevel, SensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[REG_CDATAL], &mut buf)
            .map_err(read_err)?;
        Ok(u16::from_le_bytes(buf) as LightLevel)
    }

    fn gesture_available(&mut self) -> Result<bool, SensorError> {
        Ok(self.read_reg(REG_GSTATUS)? & GSTATUS_GVALID != 0)
    }

    fn read_gesture(&mut self) -> Result<RawGesture, SensorError> {
        let Some((first, last)) = self.drain_fifo()? else {
            return Ok(RawGesture::Other);
        };
        let delta = last.lr_ratio() - first.lr_ratio();
        Ok(if delta >= SWIPE_SENSITIVITY {
            RawGesture::Right
        } else if delta <= -SWIPE_SENSITIVITY {
            RawGesture::Left
        } else {
            RawGesture::Other
        })
    }
}
