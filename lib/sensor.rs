//! BMP280 register transport over a 4-wire SPI bus.
//!
//! The sensor runs in normal mode, pressure only, without oversampling or
//! filtering, and is read as a raw 16-bit value. No compensation is applied.

use core::convert::Infallible;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;

use crate::error::{Error, Result};
use crate::pipeline::Sample;

pub const CHIP_ID: u8 = 0x58;

pub struct Register;

impl Register {
    pub const ID: u8 = 0xD0;
    pub const RESET: u8 = 0xE0;
    pub const STATUS: u8 = 0xF3;
    pub const CTRL_MEAS: u8 = 0xF4;
    pub const CONFIG: u8 = 0xF5;
    pub const PRESS_MSB: u8 = 0xF7;
}

const RESET_VALUE: u8 = 0xB6;
const READ_MASK: u8 = 0x80;
const WRITE_MASK: u8 = 0x7F;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SensorMode {
    // Pressure x1, temperature skipped, normal mode, no standby, no filter
    Mode0,
}

impl SensorMode {
    fn registers(self) -> (u8, u8) {
        match self {
            SensorMode::Mode0 => (0b000_001_11, 0b000_000_00),
        }
    }
}

/// Source of raw pressure samples for the sample interrupt.
pub trait PressureSensor {
    type Error;
    fn read_pressure(&mut self) -> core::result::Result<Sample, Self::Error>;
}

pub struct Bmp280<SPI, CS> {
    spi: SPI,
    cs: CS,
}

impl<SPI, CS, E> Bmp280<SPI, CS>
where
    SPI: Transfer<u8, Error = E>,
    CS: OutputPin<Error = Infallible>,
{
    pub fn new(spi: SPI, cs: CS) -> Self {
        let mut sensor = Bmp280 { spi, cs };
        sensor.deselect();
        sensor
    }

    /// Resets and configures the sensor, returning its chip id.
    pub fn initialize<D>(&mut self, mode: SensorMode, delay: &mut D) -> Result<u8, E>
    where
        D: DelayMs<u8>,
    {
        self.write_register(Register::RESET, RESET_VALUE)?;
        delay.delay_ms(10);

        let id = self.read_register(Register::ID)?;
        if id != CHIP_ID {
            return Err(Error::ChipId(id));
        }

        let (ctrl_meas, config) = mode.registers();
        self.write_register(Register::CTRL_MEAS, ctrl_meas)?;
        delay.delay_ms(5);
        self.write_register(Register::CONFIG, config)?;
        delay.delay_ms(5);
        Ok(id)
    }

    pub fn read_register(&mut self, addr: u8) -> Result<u8, E> {
        let mut frame = [addr | READ_MASK, 0];
        self.exchange(&mut frame)?;
        Ok(frame[1])
    }

    pub fn write_register(&mut self, addr: u8, value: u8) -> Result<(), E> {
        let mut frame = [addr & WRITE_MASK, value];
        self.exchange(&mut frame)
    }

    /// Burst read of `count` registers, accumulated big-endian.
    pub fn read_multi(&mut self, addr: u8, count: u8) -> Result<u32, E> {
        if count == 0 || count > 4 {
            return Err(Error::ReadLength(count));
        }
        let mut frame = [0u8; 5];
        frame[0] = addr | READ_MASK;
        let frame = &mut frame[..=count as usize];
        self.exchange(frame)?;
        Ok(frame[1..]
            .iter()
            .fold(0u32, |acc, byte| acc << 8 | *byte as u32))
    }

    fn exchange(&mut self, frame: &mut [u8]) -> Result<(), E> {
        self.select();
        let result = self.spi.transfer(frame).map(|_| ()).map_err(Error::Bus);
        self.deselect();
        result
    }

    fn select(&mut self) {
        self.cs.set_low().ok();
    }

    fn deselect(&mut self) {
        self.cs.set_high().ok();
    }
}

impl<SPI, CS, E> PressureSensor for Bmp280<SPI, CS>
where
    SPI: Transfer<u8, Error = E>,
    CS: OutputPin<Error = Infallible>,
{
    type Error = Error<E>;

    fn read_pressure(&mut self) -> Result<Sample, E> {
        let raw = self.read_multi(Register::PRESS_MSB, 2)?;
        Ok(raw as Sample)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;
    use std::vec::Vec;

    /// Register file behind a fake SPI bus; records every chip-select frame.
    #[derive(Default)]
    pub struct FakeChip {
        pub registers: BTreeMap<u8, u8>,
        pub frames: Vec<Vec<u8>>,
        pub selected: bool,
    }

    #[derive(Clone, Default)]
    pub struct FakeBus(pub Rc<RefCell<FakeChip>>);

    impl FakeBus {
        pub fn with_id(id: u8) -> Self {
            let bus = FakeBus::default();
            bus.0.borrow_mut().registers.insert(Register::ID, id);
            bus
        }

        pub fn set_pressure(&self, value: u16) {
            let mut chip = self.0.borrow_mut();
            chip.registers.insert(Register::PRESS_MSB, (value >> 8) as u8);
            chip.registers.insert(Register::PRESS_MSB + 1, value as u8);
        }
    }

    impl Transfer<u8> for FakeBus {
        type Error = ();

        fn transfer<'w>(&mut self, words: &'w mut [u8]) -> core::result::Result<&'w [u8], ()> {
            let mut chip = self.0.borrow_mut();
            assert!(chip.selected, "transfer without chip select");
            chip.frames.push(words.to_vec());
            let command = words[0];
            if command & READ_MASK != 0 {
                let base = command & WRITE_MASK | READ_MASK;
                for (offset, word) in words[1..].iter_mut().enumerate() {
                    let addr = base.wrapping_add(offset as u8);
                    *word = chip.registers.get(&addr).copied().unwrap_or(0);
                }
            } else {
                let addr = command | READ_MASK;
                chip.registers.insert(addr, words[1]);
            }
            Ok(words)
        }
    }

    pub struct FakeCs(pub Rc<RefCell<FakeChip>>);

    impl OutputPin for FakeCs {
        type Error = Infallible;

        fn set_low(&mut self) -> core::result::Result<(), Infallible> {
            self.0.borrow_mut().selected = true;
            Ok(())
        }

        fn set_high(&mut self) -> core::result::Result<(), Infallible> {
            self.0.borrow_mut().selected = false;
            Ok(())
        }
    }

    pub struct NoDelay;

    impl DelayMs<u8> for NoDelay {
        fn delay_ms(&mut self, _ms: u8) {}
    }

    pub fn sensor(bus: &FakeBus) -> Bmp280<FakeBus, FakeCs> {
        Bmp280::new(bus.clone(), FakeCs(bus.0.clone()))
    }

    #[test]
    fn initialize_resets_and_configures() {
        let bus = FakeBus::with_id(CHIP_ID);
        let mut bmp = sensor(&bus);

        assert_eq!(bmp.initialize(SensorMode::Mode0, &mut NoDelay), Ok(CHIP_ID));

        let chip = bus.0.borrow();
        assert_eq!(chip.frames[0], [Register::RESET & WRITE_MASK, RESET_VALUE]);
        assert_eq!(chip.registers[&Register::CTRL_MEAS], 0x07);
        assert_eq!(chip.registers[&Register::CONFIG], 0x00);
        assert!(!chip.selected);
    }

    #[test]
    fn initialize_rejects_unknown_chip() {
        let bus = FakeBus::with_id(0x60);
        let mut bmp = sensor(&bus);

        assert_eq!(
            bmp.initialize(SensorMode::Mode0, &mut NoDelay),
            Err(Error::ChipId(0x60))
        );
        assert!(!bus.0.borrow().registers.contains_key(&Register::CTRL_MEAS));
    }

    #[test]
    fn registers_read_back_after_initialize() {
        let bus = FakeBus::with_id(CHIP_ID);
        bus.0.borrow_mut().registers.insert(Register::STATUS, 0x08);
        let mut bmp = sensor(&bus);
        bmp.initialize(SensorMode::Mode0, &mut NoDelay).ok();

        assert_eq!(bmp.read_register(Register::STATUS), Ok(0x08));
        assert_eq!(bmp.read_register(Register::CTRL_MEAS), Ok(0x07));
        assert_eq!(bmp.read_register(Register::CONFIG), Ok(0x00));
        assert_eq!(bus.0.borrow().frames.last(), Some(&vec![Register::CONFIG, 0x00]));
    }

    #[test]
    fn read_multi_accumulates_big_endian() {
        let bus = FakeBus::default();
        {
            let mut chip = bus.0.borrow_mut();
            chip.registers.insert(0xF7, 0x12);
            chip.registers.insert(0xF8, 0x34);
            chip.registers.insert(0xF9, 0x56);
        }
        let mut bmp = sensor(&bus);

        assert_eq!(bmp.read_multi(0xF7, 3), Ok(0x12_3456));
        assert_eq!(bmp.read_multi(0xF7, 0), Err(Error::ReadLength(0)));
        assert_eq!(bmp.read_multi(0xF7, 5), Err(Error::ReadLength(5)));
    }

    #[test]
    fn read_pressure_is_two_byte_burst() {
        let bus = FakeBus::default();
        bus.set_pressure(0x8A1F);
        let mut bmp = sensor(&bus);

        assert_eq!(bmp.read_pressure(), Ok(0x8A1F));
        assert_eq!(bus.0.borrow().frames.last().map(|f| f.len()), Some(3));
    }
}
