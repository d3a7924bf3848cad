use core::fmt::Debug;
use embedded_sdmmc::{
    Directory, Error as SdmmcError, File, Mode, SdCard, SdCardError, TimeSource, Timestamp,
    Volume as FatVolume, VolumeIdx, VolumeManager,
};
use stm32g0xx_hal::hal::blocking::delay::DelayUs;
use stm32g0xx_hal::hal::blocking::spi::{Transfer, Write};
use stm32g0xx_hal::hal::digital::v2::OutputPin;

use crate::logger::{FileName, Volume};

/// The board has no RTC, every file gets the same timestamp.
pub struct FixedClock;

impl TimeSource for FixedClock {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 52,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

#[derive(Debug)]
pub enum SdError {
    Card(SdmmcError<SdCardError>),
    NotOpen,
}

impl From<SdmmcError<SdCardError>> for SdError {
    fn from(err: SdmmcError<SdCardError>) -> Self {
        SdError::Card(err)
    }
}

/// FAT volume 0 of the card, root directory only.
pub struct SdVolume<SPI, CS, D>
where
    SPI: Transfer<u8> + Write<u8>,
    <SPI as Transfer<u8>>::Error: Debug,
    <SPI as Write<u8>>::Error: Debug,
    CS: OutputPin,
    D: DelayUs<u8>,
{
    manager: VolumeManager<SdCard<SPI, CS, D>, FixedClock>,
    volume: FatVolume,
    root: Directory,
    file: Option<File>,
    name: FileName,
}

impl<SPI, CS, D> SdVolume<SPI, CS, D>
where
    SPI: Transfer<u8> + Write<u8>,
    <SPI as Transfer<u8>>::Error: Debug,
    <SPI as Write<u8>>::Error: Debug,
    CS: OutputPin,
    D: DelayUs<u8>,
{
    pub fn mount(spi: SPI, cs: CS, delay: D) -> Result<Self, SdError> {
        let card = SdCard::new(spi, cs, delay);
        let mut manager = VolumeManager::new(card, FixedClock);
        let volume = manager.get_volume(VolumeIdx(0))?;
        let root = manager.open_root_dir(&volume)?;
        Ok(SdVolume {
            manager,
            volume,
            root,
            file: None,
            name: FileName::new(),
        })
    }

    fn open(&mut self, name: &str, mode: Mode) -> Result<(), SdError> {
        let file = self
            .manager
            .open_file_in_dir(&mut self.volume, &self.root, name, mode)?;
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SdError> {
        match self.file.take() {
            Some(file) => Ok(self.manager.close_file(&self.volume, file)?),
            None => Ok(()),
        }
    }
}

impl<SPI, CS, D> Volume for SdVolume<SPI, CS, D>
where
    SPI: Transfer<u8> + Write<u8>,
    <SPI as Transfer<u8>>::Error: Debug,
    <SPI as Write<u8>>::Error: Debug,
    CS: OutputPin,
    D: DelayUs<u8>,
{
    type Error = SdError;

    fn exists(&mut self, name: &str) -> Result<bool, SdError> {
        match self
            .manager
            .find_directory_entry(&self.volume, &self.root, name)
        {
            Ok(_) => Ok(true),
            Err(SdmmcError::FileNotFound) => Ok(false),
            Err(err) => Err(SdError::Card(err)),
        }
    }

    fn create(&mut self, name: &str) -> Result<(), SdError> {
        self.close()?;
        self.open(name, Mode::ReadWriteCreateOrTruncate)?;
        self.name.clear();
        self.name.push_str(name).map_err(|_| SdError::NotOpen)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SdError> {
        let file = self.file.as_mut().ok_or(SdError::NotOpen)?;
        self.manager.write(&mut self.volume, file, bytes)?;
        Ok(())
    }

    /// FAT directory entry is only updated on close, so reopen to append.
    fn sync(&mut self) -> Result<(), SdError> {
        if self.file.is_none() {
            return Err(SdError::NotOpen);
        }
        self.close()?;
        let name = self.name.clone();
        self.open(&name, Mode::ReadWriteAppend)
    }
}
