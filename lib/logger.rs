//! Append-only sample log on a flat volume of numbered files.

use core::fmt::Write;

use heapless::{String, Vec};

use crate::config::{LogFile, Version, SAMPLE_RATE_HZ};
use crate::error::{Error, Result};
use crate::pipeline::Sample;

/// Single flat directory holding at most one file open for writing.
pub trait Volume {
    type Error;
    fn exists(&mut self, name: &str) -> core::result::Result<bool, Self::Error>;
    /// Opens `name` for writing, replacing an existing file.
    fn create(&mut self, name: &str) -> core::result::Result<(), Self::Error>;
    fn write(&mut self, bytes: &[u8]) -> core::result::Result<(), Self::Error>;
    fn sync(&mut self) -> core::result::Result<(), Self::Error>;
}

/// 8.3 name, e.g. `APSMPL07.DAT`.
pub type FileName = String<12>;

pub fn file_name<E>(id: u8) -> Result<FileName, E> {
    let mut name = FileName::new();
    write!(&mut name, "{}{:02}{}", LogFile::BASE, id, LogFile::EXT).map_err(|_| Error::BufferWrite)?;
    Ok(name)
}

/// First id in `1..=MAX_ID` without a file; 1 once every id is taken.
pub fn next_file_id<V: Volume>(volume: &mut V) -> Result<u8, V::Error> {
    for id in 1..=LogFile::MAX_ID {
        let name = file_name(id)?;
        if !volume.exists(&name).map_err(Error::Bus)? {
            return Ok(id);
        }
    }
    Ok(1)
}

pub struct LogWriter<V> {
    volume: V,
    name: FileName,
    unsynced: u16,
    sync_interval: u16,
}

impl<V> LogWriter<V>
where
    V: Volume,
{
    /// Picks the next free name, creates the file and writes the header.
    pub fn open(mut volume: V) -> Result<Self, V::Error> {
        let name = file_name(next_file_id(&mut volume)?)?;
        volume.create(&name).map_err(Error::Bus)?;
        let mut writer = LogWriter {
            volume,
            name,
            unsynced: 0,
            sync_interval: LogFile::SYNC_INTERVAL,
        };
        writer.put_header()?;
        Ok(writer)
    }

    pub fn append(&mut self, sample: Sample) -> Result<(), V::Error> {
        let mut line = String::<8>::new();
        write!(&mut line, "{:X}\n", sample).map_err(|_| Error::BufferWrite)?;
        self.volume.write(line.as_bytes()).map_err(Error::Bus)?;

        self.unsynced += 1;
        if self.unsynced >= self.sync_interval {
            self.unsynced = 0;
            self.volume.sync().map_err(Error::Bus)?;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn put_header(&mut self) -> Result<(), V::Error> {
        let mut header = String::<64>::new();
        write!(
            &mut header,
            "#! -{} V{}.{} ---\n# @{}\n",
            Version::PRODUCT,
            Version::MAJOR,
            Version::MINOR,
            SAMPLE_RATE_HZ
        )
        .map_err(|_| Error::BufferWrite)?;
        self.volume.write(header.as_bytes()).map_err(Error::Bus)?;
        self.volume.sync().map_err(Error::Bus)
    }
}

/// Bytes per card block.
pub const BLOCK_SIZE: usize = 512;

/// Gathers small writes into whole blocks for volumes that rewrite a block
/// per call. Bytes reach the volume when a block fills up or on `sync`;
/// a failed block write drops that block.
pub struct BlockWriter<V> {
    inner: V,
    block: Vec<u8, BLOCK_SIZE>,
}

impl<V> BlockWriter<V>
where
    V: Volume,
{
    pub fn new(inner: V) -> Self {
        BlockWriter {
            inner,
            block: Vec::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.block.len()
    }

    fn flush(&mut self) -> core::result::Result<(), V::Error> {
        if self.block.is_empty() {
            return Ok(());
        }
        let result = self.inner.write(&self.block);
        self.block.clear();
        result
    }
}

impl<V> Volume for BlockWriter<V>
where
    V: Volume,
{
    type Error = V::Error;

    fn exists(&mut self, name: &str) -> core::result::Result<bool, V::Error> {
        self.inner.exists(name)
    }

    fn create(&mut self, name: &str) -> core::result::Result<(), V::Error> {
        self.flush()?;
        self.inner.create(name)
    }

    fn write(&mut self, bytes: &[u8]) -> core::result::Result<(), V::Error> {
        let mut rest = bytes;
        while !rest.is_empty() {
            let take = (BLOCK_SIZE - self.block.len()).min(rest.len());
            // Room was checked above
            self.block.extend_from_slice(&rest[..take]).ok();
            rest = &rest[take..];
            if self.block.len() == BLOCK_SIZE {
                self.flush()?;
            }
        }
        Ok(())
    }

    fn sync(&mut self) -> core::result::Result<(), V::Error> {
        self.flush()?;
        self.inner.sync()
    }
}
