//! Interrupt-driven line output, one sample per line.
//!
//! `send` puts the first byte into the transmit register and arms the
//! transmit-empty interrupt; `on_tx_empty`, called from that interrupt,
//! pushes the rest of the line and disarms it after the terminator.

use core::convert::Infallible;
use core::fmt::Write;

use heapless::String;

use crate::config::{Version, SAMPLE_RATE_HZ};
use crate::error::{Error, Result};
use crate::pipeline::Sample;

pub trait TxRegister {
    /// Writes into the transmit data register without waiting.
    fn write(&mut self, byte: u8);
    fn is_empty(&self) -> bool;
    fn listen(&mut self);
    fn unlisten(&mut self);
}

pub struct SerialStreamer<TX> {
    tx: TX,
    buffer: String<8>,
    index: usize,
    idle: bool,
}

impl<TX> SerialStreamer<TX>
where
    TX: TxRegister,
{
    pub fn new(mut tx: TX) -> Self {
        tx.unlisten();
        SerialStreamer {
            tx,
            buffer: String::new(),
            index: 0,
            idle: true,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    /// Starts transmitting `sample`; returns `false` without touching the
    /// buffer or the interrupt while a line is still in flight.
    pub fn send(&mut self, sample: Sample) -> bool {
        if !self.idle {
            return false;
        }
        self.buffer.clear();
        // "65535\n" always fits
        if write!(&mut self.buffer, "{}\n", sample).is_err() {
            return false;
        }
        self.idle = false;
        self.index = 1;
        self.tx.write(self.buffer.as_bytes()[0]);
        self.tx.listen();
        true
    }

    /// Transmit-empty interrupt continuation.
    pub fn on_tx_empty(&mut self) {
        match self.buffer.as_bytes().get(self.index) {
            Some(byte) => {
                self.tx.write(*byte);
                self.index += 1;
            }
            None => {
                self.tx.unlisten();
                self.idle = true;
            }
        }
    }

    /// Busy-waits the stream header out; only used before sampling starts.
    pub fn send_header(&mut self) -> Result<(), Infallible> {
        let mut header = String::<24>::new();
        write!(
            &mut header,
            "#infra_{}@{}\n",
            Version::PROTOCOL,
            SAMPLE_RATE_HZ
        )
        .map_err(|_| Error::BufferWrite)?;
        for byte in header.as_bytes() {
            while !self.tx.is_empty() {
                core::hint::spin_loop();
            }
            self.tx.write(*byte);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::vec::Vec;

    #[derive(Default)]
    pub struct Recorder {
        pub sent: Vec<u8>,
        pub listening: bool,
        pub arms: usize,
    }

    impl TxRegister for Recorder {
        fn write(&mut self, byte: u8) {
            self.sent.push(byte);
        }

        fn is_empty(&self) -> bool {
            true
        }

        fn listen(&mut self) {
            self.listening = true;
            self.arms += 1;
        }

        fn unlisten(&mut self) {
            self.listening = false;
        }
    }

    impl<TX: TxRegister> SerialStreamer<TX> {
        pub fn tx(&self) -> &TX {
            &self.tx
        }

        /// Runs the interrupt until the line is out.
        pub fn drain(&mut self) {
            while !self.idle {
                self.on_tx_empty();
            }
        }
    }

    #[test]
    fn send_writes_first_byte_and_arms_interrupt() {
        let mut streamer = SerialStreamer::new(Recorder::default());

        assert!(streamer.send(500));
        assert_eq!(streamer.tx().sent, b"5");
        assert!(streamer.tx().listening);
        assert!(!streamer.is_idle());
    }

    #[test]
    fn interrupt_finishes_line_and_disarms() {
        let mut streamer = SerialStreamer::new(Recorder::default());

        streamer.send(500);
        streamer.on_tx_empty();
        streamer.on_tx_empty();
        streamer.on_tx_empty();
        assert!(!streamer.is_idle());
        streamer.on_tx_empty();

        assert_eq!(streamer.tx().sent, b"500\n");
        assert!(!streamer.tx().listening);
        assert!(streamer.is_idle());
    }

    #[test]
    fn send_in_flight_has_no_effect() {
        let mut streamer = SerialStreamer::new(Recorder::default());

        streamer.send(12);
        assert!(!streamer.send(34));
        assert_eq!(streamer.buffer, "12\n");
        assert_eq!(streamer.tx().arms, 1);
        assert_eq!(streamer.tx().sent, b"1");

        streamer.drain();
        assert!(streamer.send(34));
        streamer.drain();
        assert_eq!(streamer.tx().sent, b"12\n34\n");
        assert_eq!(streamer.tx().arms, 2);
    }

    #[test]
    fn largest_sample_fits() {
        let mut streamer = SerialStreamer::new(Recorder::default());
        assert!(streamer.send(u16::MAX));
        streamer.drain();
        assert_eq!(streamer.tx().sent, b"65535\n");
    }

    #[test]
    fn header_line() {
        let mut streamer = SerialStreamer::new(Recorder::default());
        streamer.send_header().unwrap();
        assert_eq!(streamer.tx().sent, b"#infra_1@150\n");
        assert!(streamer.is_idle());
    }
}
