//! Main loop side of the sample pipeline.
//!
//! Each poll takes at most one sample from the mailbox and routes it by
//! device mode: into the calibration accumulator while calibrating, or to
//! the log, the chart and the serial stream, in that order, while running.
//! A failing consumer never stops the others or the sampling.

use crate::calibration::Calibration;
use crate::config::{Calibrate, StartupConfig};
use crate::display::{Display, Lcd};
use crate::logger::{LogWriter, Volume};
use crate::pipeline::{DeviceMode, Sample, SampleConsumer};
use crate::serial::{SerialStreamer, TxRegister};

/// Non-blocking sample output, skipped while busy.
pub trait Stream {
    fn try_send(&mut self, sample: Sample) -> bool;
}

impl<TX> Stream for SerialStreamer<TX>
where
    TX: TxRegister,
{
    fn try_send(&mut self, sample: Sample) -> bool {
        self.is_idle() && self.send(sample)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "board", derive(defmt::Format))]
pub enum Dispatched {
    Nothing,
    Dropped(Sample),
    Calibrating,
    Calibrated(Sample),
    Recorded { logged: bool, streamed: bool },
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "board", derive(defmt::Format))]
pub struct Stats {
    pub logged: u32,
    pub log_failures: u32,
    pub chart_failures: u32,
    pub streamed: u32,
    pub serial_skipped: u32,
    pub dropped: u32,
}

pub struct Dispatcher<'a, V, LCD> {
    consumer: SampleConsumer<'a>,
    calibration: Option<Calibration>,
    log: Option<LogWriter<V>>,
    display: Display<LCD>,
    stream_serial: bool,
    stats: Stats,
}

impl<'a, V, LCD> Dispatcher<'a, V, LCD>
where
    V: Volume,
    LCD: Lcd,
{
    pub fn new(
        consumer: SampleConsumer<'a>,
        display: Display<LCD>,
        log: Option<LogWriter<V>>,
    ) -> Self {
        Dispatcher {
            consumer,
            calibration: None,
            log,
            display,
            stream_serial: false,
            stats: Stats::default(),
        }
    }

    /// Leaves Idle for Calibrating or Running. A device already in Error
    /// stays there.
    pub fn start(&mut self, config: StartupConfig) -> DeviceMode {
        self.stream_serial = config.stream_serial;
        if config.calibrate {
            if self.consumer.enter(DeviceMode::Calibrating) {
                self.calibration = Some(Calibration::new(Calibrate::ITEMS));
            }
        } else {
            self.consumer.enter(DeviceMode::Running);
        }
        self.consumer.mode()
    }

    /// Terminal failure, only reachable before `start`.
    pub fn fail(&mut self) -> bool {
        self.consumer.enter(DeviceMode::Error)
    }

    pub fn poll<S: Stream>(&mut self, stream: &mut S) -> Dispatched {
        match self.consumer.take() {
            Some(sample) => self.dispatch(sample, stream),
            None => Dispatched::Nothing,
        }
    }

    pub fn dispatch<S: Stream>(&mut self, sample: Sample, stream: &mut S) -> Dispatched {
        match self.consumer.mode() {
            DeviceMode::Calibrating => self.calibrate(sample),
            DeviceMode::Running => self.record(sample, stream),
            DeviceMode::Idle | DeviceMode::Error => {
                self.stats.dropped += 1;
                Dispatched::Dropped(sample)
            }
        }
    }

    fn calibrate(&mut self, sample: Sample) -> Dispatched {
        let calibration = match self.calibration.as_mut() {
            Some(calibration) => calibration,
            None => return Dispatched::Dropped(sample),
        };
        match calibration.feed(sample) {
            Some(baseline) => {
                self.calibration = None;
                self.display.set_calibration(baseline);
                self.consumer.enter(DeviceMode::Running);
                Dispatched::Calibrated(baseline)
            }
            None => Dispatched::Calibrating,
        }
    }

    fn record<S: Stream>(&mut self, sample: Sample, stream: &mut S) -> Dispatched {
        let logged = match self.log.as_mut() {
            Some(log) => match log.append(sample) {
                Ok(()) => {
                    self.stats.logged += 1;
                    true
                }
                Err(_) => {
                    self.stats.log_failures += 1;
                    false
                }
            },
            None => false,
        };

        if self.display.update(sample).is_err() {
            self.stats.chart_failures += 1;
        }

        let mut streamed = false;
        if self.stream_serial {
            streamed = stream.try_send(sample);
            if streamed {
                self.stats.streamed += 1;
            } else {
                self.stats.serial_skipped += 1;
            }
        }
        Dispatched::Recorded { logged, streamed }
    }

    pub fn mode(&self) -> DeviceMode {
        self.consumer.mode()
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn is_logging(&self) -> bool {
        self.log.is_some()
    }

    pub fn is_streaming(&self) -> bool {
        self.stream_serial
    }

    pub fn display(&mut self) -> &mut Display<LCD> {
        &mut self.display
    }

    /// Mailbox side used for the interrupt-driven delays.
    pub fn consumer(&mut self) -> &mut SampleConsumer<'a> {
        &mut self.consumer
    }
}
