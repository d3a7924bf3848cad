//! State shared between the sample interrupt and the main loop.
//!
//! [`Pipeline`] holds the capacity-1 sample mailbox, the device mode and the
//! housekeeping countdowns. It is split once into a [`SampleProducer`] owned
//! by the timer interrupt and a [`SampleConsumer`] owned by the main loop.
//! Each field has a single writer, so plain atomic loads and stores are
//! enough (thumbv6m has no compare-and-swap).

use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};

use crate::config::SAMPLE_RATE_HZ;

pub type Sample = u16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "board", derive(defmt::Format))]
#[repr(u8)]
pub enum DeviceMode {
    Idle = 0,
    Calibrating = 1,
    Running = 2,
    Error = 3,
}

impl DeviceMode {
    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => DeviceMode::Calibrating,
            2 => DeviceMode::Running,
            3 => DeviceMode::Error,
            _ => DeviceMode::Idle,
        }
    }

    /// The producer reads the sensor only in these modes.
    pub fn is_sampling(self) -> bool {
        matches!(self, DeviceMode::Calibrating | DeviceMode::Running)
    }

    pub fn can_enter(self, next: DeviceMode) -> bool {
        matches!(
            (self, next),
            (DeviceMode::Idle, DeviceMode::Calibrating)
                | (DeviceMode::Idle, DeviceMode::Running)
                | (DeviceMode::Idle, DeviceMode::Error)
                | (DeviceMode::Calibrating, DeviceMode::Running)
        )
    }
}

pub struct ModeCell {
    bits: AtomicU8,
}

impl ModeCell {
    pub const fn new() -> Self {
        ModeCell {
            bits: AtomicU8::new(DeviceMode::Idle as u8),
        }
    }

    pub fn get(&self) -> DeviceMode {
        DeviceMode::from_bits(self.bits.load(Ordering::Acquire))
    }

    fn enter(&self, next: DeviceMode) -> bool {
        if !self.get().can_enter(next) {
            return false;
        }
        self.bits.store(next as u8, Ordering::Release);
        true
    }
}

/// Single sample mailbox with most-recent-wins semantics.
///
/// The sample sits in the low half of one word and a producer-owned tag in
/// the high half, so a post is one store and a take is one load. The
/// consumer publishes the tag it took last; the slot is fresh while the two
/// differ. The producer never hands out the published tag, so a post is
/// never mistaken for an old one however many posts the consumer missed.
pub struct PendingSlot {
    word: AtomicU32,
    taken: AtomicU16,
}

impl PendingSlot {
    pub const fn new() -> Self {
        PendingSlot {
            word: AtomicU32::new(0),
            taken: AtomicU16::new(0),
        }
    }

    fn post(&self, sample: Sample) {
        let mut tag = ((self.word.load(Ordering::Relaxed) >> 16) as u16).wrapping_add(1);
        if tag == self.taken.load(Ordering::Acquire) {
            tag = tag.wrapping_add(1);
        }
        let word = (tag as u32) << 16 | sample as u32;
        self.word.store(word, Ordering::Release);
    }

    fn take(&self) -> Option<Sample> {
        let word = self.word.load(Ordering::Acquire);
        let tag = (word >> 16) as u16;
        if tag == self.taken.load(Ordering::Relaxed) {
            return None;
        }
        self.taken.store(tag, Ordering::Release);
        Some(word as u16)
    }

    fn is_fresh(&self) -> bool {
        (self.word.load(Ordering::Acquire) >> 16) as u16 != self.taken.load(Ordering::Relaxed)
    }
}

/// Countdown decremented by the sample tick, floored at zero.
pub struct Countdown {
    remaining: AtomicU32,
}

impl Countdown {
    pub const fn new() -> Self {
        Countdown {
            remaining: AtomicU32::new(0),
        }
    }

    pub fn set(&self, ticks: u32) {
        self.remaining.store(ticks, Ordering::Release);
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }

    // Only the tick interrupt decrements; the main loop cannot run in between.
    pub fn tick(&self) {
        let remaining = self.remaining.load(Ordering::Acquire);
        if remaining > 0 {
            self.remaining.store(remaining - 1, Ordering::Release);
        }
    }
}

pub const fn ms_to_ticks(ms: u32) -> u32 {
    (ms * SAMPLE_RATE_HZ + 999) / 1000
}

pub struct Pipeline {
    slot: PendingSlot,
    mode: ModeCell,
    delay: Countdown,
    ticks: Countdown,
}

impl Pipeline {
    pub const fn new() -> Self {
        Pipeline {
            slot: PendingSlot::new(),
            mode: ModeCell::new(),
            delay: Countdown::new(),
            ticks: Countdown::new(),
        }
    }

    pub fn split(&mut self) -> (SampleProducer<'_>, SampleConsumer<'_>) {
        let pipeline: &Pipeline = self;
        (
            SampleProducer { pipeline },
            SampleConsumer { pipeline },
        )
    }
}

/// Interrupt side of the [`Pipeline`].
pub struct SampleProducer<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> SampleProducer<'a> {
    pub fn is_sampling(&self) -> bool {
        self.pipeline.mode.get().is_sampling()
    }

    pub fn post(&mut self, sample: Sample) {
        self.pipeline.slot.post(sample);
    }

    pub fn tick_countdowns(&mut self) {
        self.pipeline.delay.tick();
        self.pipeline.ticks.tick();
    }
}

/// Main loop side of the [`Pipeline`].
pub struct SampleConsumer<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> SampleConsumer<'a> {
    pub fn take(&mut self) -> Option<Sample> {
        self.pipeline.slot.take()
    }

    pub fn is_fresh(&self) -> bool {
        self.pipeline.slot.is_fresh()
    }

    pub fn mode(&self) -> DeviceMode {
        self.pipeline.mode.get()
    }

    /// Returns `false` and keeps the current mode if the transition is illegal.
    pub fn enter(&mut self, next: DeviceMode) -> bool {
        self.pipeline.mode.enter(next)
    }

    pub fn start_delay_ms(&mut self, ms: u32) {
        self.pipeline.delay.set(ms_to_ticks(ms));
    }

    pub fn delay_expired(&self) -> bool {
        self.pipeline.delay.remaining() == 0
    }

    /// Busy waits on the tick interrupt.
    pub fn delay_ms(&mut self, ms: u32) {
        self.start_delay_ms(ms);
        while !self.delay_expired() {
            core::hint::spin_loop();
        }
    }

    pub fn start_delay_ticks(&mut self, ticks: u32) {
        self.pipeline.ticks.set(ticks);
    }

    pub fn ticks_expired(&self) -> bool {
        self.pipeline.ticks.remaining() == 0
    }

    pub fn delay_ticks(&mut self, ticks: u32) {
        self.start_delay_ticks(ticks);
        while !self.ticks_expired() {
            core::hint::spin_loop();
        }
    }
}
