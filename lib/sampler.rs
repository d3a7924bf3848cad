use crate::pipeline::{Sample, SampleProducer};
use crate::sensor::PressureSensor;

/// Timer interrupt side of the pipeline: one sensor read per tick.
pub struct Sampler<'a, S> {
    producer: SampleProducer<'a>,
    sensor: S,
    read_failures: u32,
}

impl<'a, S> Sampler<'a, S>
where
    S: PressureSensor,
{
    pub fn new(sensor: S, producer: SampleProducer<'a>) -> Self {
        Sampler {
            producer,
            sensor,
            read_failures: 0,
        }
    }

    /// Called once per timer tick. Countdowns always advance; the sensor is
    /// read only while the device samples.
    pub fn tick(&mut self) -> Result<Option<Sample>, S::Error> {
        self.producer.tick_countdowns();
        if !self.producer.is_sampling() {
            return Ok(None);
        }
        match self.sensor.read_pressure() {
            Ok(sample) => {
                self.producer.post(sample);
                Ok(Some(sample))
            }
            Err(err) => {
                self.read_failures = self.read_failures.wrapping_add(1);
                Err(err)
            }
        }
    }

    pub fn read_failures(&self) -> u32 {
        self.read_failures
    }
}
