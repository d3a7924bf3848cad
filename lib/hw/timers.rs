use stm32g0xx_hal::hal::timer::CountDown;
use stm32g0xx_hal::rcc::Rcc;
use stm32g0xx_hal::stm32g0::stm32g070::TIM6;
use stm32g0xx_hal::time::Hertz;
use stm32g0xx_hal::timer::{Timer, TimerExt};

/// Update interrupt at the sample rate, drives the sampler.
pub struct SampleTimer {
    timer: Timer<TIM6>,
    freq: Hertz,
}

impl SampleTimer {
    pub fn new(pac_tim: TIM6, freq: Hertz, rcc: &mut Rcc) -> Self {
        SampleTimer {
            timer: pac_tim.timer(rcc),
            freq,
        }
    }

    pub fn start(&mut self) {
        self.timer.clear_irq();
        self.timer.listen();
        self.timer.start(self.freq);
    }

    pub fn unpend(&mut self) {
        self.timer.clear_irq();
    }
}
