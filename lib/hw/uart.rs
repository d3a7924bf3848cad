use stm32g0xx_hal::gpio::gpioa::{PA2, PA3};
use stm32g0xx_hal::gpio::DefaultMode;
use stm32g0xx_hal::rcc::Rcc;
use stm32g0xx_hal::stm32g0::stm32g070::{GPIOA, RCC, USART2};

use crate::serial::TxRegister;

// FIXME Switch to the HAL serial once it can toggle the TXE interrupt
pub struct UartTx {
    usart: USART2,
    _pins: (PA2<DefaultMode>, PA3<DefaultMode>),
}

impl UartTx {
    pub fn new(
        pac_usart: USART2,
        tx: PA2<DefaultMode>,
        rx: PA3<DefaultMode>,
        pclk: u32,
        baud: u32,
        rcc: &mut Rcc,
    ) -> Self {
        UartTx::enable_clock_and_reset(rcc);
        UartTx::configure_pins();
        let mut uart = UartTx {
            usart: pac_usart,
            _pins: (tx, rx),
        };
        uart.configure(pclk / baud);
        uart
    }

    fn configure(&mut self, divider: u32) {
        self.usart.cr1.reset();
        self.usart.brr.write(|w| unsafe { w.brr().bits(divider as u16) });
        self.usart.cr1.write(|w| {
            // 8N1, oversampling by 16
            w.te().set_bit();
            w.re().set_bit();
            w.ue().set_bit()
        });
    }

    fn configure_pins() {
        let gpioa = unsafe { &(*GPIOA::ptr()) };
        // PA2 - USART2_TX, PA3 - USART2_RX, both AF1
        gpioa.afrl.modify(|_, w| unsafe {
            w.afsel2().bits(1);
            w.afsel3().bits(1)
        });
        gpioa.moder.modify(|_, w| unsafe {
            w.moder2().bits(0b10);
            w.moder3().bits(0b10)
        });
    }

    fn enable_clock_and_reset(_: &mut Rcc) {
        let rcc = unsafe { &(*RCC::ptr()) };
        rcc.apbenr1.modify(|_, w| w.usart2en().set_bit());
        rcc.apbrstr1.modify(|_, w| w.usart2rst().set_bit());
        rcc.apbrstr1.modify(|_, w| w.usart2rst().clear_bit());
    }
}

impl TxRegister for UartTx {
    fn write(&mut self, byte: u8) {
        self.usart.tdr.write(|w| unsafe { w.tdr().bits(byte as u16) });
    }

    fn is_empty(&self) -> bool {
        self.usart.isr.read().txe().bit_is_set()
    }

    fn listen(&mut self) {
        self.usart.cr1.modify(|_, w| w.txeie().set_bit());
    }

    fn unlisten(&mut self) {
        self.usart.cr1.modify(|_, w| w.txeie().clear_bit());
    }
}
