use cortex_m::peripheral::SYST;
use display_interface_parallel_gpio::PGPIO8BitInterface;
use stm32g0xx_hal::gpio::gpioa::{PA1, PA4, PA5, PA6, PA7, PA8};
use stm32g0xx_hal::gpio::gpiob::{
    PB0, PB1, PB12, PB13, PB14, PB15, PB2, PB3, PB4, PB5, PB6, PB7, PB8, PB9,
};
use stm32g0xx_hal::gpio::gpioc::{PC13, PC4, PC5};
use stm32g0xx_hal::gpio::{DefaultMode, Input, Output, PullUp, PushPull};
use stm32g0xx_hal::prelude::{InputPin, OutputPin};
use stm32g0xx_hal::rcc::{Config, PllConfig, Rcc, RccExt};
use stm32g0xx_hal::spi::Spi;
use stm32g0xx_hal::stm32g0::stm32g070::{RCC, SPI1, SPI2, TIM17};
use stm32g0xx_hal::timer::delay::Delay;

use crate::hw::lcd::{IliError, IliLcd};
use crate::hw::sd::{SdError, SdVolume};
use crate::logger::BlockWriter;
use crate::sensor::Bmp280;

/// APB clock produced by `init_clock`.
pub const PCLK_HZ: u32 = 64_000_000;

pub fn init_clock(pac_rcc: RCC) -> Rcc {
    // ((16 MHz / 4) * 32) / 2 = 64 MHz
    let pll_config = PllConfig::with_hsi(4, 32, 2);
    pac_rcc.freeze(Config::pll().pll_cfg(pll_config))
}

// PB0 - LCD_D0
type LcdD0 = PB0<Output<PushPull>>;
// PB1 - LCD_D1
type LcdD1 = PB1<Output<PushPull>>;
// PB2 - LCD_D2
type LcdD2 = PB2<Output<PushPull>>;
// PB3 - LCD_D3
type LcdD3 = PB3<Output<PushPull>>;
// PB4 - LCD_D4
type LcdD4 = PB4<Output<PushPull>>;
// PB5 - LCD_D5
type LcdD5 = PB5<Output<PushPull>>;
// PB6 - LCD_D6
type LcdD6 = PB6<Output<PushPull>>;
// PB7 - LCD_D7
type LcdD7 = PB7<Output<PushPull>>;
// PB8 - LCD_DC (Command[Low]/Data[High])
type LcdDC = PB8<Output<PushPull>>;
// PB9 - LCD_WR (Write signal)
type LcdWR = PB9<Output<PushPull>>;

// PA1 - SPI1_SCK, PA6 - SPI1_MISO, PA7 - SPI1_MOSI
type SensorSpi = Spi<SPI1, (PA1<DefaultMode>, PA6<DefaultMode>, PA7<DefaultMode>)>;
// PA8 - BMP280 chip select
type SensorCs = PA8<Output<PushPull>>;

// PB13 - SPI2_SCK, PB14 - SPI2_MISO, PB15 - SPI2_MOSI
type SdSpi = Spi<SPI2, (PB13<DefaultMode>, PB14<DefaultMode>, PB15<DefaultMode>)>;
// PB12 - SD card chip select
type SdCs = PB12<Output<PushPull>>;
// SYST belongs to the LCD bring-up
type SdDelay = Delay<TIM17>;

// PA2 - USART2_TX
// PA3 - USART2_RX

// PA4 - LCD_RST (Reset)
pub type LcdRst = PA4<Output<PushPull>>;
// PA5 - LCD_RD (Read signal)
pub type LcdRD = PA5<Output<PushPull>>;

// PC13 - User button, active low
pub type Button = PC13<Input<PullUp>>;
// PC4 - Busy LED
pub type BusyLed = PC4<Output<PushPull>>;
// PC5 - Error LED
pub type ErrorLed = PC5<Output<PushPull>>;

pub type LcdInterface =
    PGPIO8BitInterface<LcdD0, LcdD1, LcdD2, LcdD3, LcdD4, LcdD5, LcdD6, LcdD7, LcdDC, LcdWR>;
pub type HwLcd = IliLcd<LcdInterface, LcdRst>;
pub type HwSensor = Bmp280<SensorSpi, SensorCs>;
pub type HwVolume = BlockWriter<SdVolume<SdSpi, SdCs, SdDelay>>;

pub fn init_lcd(
    interface: LcdInterface,
    lcd_rst: LcdRst,
    lcd_rd: LcdRD,
    delay: &mut Delay<SYST>,
) -> Result<HwLcd, IliError> {
    let mut lcd_rd = lcd_rd;
    lcd_rd.set_high().ok();
    IliLcd::new(interface, lcd_rst, delay)
}

/// Mounts the card at its 400 kHz identification clock, then moves SPI2 to
/// PCLK / 8 (8 MHz) for data transfer.
pub fn mount_sd(spi: SdSpi, cs: SdCs, delay: SdDelay) -> Result<HwVolume, SdError> {
    let volume = SdVolume::mount(spi, cs, delay)?;
    sd_full_speed();
    Ok(BlockWriter::new(volume))
}

fn sd_full_speed() {
    let spi = unsafe { &(*SPI2::ptr()) };
    spi.cr1.modify(|_, w| w.spe().clear_bit());
    // Baud rate PCLK / 8
    spi.cr1.modify(|_, w| unsafe { w.br().bits(0b010) });
    spi.cr1.modify(|_, w| w.spe().set_bit());
}

/// Sampled once at reset, the latch is not watched afterwards.
pub fn is_pressed(button: &Button) -> bool {
    button.is_low().unwrap_or(false)
}

pub struct StatusLeds {
    busy: BusyLed,
    error: ErrorLed,
    busy_on: bool,
}

impl StatusLeds {
    pub fn new(busy: BusyLed, error: ErrorLed) -> Self {
        let mut leds = StatusLeds {
            busy,
            error,
            busy_on: false,
        };
        leds.busy.set_low().ok();
        leds.error.set_low().ok();
        leds
    }

    pub fn toggle_busy(&mut self) {
        self.busy_on = !self.busy_on;
        if self.busy_on {
            self.busy.set_high().ok();
        } else {
            self.busy.set_low().ok();
        }
    }

    pub fn set_error(&mut self, on: bool) {
        if on {
            self.error.set_high().ok();
        } else {
            self.error.set_low().ok();
        }
    }
}
