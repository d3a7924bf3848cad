#![no_main]
#![no_std]

use lib as _;

use cortex_m::singleton;
use lib::config::{
    ErrorBlink, Serial, StartupConfig, ALWAYS_CALIBRATE, BUTTON_ROLE, SAMPLE_RATE_HZ,
    SETTLE_TICKS,
};
use lib::dispatcher::{Dispatched, Dispatcher, Stream};
use lib::display::{Color, Display, StatusLine};
use lib::hw::{
    init_clock, init_lcd, is_pressed, mount_sd, HwLcd, HwSensor, HwVolume, LcdInterface,
    SampleTimer, StatusLeds, UartTx, PCLK_HZ,
};
use lib::logger::LogWriter;
use lib::pipeline::{DeviceMode, Pipeline, Sample};
use lib::sampler::Sampler;
use lib::sensor::{Bmp280, Register, SensorMode};
use lib::serial::SerialStreamer;
use rtic::app;
use rtic::Mutex;
use stm32g0xx_hal::delay::DelayExt;
use stm32g0xx_hal::gpio::{GpioExt, Speed};
use stm32g0xx_hal::spi::{SpiExt, MODE_0};
use stm32g0xx_hal::time::U32Ext;

type Streamer = SerialStreamer<UartTx>;

/// Sends through the streamer shared with the USART interrupt.
struct Locked<'a, M>(&'a mut M);

impl<'a, M> Stream for Locked<'a, M>
where
    M: Mutex<T = Streamer>,
{
    fn try_send(&mut self, sample: Sample) -> bool {
        self.0.lock(|streamer: &mut Streamer| streamer.try_send(sample))
    }
}

fn mode_text(mode: DeviceMode, streaming: bool) -> &'static str {
    match (mode, streaming) {
        (DeviceMode::Idle, _) => "Idle",
        (DeviceMode::Calibrating, false) => "Calibrating",
        (DeviceMode::Calibrating, true) => "Calibrating, serial on",
        (DeviceMode::Running, false) => "Running",
        (DeviceMode::Running, true) => "Running, serial on",
        (DeviceMode::Error, _) => "Error",
    }
}

#[app(device = stm32g0xx_hal::stm32, peripherals = true)]
const APP: () = {
    struct Resources {
        dispatcher: Dispatcher<'static, HwVolume, HwLcd>,
        sampler: Sampler<'static, HwSensor>,
        sample_timer: SampleTimer,
        streamer: Streamer,
        leds: StatusLeds,
    }

    #[init]
    fn init(cx: init::Context) -> init::LateResources {
        let core: rtic::export::Peripherals = cx.core;
        let device: stm32g0xx_hal::stm32::Peripherals = cx.device;

        // Mailbox
        let pipeline: &'static mut Pipeline = singleton!(: Pipeline = Pipeline::new()).unwrap();
        let (producer, consumer) = pipeline.split();

        // Clock
        let mut rcc = init_clock(device.RCC);
        let mut delay = core.SYST.delay(&mut rcc);

        // GPIO
        let gpioa = device.GPIOA.split(&mut rcc);
        let gpiob = device.GPIOB.split(&mut rcc);
        let gpioc = device.GPIOC.split(&mut rcc);

        let button = gpioc.pc13.into_pull_up_input();
        let pressed = is_pressed(&button);
        let leds = StatusLeds::new(
            gpioc.pc4.into_push_pull_output(),
            gpioc.pc5.into_push_pull_output(),
        );

        // LCD
        let interface = LcdInterface::new(
            gpiob.pb0.into_push_pull_output().set_speed(Speed::VeryHigh),
            gpiob.pb1.into_push_pull_output().set_speed(Speed::VeryHigh),
            gpiob.pb2.into_push_pull_output().set_speed(Speed::VeryHigh),
            gpiob.pb3.into_push_pull_output().set_speed(Speed::VeryHigh),
            gpiob.pb4.into_push_pull_output().set_speed(Speed::VeryHigh),
            gpiob.pb5.into_push_pull_output().set_speed(Speed::VeryHigh),
            gpiob.pb6.into_push_pull_output().set_speed(Speed::VeryHigh),
            gpiob.pb7.into_push_pull_output().set_speed(Speed::VeryHigh),
            gpiob.pb8.into_push_pull_output().set_speed(Speed::VeryHigh),
            gpiob.pb9.into_push_pull_output().set_speed(Speed::VeryHigh),
        );
        let lcd = init_lcd(
            interface,
            gpioa.pa4.into_push_pull_output(),
            gpioa.pa5.into_push_pull_output(),
            &mut delay,
        )
        .unwrap();
        let mut display = Display::new(lcd).unwrap();
        defmt::info!("Display ready");

        // Pressure sensor
        let spi1 = device.SPI1.spi(
            (gpioa.pa1, gpioa.pa6, gpioa.pa7),
            MODE_0,
            1.mhz(),
            &mut rcc,
        );
        let mut sensor: HwSensor = Bmp280::new(spi1, gpioa.pa8.into_push_pull_output());
        let sensor_ready = match sensor.initialize(SensorMode::Mode0, &mut delay) {
            Ok(id) => {
                defmt::info!("Pressure sensor id {=u8:x}", id);
                if let (Ok(status), Ok(ctrl_meas), Ok(config)) = (
                    sensor.read_register(Register::STATUS),
                    sensor.read_register(Register::CTRL_MEAS),
                    sensor.read_register(Register::CONFIG),
                ) {
                    defmt::debug!(
                        "status {=u8:x} ctrl_meas {=u8:x} config {=u8:x}",
                        status,
                        ctrl_meas,
                        config
                    );
                }
                true
            }
            Err(_) => {
                defmt::error!("Pressure sensor init failed");
                false
            }
        };

        // Storage
        let spi2 = device.SPI2.spi(
            (gpiob.pb13, gpiob.pb14, gpiob.pb15),
            MODE_0,
            400.khz(),
            &mut rcc,
        );
        let sd_delay = device.TIM17.delay(&mut rcc);
        let log = match mount_sd(spi2, gpiob.pb12.into_push_pull_output(), sd_delay) {
            Ok(volume) => match LogWriter::open(volume) {
                Ok(log) => {
                    defmt::info!("Logging to {=str}", log.name());
                    Some(log)
                }
                Err(_) => {
                    defmt::warn!("Cannot create log file");
                    display.show_error("SD card: cannot create log file").ok();
                    None
                }
            },
            Err(_) => {
                defmt::warn!("SD card mount failed");
                display.show_error("SD card: mount failed").ok();
                None
            }
        };

        // Serial
        let uart = UartTx::new(
            device.USART2,
            gpioa.pa2,
            gpioa.pa3,
            PCLK_HZ,
            Serial::BAUD_RATE,
            &mut rcc,
        );
        let mut streamer = SerialStreamer::new(uart);

        let mut config = StartupConfig::resolve(BUTTON_ROLE, pressed, ALWAYS_CALIBRATE);
        if log.is_none() {
            config = config.without_storage();
        }
        if config.stream_serial {
            streamer.send_header().ok();
        }

        let mut dispatcher = Dispatcher::new(consumer, display, log);
        if sensor_ready {
            let mode = dispatcher.start(config);
            defmt::info!("Starting in {:?} {:?}", mode, config);
        } else {
            dispatcher.fail();
            dispatcher
                .display()
                .show_error("Pressure sensor not found")
                .ok();
        }
        let mode = dispatcher.mode();
        dispatcher
            .display()
            .show(StatusLine::Mode, mode_text(mode, config.stream_serial), Color::TEXT)
            .ok();

        let sampler = Sampler::new(sensor, producer);
        let sample_timer = SampleTimer::new(device.TIM6, SAMPLE_RATE_HZ.hz(), &mut rcc);

        init::LateResources {
            dispatcher,
            sampler,
            sample_timer,
            streamer,
            leds,
        }
    }

    #[idle(resources = [dispatcher, sample_timer, streamer, leds])]
    fn idle(mut cx: idle::Context) -> ! {
        cx.resources.sample_timer.lock(|timer: &mut SampleTimer| {
            timer.start();
        });
        let dispatcher: &mut Dispatcher<'static, HwVolume, HwLcd> = cx.resources.dispatcher;
        let leds: &mut StatusLeds = cx.resources.leds;

        if dispatcher.mode() == DeviceMode::Error {
            loop {
                leds.set_error(true);
                dispatcher.consumer().delay_ms(ErrorBlink::ON_MS);
                leds.set_error(false);
                dispatcher.consumer().delay_ms(ErrorBlink::OFF_MS);
            }
        }

        // First conversion is still running, drop what was read meanwhile
        dispatcher.consumer().delay_ticks(SETTLE_TICKS);
        dispatcher.consumer().take();

        let mut streamer = Locked(&mut cx.resources.streamer);
        let mut write_failure_shown = false;
        loop {
            match dispatcher.poll(&mut streamer) {
                Dispatched::Nothing => continue,
                Dispatched::Calibrated(baseline) => {
                    defmt::info!("Calibrated, baseline {=u16}", baseline);
                    let text = mode_text(DeviceMode::Running, dispatcher.is_streaming());
                    dispatcher
                        .display()
                        .show(StatusLine::Mode, text, Color::TEXT)
                        .ok();
                }
                Dispatched::Recorded { logged: false, .. }
                    if dispatcher.is_logging() && !write_failure_shown =>
                {
                    defmt::warn!("Log write failed");
                    write_failure_shown = true;
                    dispatcher.display().show_error("SD card: write failed").ok();
                }
                _ => {}
            }
            leds.toggle_busy();
        }
    }

    #[task(binds = TIM6, priority = 2, resources = [sampler, sample_timer])]
    fn tim6(cx: tim6::Context) {
        let timer: &mut SampleTimer = cx.resources.sample_timer;
        let sampler: &mut Sampler<'static, HwSensor> = cx.resources.sampler;

        timer.unpend();
        if sampler.tick().is_err() && sampler.read_failures() == 1 {
            defmt::warn!("Pressure read failed");
        }
    }

    #[task(binds = USART2, priority = 2, resources = [streamer])]
    fn usart2(cx: usart2::Context) {
        let streamer: &mut Streamer = cx.resources.streamer;
        streamer.on_tx_empty();
    }
};
