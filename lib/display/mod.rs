use core::fmt::Write;

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::{Rgb565, RgbColor};
use embedded_graphics::prelude::{Point, Primitive, Size};
use embedded_graphics::primitives::{Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use embedded_graphics::Drawable;
use heapless::String;

use crate::config::Version;
use crate::error::{Error, Result};
use crate::pipeline::Sample;

pub mod chart;

pub use chart::{Chart, Column, Plot};

pub trait Lcd {
    type Error;
    fn clear(&mut self, color: Rgb565) -> core::result::Result<(), Self::Error>;
    fn draw<D: Drawable<Color = Rgb565>>(
        &mut self,
        drawable: D,
    ) -> core::result::Result<D::Output, Self::Error>;
}

struct Dimension;

impl Dimension {
    const WIDTH: u32 = 320;
    const LINE_HEIGHT: i32 = 10;
}

/// Text rows of the 6x10 font; row n starts at y = 10 n.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatusLine {
    Header = 0,
    Mode = 1,
    Message = 23,
}

impl StatusLine {
    fn top(self) -> i32 {
        self as i32 * Dimension::LINE_HEIGHT
    }
}

pub struct Color;

impl Color {
    pub const BACKGROUND: Rgb565 = Rgb565::BLACK;
    pub const TEXT: Rgb565 = Rgb565::WHITE;
    pub const ERROR: Rgb565 = Rgb565::RED;
    pub const AXIS: Rgb565 = Rgb565::BLUE;
    pub const DATA: Rgb565 = Rgb565::GREEN;
    pub const CURSOR: Rgb565 = Rgb565::YELLOW;
}

/// Status text plus the circular strip chart.
pub struct Display<LCD> {
    lcd: LCD,
    chart: Chart,
}

impl<LCD, LCDER> Display<LCD>
where
    LCD: Lcd<Error = LCDER>,
{
    pub fn new(lcd: LCD) -> Result<Self, LCDER> {
        let mut display = Display {
            lcd,
            chart: Chart::new(),
        };
        display.init()?;
        Ok(display)
    }

    /// Clears the screen, redraws the header and the chart axes.
    pub fn init(&mut self) -> Result<(), LCDER> {
        self.lcd.clear(Color::BACKGROUND).map_err(Error::Bus)?;
        let mut header = String::<40>::new();
        write!(
            &mut header,
            "Infrasound logger V{}.{}",
            Version::MAJOR,
            Version::MINOR
        )
        .map_err(|_| Error::BufferWrite)?;
        self.show(StatusLine::Header, &header, Color::TEXT)?;
        self.init_chart()
    }

    pub fn init_chart(&mut self) -> Result<(), LCDER> {
        self.chart.reset();
        let plot = Rectangle::with_corners(
            Point::new(Plot::X_START, Plot::Y_HIGH),
            Point::new(Plot::X_END, Plot::Y_LOW),
        )
        .into_styled(PrimitiveStyle::with_fill(Color::BACKGROUND));
        self.lcd.draw(plot).map_err(Error::Bus)?;
        self.line(
            Point::new(Plot::X_START, Plot::Y_MID),
            Point::new(Plot::X_END, Plot::Y_MID),
            Color::AXIS,
        )?;
        self.line(
            Point::new(Plot::X_START, Plot::Y_HIGH),
            Point::new(Plot::X_START, Plot::Y_LOW),
            Color::AXIS,
        )
    }

    pub fn set_calibration(&mut self, baseline: Sample) {
        self.chart.set_calibration(baseline);
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    /// Feeds the chart; returns `true` when a column was drawn.
    pub fn update(&mut self, sample: Sample) -> Result<bool, LCDER> {
        let column = match self.chart.push(sample) {
            Some(column) => column,
            None => return Ok(false),
        };
        self.draw_column(&column)?;
        Ok(true)
    }

    /// Replaces a whole text row.
    pub fn show(&mut self, line: StatusLine, text: &str, color: Rgb565) -> Result<(), LCDER> {
        let top = line.top();
        let row = Rectangle::new(
            Point::new(0, top),
            Size::new(Dimension::WIDTH, Dimension::LINE_HEIGHT as u32),
        )
        .into_styled(PrimitiveStyle::with_fill(Color::BACKGROUND));
        self.lcd.draw(row).map_err(Error::Bus)?;

        let text = Text::with_baseline(
            text,
            Point::new(0, top),
            MonoTextStyle::new(&FONT_6X10, color),
            Baseline::Top,
        );
        self.lcd.draw(text).map_err(Error::Bus)?;
        Ok(())
    }

    pub fn show_error(&mut self, text: &str) -> Result<(), LCDER> {
        self.show(StatusLine::Message, text, Color::ERROR)
    }

    fn draw_column(&mut self, column: &Column) -> Result<(), LCDER> {
        // Overpaint the previous cursor marker and the oldest data
        self.line(
            Point::new(column.x, Plot::Y_HIGH),
            Point::new(column.x, Plot::Y_LOW),
            Color::BACKGROUND,
        )?;
        self.line(
            Point::new(column.x, Plot::Y_MID),
            Point::new(column.x, column.y),
            Color::DATA,
        )?;
        if let Some(x) = column.marker {
            self.line(
                Point::new(x, Plot::Y_MID - Plot::CURSOR_HALF),
                Point::new(x, Plot::Y_MID + Plot::CURSOR_HALF),
                Color::CURSOR,
            )?;
        }
        Ok(())
    }

    fn line(&mut self, start: Point, end: Point, color: Rgb565) -> Result<(), LCDER> {
        let line = Line::new(start, end).into_styled(PrimitiveStyle::with_stroke(color, 1));
        self.lcd.draw(line).map_err(Error::Bus)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Pixel};
    use std::vec;
    use std::vec::Vec;

    pub struct FrameBuffer {
        pub pixels: Vec<Rgb565>,
        pub fail: bool,
    }

    #[derive(Debug, PartialEq)]
    pub struct Unplugged;

    impl FrameBuffer {
        pub fn new() -> Self {
            FrameBuffer {
                pixels: vec![Rgb565::MAGENTA; 320 * 240],
                fail: false,
            }
        }

        pub fn at(&self, x: i32, y: i32) -> Rgb565 {
            self.pixels[(y * 320 + x) as usize]
        }
    }

    impl OriginDimensions for FrameBuffer {
        fn size(&self) -> Size {
            Size::new(320, 240)
        }
    }

    impl DrawTarget for FrameBuffer {
        type Color = Rgb565;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> core::result::Result<(), Infallible>
        where
            I: IntoIterator<Item = Pixel<Rgb565>>,
        {
            for Pixel(point, color) in pixels {
                if (0..320).contains(&point.x) && (0..240).contains(&point.y) {
                    self.pixels[(point.y * 320 + point.x) as usize] = color;
                }
            }
            Ok(())
        }
    }

    impl Lcd for FrameBuffer {
        type Error = Unplugged;

        fn clear(&mut self, color: Rgb565) -> core::result::Result<(), Unplugged> {
            if self.fail {
                return Err(Unplugged);
            }
            DrawTarget::clear(self, color).map_err(|_| Unplugged)
        }

        fn draw<D: Drawable<Color = Rgb565>>(
            &mut self,
            drawable: D,
        ) -> core::result::Result<D::Output, Unplugged> {
            if self.fail {
                return Err(Unplugged);
            }
            drawable.draw(self).map_err(|_| Unplugged)
        }
    }

    #[test]
    fn init_draws_axes_on_cleared_screen() {
        let display = Display::new(FrameBuffer::new()).unwrap();
        let fb = &display.lcd;

        assert_eq!(fb.at(Plot::X_START, Plot::Y_MID), Color::AXIS);
        assert_eq!(fb.at(Plot::X_END, Plot::Y_MID), Color::AXIS);
        assert_eq!(fb.at(Plot::X_START, Plot::Y_HIGH), Color::AXIS);
        assert_eq!(fb.at(Plot::X_START, Plot::Y_LOW), Color::AXIS);
        assert_eq!(fb.at(200, 200), Color::BACKGROUND);
        assert!(fb.pixels[..320 * 10].iter().any(|p| *p == Color::TEXT));
    }

    #[test]
    fn column_draws_data_and_cursor() {
        let mut display = Display::new(FrameBuffer::new()).unwrap();
        display.set_calibration(1000);

        assert_eq!(display.update(1010), Ok(false));
        assert_eq!(display.update(1010), Ok(false));
        assert_eq!(display.update(1010), Ok(true));

        let fb = &display.lcd;
        let x = Plot::X_START + 1;
        assert_eq!(fb.at(x, Plot::Y_MID), Color::DATA);
        assert_eq!(fb.at(x, Plot::Y_MID - 10), Color::DATA);
        assert_eq!(fb.at(x, Plot::Y_MID - 11), Color::BACKGROUND);
        assert_eq!(fb.at(x + 1, Plot::Y_MID - Plot::CURSOR_HALF), Color::CURSOR);
        assert_eq!(fb.at(x + 1, Plot::Y_MID + Plot::CURSOR_HALF), Color::CURSOR);
    }

    #[test]
    fn next_column_erases_previous_cursor() {
        let mut display = Display::new(FrameBuffer::new()).unwrap();
        for _ in 0..6 {
            display.update(400).unwrap();
        }

        let fb = &display.lcd;
        let second = Plot::X_START + 2;
        assert_eq!(fb.at(second, Plot::Y_MID), Color::DATA);
        assert_eq!(fb.at(second, Plot::Y_MID + Plot::CURSOR_HALF), Color::BACKGROUND);
        assert_eq!(fb.at(second + 1, Plot::Y_MID + Plot::CURSOR_HALF), Color::CURSOR);
    }

    #[test]
    fn init_chart_wipes_plot() {
        let mut display = Display::new(FrameBuffer::new()).unwrap();
        for _ in 0..30 {
            display.update(900).unwrap();
        }
        display.init_chart().unwrap();

        let fb = &display.lcd;
        assert_eq!(fb.at(Plot::X_START + 5, Plot::Y_MID), Color::AXIS);
        assert_eq!(fb.at(Plot::X_START + 5, Plot::Y_MID - 1), Color::BACKGROUND);
        assert_eq!(fb.at(Plot::X_START + 11, Plot::Y_MID + 10), Color::BACKGROUND);
        assert_eq!(display.chart().cursor(), 0);
        assert_eq!(display.chart().baseline(), None);
    }

    #[test]
    fn show_replaces_row() {
        let mut display = Display::new(FrameBuffer::new()).unwrap();
        display.show_error("SD card failure").unwrap();
        let top = StatusLine::Message as i32 * 10;
        assert!((top..top + 10)
            .flat_map(|y| (0..320).map(move |x| (x, y)))
            .any(|(x, y)| display.lcd.at(x, y) == Color::ERROR));

        display.show(StatusLine::Message, "", Color::TEXT).unwrap();
        assert!((top..top + 10)
            .flat_map(|y| (0..320).map(move |x| (x, y)))
            .all(|(x, y)| display.lcd.at(x, y) == Color::BACKGROUND));
    }

    #[test]
    fn lcd_failure_is_reported() {
        let mut display = Display::new(FrameBuffer::new()).unwrap();
        display.lcd.fail = true;
        for _ in 0..2 {
            assert_eq!(display.update(1), Ok(false));
        }
        assert_eq!(display.update(1), Err(Error::Bus(Unplugged)));
    }
}
