//! Coarse status signalling over two indicator LEDs.

use embassy_time::Timer;
use embedded_hal::digital::StatefulOutputPin;

/// One indicator LED, driven low at startup.
pub struct StatusLed<P> {
    pin: P,
}

impl<P: StatefulOutputPin> StatusLed<P> {
    pub fn new(mut pin: P) -> Self {
        let _ = pin.set_low();
        Self { pin }
    }

    /// Toggles the LED `count` times, pausing `interval_ms` after each
    /// toggle. An even count leaves the LED where it started.
    pub async fn blink(&mut self, count: u32, interval_ms: u64) {
        for _ in 0..count {
            let _ = self.pin.toggle();
            Timer::after_millis(interval_ms).await;
        }
    }

    pub fn off(&mut self) {
        let _ = self.pin.set_low();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embassy_futures::block_on;
    use embedded_hal::digital::{ErrorType, OutputPin};

    struct FakePin {
        high: bool,
        toggles: u32,
    }

    impl ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }
    }

    impl StatefulOutputPin for FakePin {
        fn is_set_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high)
        }
        fn is_set_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high)
        }
        fn toggle(&mut self) -> Result<(), Infallible> {
            self.toggles += 1;
            self.high = !self.high;
            Ok(())
        }
    }

    #[test]
    fn even_blink_count_returns_to_idle() {
        let mut led = StatusLed::new(FakePin {
            high: true,
            toggles: 0,
        });
        block_on(led.blink(4, 1));
        assert_eq!(led.pin.toggles, 4);
        assert!(!led.pin.high);
    }

    #[test]
    fn odd_blink_count_leaves_led_on() {
        let mut led = StatusLed::new(FakePin {
            high: false,
            toggles: 0,
        });
        block_on(led.blink(1, 1));
        assert!(led.pin.high);
    }
}
