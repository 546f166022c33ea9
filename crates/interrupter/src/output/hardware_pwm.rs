//! On-chip PWM backend.

use platform::duty::duty16;
use platform::PwmPeripheral;

use super::{Activation, BackendKind, OutputBackend, Waveform};
use crate::error::{Error, HardwareFault};

/// Drives a channel from a hardware PWM slice.
///
/// Frequency and compare value are written directly; once programmed the
/// waveform needs no CPU time. Off is duty zero, the frequency is left as is.
pub struct HardwarePwm<P> {
    pwm: P,
}

impl<P: PwmPeripheral> HardwarePwm<P> {
    /// Wrap a configured PWM slice.
    pub fn new(pwm: P) -> Self {
        Self { pwm }
    }

    /// The PWM slice.
    pub fn peripheral(&self) -> &P {
        &self.pwm
    }
}

impl<P: PwmPeripheral> OutputBackend for HardwarePwm<P> {
    fn kind(&self) -> BackendKind {
        BackendKind::HardwarePwm
    }

    async fn start(&mut self, waveform: Waveform) -> Result<Activation, Error> {
        let duty = duty16(waveform.frequency_hz, waveform.on_time_us);
        self.pwm
            .set_frequency(waveform.frequency_hz)
            .and_then(|()| self.pwm.set_duty_u16(duty))
            .map_err(|e| Error::Hardware(HardwareFault::Peripheral(e)))?;
        Ok(Activation::Driven)
    }

    async fn stop(&mut self) -> Result<(), Error> {
        self.pwm
            .set_duty_u16(0)
            .map_err(|e| Error::Hardware(HardwareFault::Peripheral(e)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::mocks::MockPwm;
    use platform::HalError;

    #[tokio::test]
    async fn programs_frequency_then_duty() {
        let mut backend = HardwarePwm::new(MockPwm::new());
        let wave = Waveform {
            frequency_hz: 1000,
            on_time_us: 20,
        };
        assert_eq!(backend.start(wave).await.unwrap(), Activation::Driven);
        assert_eq!(backend.peripheral().frequency, Some(1000));
        assert_eq!(backend.peripheral().duty, 1311);
        backend.stop().await.unwrap();
        assert_eq!(backend.peripheral().duty, 0);
    }

    #[tokio::test]
    async fn peripheral_error_is_hardware_fault() {
        let mut pwm = MockPwm::new();
        pwm.fail_with = Some(HalError::OutOfRange);
        let mut backend = HardwarePwm::new(pwm);
        let err = backend
            .start(Waveform {
                frequency_hz: 10,
                on_time_us: 5,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::Hardware(HardwareFault::Peripheral(HalError::OutOfRange))
        );
    }
}
