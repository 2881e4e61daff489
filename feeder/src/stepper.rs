//! Open-loop unipolar stepper (28BYJ-48 class via ULN2003).
//!
//! Coils IN1..IN4 are driven with the 8 state half-step sequence. There is
//! no position feedback; the driver counts the steps it issued.

use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, PinState};
use log::debug;

use crate::error::{FeederError, Result};

/// Coil states IN1..IN4 per half step.
pub const HALF_STEP_SEQUENCE: [[bool; 4]; 8] = [
    [true, false, false, false],
    [true, true, false, false],
    [false, true, false, false],
    [false, true, true, false],
    [false, false, true, false],
    [false, false, true, true],
    [false, false, false, true],
    [true, false, false, true],
];

/// Runs the feeding mechanism for a bounded time.
pub trait Actuator {
    fn dispense(&mut self, duration: Duration) -> Result<()>;
}

pub struct Stepper<P, D> {
    coils: [P; 4],
    delay: D,
    step_interval_ms: u32,
    phase: usize,
    position: i64,
}

impl<P, D> Stepper<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(coils: [P; 4], delay: D, step_interval_ms: u32) -> Result<Self> {
        if step_interval_ms == 0 {
            return Err(FeederError::Config("step interval must be at least 1 ms".into()));
        }
        Ok(Self {
            coils,
            delay,
            step_interval_ms,
            phase: 0,
            position: 0,
        })
    }

    /// Half steps issued since construction, forward positive.
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Move `steps` half steps, negative for reverse. Coils stay energized.
    pub fn step(&mut self, steps: i32) -> Result<()> {
        let forward = steps >= 0;
        for _ in 0..steps.unsigned_abs() {
            self.phase = if forward {
                (self.phase + 1) % HALF_STEP_SEQUENCE.len()
            } else {
                (self.phase + HALF_STEP_SEQUENCE.len() - 1) % HALF_STEP_SEQUENCE.len()
            };
            self.energize(HALF_STEP_SEQUENCE[self.phase])?;
            self.position += if forward { 1 } else { -1 };
            self.delay.delay_ms(self.step_interval_ms);
        }
        Ok(())
    }

    /// De-energize all coils.
    pub fn release(&mut self) -> Result<()> {
        self.energize([false; 4])
    }

    fn energize(&mut self, states: [bool; 4]) -> Result<()> {
        for (coil, on) in self.coils.iter_mut().zip(states) {
            coil.set_state(PinState::from(on)).map_err(FeederError::pin)?;
        }
        Ok(())
    }

    pub fn steps_for(&self, duration: Duration) -> i32 {
        let steps = duration.as_millis() / u128::from(self.step_interval_ms);
        i32::try_from(steps).unwrap_or(i32::MAX)
    }
}

impl<P, D> Actuator for Stepper<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    fn dispense(&mut self, duration: Duration) -> Result<()> {
        let steps = self.steps_for(duration);
        debug!("Dispensing for {:?} ({} half steps)", duration, steps);
        let moved = self.step(steps);
        // always drop coil current, even after a failed step
        let released = self.release();
        moved?;
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone)]
    struct Pin {
        index: usize,
        levels: Rc<RefCell<[bool; 4]>>,
        history: Rc<RefCell<Vec<[bool; 4]>>>,
    }

    impl embedded_hal::digital::ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> std::result::Result<(), Infallible> {
            self.levels.borrow_mut()[self.index] = false;
            self.record();
            Ok(())
        }

        fn set_high(&mut self) -> std::result::Result<(), Infallible> {
            self.levels.borrow_mut()[self.index] = true;
            self.record();
            Ok(())
        }
    }

    impl Pin {
        // one snapshot per full coil update, taken when IN4 is written
        fn record(&self) {
            if self.index == 3 {
                let levels = *self.levels.borrow();
                self.history.borrow_mut().push(levels);
            }
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        total_ms: u64,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ms += u64::from(ns) / 1_000_000;
        }

        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += u64::from(ms);
        }
    }

    fn stepper(interval_ms: u32) -> (Stepper<Pin, CountingDelay>, Rc<RefCell<Vec<[bool; 4]>>>) {
        let levels = Rc::new(RefCell::new([false; 4]));
        let history = Rc::new(RefCell::new(Vec::new()));
        let coils = [0, 1, 2, 3].map(|index| Pin {
            index,
            levels: Rc::clone(&levels),
            history: Rc::clone(&history),
        });
        let stepper = Stepper::new(coils, CountingDelay::default(), interval_ms).unwrap();
        (stepper, history)
    }

    #[test]
    fn forward_steps_follow_half_step_sequence() {
        let (mut s, history) = stepper(2);
        s.step(8).unwrap();

        let expected: Vec<[bool; 4]> = (1..=8).map(|i| HALF_STEP_SEQUENCE[i % 8]).collect();
        assert_eq!(*history.borrow(), expected);
        assert_eq!(s.position(), 8);
    }

    #[test]
    fn reverse_steps_walk_sequence_backwards() {
        let (mut s, history) = stepper(2);
        s.step(-2).unwrap();

        assert_eq!(*history.borrow(), vec![HALF_STEP_SEQUENCE[7], HALF_STEP_SEQUENCE[6]]);
        assert_eq!(s.position(), -2);
    }

    #[test]
    fn dispense_runs_for_duration_then_releases() {
        let (mut s, history) = stepper(2);
        s.dispense(Duration::from_millis(100)).unwrap();

        assert_eq!(s.position(), 50);
        assert_eq!(s.delay.total_ms, 100);
        assert_eq!(history.borrow().last(), Some(&[false; 4]));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let levels = Rc::new(RefCell::new([false; 4]));
        let history = Rc::new(RefCell::new(Vec::new()));
        let coils = [0, 1, 2, 3].map(|index| Pin {
            index,
            levels: Rc::clone(&levels),
            history: Rc::clone(&history),
        });
        assert!(Stepper::new(coils, CountingDelay::default(), 0).is_err());
    }
}
