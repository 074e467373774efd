//! Test doubles shared by the listening loop tests.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crate::error::{NmeaError, Result};
use crate::transport::{DatagramSource, StopToken};

/// One scripted outcome of a receive call.
#[derive(Debug, Clone)]
pub enum Step {
    Data(&'static [u8]),
    Timeout,
    Fail(io::ErrorKind),
    Closed,
}

/// A datagram source replaying a fixed script.
///
/// Once the script runs out it idles until stopped.
#[derive(Debug)]
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    forever: Option<Step>,
}

impl ScriptedSource {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            forever: None,
        }
    }

    /// A source that yields `step` on every call.
    pub fn repeating(step: Step) -> Self {
        Self {
            steps: VecDeque::new(),
            forever: Some(step),
        }
    }
}

impl DatagramSource for ScriptedSource {
    fn receive_until(&mut self, buf: &mut [u8], stop: &StopToken) -> Option<Result<usize>> {
        if stop.is_stopped() {
            return None;
        }
        let step = match self.steps.pop_front().or_else(|| self.forever.clone()) {
            Some(step) => step,
            None => {
                while !stop.wait(Duration::from_millis(10)) {}
                return None;
            }
        };
        Some(match step {
            Step::Data(data) => {
                buf[..data.len()].copy_from_slice(data);
                Ok(data.len())
            }
            Step::Timeout => Err(NmeaError::Timeout),
            Step::Fail(kind) => Err(NmeaError::Io(kind.into())),
            Step::Closed => Err(NmeaError::NotOpen),
        })
    }
}
