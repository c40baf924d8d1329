//! The visual countdown shown before recording starts.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::Config;
use crate::event::SessionEvent;
use crate::sink::EventSink;

/// Labels shown on the regular cadence, then the final label.
const STEPS: [&str; 3] = ["3", "2", "1"];
const GO: &str = "GO!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// Put this label on screen
    Show(&'static str),
    /// The countdown is over; recording may start
    Finished,
}

/// Fixed-cadence countdown. It cannot be skipped or cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    step: Duration,
    hold: Duration,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Countdown {
    pub fn new(step: Duration, hold: Duration) -> Self {
        Self { step, hold }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.countdown_step(), config.countdown_final())
    }

    /// Time from the first label to `Finished`.
    pub fn total(&self) -> Duration {
        self.step * STEPS.len() as u32 + self.hold
    }

    /// Posts the labels for `take` at the configured cadence, then `Finished`.
    pub async fn run(self, sink: Arc<dyn EventSink>, take: u64) {
        for label in STEPS {
            sink.post(SessionEvent::Countdown {
                take,
                event: CountdownEvent::Show(label),
            });
            sleep(self.step).await;
        }
        sink.post(SessionEvent::Countdown {
            take,
            event: CountdownEvent::Show(GO),
        });
        sleep(self.hold).await;
        sink.post(SessionEvent::Countdown {
            take,
            event: CountdownEvent::Finished,
        });
    }
}
