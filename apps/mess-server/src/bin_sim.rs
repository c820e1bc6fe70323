use std::time::Duration;

use mess_events::Bus;
use mess_topics as topics;
use rand::Rng;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const MAX_WEIGHT_KG: f64 = 50.0;
const FULL_THRESHOLD_KG: f64 = 45.0;
const START_WEIGHT_KG: f64 = 12.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BinReading {
    pub weight_kg: f64,
    pub full: bool,
}

// One random-walk step: drift, clamp to the scale's range, round to two
// decimals.
fn step(prev: f64, delta: f64) -> BinReading {
    let weight = ((prev + delta).clamp(0.0, MAX_WEIGHT_KG) * 100.0).round() / 100.0;
    BinReading {
        weight_kg: weight,
        full: weight > FULL_THRESHOLD_KG,
    }
}

/// Synthetic smart-bin scale: an independent periodic scalar with no
/// causal link to feedback. It never blocks the snapshot pipeline and
/// carries no ordering relationship to metrics or insights.
pub fn spawn(
    bus: Bus,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> (watch::Receiver<BinReading>, JoinHandle<()>) {
    let initial = BinReading {
        weight_kg: START_WEIGHT_KG,
        full: false,
    };
    let (tx, rx) = watch::channel(initial);
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut reading = initial;
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    // uniform drift with a slight upward bias
                    let delta = rand::rng().random_range(-0.4..0.6);
                    reading = step(reading.weight_kg, delta);
                    let _ = tx.send(reading);
                    bus.publish(topics::TOPIC_BIN_WEIGHT_UPDATED, &reading);
                }
            }
        }
    });
    (rx, handle)
}
