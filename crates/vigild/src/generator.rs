//! Synthetic traffic for the demo daemon.
//!
//! One steady topic from the first tick, a second topic that appears late
//! so topic discovery has something to find, and scheduled spikes on the
//! steady topic's two fields so detections actually fire.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{debug, warn};

use vigil_core::{Payload, StreamMessage, epoch_millis};
use vigil_stream::{MemoryBroker, StreamClient};

const STEADY_TOPIC: &str = "sensor-readings";
const LATE_TOPIC: &str = "pump-telemetry";

const STEADY_EVERY: Duration = Duration::from_millis(2_500);
/// Every Nth tick spikes `sub.one` upward.
const SPIKE_ONE_EVERY: u64 = 12;
/// Every Nth tick spikes `two` downward.
const SPIKE_TWO_EVERY: u64 = 24;
/// The late topic starts producing after this many ticks.
const LATE_TOPIC_AFTER: u64 = 8;

/// Produce readings until shutdown. Errors are logged and skipped so one
/// failed produce never kills the demo.
pub async fn run(broker: Arc<MemoryBroker>, mut shutdown: watch::Receiver<bool>) {
    let mut tick: u64 = 0;
    loop {
        tokio::select! {
            _ = tokio::time::sleep(STEADY_EVERY) => {
                tick += 1;

                let reading = steady_reading(tick);
                if let Err(err) = broker.produce(STEADY_TOPIC, 1, reading).await {
                    warn!(%err, topic = STEADY_TOPIC, "produce failed");
                }

                if tick > LATE_TOPIC_AFTER {
                    let reading = late_reading(tick);
                    if let Err(err) = broker.produce(LATE_TOPIC, 1, reading).await {
                        warn!(%err, topic = LATE_TOPIC, "produce failed");
                    }
                }

                debug!(tick, "tick produced");
            }
            _ = shutdown.changed() => {
                debug!(tick, "generator shutting down");
                return;
            }
        }
    }
}

fn steady_reading(tick: u64) -> StreamMessage {
    let sub_one = if tick % SPIKE_ONE_EVERY == 0 {
        150.5
    } else {
        15.5 + wobble(tick)
    };
    let two = if tick % SPIKE_TWO_EVERY == 0 {
        -100.0
    } else {
        16.0 + wobble(tick + 3)
    };
    StreamMessage::new(
        STEADY_TOPIC,
        Payload::from_json(serde_json::json!({"sub": {"one": sub_one}, "two": two})),
        epoch_millis(),
    )
}

fn late_reading(tick: u64) -> StreamMessage {
    StreamMessage::new(
        LATE_TOPIC,
        Payload::from_json(serde_json::json!({"flow": 40.0 + wobble(tick), "state": "ok"})),
        epoch_millis(),
    )
}

/// Small deterministic spread so windows never have a zero deviation.
fn wobble(tick: u64) -> f64 {
    ((tick % 7) as f64 - 3.0) * 0.4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_readings_spike_on_schedule() {
        let normal = steady_reading(1);
        assert_eq!(normal.payload.number_at("sub.one"), Some(15.5 + wobble(1)));

        let spiked = steady_reading(SPIKE_ONE_EVERY);
        assert_eq!(spiked.payload.number_at("sub.one"), Some(150.5));

        let dipped = steady_reading(SPIKE_TWO_EVERY);
        assert_eq!(dipped.payload.number_at("two"), Some(-100.0));
    }

    #[test]
    fn wobble_is_bounded_and_varies() {
        let values: Vec<f64> = (0..14).map(wobble).collect();
        assert!(values.iter().all(|v| v.abs() <= 1.2 + f64::EPSILON));
        assert!(values.iter().any(|v| *v != values[0]));
    }

    #[tokio::test]
    async fn generator_stops_on_shutdown() {
        let broker = Arc::new(MemoryBroker::new());
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(run(broker, rx));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("generator should exit promptly")
            .unwrap();
    }
}
