//! [`LeaderSource`] – publishes leader joint readings at a fixed rate.

use std::time::Duration;

use telerelay_hal::{JointReader, JointReading};
use telerelay_middleware::{Frame, FramePublisher, LEADER_JOINTS_TOPIC};
use telerelay_types::{ConfigError, LeaderMessage, RelayError, now_secs};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default publish rate of the leader loop.
pub const DEFAULT_RATE_HZ: f64 = 100.0;

/// Stamps readings with the current time and a monotonically increasing
/// sequence id, and publishes them on the leader topic.
#[derive(Debug)]
pub struct LeaderSource {
    topic: String,
    rate_hz: f64,
    period: Duration,
    next_seq: u64,
}

impl LeaderSource {
    /// # Errors
    ///
    /// [`ConfigError::InvalidRate`] unless `rate_hz` is positive, finite, and
    /// its period fits in a [`Duration`].
    pub fn new(rate_hz: f64) -> Result<Self, ConfigError> {
        if !rate_hz.is_finite() || rate_hz <= 0.0 {
            return Err(ConfigError::InvalidRate(rate_hz));
        }
        let period = Duration::try_from_secs_f64(1.0 / rate_hz)
            .map_err(|_| ConfigError::InvalidRate(rate_hz))?;
        Ok(Self {
            topic: LEADER_JOINTS_TOPIC.to_string(),
            rate_hz,
            period,
            next_seq: 0,
        })
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn rate_hz(&self) -> f64 {
        self.rate_hz
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Turn `reading` into the next [`LeaderMessage`].
    pub fn stamp(&mut self, reading: JointReading) -> LeaderMessage {
        let seq = self.next_seq;
        self.next_seq += 1;
        LeaderMessage {
            joints: reading.values,
            timestamp: now_secs(),
            seq: Some(seq),
            gripper: reading.gripper,
        }
    }

    /// Stamp and publish one reading.  Returns the number of receivers.
    ///
    /// # Errors
    ///
    /// Propagates serialisation and transport errors.
    pub async fn publish(
        &mut self,
        publisher: &dyn FramePublisher,
        reading: JointReading,
    ) -> Result<usize, RelayError> {
        let msg = self.stamp(reading);
        let frame = Frame::json(self.topic.as_str(), &msg)?;
        let receivers = publisher.publish(frame).await?;
        debug!(seq = ?msg.seq, receivers, "leader joints published");
        Ok(receivers)
    }

    /// Poll `reader` at the configured rate and publish every reading until
    /// `shutdown` turns `true`.
    ///
    /// A tick where the reader has no sample is skipped.  Publish failures
    /// are logged and do not stop the loop.  Returns the number of messages
    /// published.
    pub async fn run(
        &mut self,
        reader: &mut dyn JointReader,
        publisher: &dyn FramePublisher,
        mut shutdown: watch::Receiver<bool>,
    ) -> u64 {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(topic = %self.topic, rate_hz = self.rate_hz, joints = reader.joint_count(), "leader loop started");

        let mut published = 0u64;
        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let Some(reading) = reader.read() else {
                        continue;
                    };
                    match self.publish(publisher, reading).await {
                        Ok(_) => published += 1,
                        Err(e) => warn!(error = %e, "failed to publish leader joints"),
                    }
                }
            }
        }

        info!(published, "leader loop stopped");
        published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telerelay_hal::SineSweepLeader;
    use telerelay_middleware::{FrameBus, FrameSubscriber};

    #[test]
    fn invalid_rates_are_rejected() {
        for rate in [0.0, -5.0, 1e-20, f64::NAN, f64::INFINITY] {
            assert!(matches!(LeaderSource::new(rate), Err(ConfigError::InvalidRate(_))));
        }
    }

    #[test]
    fn period_follows_rate() {
        let source = LeaderSource::new(DEFAULT_RATE_HZ).unwrap();
        assert_eq!(source.rate_hz(), 100.0);
        assert_eq!(source.period(), Duration::from_millis(10));
    }

    #[test]
    fn stamp_assigns_increasing_seq() {
        let mut source = LeaderSource::new(50.0).unwrap();
        let a = source.stamp(JointReading::new(vec![0.1]));
        let b = source.stamp(JointReading::new(vec![0.2]).with_gripper(0.4));
        assert_eq!(a.seq, Some(0));
        assert_eq!(b.seq, Some(1));
        assert_eq!(b.gripper, Some(0.4));
        assert!(b.timestamp >= a.timestamp);
    }

    #[tokio::test]
    async fn run_publishes_until_shutdown() -> Result<(), Box<dyn std::error::Error>> {
        let bus = FrameBus::default();
        let mut rx = bus.subscribe(LEADER_JOINTS_TOPIC);
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = {
            let bus = bus.clone();
            tokio::spawn(async move {
                let mut source = LeaderSource::new(200.0).unwrap();
                let mut reader = SineSweepLeader::new(3);
                source.run(&mut reader, &bus, stop_rx).await
            })
        };

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await?
            .ok_or("bus closed")?;
        let msg: LeaderMessage = first.parse_json().map_err(|e| e.to_string())?;
        assert_eq!(msg.joints.len(), 3);
        assert_eq!(msg.seq, Some(0));

        stop_tx.send(true)?;
        let published = tokio::time::timeout(Duration::from_secs(2), task).await??;
        assert!(published >= 1);
        Ok(())
    }
}
