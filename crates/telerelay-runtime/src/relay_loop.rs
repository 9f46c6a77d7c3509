//! [`MasterRelay`] – the master node's receive → validate → forward loop.
//!
//! Each frame on the leader topic goes through:
//!
//! 1. **Decode** – parse the JSON payload as a [`LeaderPayload`] (vector or
//!    `joint_<n>` fields) and check joint count and finiteness.
//! 2. **Freshness** – drop messages older than the staleness threshold.
//! 3. **Gate** – [`RelayGate::evaluate`]: map, transform, validate.
//! 4. **Forward** – allowed commands are published on the follower topic;
//!    blocked ones are logged and counted, never forwarded.
//!
//! Drops never stop the loop.  Statistics are logged every
//! [`STATS_LOG_INTERVAL`] validated messages and once more at shutdown.
//!
//! # Example
//!
//! ```rust,no_run
//! use telerelay_kernel::{RelayConfig, RelayGate};
//! use telerelay_middleware::{FrameBus, LEADER_JOINTS_TOPIC};
//! use telerelay_runtime::MasterRelay;
//! use telerelay_types::JointLimit;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RelayConfig::with_limits(vec![JointLimit::new(0, "joint0", -3.14, 3.14)]);
//! let relay = MasterRelay::new(RelayGate::from_config(&config)?);
//!
//! let bus = FrameBus::default();
//! let mut leader = bus.subscribe(LEADER_JOINTS_TOPIC);
//! let (_stop_tx, stop_rx) = tokio::sync::watch::channel(false);
//! let stats = relay.run(&mut leader, &bus, stop_rx).await;
//! println!("forwarded {}", stats.allowed);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::Utc;
use telerelay_kernel::{RelayGate, RelayStatistics, StatisticsSnapshot, ValidationVerdict};
use telerelay_middleware::{
    FOLLOWER_COMMANDS_TOPIC, Frame, FramePublisher, FrameSubscriber, LEADER_JOINTS_TOPIC,
};
use telerelay_types::{
    DropReason, FollowerCommand, JointVector, LeaderMessage, LeaderPayload, ViolationEvent,
    now_secs,
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Validated messages between two statistics log lines.
pub const STATS_LOG_INTERVAL: u64 = 100;

/// Buffered [`ViolationEvent`]s per subscriber before the oldest are dropped.
const VIOLATION_CHANNEL_CAPACITY: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// What happened to a single inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// Passed every check; this command should be published.
    Forwarded(FollowerCommand),
    /// Reached the validator and was rejected.
    Blocked(ValidationVerdict),
    /// Never reached the validator.
    Dropped(DropReason),
}

// ─────────────────────────────────────────────────────────────────────────────
// MasterRelay
// ─────────────────────────────────────────────────────────────────────────────

/// The master node: owns the [`RelayGate`] and the [`RelayStatistics`].
pub struct MasterRelay {
    gate: RelayGate,
    stats: Arc<RelayStatistics>,
    violations: broadcast::Sender<ViolationEvent>,
    input_topic: String,
    output_topic: String,
}

impl MasterRelay {
    pub fn new(gate: RelayGate) -> Self {
        let (violations, _) = broadcast::channel(VIOLATION_CHANNEL_CAPACITY);
        Self {
            gate,
            stats: Arc::new(RelayStatistics::new()),
            violations,
            input_topic: LEADER_JOINTS_TOPIC.to_string(),
            output_topic: FOLLOWER_COMMANDS_TOPIC.to_string(),
        }
    }

    /// Override the default `leader_joints` / `follower_commands` topics.
    pub fn with_topics(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.input_topic = input.into();
        self.output_topic = output.into();
        self
    }

    /// Shared handle to the live counters.
    pub fn statistics(&self) -> Arc<RelayStatistics> {
        Arc::clone(&self.stats)
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }

    /// Receive a [`ViolationEvent`] for every message that had at least one
    /// violating joint, blocked or overridden.
    pub fn subscribe_violations(&self) -> broadcast::Receiver<ViolationEvent> {
        self.violations.subscribe()
    }

    /// Run one frame through decode, freshness, and the gate.
    ///
    /// Statistics are updated here; publishing is left to the caller.
    pub fn process_frame(&self, frame: &Frame, received_at: f64) -> RelayOutcome {
        if frame.topic != self.input_topic {
            return self.drop_message(DropReason::UnknownTopic(frame.topic.clone()));
        }
        match frame
            .parse_json::<LeaderPayload>()
            .and_then(LeaderPayload::into_message)
        {
            Ok(msg) => self.process_message(msg, received_at),
            Err(reason) => self.drop_message(reason),
        }
    }

    /// As [`process_frame`](Self::process_frame) for an already-decoded
    /// message.
    pub fn process_message(&self, msg: LeaderMessage, received_at: f64) -> RelayOutcome {
        let vector = match msg.into_joint_vector(self.gate.source_joints()) {
            Ok(v) => v,
            Err(reason) => return self.drop_message(reason),
        };
        if let Err(reason) = self.gate.check_freshness(&vector, received_at) {
            return self.drop_message(reason);
        }
        self.evaluate(&vector)
    }

    fn evaluate(&self, vector: &JointVector) -> RelayOutcome {
        let outcome = self.gate.evaluate(vector);
        let total = self.stats.record(&outcome.verdict);

        if !outcome.verdict.violations.is_empty() {
            self.report_violations(vector, &outcome.verdict);
        }

        if total % STATS_LOG_INTERVAL == 0 {
            log_statistics(&self.stats.snapshot());
        }

        if !outcome.verdict.allowed {
            return RelayOutcome::Blocked(outcome.verdict);
        }

        debug!(seq = ?vector.seq, "command forwarded");
        RelayOutcome::Forwarded(FollowerCommand {
            joints: outcome.joints,
            timestamp: now_secs(),
            source_timestamp: vector.timestamp,
            seq: vector.seq,
            gripper: outcome.gripper,
        })
    }

    fn report_violations(&self, vector: &JointVector, verdict: &ValidationVerdict) {
        for v in &verdict.violations {
            if verdict.enforced {
                warn!(
                    joint = v.joint,
                    name = %v.name,
                    value = v.value,
                    bound = v.bound,
                    kind = ?v.kind,
                    "joint limit violation, command blocked"
                );
            } else {
                warn!(
                    joint = v.joint,
                    name = %v.name,
                    value = v.value,
                    bound = v.bound,
                    kind = ?v.kind,
                    "joint limit violation forwarded, limits disabled"
                );
            }
        }

        // No subscribers is fine.
        let _ = self.violations.send(ViolationEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_timestamp: vector.timestamp,
            seq: vector.seq,
            overridden: verdict.is_overridden(),
            violations: verdict.violations.clone(),
        });
    }

    fn drop_message(&self, reason: DropReason) -> RelayOutcome {
        debug!(reason = %reason, "message dropped");
        self.stats.record_drop(&reason);
        RelayOutcome::Dropped(reason)
    }

    /// Relay frames from `subscriber` to `publisher` until `shutdown` turns
    /// `true` or the subscriber closes.
    ///
    /// Per-message failures are counted, never returned.  Returns the final
    /// statistics snapshot.
    pub async fn run(
        &self,
        subscriber: &mut dyn FrameSubscriber,
        publisher: &dyn FramePublisher,
        mut shutdown: watch::Receiver<bool>,
    ) -> StatisticsSnapshot {
        info!(
            input = %self.input_topic,
            output = %self.output_topic,
            source_joints = self.gate.source_joints(),
            destination_joints = self.gate.destination_joints(),
            limits_enforced = self.gate.limits_enforced(),
            staleness_ms = self.gate.staleness_threshold().as_millis() as u64,
            "master relay started"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                frame = subscriber.recv() => {
                    let Some(frame) = frame else {
                        warn!(topic = %self.input_topic, "leader subscription closed");
                        break;
                    };
                    if let RelayOutcome::Forwarded(command) = self.process_frame(&frame, now_secs()) {
                        self.forward(publisher, &command).await;
                    }
                }
            }
        }

        let snapshot = self.stats.snapshot();
        info!("master relay stopped");
        log_statistics(&snapshot);
        snapshot
    }

    async fn forward(&self, publisher: &dyn FramePublisher, command: &FollowerCommand) {
        let frame = match Frame::json(self.output_topic.as_str(), command) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.record_publish_failure();
                warn!(error = %e, "failed to encode follower command");
                return;
            }
        };
        match publisher.publish(frame).await {
            Ok(_) => self.stats.record_forward(command.timestamp),
            Err(e) => {
                self.stats.record_publish_failure();
                warn!(error = %e, seq = ?command.seq, "failed to publish follower command");
            }
        }
    }
}

fn log_statistics(s: &StatisticsSnapshot) {
    info!(
        received = s.total,
        forwarded = s.allowed,
        blocked = s.blocked,
        overridden = s.overridden,
        block_pct = format!("{:.1}", s.block_percentage()),
        decode_errors = s.decode_errors,
        stale_drops = s.stale_drops,
        publish_failures = s.publish_failures,
        "relay statistics"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
