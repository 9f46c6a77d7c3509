//! End-to-end: LeaderSource → FrameBus → MasterRelay → FrameBus → FollowerSink.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use telerelay_hal::{JointReader, JointReading, SimFollowerArm};
use telerelay_kernel::{MappingPair, RelayConfig, RelayGate, StatisticsSnapshot};
use telerelay_middleware::{FOLLOWER_COMMANDS_TOPIC, FrameBus, LEADER_JOINTS_TOPIC};
use telerelay_runtime::{FollowerSink, LeaderSource, MasterRelay};
use telerelay_types::{JointLimit, ViolationEvent};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Replays a fixed list of readings, then reports no sample.
struct ScriptedReader {
    joints: usize,
    samples: VecDeque<JointReading>,
}

impl ScriptedReader {
    fn new(samples: Vec<Vec<f64>>) -> Self {
        Self {
            joints: samples.first().map_or(0, Vec::len),
            samples: samples.into_iter().map(JointReading::new).collect(),
        }
    }
}

impl JointReader for ScriptedReader {
    fn joint_count(&self) -> usize {
        self.joints
    }

    fn read(&mut self) -> Option<JointReading> {
        self.samples.pop_front()
    }
}

/// Three joints, reversed order, offset on the first destination joint.
fn reversed_config() -> RelayConfig {
    let mut config = RelayConfig::with_limits(
        (0..3)
            .map(|i| JointLimit::new(i, format!("joint{i}"), -1.0, 1.0))
            .collect(),
    );
    config.mapping = Some(vec![
        MappingPair::new(0, 2),
        MappingPair::new(1, 1),
        MappingPair::new(2, 0),
    ]);
    config.offsets = Some(vec![0.1, 0.0, 0.0]);
    config
}

struct Pipeline {
    violations: broadcast::Receiver<ViolationEvent>,
    follower: FollowerSink,
    arm: SimFollowerArm,
    stop: watch::Sender<bool>,
    master_task: JoinHandle<StatisticsSnapshot>,
    leader_task: JoinHandle<u64>,
}

fn start(config: &RelayConfig, reader: ScriptedReader) -> Pipeline {
    let bus = FrameBus::default();
    let (stop, stop_rx) = watch::channel(false);
    let relay = Arc::new(MasterRelay::new(RelayGate::from_config(config).unwrap()));
    let arm = SimFollowerArm::new(3);
    let violations = relay.subscribe_violations();

    // Subscribe every hop before the leader starts publishing.
    let follower = FollowerSink::spawn(
        Box::new(bus.subscribe(FOLLOWER_COMMANDS_TOPIC)),
        Some(Box::new(arm.clone())),
        stop_rx.clone(),
    );
    let mut leader_rx = bus.subscribe(LEADER_JOINTS_TOPIC);

    let master_task = {
        let relay = Arc::clone(&relay);
        let bus = bus.clone();
        let stop_rx = stop_rx.clone();
        tokio::spawn(async move { relay.run(&mut leader_rx, &bus, stop_rx).await })
    };

    let leader_task = tokio::spawn(async move {
        let mut source = LeaderSource::new(200.0).unwrap();
        let mut reader = reader;
        source.run(&mut reader, &bus, stop_rx).await
    });

    Pipeline {
        violations,
        follower,
        arm,
        stop,
        master_task,
        leader_task,
    }
}

async fn shutdown(pipeline: Pipeline) -> (StatisticsSnapshot, u64) {
    pipeline.stop.send(true).unwrap();
    let stats = tokio::time::timeout(Duration::from_secs(2), pipeline.master_task)
        .await
        .unwrap()
        .unwrap();
    let published = tokio::time::timeout(Duration::from_secs(2), pipeline.leader_task)
        .await
        .unwrap()
        .unwrap();
    (stats, published)
}

#[tokio::test]
async fn safe_motion_reaches_the_follower_transformed() {
    let pipeline = start(&reversed_config(), ScriptedReader::new(vec![vec![0.2, 0.3, 0.4]]));

    let command = pipeline
        .follower
        .wait_for_command(Duration::from_secs(2))
        .await
        .expect("follower never received a command");

    let expected = [0.5, 0.3, 0.2];
    for (got, want) in command.joints.iter().zip(expected) {
        assert!((got - want).abs() < 1e-9, "got {:?}", command.joints);
    }
    assert_eq!(command.seq, Some(0));
    assert!(command.timestamp >= command.source_timestamp);
    assert_eq!(pipeline.arm.command_count(), 1);

    let (stats, published) = shutdown(pipeline).await;
    assert_eq!(published, 1);
    assert_eq!((stats.total, stats.allowed, stats.blocked), (1, 1, 0));
}

#[tokio::test]
async fn unsafe_motion_is_blocked_before_the_follower() {
    let mut pipeline = start(
        &reversed_config(),
        // Destination joint 2 comes from source joint 0: 5.0 is out of range.
        ScriptedReader::new(vec![vec![5.0, 0.0, 0.0], vec![0.0, 0.0, 0.5]]),
    );
    let command = pipeline
        .follower
        .wait_for_command(Duration::from_secs(2))
        .await
        .expect("follower never received the safe command");
    assert_eq!(command.seq, Some(1), "blocked command leaked through");
    assert_eq!(pipeline.arm.command_count(), 1);

    let event = tokio::time::timeout(Duration::from_secs(2), pipeline.violations.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(!event.overridden);
    assert_eq!(event.seq, Some(0));
    assert_eq!(event.violations.len(), 1);
    assert_eq!(event.violations[0].joint, 2);

    let (stats, _) = shutdown(pipeline).await;
    assert_eq!((stats.total, stats.allowed, stats.blocked), (2, 1, 1));
    assert!((stats.block_percentage() - 50.0).abs() < 1e-9);
}

#[tokio::test]
async fn disabled_limits_forward_everything() {
    let mut config = reversed_config();
    config.limits_enabled = false;
    let pipeline = start(&config, ScriptedReader::new(vec![vec![5.0, 0.0, 0.0]]));

    let command = pipeline
        .follower
        .wait_for_command(Duration::from_secs(2))
        .await
        .expect("override should forward the command");
    assert!((command.joints[2] - 5.0).abs() < 1e-9);

    let (stats, _) = shutdown(pipeline).await;
    assert_eq!((stats.allowed, stats.blocked, stats.overridden), (1, 0, 1));
    assert!(stats.last_violation.is_some_and(|v| v.overridden));
}
