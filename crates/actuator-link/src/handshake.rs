use crate::halt::{HaltSink, LinkState};
use crate::{unix_seconds, AckRecord, ActuatorLink, CommandFrame, HaltHandle, LinkError, Position, Result, SyncOutcome};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    pub command_path: PathBuf,
    pub ack_path: PathBuf,
    pub poll_interval_ms: u64,
    pub ack_timeout_ms: u64,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            command_path: PathBuf::from("tcp_commands.json"),
            ack_path: PathBuf::from("tcp_ack.json"),
            poll_interval_ms: 50,
            ack_timeout_ms: 5000,
        }
    }
}

/// Command/ack exchange over two files on a shared filesystem.
pub struct FileHandshake {
    config: HandshakeConfig,
    seq: Arc<AtomicU64>,
    state: Arc<Mutex<LinkState>>,
    halt: HaltHandle,
}

impl FileHandshake {
    pub fn new(config: HandshakeConfig, home: Position) -> Self {
        // Seed from the clock so ids never repeat across restarts.
        let seed = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let seq = Arc::new(AtomicU64::new(seed));
        let state = Arc::new(Mutex::new(LinkState {
            position: home,
            gripper_position: 0.0,
        }));
        let halt = HaltHandle::new(
            seq.clone(),
            state.clone(),
            HaltSink::File(config.command_path.clone()),
        );
        Self {
            config,
            seq,
            state,
            halt,
        }
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Read the last confirmed position from the ack file, if any.
    pub fn last_reported_position(&self) -> Option<Position> {
        let text = fs::read_to_string(&self.config.ack_path).ok()?;
        let ack: AckRecord = serde_json::from_str(text.trim()).ok()?;
        Some(ack.position)
    }

    fn read_fresh_ack(&self, seq: u64, written_at: SystemTime) -> Option<AckRecord> {
        let path = &self.config.ack_path;
        let text = fs::read_to_string(path).ok()?;
        let ack: AckRecord = match serde_json::from_str(text.trim()) {
            Ok(ack) => ack,
            Err(e) => {
                // Usually a partially written file; try again next poll.
                debug!(error = %e, "ack file not parseable yet");
                return None;
            }
        };
        let mtime = fs::metadata(path).and_then(|m| m.modified()).ok();
        is_fresh(&ack, mtime, seq, written_at).then_some(ack)
    }
}

/// Decide whether an acknowledgment belongs to the command written at
/// `written_at` with id `seq`.
///
/// An explicit `seq` wins; otherwise the ack's own timestamp, and failing
/// that the ack file's modification time, must not predate the write.
pub(crate) fn is_fresh(
    ack: &AckRecord,
    mtime: Option<SystemTime>,
    seq: u64,
    written_at: SystemTime,
) -> bool {
    if let Some(ack_seq) = ack.seq {
        return ack_seq == seq;
    }
    if let Some(ts) = ack.timestamp {
        return ts >= unix_seconds(written_at);
    }
    mtime.map(|m| m >= written_at).unwrap_or(false)
}

/// Overwrite `path` with `frame` via a temp file named for `writer`, then
/// rename.
pub(crate) fn write_frame(path: &Path, frame: &CommandFrame, writer: &str) -> Result<()> {
    let json = serde_json::to_string(frame).map_err(|e| LinkError::Encode(e.to_string()))?;
    let tmp = path.with_extension(format!("json.{writer}.tmp"));
    fs::write(&tmp, json).map_err(|e| LinkError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| LinkError::io(path, e))
}

impl ActuatorLink for FileHandshake {
    fn send_and_wait(&mut self, target: Position, gripper_position: f64) -> Result<SyncOutcome> {
        let (seq, written_at) = {
            let _writing = self.halt.write_lock();
            if self.halt.is_halted() {
                return Err(LinkError::Halted);
            }
            let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
            let frame = CommandFrame::new(target, gripper_position, seq);
            {
                let mut state = self.state.lock();
                state.position = target;
                state.gripper_position = gripper_position;
            }
            let written_at = SystemTime::now();
            write_frame(&self.config.command_path, &frame, "move")?;
            (seq, written_at)
        };
        debug!(%target, seq, "command written");

        let deadline = Instant::now() + Duration::from_millis(self.config.ack_timeout_ms);
        let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
        loop {
            if self.halt.is_halted() {
                return Err(LinkError::Halted);
            }
            if let Some(ack) = self.read_fresh_ack(seq, written_at) {
                if ack.completed {
                    let mut state = self.state.lock();
                    state.position = ack.position;
                    if let Some(g) = ack.gripper_position {
                        state.gripper_position = g;
                    }
                    return Ok(SyncOutcome {
                        position: ack.position,
                        gripper_position: ack.gripper_position,
                        confirmed: true,
                    });
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(poll);
        }

        warn!(
            %target,
            timeout_ms = self.config.ack_timeout_ms,
            "no fresh acknowledgment, continuing with commanded position"
        );
        Ok(SyncOutcome::unconfirmed(target))
    }

    fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config_in(dir: &Path, timeout_ms: u64) -> HandshakeConfig {
        HandshakeConfig {
            command_path: dir.join("tcp_commands.json"),
            ack_path: dir.join("tcp_ack.json"),
            poll_interval_ms: 10,
            ack_timeout_ms: timeout_ms,
        }
    }

    #[test]
    fn stale_ack_is_never_adopted() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_in(dir.path(), 200);
        fs::write(
            &config.ack_path,
            r#"{"completed": true, "position": {"x": 9.0, "y": 9.0, "z": 9.0}}"#,
        )?;
        let file = fs::OpenOptions::new().write(true).open(&config.ack_path)?;
        file.set_modified(SystemTime::now() - Duration::from_secs(5))?;
        drop(file);

        let mut link = FileHandshake::new(config.clone(), Position::default());
        let target = Position::new(1.0, 2.0, 3.0);
        let outcome = link.send_and_wait(target, 0.11)?;

        assert!(!outcome.confirmed);
        assert_eq!(outcome.position, target);
        let written: CommandFrame = serde_json::from_str(&fs::read_to_string(&config.command_path)?)?;
        assert_eq!(written.position(), target);
        Ok(())
    }

    #[test]
    fn matching_seq_ack_replaces_commanded_position() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_in(dir.path(), 2000);
        let command_path = config.command_path.clone();
        let ack_path = config.ack_path.clone();

        let actuator = std::thread::spawn(move || -> anyhow::Result<()> {
            let deadline = Instant::now() + Duration::from_secs(2);
            while Instant::now() < deadline {
                if let Ok(text) = fs::read_to_string(&command_path) {
                    let frame: CommandFrame = serde_json::from_str(&text)?;
                    // Report a slightly drifted arrival.
                    let ack = serde_json::json!({
                        "completed": true,
                        "position": {"x": frame.x + 0.001, "y": frame.y, "z": frame.z},
                        "gripper_position": 0.05,
                        "seq": frame.seq,
                    });
                    fs::write(&ack_path, ack.to_string())?;
                    return Ok(());
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            anyhow::bail!("command never written")
        });

        let mut link = FileHandshake::new(config, Position::default());
        let outcome = link.send_and_wait(Position::new(0.1, 0.5, -0.2), 0.11)?;
        actuator.join().map_err(|_| anyhow::anyhow!("actuator thread panicked"))??;

        assert!(outcome.confirmed);
        assert!((outcome.position.x - 0.101).abs() < 1e-9);
        assert_eq!(outcome.gripper_position, Some(0.05));
        Ok(())
    }

    #[test]
    fn freshness_prefers_seq_then_timestamp_then_mtime() {
        let written_at = SystemTime::now();
        let mut ack = AckRecord {
            completed: true,
            position: Position::default(),
            gripper_position: None,
            seq: Some(4),
            timestamp: Some(0.0),
        };
        assert!(is_fresh(&ack, None, 4, written_at));
        assert!(!is_fresh(&ack, None, 5, written_at));

        ack.seq = None;
        assert!(!is_fresh(&ack, Some(written_at), 4, written_at));
        ack.timestamp = Some(unix_seconds(written_at) + 0.5);
        assert!(is_fresh(&ack, None, 4, written_at));

        ack.timestamp = None;
        assert!(is_fresh(&ack, Some(written_at + Duration::from_millis(1)), 4, written_at));
        assert!(!is_fresh(&ack, Some(written_at - Duration::from_secs(5)), 4, written_at));
        assert!(!is_fresh(&ack, None, 4, written_at));
    }

    #[test]
    fn halted_link_refuses_moves_until_resumed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_in(dir.path(), 20);
        let mut link = FileHandshake::new(config.clone(), Position::new(0.0, 0.567, -0.24));
        let halt = link.halt_handle();

        halt.trigger()?;
        let frame: CommandFrame = serde_json::from_str(&fs::read_to_string(&config.command_path)?)?;
        assert!(frame.emergency_halt);
        assert_eq!(frame.position(), Position::new(0.0, 0.567, -0.24));
        assert!(matches!(
            link.send_and_wait(Position::default(), 0.0),
            Err(LinkError::Halted)
        ));

        halt.resume();
        let outcome = link.send_and_wait(Position::default(), 0.0)?;
        assert!(!outcome.confirmed);
        Ok(())
    }

    #[test]
    fn halt_frame_is_always_the_last_frame_written() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_in(dir.path(), 500);
        let mut link = FileHandshake::new(config.clone(), Position::default());
        let halt = link.halt_handle();

        // Both writers queue up behind a held write lock.
        let writing = halt.write_lock();
        let mover = std::thread::spawn(move || link.send_and_wait(Position::new(0.2, 0.2, 0.2), 0.0));
        std::thread::sleep(Duration::from_millis(50));
        let halter = {
            let halt = halt.clone();
            std::thread::spawn(move || halt.trigger())
        };
        std::thread::sleep(Duration::from_millis(50));
        drop(writing);

        halter.join().map_err(|_| anyhow::anyhow!("halt thread panicked"))??;
        let moved = mover.join().map_err(|_| anyhow::anyhow!("move thread panicked"))?;
        assert!(matches!(moved, Err(LinkError::Halted)));
        let frame: CommandFrame = serde_json::from_str(&fs::read_to_string(&config.command_path)?)?;
        assert!(frame.emergency_halt);
        Ok(())
    }
}
