//! Command types for inter-thread communication.
//!
//! Operator requests reach the SLAM thread over a channel. Each command
//! carries a oneshot-style reply channel so the caller can wait for the
//! outcome without touching session state itself.

use std::path::PathBuf;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};

use crate::core::types::Pose2D;
use crate::loop_closure::CommitOutcome;
use crate::session::MatchType;

/// Commands handled by the SLAM thread.
#[derive(Debug, Clone, PartialEq)]
pub enum SlamCommand {
    /// Toggle admission of new scans.
    PauseNewMeasurements,

    /// Apply pending node moves and re-optimize.
    ManualLoopClosure,

    /// Drop pending node moves.
    ClearManualChanges,

    /// Flip interactive editing.
    ToggleInteractiveMode,

    /// Queue a node move for the next manual loop closure.
    RecordMove {
        node: u64,
        pose: Pose2D,
    },

    /// Broadcast a node's raw scan at a drag pose.
    PreviewMove {
        node: u64,
        pose: Pose2D,
    },

    /// Write the session archive.
    Serialize {
        path: PathBuf,
    },

    /// Replace the session with an archive.
    Deserialize {
        path: PathBuf,
        match_type: MatchType,
        initial_pose: Pose2D,
    },
}

impl SlamCommand {
    /// Parse one operator console line.
    ///
    /// ```text
    /// pause | close | clear | interactive
    /// move <node> <x> <y> <theta>
    /// preview <node> <x> <y> <theta>
    /// save <path>
    /// load <path> dock
    /// load <path> near <x> <y> <theta>
    /// load <path> localize <x> <y> <theta>
    /// ```
    pub fn parse(line: &str) -> Result<Self, String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["pause"] => Ok(SlamCommand::PauseNewMeasurements),
            ["close"] => Ok(SlamCommand::ManualLoopClosure),
            ["clear"] => Ok(SlamCommand::ClearManualChanges),
            ["interactive"] => Ok(SlamCommand::ToggleInteractiveMode),
            ["move", node, pose @ ..] => Ok(SlamCommand::RecordMove {
                node: parse_node(node)?,
                pose: parse_pose(pose)?,
            }),
            ["preview", node, pose @ ..] => Ok(SlamCommand::PreviewMove {
                node: parse_node(node)?,
                pose: parse_pose(pose)?,
            }),
            ["save", path] => Ok(SlamCommand::Serialize {
                path: PathBuf::from(path),
            }),
            ["load", path, "dock"] => Ok(SlamCommand::Deserialize {
                path: PathBuf::from(path),
                match_type: MatchType::StartAtFirstNode,
                initial_pose: Pose2D::identity(),
            }),
            ["load", path, "near", pose @ ..] => Ok(SlamCommand::Deserialize {
                path: PathBuf::from(path),
                match_type: MatchType::StartAtGivenPose,
                initial_pose: parse_pose(pose)?,
            }),
            ["load", path, "localize", pose @ ..] => Ok(SlamCommand::Deserialize {
                path: PathBuf::from(path),
                match_type: MatchType::LocalizeAtPose,
                initial_pose: parse_pose(pose)?,
            }),
            [] => Err("empty command".to_string()),
            _ => Err(format!("unknown command: {}", line.trim())),
        }
    }
}

fn parse_node(word: &str) -> Result<u64, String> {
    word.parse()
        .map_err(|_| format!("invalid node id: {}", word))
}

fn parse_pose(words: &[&str]) -> Result<Pose2D, String> {
    let [x, y, theta] = words else {
        return Err(format!("expected <x> <y> <theta>, got {} values", words.len()));
    };
    let value = |w: &str| {
        w.parse::<f32>()
            .map_err(|_| format!("invalid number: {}", w))
    };
    Ok(Pose2D::new(value(x)?, value(y)?, value(theta)?))
}

/// Result of a command execution.
pub type CommandResult = Result<CommandResponse, String>;

/// Response data from command execution.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResponse {
    /// New state of the admission pause flag.
    MeasurementsPaused(bool),

    /// Outcome of a manual loop closure.
    LoopClosure(CommitOutcome),

    ManualChangesCleared,

    /// New state of the interactive flag.
    InteractiveMode(bool),

    MoveRecorded,

    /// Whether a held scan existed for the node.
    PreviewSent(bool),

    Serialized,

    Deserialized,
}

/// Command with response channel for acknowledgment.
pub struct CommandWithResponse {
    /// The command to execute.
    pub command: SlamCommand,
    /// Channel to send response back.
    pub response_tx: Sender<CommandResult>,
}

impl std::fmt::Debug for CommandWithResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandWithResponse")
            .field("command", &self.command)
            .field("response_tx", &"...")
            .finish()
    }
}

/// Sender end of command channel (held by the console and other clients).
pub type CommandSender = Sender<CommandWithResponse>;

/// Receiver end of command channel (held by SLAM Thread).
pub type CommandReceiver = Receiver<CommandWithResponse>;

/// Create a new command channel pair.
pub fn create_command_channel() -> (CommandSender, CommandReceiver) {
    unbounded()
}

/// Send a command and wait for the SLAM thread's answer.
pub fn send_command_sync(
    sender: &CommandSender,
    command: SlamCommand,
    timeout_ms: u64,
) -> CommandResult {
    let (response_tx, response_rx) = bounded(1);

    sender
        .send(CommandWithResponse {
            command,
            response_tx,
        })
        .map_err(|_| "SLAM thread not responding (channel closed)".to_string())?;

    response_rx
        .recv_timeout(Duration::from_millis(timeout_ms))
        .map_err(|e| match e {
            RecvTimeoutError::Timeout => "SLAM command timeout".to_string(),
            RecvTimeoutError::Disconnected => "SLAM thread disconnected".to_string(),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_send_command_sync() {
        let (tx, rx) = create_command_channel();

        let handle = thread::spawn(move || {
            while let Ok(cmd) = rx.recv_timeout(Duration::from_millis(100)) {
                let response = match cmd.command {
                    SlamCommand::PauseNewMeasurements => CommandResponse::MeasurementsPaused(true),
                    _ => CommandResponse::ManualChangesCleared,
                };
                cmd.response_tx.send(Ok(response)).ok();
            }
        });

        let result = send_command_sync(&tx, SlamCommand::PauseNewMeasurements, 1000);
        assert_eq!(result, Ok(CommandResponse::MeasurementsPaused(true)));

        drop(tx);
        handle.join().unwrap();
    }

    #[test]
    fn test_send_to_closed_channel() {
        let (tx, rx) = create_command_channel();
        drop(rx);
        assert!(send_command_sync(&tx, SlamCommand::ClearManualChanges, 10).is_err());
    }

    #[test]
    fn test_parse_console_lines() {
        assert_eq!(
            SlamCommand::parse("pause"),
            Ok(SlamCommand::PauseNewMeasurements)
        );
        assert_eq!(
            SlamCommand::parse("  move 4 1.0 2.0 0.5 "),
            Ok(SlamCommand::RecordMove {
                node: 4,
                pose: Pose2D::new(1.0, 2.0, 0.5)
            })
        );
        assert_eq!(
            SlamCommand::parse("load maps/office.setu dock"),
            Ok(SlamCommand::Deserialize {
                path: PathBuf::from("maps/office.setu"),
                match_type: MatchType::StartAtFirstNode,
                initial_pose: Pose2D::identity(),
            })
        );

        if let Ok(SlamCommand::Deserialize { match_type, initial_pose, .. }) =
            SlamCommand::parse("load m.setu localize 1 2 3")
        {
            assert_eq!(match_type, MatchType::LocalizeAtPose);
            assert_eq!(initial_pose, Pose2D::new(1.0, 2.0, 3.0));
        } else {
            panic!("Expected Deserialize command");
        }
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(SlamCommand::parse("").is_err());
        assert!(SlamCommand::parse("teleport").is_err());
        assert!(SlamCommand::parse("move x 1 2 3").is_err());
        assert!(SlamCommand::parse("move 1 1 2").is_err());
        assert!(SlamCommand::parse("load m.setu near 1 two 3").is_err());
    }
}
