//! Operator command plumbing for the daemon.
//!
//! - `SlamCommand`: requests sent to the SLAM thread
//! - `CommandResponse`: what the SLAM thread answers
//! - channel helpers for synchronous request/reply

mod commands;

pub use commands::{
    CommandReceiver, CommandResponse, CommandResult, CommandSender, CommandWithResponse,
    SlamCommand, create_command_channel, send_command_sync,
};
