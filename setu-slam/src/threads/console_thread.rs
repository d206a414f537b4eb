//! Console Thread - operator commands typed on stdin.
//!
//! One command per line (see [`SlamCommand::parse`]); each answer is
//! logged. The thread is detached since a blocking stdin read cannot be
//! interrupted.

use std::io::BufRead;
use std::thread;

use crate::state::{CommandResult, CommandSender, SlamCommand, send_command_sync};

/// Long enough for a full re-optimization or a restore with metadata wait.
const COMMAND_TIMEOUT_MS: u64 = 60_000;

pub struct ConsoleThread;

impl ConsoleThread {
    pub fn spawn(commands: CommandSender) -> std::io::Result<()> {
        thread::Builder::new()
            .name("console".into())
            .spawn(move || run(commands))?;
        Ok(())
    }
}

fn run(commands: CommandSender) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match SlamCommand::parse(&line) {
            Ok(command) => {
                let result = send_command_sync(&commands, command, COMMAND_TIMEOUT_MS);
                log::info!("{}", describe(&result));
            }
            Err(e) => log::warn!("{}", e),
        }
    }
    log::debug!("Console input closed");
}

fn describe(result: &CommandResult) -> String {
    match result {
        Ok(response) => format!("ok: {:?}", response),
        Err(e) => format!("error: {}", e),
    }
}
