//! SLAM Thread - sensor intake and operator commands.
//!
//! This thread:
//! - Restores the startup map, if one is configured
//! - Feeds odometry samples into the shared lookup buffer
//! - Admits scans on arrival and queues them for the optimizer
//! - Drains the queue while processing is not paused
//! - Attaches fiducial detections to the latest accepted scans
//! - Answers operator commands between sensor messages
//!
//! Admission happens on arrival so throttling sees every scan; the
//! optimizer stage is the one interactive mode pauses. A fatal error
//! clears the running flag and ends the thread with that error.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, never, select};

use crate::core::types::{FiducialDetections, OdometrySample, RangeScan};
use crate::error::Result;
use crate::session::{OdometryBuffer, PausedApplication, PosedScan, SlamNode};
use crate::state::{CommandReceiver, CommandResponse, CommandWithResponse, SlamCommand};

use super::SensorChannels;

/// SLAM Thread handle.
pub struct SlamThread {
    handle: JoinHandle<Result<()>>,
}

impl SlamThread {
    /// Spawn the SLAM thread.
    pub fn spawn(
        node: Arc<SlamNode>,
        channels: SensorChannels,
        command_rx: CommandReceiver,
        odometry: Arc<OdometryBuffer>,
        running: Arc<AtomicBool>,
    ) -> std::io::Result<Self> {
        let handle = thread::Builder::new()
            .name("slam".into())
            .spawn(move || {
                let result = SlamContext::new(node, channels, command_rx, odometry)
                    .and_then(|mut ctx| ctx.run(&running));
                if let Err(e) = &result {
                    log::error!("SLAM thread stopping: {}", e);
                    running.store(false, Ordering::Relaxed);
                }
                result
            })?;

        Ok(Self { handle })
    }

    /// Wait for thread to finish.
    pub fn join(self) -> thread::Result<Result<()>> {
        self.handle.join()
    }
}

#[derive(Debug, Clone, Copy)]
enum Input {
    Commands,
    Odometry,
    Scans,
    Fiducials,
}

enum Event {
    Command(CommandWithResponse),
    Odometry(OdometrySample),
    Scan(RangeScan),
    Fiducials(FiducialDetections),
    Closed(Input),
    Idle,
}

struct SlamContext {
    node: Arc<SlamNode>,
    scans: Receiver<RangeScan>,
    odometry_rx: Receiver<OdometrySample>,
    fiducials: Receiver<FiducialDetections>,
    commands: CommandReceiver,
    odometry: Arc<OdometryBuffer>,
    queue: VecDeque<PosedScan>,
    max_queue_size: usize,
}

impl SlamContext {
    fn new(
        node: Arc<SlamNode>,
        channels: SensorChannels,
        commands: CommandReceiver,
        odometry: Arc<OdometryBuffer>,
    ) -> Result<Self> {
        let max_queue_size = node.config().admission.max_queue_size.max(1);
        let ctx = Self {
            node,
            scans: channels.scans,
            odometry_rx: channels.odometry,
            fiducials: channels.fiducials,
            commands,
            odometry,
            queue: VecDeque::new(),
            max_queue_size,
        };

        if let Some(request) = ctx.node.config().startup.restore_request()
            && let Err(e) = ctx.node.restore_at_startup(&request, &ctx.scans)
        {
            if e.is_fatal() {
                return Err(e);
            }
            log::error!("Startup map not loaded: {}", e);
        }
        Ok(ctx)
    }

    fn run(&mut self, running: &Arc<AtomicBool>) -> Result<()> {
        log::info!("SLAM thread started");

        while running.load(Ordering::Relaxed) {
            let event = select! {
                recv(self.commands) -> msg => msg.map_or(Event::Closed(Input::Commands), Event::Command),
                recv(self.odometry_rx) -> msg => msg.map_or(Event::Closed(Input::Odometry), Event::Odometry),
                recv(self.scans) -> msg => msg.map_or(Event::Closed(Input::Scans), Event::Scan),
                recv(self.fiducials) -> msg => msg.map_or(Event::Closed(Input::Fiducials), Event::Fiducials),
                default(Duration::from_millis(10)) => Event::Idle,
            };

            match event {
                Event::Command(cmd) => match self.execute(cmd.command) {
                    Ok(response) => {
                        cmd.response_tx.send(Ok(response)).ok();
                    }
                    Err(e) => {
                        cmd.response_tx.send(Err(e.to_string())).ok();
                        if e.is_fatal() {
                            return Err(e);
                        }
                    }
                },
                Event::Odometry(sample) => self.odometry.insert(&sample),
                Event::Scan(scan) => self.admit(scan),
                Event::Fiducials(detections) => {
                    // Tags attach to the latest scan sent before them.
                    self.catch_up();
                    self.node.add_fiducials(&detections);
                }
                Event::Closed(input) => self.close(input),
                Event::Idle => {}
            }

            self.drain_queue();
        }

        log::info!(
            "SLAM thread shutdown complete ({} scans in dataset, {} still queued)",
            self.node.dataset_len(),
            self.queue.len()
        );
        Ok(())
    }

    /// Stop selecting on a disconnected input.
    fn close(&mut self, input: Input) {
        log::info!("{:?} channel closed", input);
        match input {
            Input::Commands => self.commands = never(),
            Input::Odometry => self.odometry_rx = never(),
            Input::Scans => self.scans = never(),
            Input::Fiducials => self.fiducials = never(),
        }
    }

    fn drain_odometry(&mut self) {
        while let Ok(sample) = self.odometry_rx.try_recv() {
            self.odometry.insert(&sample);
        }
    }

    /// Admit and process every scan already waiting in the channel.
    fn catch_up(&mut self) {
        while let Ok(scan) = self.scans.try_recv() {
            self.admit(scan);
        }
        self.drain_queue();
    }

    fn admit(&mut self, scan: RangeScan) {
        // Odometry sent ahead of this scan must be visible to its lookup.
        self.drain_odometry();

        let Some(posed) = self.node.admit_scan(scan) else {
            return;
        };
        self.queue.push_back(posed);
        if self.queue.len() > self.max_queue_size
            && let Some(dropped) = self.queue.pop_front()
        {
            log::warn!(
                "Scan queue full ({}), dropping scan {} from {}",
                self.max_queue_size,
                dropped.scan.seq,
                dropped.scan.frame_id
            );
        }
    }

    fn drain_queue(&mut self) {
        while !self.node.paused().get(PausedApplication::Processing) {
            let Some(posed) = self.queue.pop_front() else {
                break;
            };
            if let Some(node) = self.node.process_posed(&posed) {
                log::trace!("Scan {} from {} added as node {}", posed.scan.seq, posed.scan.frame_id, node);
            }
        }
    }

    fn execute(&mut self, command: SlamCommand) -> Result<CommandResponse> {
        log::info!("Command: {:?}", command);
        let node = &self.node;
        let response = match command {
            SlamCommand::PauseNewMeasurements => {
                CommandResponse::MeasurementsPaused(node.pause_new_measurements())
            }
            SlamCommand::ManualLoopClosure => {
                CommandResponse::LoopClosure(node.manual_loop_closure()?)
            }
            SlamCommand::ClearManualChanges => {
                node.clear_manual_changes()?;
                CommandResponse::ManualChangesCleared
            }
            SlamCommand::ToggleInteractiveMode => {
                CommandResponse::InteractiveMode(node.toggle_interactive_mode()?)
            }
            SlamCommand::RecordMove { node: id, pose } => {
                node.assistant().record_move(id, pose)?;
                CommandResponse::MoveRecorded
            }
            SlamCommand::PreviewMove { node: id, pose } => {
                CommandResponse::PreviewSent(node.assistant().preview_move(id, pose)?.is_some())
            }
            SlamCommand::Serialize { path } => {
                node.serialize(&path)?;
                CommandResponse::Serialized
            }
            SlamCommand::Deserialize {
                path,
                match_type,
                initial_pose,
            } => {
                node.deserialize(&path, match_type, initial_pose, &self.scans)?;
                // Queued scans refer to the replaced session.
                self.queue.clear();
                CommandResponse::Deserialized
            }
        };
        Ok(response)
    }
}
