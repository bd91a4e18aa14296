//! Function-pointer stage sequencer for multi-stage device commands.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  stage table for one command (e.g. valve Pulse)            │
//! │  ┌───────┬───────────────────────────────┬──────────────┐  │
//! │  │ stage │ fn(&mut driver, &mut ctx)     │ returns      │  │
//! │  ├───────┼───────────────────────────────┼──────────────┤  │
//! │  │   1   │ open                          │ Next / Abort │  │
//! │  │   2   │ hold until pulse elapsed      │ Wait / Next  │  │
//! │  │   3   │ close                         │ Complete     │  │
//! │  └───────┴───────────────────────────────┴──────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The scheduler owns one [`Execution`] per device and calls the device
//! once per loop iteration. [`run`] executes the stage under the cursor:
//!
//! - `Wait` returns control at once. A waiting stage must not touch pins
//!   or emit anything, so re-entry before the deadline is side-effect free.
//! - `Next` advances the cursor, stamps the new stage-entry time and falls
//!   through to the next stage in the same call.
//! - `Complete` / `Abort` end the command. Abort also drops any queued
//!   re-execution.
//!
//! A table that runs off its end without completing is a driver defect:
//! the command is aborted and logged.

use log::{debug, error, trace};

use crate::app::module::Services;
use crate::app::ports::elapsed;

// ---------------------------------------------------------------------------
// Stage outcome and signature
// ---------------------------------------------------------------------------

/// What a stage asks the sequencer to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Stay in this stage; re-enter on the next tick.
    Wait,
    /// Move to the following stage.
    Next,
    Complete,
    Abort,
}

impl Step {
    /// `on_ok` when `result` succeeded, otherwise `Abort`.
    #[inline]
    pub fn after<E>(result: Result<(), E>, on_ok: Step) -> Step {
        match result {
            Ok(()) => on_ok,
            Err(_) => Step::Abort,
        }
    }
}

/// Per-call view a stage gets of the world.
pub struct StageCtx<'s, 'a> {
    entered_us: u64,
    pub svc: &'s mut Services<'a>,
}

impl StageCtx<'_, '_> {
    /// Timestamp at which the current stage was entered.
    pub fn entered_us(&self) -> u64 {
        self.entered_us
    }

    /// Non-blocking: has `duration_us` passed since this stage began?
    pub fn waited(&self, duration_us: u64) -> bool {
        elapsed(self.svc.clock, self.entered_us, duration_us)
    }
}

/// One row of a stage table.
pub type Stage<D> = fn(&mut D, &mut StageCtx<'_, '_>) -> Step;

// ---------------------------------------------------------------------------
// Execution context (scheduler-owned)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// Where one call to [`run`] left the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// No command has been started.
    Idle,
    /// Still in progress; call again next tick.
    Running,
    Completed,
    Aborted,
}

/// Progress of one device's active command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    command: u8,
    /// 1-based; only ever moves forward within a command.
    stage: u8,
    entered_us: u64,
    state: ExecState,
    recurrence_us: Option<u64>,
    finished_us: u64,
}

impl Default for Execution {
    fn default() -> Self {
        Self::new()
    }
}

impl Execution {
    pub const fn new() -> Self {
        Self {
            command: 0,
            stage: 1,
            entered_us: 0,
            state: ExecState::Idle,
            recurrence_us: None,
            finished_us: 0,
        }
    }

    /// Begin a one-shot command at stage 1.
    pub fn start(&mut self, command: u8, now_us: u64) {
        self.command = command;
        self.recurrence_us = None;
        self.restart(now_us);
    }

    /// Begin a command the scheduler re-runs `every_us` after each
    /// completion.
    pub fn start_recurrent(&mut self, command: u8, every_us: u64, now_us: u64) {
        self.start(command, now_us);
        self.recurrence_us = Some(every_us);
    }

    /// Restart a completed recurrent command once its delay has elapsed.
    /// Returns `true` if the command was restarted.
    pub fn rerun_due(&mut self, now_us: u64) -> bool {
        match (self.state, self.recurrence_us) {
            (ExecState::Completed, Some(every))
                if now_us.wrapping_sub(self.finished_us) >= every =>
            {
                self.restart(now_us);
                true
            }
            _ => false,
        }
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn stage(&self) -> u8 {
        self.stage
    }

    pub fn entered_us(&self) -> u64 {
        self.entered_us
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn recurrence_us(&self) -> Option<u64> {
        self.recurrence_us
    }

    pub fn is_running(&self) -> bool {
        self.state == ExecState::Running
    }

    pub fn progress(&self) -> Progress {
        match self.state {
            ExecState::Idle => Progress::Idle,
            ExecState::Running => Progress::Running,
            ExecState::Completed => Progress::Completed,
            ExecState::Aborted => Progress::Aborted,
        }
    }

    fn restart(&mut self, now_us: u64) {
        self.stage = 1;
        self.entered_us = now_us;
        self.state = ExecState::Running;
    }

    fn advance(&mut self, now_us: u64) {
        self.stage = self.stage.saturating_add(1);
        self.entered_us = now_us;
    }

    fn complete(&mut self, now_us: u64) {
        self.state = ExecState::Completed;
        self.finished_us = now_us;
    }

    fn abort(&mut self) {
        self.state = ExecState::Aborted;
        self.recurrence_us = None;
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Re-enter `exec`'s command on `driver` at its current stage.
pub fn run<D>(
    driver: &mut D,
    stages: &[Stage<D>],
    exec: &mut Execution,
    svc: &mut Services<'_>,
) -> Progress {
    if !exec.is_running() {
        debug!("command {} is not running ({:?})", exec.command, exec.state);
        return exec.progress();
    }

    loop {
        let Some(stage) = usize::from(exec.stage)
            .checked_sub(1)
            .and_then(|i| stages.get(i))
        else {
            error!(
                "command {} fell off its stage table at stage {}",
                exec.command, exec.stage
            );
            exec.abort();
            return Progress::Aborted;
        };

        let mut ctx = StageCtx {
            entered_us: exec.entered_us,
            svc: &mut *svc,
        };

        match stage(driver, &mut ctx) {
            Step::Wait => return Progress::Running,
            Step::Next => {
                exec.advance(svc.now_us());
                trace!("command {} -> stage {}", exec.command, exec.stage);
            }
            Step::Complete => {
                exec.complete(svc.now_us());
                debug!("command {} completed", exec.command);
                return Progress::Completed;
            }
            Step::Abort => {
                exec.abort();
                debug!("command {} aborted at stage {}", exec.command, exec.stage);
                return Progress::Aborted;
            }
        }
    }
}
