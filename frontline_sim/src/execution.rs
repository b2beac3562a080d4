use bevy::prelude::{ResMut, Resource};
use serde::{Deserialize, Serialize};
use sim_schema::{PlayerId, UnitId};
use thiserror::Error;

use crate::{
    game::Game,
    nation::NationExecution,
    sam::{SamLauncherExecution, SamMissileExecution},
    win_check::WinCheckExecution,
};

/// Scheduling bugs. Ordinary game failures never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("{execution} ticked before init")]
    NotInitialized { execution: &'static str },
    #[error("{execution} references player {player} which is not in the game")]
    MissingOwner {
        execution: &'static str,
        player: PlayerId,
    },
    #[error("{execution} references unit {unit} which was never created")]
    UnknownUnit {
        execution: &'static str,
        unit: UnitId,
    },
}

/// Mutable view handed to an execution for one `init` or `tick` call.
pub struct ExecutionContext<'a> {
    pub game: &'a mut Game,
    spawned: &'a mut Vec<Execution>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(game: &'a mut Game, spawned: &'a mut Vec<Execution>) -> Self {
        Self { game, spawned }
    }

    pub fn tick(&self) -> u64 {
        self.game.ticks()
    }

    /// Registers a sibling execution; it is initialised and first ticked on
    /// the next runner pass.
    pub fn spawn(&mut self, execution: Execution) {
        self.spawned.push(execution);
    }
}

/// Every schedulable unit of work, dispatched by variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Execution {
    Nation(Box<NationExecution>),
    SamLauncher(SamLauncherExecution),
    SamMissile(SamMissileExecution),
    WinCheck(WinCheckExecution),
}

impl Execution {
    pub fn label(&self) -> &'static str {
        match self {
            Execution::Nation(_) => "nation",
            Execution::SamLauncher(_) => "sam_launcher",
            Execution::SamMissile(_) => "sam_missile",
            Execution::WinCheck(_) => "win_check",
        }
    }

    pub fn init(&mut self, ctx: &mut ExecutionContext<'_>) {
        match self {
            Execution::Nation(exec) => exec.init(ctx),
            Execution::SamLauncher(exec) => exec.init(ctx),
            Execution::SamMissile(exec) => exec.init(ctx),
            Execution::WinCheck(exec) => exec.init(ctx),
        }
    }

    /// Pre-tick invariant check. An error aborts the execution.
    pub fn validate(&self, game: &Game) -> Result<(), ExecutionError> {
        match self {
            Execution::Nation(exec) => exec.validate(game),
            Execution::SamLauncher(exec) => exec.validate(game),
            Execution::SamMissile(exec) => exec.validate(game),
            Execution::WinCheck(exec) => exec.validate(game),
        }
    }

    pub fn tick(&mut self, ctx: &mut ExecutionContext<'_>) {
        match self {
            Execution::Nation(exec) => exec.tick(ctx),
            Execution::SamLauncher(exec) => exec.tick(ctx),
            Execution::SamMissile(exec) => exec.tick(ctx),
            Execution::WinCheck(exec) => exec.tick(ctx),
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Execution::Nation(exec) => exec.is_active(),
            Execution::SamLauncher(exec) => exec.is_active(),
            Execution::SamMissile(exec) => exec.is_active(),
            Execution::WinCheck(exec) => exec.is_active(),
        }
    }

    pub fn active_during_spawn_phase(&self) -> bool {
        match self {
            Execution::Nation(_) => true,
            Execution::SamLauncher(_) | Execution::SamMissile(_) | Execution::WinCheck(_) => false,
        }
    }
}

impl From<NationExecution> for Execution {
    fn from(exec: NationExecution) -> Self {
        Execution::Nation(Box::new(exec))
    }
}

impl From<SamLauncherExecution> for Execution {
    fn from(exec: SamLauncherExecution) -> Self {
        Execution::SamLauncher(exec)
    }
}

impl From<SamMissileExecution> for Execution {
    fn from(exec: SamMissileExecution) -> Self {
        Execution::SamMissile(exec)
    }
}

impl From<WinCheckExecution> for Execution {
    fn from(exec: WinCheckExecution) -> Self {
        Execution::WinCheck(exec)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub executed: usize,
    pub skipped_spawn_phase: usize,
    pub retired: usize,
    pub fatal: Vec<ExecutionError>,
}

/// Ordered schedule of executions. Registration order is tick order.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionRunner {
    executions: Vec<Execution>,
    pending: Vec<Execution>,
    #[serde(skip)]
    last_report: TickReport,
}

impl ExecutionRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, execution: impl Into<Execution>) {
        self.pending.push(execution.into());
    }

    pub fn executions(&self) -> &[Execution] {
        &self.executions
    }

    pub fn pending(&self) -> &[Execution] {
        &self.pending
    }

    pub fn active_count(&self) -> usize {
        self.executions.len() + self.pending.len()
    }

    pub fn last_report(&self) -> &TickReport {
        &self.last_report
    }

    /// One pass over the schedule: initialise newly registered executions,
    /// validate and tick every live one, then drop the inactive.
    pub fn run_tick(&mut self, game: &mut Game) -> &TickReport {
        let mut report = TickReport {
            tick: game.ticks(),
            ..TickReport::default()
        };
        let mut spawned = Vec::new();

        for mut execution in std::mem::take(&mut self.pending) {
            execution.init(&mut ExecutionContext::new(game, &mut spawned));
            self.executions.push(execution);
        }

        let spawn_phase = game.in_spawn_phase();
        let mut aborted = vec![false; self.executions.len()];
        for (index, execution) in self.executions.iter_mut().enumerate() {
            if !execution.is_active() {
                continue;
            }
            if spawn_phase && !execution.active_during_spawn_phase() {
                report.skipped_spawn_phase += 1;
                continue;
            }
            if let Err(err) = execution.validate(game) {
                tracing::error!(
                    target: "frontline::runner",
                    tick = report.tick,
                    execution = execution.label(),
                    error = %err,
                    "runner.execution_aborted"
                );
                aborted[index] = true;
                report.fatal.push(err);
                continue;
            }
            execution.tick(&mut ExecutionContext::new(game, &mut spawned));
            report.executed += 1;
        }

        let before = self.executions.len();
        let mut index = 0;
        self.executions.retain(|execution| {
            let keep = !aborted[index] && execution.is_active();
            index += 1;
            keep
        });
        report.retired = before - self.executions.len();
        self.pending.extend(spawned);

        tracing::trace!(
            target: "frontline::runner",
            tick = report.tick,
            executed = report.executed,
            retired = report.retired,
            "runner.tick_complete"
        );
        self.last_report = report;
        &self.last_report
    }
}

pub fn run_executions(mut game: ResMut<Game>, mut runner: ResMut<ExecutionRunner>) {
    runner.run_tick(&mut game);
}

pub fn advance_tick(mut game: ResMut<Game>) {
    game.advance_tick();
}
