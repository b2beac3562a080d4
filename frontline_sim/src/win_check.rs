use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sim_schema::{GameMode, MessageKind, PlayerId, Team, WinnerRecord};

use crate::{
    execution::{ExecutionContext, ExecutionError},
    game::{Game, PeaceVote},
};

const LABEL: &str = "win_check";

/// Periodic victory adjudication. Deactivates once a winner is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinCheckExecution {
    initialized: bool,
    active: bool,
}

impl Default for WinCheckExecution {
    fn default() -> Self {
        Self::new()
    }
}

impl WinCheckExecution {
    pub fn new() -> Self {
        Self {
            initialized: false,
            active: true,
        }
    }

    pub fn init(&mut self, _ctx: &mut ExecutionContext<'_>) {
        self.initialized = true;
    }

    pub fn validate(&self, _game: &Game) -> Result<(), ExecutionError> {
        if !self.initialized {
            return Err(ExecutionError::NotInitialized { execution: LABEL });
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn tick(&mut self, ctx: &mut ExecutionContext<'_>) {
        let now = ctx.tick();
        let game = &mut *ctx.game;
        if game.winner().is_some() {
            self.active = false;
            return;
        }
        if now % game.config.win_check_interval.max(1) != 0 {
            return;
        }
        let winner = match game.config.game_mode {
            GameMode::FreeForAll => check_free_for_all(game),
            GameMode::Team => check_teams(game),
        };
        let Some(winner) = winner else {
            return;
        };
        if game.set_winner(winner.clone()) {
            tracing::info!(
                target: "frontline::win_check",
                winner = ?winner,
                tick = now,
                "win_check.winner_declared"
            );
        }
        self.active = false;
    }
}

/// Land that still counts toward victory: every land tile not under fallout.
pub fn contested_land(game: &Game) -> usize {
    let map = game.map();
    map.num_land_tiles().saturating_sub(map.num_fallout_tiles())
}

fn exceeds_threshold(game: &Game, share: f64) -> bool {
    share * 100.0 > game.config.win_threshold_pct
}

/// Alive landholders ordered by tiles descending, then id.
fn ranked_landholders(game: &Game) -> Vec<(usize, PlayerId)> {
    let mut ranked: Vec<(usize, PlayerId)> = game
        .active_players()
        .map(|p| (p.num_tiles_owned(), p.id()))
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    ranked
}

fn tiles_of(game: &Game, player: PlayerId) -> usize {
    game.player(player)
        .filter(|p| p.is_alive())
        .map_or(0, |p| p.num_tiles_owned())
}

/// Connected components of the alliance graph among active players with at
/// least two members. Each component is keyed by its sorted member list, so
/// the same coalition is produced once whichever member is visited first.
pub fn coalitions(game: &Game) -> Vec<Vec<PlayerId>> {
    let active: BTreeSet<PlayerId> = game.active_players().map(|p| p.id()).collect();
    let mut seen: BTreeSet<PlayerId> = BTreeSet::new();
    let mut found: BTreeSet<Vec<PlayerId>> = BTreeSet::new();
    for &start in &active {
        if seen.contains(&start) {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![start];
        seen.insert(start);
        while let Some(current) = stack.pop() {
            component.push(current);
            let Some(player) = game.player(current) else {
                continue;
            };
            for &ally in player.allies() {
                if active.contains(&ally) && seen.insert(ally) {
                    stack.push(ally);
                }
            }
        }
        if component.len() >= 2 {
            component.sort();
            found.insert(component);
        }
    }
    found.into_iter().collect()
}

pub fn check_free_for_all(game: &mut Game) -> Option<WinnerRecord> {
    let land = contested_land(game);
    if land == 0 {
        return None;
    }
    let ranked = ranked_landholders(game);
    let &(top_tiles, top) = ranked.first()?;
    let fair_share = land as f64 / ranked.len() as f64;
    if top_tiles as f64 > fair_share && exceeds_threshold(game, top_tiles as f64 / land as f64) {
        return Some(WinnerRecord::Player(top));
    }

    if game.peace_vote().is_some() {
        return tally_peace_vote(game, land);
    }
    start_peace_vote(game, land);
    None
}

fn tally_peace_vote(game: &mut Game, land: usize) -> Option<WinnerRecord> {
    let vote = game.peace_vote()?.clone();
    let approved: usize = vote.approvals.iter().map(|&p| tiles_of(game, p)).sum();
    if exceeds_threshold(game, approved as f64 / land as f64) {
        let winner = vote
            .approvals
            .iter()
            .map(|&p| (tiles_of(game, p), p))
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
            .map(|(_, p)| p)?;
        game.set_peace_vote(None);
        tracing::info!(
            target: "frontline::win_check",
            winner = %winner,
            approvals = vote.approvals.len(),
            "win_check.peace_vote_passed"
        );
        return Some(WinnerRecord::Player(winner));
    }
    if game.ticks() >= vote.expires_tick {
        game.set_peace_vote(None);
        tracing::info!(
            target: "frontline::win_check",
            members = vote.members.len(),
            approvals = vote.approvals.len(),
            "win_check.peace_vote_expired"
        );
    }
    None
}

fn start_peace_vote(game: &mut Game, land: usize) {
    let mut best: Option<(usize, Vec<PlayerId>)> = None;
    for members in coalitions(game) {
        let tiles: usize = members.iter().map(|&p| tiles_of(game, p)).sum();
        if best.as_ref().map_or(true, |(best_tiles, _)| tiles > *best_tiles) {
            best = Some((tiles, members));
        }
    }
    let Some((tiles, members)) = best else {
        return;
    };
    if !exceeds_threshold(game, tiles as f64 / land as f64) {
        return;
    }
    let now = game.ticks();
    let text = format!(
        "A coalition of {} nations holds {:.0}% of the land and may vote for peace",
        members.len(),
        tiles as f64 * 100.0 / land as f64
    );
    tracing::info!(
        target: "frontline::win_check",
        members = members.len(),
        tiles,
        "win_check.peace_vote_started"
    );
    game.set_peace_vote(Some(PeaceVote {
        members,
        started_tick: now,
        expires_tick: now + game.config.peace_vote_duration_ticks,
        approvals: BTreeSet::new(),
    }));
    game.display_message(MessageKind::PeaceVote, text, None);
}

/// Leading competitive team by territory, declared once its share exceeds
/// the threshold. The bot team never wins.
pub fn check_teams(game: &Game) -> Option<WinnerRecord> {
    let land = contested_land(game);
    if land == 0 {
        return None;
    }
    let mut per_team: BTreeMap<Team, usize> = BTreeMap::new();
    for player in game.active_players() {
        match player.team() {
            Some(Team::Bot) | None => {}
            Some(team) => *per_team.entry(team).or_insert(0) += player.num_tiles_owned(),
        }
    }
    let (team, tiles) = per_team
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))?;
    exceeds_threshold(game, tiles as f64 / land as f64).then_some(WinnerRecord::Team(team))
}
