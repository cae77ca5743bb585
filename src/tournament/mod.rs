//! Round-robin tournament coordinator
//!
//! Every unordered pair of configured players meets once. Each matchup gets
//! brand-new player instances and freshly drawn teams, then plays a fixed
//! number of battles through a [`MatchRunner`]. Nothing survives from one
//! matchup to the next except the win rates written into the
//! [`CrossEvaluation`].

pub mod teams;

use crate::agent::baseline::{MaxPowerBot, RandomBot};
use crate::agent::player::{BattleRecord, LlmAgent, Player};
use crate::core::config::{PlayerConfig, PlayerKind, SystemPrompt, TournamentConfig};
use crate::core::error::{ArenaError, Result};
use crate::core::types::BoxFuture;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub use teams::{RandomTeamBuilder, TeamRoster, TeamSource};

/// Builds a fresh player for one tournament entry
pub trait PlayerFactory: Send + Sync {
    fn create_player(&self, config: &PlayerConfig) -> Result<Box<dyn Player>>;
}

/// Creates language-model agents and baseline bots from their configuration
pub struct DefaultPlayerFactory {
    system_prompt: SystemPrompt,
    log_dir: PathBuf,
}

impl DefaultPlayerFactory {
    pub fn new(system_prompt: SystemPrompt, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            system_prompt,
            log_dir: log_dir.into(),
        }
    }

    /// Load the system prompt named by a tournament file and log into its `log_dir`
    pub fn from_config(config: &TournamentConfig) -> Result<Self> {
        let system_prompt = SystemPrompt::load(&config.system_prompt_path)?;
        Ok(Self::new(system_prompt, config.log_dir.clone()))
    }

    pub fn system_prompt(&self) -> &SystemPrompt {
        &self.system_prompt
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

impl PlayerFactory for DefaultPlayerFactory {
    fn create_player(&self, config: &PlayerConfig) -> Result<Box<dyn Player>> {
        if let Some(agent) = config.agent_config()? {
            let agent = LlmAgent::from_config(agent, self.system_prompt.clone(), self.log_dir.clone())?;
            return Ok(Box::new(agent));
        }
        match config.kind {
            PlayerKind::Random => Ok(Box::new(RandomBot::new(config.username.clone()))),
            PlayerKind::MaxPower => Ok(Box::new(MaxPowerBot::new(config.username.clone()))),
            PlayerKind::Local | PlayerKind::Router => Err(ArenaError::Config(format!(
                "player '{}' has no agent configuration",
                config.username
            ))),
        }
    }
}

/// One side of a matchup: a fresh player and the team it brings
pub struct Entrant {
    pub player: Box<dyn Player>,
    pub team: TeamRoster,
}

/// Plays battles between two entrants through the battle engine.
///
/// Implementations must invoke each player's `battle_finished` once per battle;
/// win rates are read from the players afterwards.
pub trait MatchRunner: Send + Sync {
    fn run_matches<'a>(
        &'a self,
        first: &'a Entrant,
        second: &'a Entrant,
        battle_format: &'a str,
        n_battles: u32,
    ) -> BoxFuture<'a, Result<()>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentSettings {
    pub battle_format: String,
    pub team_size: usize,
    pub n_challenges: u32,
}

impl From<&TournamentConfig> for TournamentSettings {
    fn from(config: &TournamentConfig) -> Self {
        Self {
            battle_format: config.battle_format.clone(),
            team_size: config.team_size,
            n_challenges: config.n_challenges,
        }
    }
}

/// Every unordered pair `(i, j)` with `i < j`
pub fn round_robin_pairs(n: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            pairs.push((i, j));
        }
    }
    pairs
}

/// Result of one side of a played matchup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairResult {
    pub won: u32,
    pub finished: u32,
    pub win_rate: f64,
}

impl From<BattleRecord> for PairResult {
    fn from(record: BattleRecord) -> Self {
        Self {
            won: record.won,
            finished: record.finished(),
            win_rate: record.win_rate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchupCell {
    /// A player against itself
    NotApplicable,
    Played(PairResult),
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchupFailure {
    pub first: String,
    pub second: String,
    pub error: String,
}

/// Aggregate over all opponents of one player
#[derive(Debug, Clone, PartialEq)]
pub struct OverallStat {
    pub username: String,
    pub won: u32,
    pub battles: u32,
}

impl OverallStat {
    pub fn win_rate(&self) -> f64 {
        match self.battles {
            0 => 0.0,
            n => f64::from(self.won) / f64::from(n),
        }
    }
}

/// Win-rate matrix of a finished tournament, rows and columns in entry order
#[derive(Debug, Clone, PartialEq)]
pub struct CrossEvaluation {
    usernames: Vec<String>,
    cells: Vec<Vec<MatchupCell>>,
    failures: Vec<MatchupFailure>,
}

impl CrossEvaluation {
    fn new(usernames: Vec<String>) -> Self {
        let n = usernames.len();
        let cells = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| if i == j { MatchupCell::NotApplicable } else { MatchupCell::Failed })
                    .collect()
            })
            .collect();
        Self {
            usernames,
            cells,
            failures: Vec::new(),
        }
    }

    pub fn usernames(&self) -> &[String] {
        &self.usernames
    }

    pub fn failures(&self) -> &[MatchupFailure] {
        &self.failures
    }

    pub fn cell(&self, player: &str, opponent: &str) -> Option<MatchupCell> {
        let i = self.index_of(player)?;
        let j = self.index_of(opponent)?;
        Some(self.cells[i][j])
    }

    /// `None` for self-pairings, failed matchups and unknown names
    pub fn win_rate(&self, player: &str, opponent: &str) -> Option<f64> {
        match self.cell(player, opponent)? {
            MatchupCell::Played(result) => Some(result.win_rate),
            MatchupCell::NotApplicable | MatchupCell::Failed => None,
        }
    }

    pub fn overall_stats(&self) -> Vec<OverallStat> {
        self.usernames
            .iter()
            .zip(&self.cells)
            .map(|(username, row)| {
                let (won, battles) = row.iter().fold((0, 0), |(won, battles), cell| match cell {
                    MatchupCell::Played(r) => (won + r.won, battles + r.finished),
                    _ => (won, battles),
                });
                OverallStat {
                    username: username.clone(),
                    won,
                    battles,
                }
            })
            .collect()
    }

    /// Grid table of win rates; `-` on the diagonal, `err` for failed matchups
    pub fn render_table(&self) -> String {
        let mut rows = vec![std::iter::once("-".to_string())
            .chain(self.usernames.iter().cloned())
            .collect::<Vec<_>>()];
        for (username, cells) in self.usernames.iter().zip(&self.cells) {
            let mut row = vec![username.clone()];
            row.extend(cells.iter().map(|cell| match cell {
                MatchupCell::NotApplicable => "-".to_string(),
                MatchupCell::Played(r) => format!("{:.2}", r.win_rate),
                MatchupCell::Failed => "err".to_string(),
            }));
            rows.push(row);
        }

        let widths: Vec<usize> = (0..rows[0].len())
            .map(|c| rows.iter().map(|r| r[c].chars().count()).max().unwrap_or(0))
            .collect();
        let border = |fill: char| {
            let mut line = String::from("+");
            for w in &widths {
                line.push_str(&fill.to_string().repeat(w + 2));
                line.push('+');
            }
            line
        };

        let mut out = String::new();
        let _ = writeln!(out, "{}", border('-'));
        for (n, row) in rows.iter().enumerate() {
            let mut line = String::from("|");
            for (cell, w) in row.iter().zip(&widths) {
                let _ = write!(line, " {:<w$} |", cell, w = *w);
            }
            let _ = writeln!(out, "{}", line);
            let _ = writeln!(out, "{}", border(if n == 0 { '=' } else { '-' }));
        }
        out
    }

    pub fn render_overall(&self) -> String {
        let mut out = String::new();
        for stat in self.overall_stats() {
            let _ = writeln!(
                out,
                "{:20} | Win Rate: {:.1}% ({}/{} battles won)",
                stat.username,
                stat.win_rate() * 100.0,
                stat.won,
                stat.battles
            );
        }
        for failure in &self.failures {
            let _ = writeln!(
                out,
                "{} vs {} failed: {}",
                failure.first, failure.second, failure.error
            );
        }
        out
    }

    fn index_of(&self, username: &str) -> Option<usize> {
        self.usernames.iter().position(|u| u == username)
    }
}

/// Round-robin cross-evaluation with fresh players and teams per matchup
pub struct Tournament {
    factory: Box<dyn PlayerFactory>,
    teams: Box<dyn TeamSource>,
    runner: Box<dyn MatchRunner>,
    settings: TournamentSettings,
}

impl Tournament {
    pub fn new(
        factory: Box<dyn PlayerFactory>,
        teams: Box<dyn TeamSource>,
        runner: Box<dyn MatchRunner>,
        settings: TournamentSettings,
    ) -> Self {
        Self {
            factory,
            teams,
            runner,
            settings,
        }
    }

    /// Everything a tournament file describes except how battles are played
    pub fn from_config(config: &TournamentConfig, runner: Box<dyn MatchRunner>) -> Result<Self> {
        let factory = DefaultPlayerFactory::from_config(config)?;
        let teams = RandomTeamBuilder::from_file(&config.builds_path, config.exclude_format.as_deref())?;
        tracing::info!("Interaction logs go to {:?}", config.log_dir);
        Ok(Self::new(
            Box::new(factory),
            Box::new(teams),
            runner,
            TournamentSettings::from(config),
        ))
    }

    pub fn settings(&self) -> &TournamentSettings {
        &self.settings
    }

    /// Play every unique pairing; a failed matchup is recorded, never fatal
    pub async fn run(&self, players: &[PlayerConfig]) -> CrossEvaluation {
        let usernames: Vec<String> = players.iter().map(|p| p.username.clone()).collect();
        let mut results = CrossEvaluation::new(usernames);
        let pairs = round_robin_pairs(players.len());

        tracing::info!(
            "Starting round robin: {} players, {} matchups, {} battles each",
            players.len(),
            pairs.len(),
            self.settings.n_challenges
        );

        for (matchup, (i, j)) in pairs.into_iter().enumerate() {
            let matchup = matchup + 1;
            let (first, second) = (&players[i], &players[j]);
            tracing::info!("[Matchup {}] {} vs {}", matchup, first.username, second.username);

            match self.play_matchup(first, second, matchup).await {
                Ok((a, b)) => {
                    tracing::info!(
                        "{} won {}/{}, {} won {}/{}",
                        first.username,
                        a.won,
                        a.finished,
                        second.username,
                        b.won,
                        b.finished
                    );
                    results.cells[i][j] = MatchupCell::Played(a);
                    results.cells[j][i] = MatchupCell::Played(b);
                }
                Err(err) => {
                    tracing::warn!(
                        "Matchup {} vs {} failed: {}",
                        first.username,
                        second.username,
                        err
                    );
                    results.failures.push(MatchupFailure {
                        first: first.username.clone(),
                        second: second.username.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        results
    }

    async fn play_matchup(
        &self,
        first: &PlayerConfig,
        second: &PlayerConfig,
        matchup: usize,
    ) -> Result<(PairResult, PairResult)> {
        let first = self.entrant(first, matchup)?;
        let second = self.entrant(second, matchup)?;

        self.runner
            .run_matches(
                &first,
                &second,
                &self.settings.battle_format,
                self.settings.n_challenges,
            )
            .await?;

        let (a, b) = (first.player.record(), second.player.record());
        if self.settings.n_challenges > 0 && (a.finished() == 0 || b.finished() == 0) {
            return Err(ArenaError::Match(format!(
                "runner returned without finishing any of {} battles",
                self.settings.n_challenges
            )));
        }
        Ok((a.into(), b.into()))
    }

    /// Fresh player under a matchup-unique name, with a freshly drawn team
    fn entrant(&self, config: &PlayerConfig, matchup: usize) -> Result<Entrant> {
        let mut config = config.clone();
        config.username = format!("{}_{}", config.username, matchup);
        Ok(Entrant {
            player: self.factory.create_player(&config)?,
            team: self.teams.generate_team(self.settings.team_size)?,
        })
    }
}
