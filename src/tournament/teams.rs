//! Team assignment for tournament matchups
//!
//! Builds are Showdown-format sets kept in one text file, separated by lines of
//! `=` characters. Lines starting with `#` are annotations (source, format
//! tags) and never reach the team text.

use crate::core::error::{ArenaError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// A separator line is at least this many `=` and nothing else
const SEPARATOR_MIN_LEN: usize = 10;

/// A team in Showdown import format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRoster {
    builds: Vec<String>,
}

impl TeamRoster {
    pub fn new(builds: Vec<String>) -> Self {
        Self { builds }
    }

    pub fn builds(&self) -> &[String] {
        &self.builds
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }
}

impl fmt::Display for TeamRoster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.builds.join("\n\n"))
    }
}

/// Collaborator that hands out a team for each side of a matchup
pub trait TeamSource: Send + Sync {
    fn generate_team(&self, team_size: usize) -> Result<TeamRoster>;
}

/// Samples distinct builds uniformly at random from a builds file
pub struct RandomTeamBuilder {
    builds: Vec<String>,
    rng: Mutex<StdRng>,
}

impl RandomTeamBuilder {
    /// Parse builds text, dropping any build tagged with `exclude_format`
    pub fn parse(contents: &str, exclude_format: Option<&str>) -> Self {
        let exclude = exclude_format
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_lowercase);

        let builds = split_builds(contents)
            .into_iter()
            .filter(|block| match &exclude {
                Some(label) => !is_tagged(block, label),
                None => true,
            })
            .filter_map(|block| clean_build(&block))
            .collect();

        Self {
            builds,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn from_file(path: &Path, exclude_format: Option<&str>) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ArenaError::Team(format!("Failed to read builds file {:?}: {}", path, e))
        })?;
        let builder = Self::parse(&contents, exclude_format);
        tracing::info!("Loaded {} builds from {:?}", builder.len(), path);
        Ok(builder)
    }

    /// Reseed for reproducible draws
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn builds(&self) -> &[String] {
        &self.builds
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }
}

impl TeamSource for RandomTeamBuilder {
    fn generate_team(&self, team_size: usize) -> Result<TeamRoster> {
        if team_size > self.builds.len() {
            return Err(ArenaError::Team(format!(
                "Requested team size {} exceeds available builds {}",
                team_size,
                self.builds.len()
            )));
        }
        let mut rng = match self.rng.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        };
        let picked = self
            .builds
            .choose_multiple(&mut *rng, team_size)
            .cloned()
            .collect();
        Ok(TeamRoster::new(picked))
    }
}

fn is_separator(line: &str) -> bool {
    let line = line.trim();
    line.len() >= SEPARATOR_MIN_LEN && line.chars().all(|c| c == '=')
}

fn split_builds(contents: &str) -> Vec<String> {
    let mut blocks = vec![String::new()];
    for line in contents.lines() {
        if is_separator(line) {
            blocks.push(String::new());
        } else if let Some(block) = blocks.last_mut() {
            block.push_str(line);
            block.push('\n');
        }
    }
    blocks
}

/// Whether a comment line of the block names `label` as a whole word
fn is_tagged(block: &str, label: &str) -> bool {
    block
        .lines()
        .filter_map(|line| line.trim().strip_prefix('#'))
        .any(|comment| {
            comment
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == label)
        })
}

fn clean_build(block: &str) -> Option<String> {
    let kept: Vec<&str> = block
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect();
    let build = kept.join("\n").trim().to_string();
    (!build.is_empty()).then_some(build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const BUILDS: &str = "\
# Source: smogon
# Format: gen3ubers
Kyogre @ Leftovers
Ability: Drizzle
- Surf
============================================================
# Format: doubles
Groudon @ Leftovers
- Earthquake
============================================================
# Format: gen3ubers
Mewtwo @ Lum Berry
- Psychic
============================================================
# Note: strong in doublesnot
Latios @ Soul Dew
- Dragon Claw
============================================================
";

    #[test]
    fn test_parse_strips_comments_and_empties() {
        let builder = RandomTeamBuilder::parse(BUILDS, None);
        assert_eq!(builder.len(), 4);
        assert!(builder.builds()[0].starts_with("Kyogre @ Leftovers"));
        assert!(builder.builds().iter().all(|b| !b.contains('#')));
    }

    #[test]
    fn test_exclusion_is_whole_word_on_comments() {
        let builder = RandomTeamBuilder::parse(BUILDS, Some("Doubles"));
        let species: Vec<&str> = builder
            .builds()
            .iter()
            .filter_map(|b| b.split_whitespace().next())
            .collect();
        assert_eq!(species, vec!["Kyogre", "Mewtwo", "Latios"]);
    }

    #[test]
    fn test_team_has_distinct_builds() {
        let builder = RandomTeamBuilder::parse(BUILDS, None).with_seed(9);
        for _ in 0..20 {
            let team = builder.generate_team(3).unwrap();
            let unique: HashSet<&String> = team.builds().iter().collect();
            assert_eq!(unique.len(), 3);
        }
    }

    #[test]
    fn test_team_too_large_is_error() {
        let builder = RandomTeamBuilder::parse(BUILDS, Some("doubles"));
        assert!(matches!(builder.generate_team(4), Err(ArenaError::Team(_))));
    }

    #[test]
    fn test_roster_display_is_showdown_text() {
        let team = TeamRoster::new(vec!["Kyogre\n- Surf".into(), "Mewtwo\n- Psychic".into()]);
        assert_eq!(team.to_string(), "Kyogre\n- Surf\n\nMewtwo\n- Psychic");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("builds.txt");
        fs::write(&path, BUILDS).unwrap();
        let builder = RandomTeamBuilder::from_file(&path, None).unwrap();
        assert_eq!(builder.len(), 4);
        assert!(RandomTeamBuilder::from_file(&dir.path().join("missing.txt"), None).is_err());
    }
}
