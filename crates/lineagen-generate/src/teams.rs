use rand::Rng;
use rand::seq::index;

use lineagen_core::{DataSourceKind, Platform, Team};

use crate::config::TeamAssignment;
use crate::errors::GenerationError;
use crate::sampling::WeightedTable;

const DEPARTMENTS: &[&str] = &[
    "Engineering",
    "Data Science",
    "Analytics",
    "Finance",
    "Marketing",
    "Sales",
];
const PORTFOLIO_SIZE: std::ops::RangeInclusive<usize> = 3..=5;

/// Fixed team pool plus the policy used to stamp ownership on nodes.
#[derive(Debug, Clone)]
pub struct TeamRegistry {
    teams: Vec<Team>,
    portfolios: Vec<Vec<Platform>>,
    policy: TeamAssignment,
    weights: Option<WeightedTable<usize>>,
}

impl TeamRegistry {
    /// Create `num_teams` teams named `team_0..team_{n-1}`, each owning a
    /// portfolio of 3-5 platforms.
    pub fn create(
        num_teams: usize,
        policy: TeamAssignment,
        rng: &mut impl Rng,
    ) -> Result<Self, GenerationError> {
        if num_teams == 0 {
            return Err(GenerationError::Configuration(
                "num_teams must be > 0".to_string(),
            ));
        }

        let teams = (0..num_teams)
            .map(|index| Team {
                id: format!("team_{index}"),
                name: format!("Team {index}"),
                department: DEPARTMENTS[rng.random_range(0..DEPARTMENTS.len())].to_string(),
            })
            .collect();

        let portfolios = (0..num_teams)
            .map(|_| {
                let size = rng.random_range(PORTFOLIO_SIZE);
                let mut picked: Vec<Platform> = index::sample(&mut *rng, Platform::ALL.len(), size)
                    .into_iter()
                    .map(|slot| Platform::ALL[slot])
                    .collect();
                picked.sort();
                picked
            })
            .collect();

        let weights = match policy {
            TeamAssignment::RoundRobin => None,
            TeamAssignment::Weighted => Some(WeightedTable::new(
                (0..num_teams).map(|index| (index, rng.random_range(1.0..=4.0))),
                "team weights",
            )?),
        };

        Ok(Self {
            teams,
            portfolios,
            policy,
            weights,
        })
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn team(&self, index: usize) -> &Team {
        &self.teams[index % self.teams.len()]
    }

    /// Platforms owned by the team at `index`.
    pub fn portfolio(&self, index: usize) -> &[Platform] {
        &self.portfolios[index % self.portfolios.len()]
    }

    /// Portfolio platforms of `kind` for the team at `index`; empty when the
    /// team owns none of that kind.
    pub fn platforms_of(&self, index: usize, kind: DataSourceKind) -> Vec<Platform> {
        self.portfolio(index)
            .iter()
            .copied()
            .filter(|platform| platform.kind() == kind)
            .collect()
    }

    /// Team index for the node generated at `node_index`.
    pub fn assign(&self, node_index: usize, rng: &mut impl Rng) -> usize {
        let count = self.teams.len();
        match (&self.policy, &self.weights) {
            (TeamAssignment::Weighted, Some(weights)) if node_index >= count => weights.sample(rng),
            _ => node_index % count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::stream_rng;

    #[test]
    fn names_are_deterministic() {
        let mut rng = stream_rng(1, "teams");
        let registry = TeamRegistry::create(3, TeamAssignment::RoundRobin, &mut rng).unwrap();
        let ids: Vec<&str> = registry.teams().iter().map(|team| team.id.as_str()).collect();
        assert_eq!(ids, vec!["team_0", "team_1", "team_2"]);
        assert_eq!(registry.team(1).name, "Team 1");
        assert!(DEPARTMENTS.contains(&registry.team(2).department.as_str()));
    }

    #[test]
    fn round_robin_is_even() {
        let mut rng = stream_rng(2, "teams");
        let registry = TeamRegistry::create(4, TeamAssignment::RoundRobin, &mut rng).unwrap();
        let mut counts = [0usize; 4];
        for index in 0..1_000 {
            counts[registry.assign(index, &mut rng)] += 1;
        }
        assert_eq!(counts, [250; 4]);
    }

    #[test]
    fn weighted_covers_every_team() {
        let mut rng = stream_rng(3, "teams");
        let registry = TeamRegistry::create(5, TeamAssignment::Weighted, &mut rng).unwrap();
        let mut counts = [0usize; 5];
        for index in 0..5 {
            counts[registry.assign(index, &mut rng)] += 1;
        }
        assert!(counts.iter().all(|count| *count == 1));

        for index in 5..5_000 {
            counts[registry.assign(index, &mut rng)] += 1;
        }
        // weights lie in [1, 4], so every team keeps a visible share
        assert!(counts.iter().all(|count| *count > 150), "{counts:?}");
    }

    #[test]
    fn portfolios_hold_three_to_five_platforms() {
        let mut rng = stream_rng(5, "teams");
        let registry = TeamRegistry::create(8, TeamAssignment::RoundRobin, &mut rng).unwrap();
        for team in 0..registry.len() {
            let portfolio = registry.portfolio(team);
            assert!(PORTFOLIO_SIZE.contains(&portfolio.len()), "{portfolio:?}");
            let mut distinct = portfolio.to_vec();
            distinct.dedup();
            assert_eq!(distinct.len(), portfolio.len());
            for platform in portfolio {
                assert!(registry.platforms_of(team, platform.kind()).contains(platform));
            }
        }
    }

    #[test]
    fn zero_teams_is_rejected() {
        let mut rng = stream_rng(4, "teams");
        assert!(TeamRegistry::create(0, TeamAssignment::RoundRobin, &mut rng).is_err());
    }
}
