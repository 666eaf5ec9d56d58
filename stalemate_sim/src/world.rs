//! World builder: processes, plans and resource pools for a scenario.

use crate::scenarios::ScenarioId;
use crate::seeds::SeedSchedule;
use clap::ValueEnum;
use rand::seq::SliceRandom;
use rand::Rng;
use stalemate_core::{ConcurrentScenario, Policy, Resource, WorkerSpec};
use stalemate_env::{ProcessId, ResourceId};

/// Predefined contention levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContentionPreset {
    /// Few processes over many resources
    Low,
    /// Many processes over few resources
    High,
}

impl ContentionPreset {
    /// Default (processes, resources) of the preset.
    pub fn shape(self) -> (usize, usize) {
        match self {
            ContentionPreset::Low => (3, 10),
            ContentionPreset::High => (10, 3),
        }
    }
}

/// Scenario-shaping inputs of a discrete world.
#[derive(Debug, Clone, Default)]
pub struct WorldConfig {
    /// Process count (None = preset default)
    pub processes: Option<usize>,

    /// Resource count, ignored when typed counts are given
    pub resources: Option<usize>,

    /// Typed resource counts (A1.., B1.., C1..)
    pub res_a: Option<usize>,
    pub res_b: Option<usize>,
    pub res_c: Option<usize>,

    /// Contention preset
    pub contention: Option<ContentionPreset>,

    /// Use the fixed three-process demo instead of random plans
    pub demo: bool,
}

/// Resources and per-process plans of a discrete run.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteWorld {
    pub resources: Vec<Resource>,
    pub plans: Vec<Vec<ResourceId>>,
}

impl WorldConfig {
    /// The deterministic demo world.
    pub fn demo() -> Self {
        Self {
            demo: true,
            ..Self::default()
        }
    }

    fn has_typed_resources(&self) -> bool {
        self.res_a.is_some() || self.res_b.is_some() || self.res_c.is_some()
    }

    /// Builds the discrete world.
    ///
    /// Demo: `P1:[R1,R2]`, `P2:[R2,R1]`, `P3:[R1]` over `R1`, `R2`.
    /// Otherwise each process plans two distinct resources (one if only one
    /// exists) sampled from the world seed stream.
    pub fn build(&self, seeds: &SeedSchedule) -> DiscreteWorld {
        if self.demo {
            return DiscreteWorld {
                resources: numbered_resources(2),
                plans: vec![
                    vec![ResourceId::new(0), ResourceId::new(1)],
                    vec![ResourceId::new(1), ResourceId::new(0)],
                    vec![ResourceId::new(0)],
                ],
            };
        }

        let (default_processes, default_resources) = self.contention.map_or((5, 5), ContentionPreset::shape);
        let resources = if self.has_typed_resources() {
            let counts = [self.res_a, self.res_b, self.res_c].map(|c| c.unwrap_or(0));
            if counts.iter().sum::<usize>() == 0 {
                typed_resources([1, 1, 1])
            } else {
                typed_resources(counts)
            }
        } else {
            numbered_resources(self.resources.unwrap_or(default_resources))
        };
        let num_processes = self.processes.unwrap_or(default_processes);

        let ids: Vec<ResourceId> = resources.iter().map(|r| r.id).collect();
        let want = ids.len().min(2);
        let mut rng = seeds.world_rng();
        let plans = (0..num_processes)
            .map(|_| ids.choose_multiple(&mut rng, want).copied().collect())
            .collect();

        DiscreteWorld { resources, plans }
    }
}

/// `R1..Rn`, all unit resources.
fn numbered_resources(count: usize) -> Vec<Resource> {
    (0..count)
        .map(|i| Resource::unit(ResourceId::new(i), format!("R{}", i + 1)))
        .collect()
}

/// `A1..`, `B1..`, `C1..` in that global order.
fn typed_resources(counts: [usize; 3]) -> Vec<Resource> {
    let mut resources = Vec::new();
    for (prefix, count) in ["A", "B", "C"].into_iter().zip(counts) {
        for i in 0..count {
            let id = ResourceId::new(resources.len());
            resources.push(Resource::unit(id, format!("{}{}", prefix, i + 1)));
        }
    }
    resources
}

// ============================================================================
// CONCURRENT SHAPES
// ============================================================================

/// Builds the concurrent scenario for `workers` workers.
///
/// - naive / retry: even workers take A then B, odd workers B then A
/// - ordered: everyone takes A then B
/// - banker: countable A and B with `max(2, workers - 1)` units each;
///   every worker claims 1 or 2 of each, drawn from the claims stream
pub fn concurrent_scenario(
    scenario: ScenarioId,
    policy: Policy,
    workers: usize,
    seeds: &SeedSchedule,
) -> ConcurrentScenario {
    let a = ResourceId::new(0);
    let b = ResourceId::new(1);

    if scenario == ScenarioId::Banker {
        let capacity = workers.saturating_sub(1).max(2) as i64;
        let mut rng = seeds.claims_rng(scenario);
        let workers = (0..workers)
            .map(|i| {
                let claim = vec![1 + rng.gen_range(0..=1), 1 + rng.gen_range(0..=1)];
                WorkerSpec::with_claim(ProcessId::new(i), claim)
            })
            .collect();
        return ConcurrentScenario {
            policy,
            resources: vec![Resource::countable(a, "A", capacity), Resource::countable(b, "B", capacity)],
            workers,
        };
    }

    let alternate = matches!(scenario, ScenarioId::Naive | ScenarioId::Retry);
    let workers = (0..workers)
        .map(|i| {
            let plan = if alternate && i % 2 == 1 { vec![b, a] } else { vec![a, b] };
            WorkerSpec::with_plan(ProcessId::new(i), plan)
        })
        .collect();
    ConcurrentScenario {
        policy,
        resources: vec![Resource::unit(a, "A"), Resource::unit(b, "B")],
        workers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_world() {
        let world = WorldConfig::demo().build(&SeedSchedule::new(42));
        let names: Vec<&str> = world.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["R1", "R2"]);
        assert_eq!(world.plans[1], vec![ResourceId::new(1), ResourceId::new(0)]);
        assert_eq!(world.plans[2], vec![ResourceId::new(0)]);
    }

    #[test]
    fn test_presets() {
        let seeds = SeedSchedule::new(42);
        let low = WorldConfig {
            contention: Some(ContentionPreset::Low),
            ..WorldConfig::default()
        }
        .build(&seeds);
        assert_eq!((low.plans.len(), low.resources.len()), (3, 10));

        let high = WorldConfig {
            contention: Some(ContentionPreset::High),
            ..WorldConfig::default()
        }
        .build(&seeds);
        assert_eq!((high.plans.len(), high.resources.len()), (10, 3));

        let default = WorldConfig::default().build(&seeds);
        assert_eq!((default.plans.len(), default.resources.len()), (5, 5));
    }

    #[test]
    fn test_random_plans_are_distinct_pairs_and_seeded() {
        let config = WorldConfig::default();
        let first = config.build(&SeedSchedule::new(42));
        let again = config.build(&SeedSchedule::new(42));
        assert_eq!(first, again);
        for plan in &first.plans {
            assert_eq!(plan.len(), 2);
            assert_ne!(plan[0], plan[1]);
        }
    }

    #[test]
    fn test_single_resource_plans() {
        let world = WorldConfig {
            processes: Some(2),
            resources: Some(1),
            ..WorldConfig::default()
        }
        .build(&SeedSchedule::new(1));
        assert_eq!(world.plans, vec![vec![ResourceId::new(0)]; 2]);
    }

    #[test]
    fn test_typed_resources() {
        let world = WorldConfig {
            res_a: Some(2),
            res_c: Some(1),
            resources: Some(9),
            ..WorldConfig::default()
        }
        .build(&SeedSchedule::new(42));
        let names: Vec<&str> = world.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A1", "A2", "C1"]);

        let all_zero = WorldConfig {
            res_a: Some(0),
            ..WorldConfig::default()
        }
        .build(&SeedSchedule::new(42));
        let names: Vec<&str> = all_zero.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A1", "B1", "C1"]);
    }

    #[test]
    fn test_concurrent_shapes() {
        let seeds = SeedSchedule::new(42);
        let naive = concurrent_scenario(ScenarioId::Naive, Policy::Naive, 3, &seeds);
        assert_eq!(naive.workers[0].plan, vec![ResourceId::new(0), ResourceId::new(1)]);
        assert_eq!(naive.workers[1].plan, vec![ResourceId::new(1), ResourceId::new(0)]);
        assert_eq!(naive.workers[2].plan, vec![ResourceId::new(0), ResourceId::new(1)]);

        let ordered = concurrent_scenario(ScenarioId::Ordered, Policy::Ordered, 2, &seeds);
        assert!(ordered.workers.iter().all(|w| w.plan == vec![ResourceId::new(0), ResourceId::new(1)]));
    }

    #[test]
    fn test_banker_pool_and_claims() {
        let seeds = SeedSchedule::new(42);
        let banker = concurrent_scenario(ScenarioId::Banker, Policy::Banker, 4, &seeds);
        assert_eq!(banker.resources[0].capacity, 3);
        assert_eq!(banker.resources[1].capacity, 3);
        for worker in &banker.workers {
            assert!(worker.claim.iter().all(|&c| (1..=2).contains(&c)));
        }

        let small = concurrent_scenario(ScenarioId::Banker, Policy::Banker, 2, &seeds);
        assert_eq!(small.resources[0].capacity, 2);
    }
}
