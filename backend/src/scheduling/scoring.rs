//! Ranking of placement candidates.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::{Candidate, ResourceSnapshot, ScheduleState};
use crate::models::VirtualClass;

/// Score contributions; defaults mirror the center's standard policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_availability_violation")]
    pub availability_violation: i32,
    #[serde(default = "default_preferred_teacher")]
    pub preferred_teacher: i32,
    #[serde(default = "default_heavy_workload")]
    pub heavy_workload: i32,
    #[serde(default = "default_heavy_workload_threshold")]
    pub heavy_workload_threshold: u32,
    #[serde(default = "default_early_start")]
    pub early_start: i32,
    #[serde(default = "default_early_start_before_minute")]
    pub early_start_before_minute: u32,
    #[serde(default = "default_tighter_fit")]
    pub tighter_fit: i32,
}

fn default_availability_violation() -> i32 {
    -1000
}

fn default_preferred_teacher() -> i32 {
    100
}

fn default_heavy_workload() -> i32 {
    -50
}

fn default_heavy_workload_threshold() -> u32 {
    2
}

fn default_early_start() -> i32 {
    10
}

fn default_early_start_before_minute() -> u32 {
    720
}

fn default_tighter_fit() -> i32 {
    1
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            availability_violation: default_availability_violation(),
            preferred_teacher: default_preferred_teacher(),
            heavy_workload: default_heavy_workload(),
            heavy_workload_threshold: default_heavy_workload_threshold(),
            early_start: default_early_start(),
            early_start_before_minute: default_early_start_before_minute(),
            tighter_fit: default_tighter_fit(),
        }
    }
}

pub struct ScoringHeuristic<'a> {
    snapshot: &'a ResourceSnapshot,
    weights: &'a ScoringWeights,
}

impl<'a> ScoringHeuristic<'a> {
    pub fn new(snapshot: &'a ResourceSnapshot, weights: &'a ScoringWeights) -> Self {
        Self { snapshot, weights }
    }

    /// Score of a candidate on its own, without the pairwise room-fit bonus.
    pub fn base_score(&self, candidate: &Candidate, class: &VirtualClass, state: &ScheduleState) -> i32 {
        let w = self.weights;
        let p = candidate.placement;
        let mut score = 0;
        if candidate.violates_availability {
            score += w.availability_violation;
        }
        if class.preferred_teacher == Some(self.snapshot.teachers[p.teacher].id) {
            score += w.preferred_teacher;
        }
        if state.workload(p.teacher, p.day) >= w.heavy_workload_threshold {
            score += w.heavy_workload;
        }
        if candidate.start_minute < w.early_start_before_minute {
            score += w.early_start;
        }
        score
    }

    /// Pairwise score: base score plus the tighter-fit bonus against `other`.
    pub fn score_against(
        &self,
        candidate: &Candidate,
        other: &Candidate,
        class: &VirtualClass,
        state: &ScheduleState,
    ) -> i32 {
        let mut score = self.base_score(candidate, class, state);
        if candidate.room_surplus < other.room_surplus {
            score += self.weights.tighter_fit;
        }
        score
    }

    /// Orders `a` before `b` when `a` scores higher against `b`.
    pub fn compare(
        &self,
        a: &Candidate,
        b: &Candidate,
        class: &VirtualClass,
        state: &ScheduleState,
    ) -> Ordering {
        let sa = self.score_against(a, b, class, state);
        let sb = self.score_against(b, a, class, state);
        sb.cmp(&sa)
    }

    /// Sort candidates best first. The sort is stable, so ties keep discovery order.
    pub fn rank(&self, candidates: &mut [Candidate], class: &VirtualClass, state: &ScheduleState) {
        candidates.sort_by_cached_key(|c| {
            (
                std::cmp::Reverse(self.base_score(c, class, state)),
                c.room_surplus,
            )
        });
    }

    /// The top-ranked candidate.
    pub fn best(
        &self,
        mut candidates: Vec<Candidate>,
        class: &VirtualClass,
        state: &ScheduleState,
    ) -> Option<Candidate> {
        self.rank(&mut candidates, class, state);
        candidates.into_iter().next()
    }
}
