use std::time::Duration;

use emg_core::visibility::VisibilitySink;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::atlas::Scene;
use crate::warning::{raise, Warning};

/// Result of one rotation pass over every enabled group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RotationReport {
    /// `(group, revealed layer id)` for each group that rotated.
    pub revealed: Vec<(String, String)>,
    /// Groups skipped for having fewer than two members.
    pub warnings: Vec<Warning>,
}

/// Periodically shows one random texture layer per enabled group.
#[derive(Debug, Clone)]
pub struct GroupRotator {
    groups: Vec<String>,
    interval: Duration,
}

impl GroupRotator {
    /// Rotator over every enabled group of `scene`.
    pub fn new(scene: &Scene, interval: Duration) -> Self {
        Self {
            groups: scene.enabled_groups().map(str::to_string).collect(),
            interval,
        }
    }

    /// Enabled group names, sorted.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Period between rotations.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One pass: per group, hide every member then reveal one at random.
    pub fn rotate<S, R>(&self, scene: &Scene, sink: &mut S, rng: &mut R) -> RotationReport
    where
        S: VisibilitySink + ?Sized,
        R: Rng + ?Sized,
    {
        let mut report = RotationReport::default();
        for group in &self.groups {
            let members = scene.group_members(group);
            if members.len() < 2 {
                report.warnings.push(raise(Warning::TooFewGroupMembers {
                    group: group.clone(),
                    members: members.len(),
                }));
                continue;
            }
            for layer in &members {
                sink.set_visible(&layer.id, false);
            }
            if let Some(chosen) = members.choose(rng) {
                sink.set_visible(&chosen.id, true);
                report.revealed.push((group.clone(), chosen.id.clone()));
            }
        }
        report
    }
}
