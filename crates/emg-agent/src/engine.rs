use std::time::{Duration, Instant};

use emg_config::AnimationConfig;
use emg_core::scheduler::{Scheduler, TimerQueue};
use emg_core::visibility::{VisibilityBus, VisibilityCommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::atlas::Scene;
use crate::rotator::GroupRotator;
use crate::sprite::SpriteFrameMachine;
use crate::warning::Warning;

/// Default period of the layer-group rotation.
pub const DEFAULT_GROUP_INTERVAL: Duration = Duration::from_millis(500);

/// A timer the engine hands to its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineTask {
    /// Tick the sprite machine at this index.
    Sprite(usize),
    /// Rotate every enabled group.
    Groups,
}

/// Engine timing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Period between layer-group rotations.
    pub group_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            group_interval: DEFAULT_GROUP_INTERVAL,
        }
    }
}

impl From<&AnimationConfig> for EngineSettings {
    fn from(config: &AnimationConfig) -> Self {
        Self {
            group_interval: Duration::from_millis(config.group_interval_ms),
        }
    }
}

/// What one [`AnimationEngine::advance`] call fired.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvanceReport {
    /// Timers fired, sprite ticks and group rotations together.
    pub ticks: usize,
    /// Missing-data warnings raised while firing them.
    pub warnings: Vec<Warning>,
}

/// Runs every sprite machine and the group rotator of one scene on a single
/// scheduler.
///
/// The engine has no thread and reads no clock. The host calls
/// [`advance`](Self::advance) with the current time (ideally at
/// [`next_deadline`](Self::next_deadline)) and then applies
/// [`drain_commands`](Self::drain_commands) to its surface.
pub struct AnimationEngine<S = TimerQueue<EngineTask>, R = StdRng> {
    scene: Scene,
    settings: EngineSettings,
    machines: Vec<SpriteFrameMachine>,
    rotator: GroupRotator,
    scheduler: S,
    rng: R,
    bus: VisibilityBus,
    running: bool,
}

impl AnimationEngine {
    /// Engine with a fresh timer queue and an entropy-seeded RNG.
    pub fn new(scene: Scene, settings: EngineSettings) -> Self {
        Self::with_parts(scene, settings, TimerQueue::new(), StdRng::from_entropy())
    }

    /// Engine with a reproducible random sequence.
    pub fn seeded(scene: Scene, settings: EngineSettings, seed: u64) -> Self {
        Self::with_parts(scene, settings, TimerQueue::new(), StdRng::seed_from_u64(seed))
    }
}

impl<S: Scheduler<EngineTask>, R: Rng> AnimationEngine<S, R> {
    /// Engine over an explicit scheduler and RNG.
    pub fn with_parts(scene: Scene, settings: EngineSettings, scheduler: S, rng: R) -> Self {
        let machines = build_machines(&scene);
        let rotator = GroupRotator::new(&scene, settings.group_interval);
        let bus = VisibilityBus::with_layers(scene.layer_ids());
        tracing::debug!(
            machines = machines.len(),
            groups = rotator.groups().len(),
            "animation engine ready"
        );
        Self {
            scene,
            settings,
            machines,
            rotator,
            scheduler,
            rng,
            bus,
            running: false,
        }
    }

    /// Start (or resume) animating: every machine is marked running and
    /// ticks at `now`, and every enabled group rotates at `now` so only one
    /// of its members is ever left visible. Calling it while running does
    /// nothing.
    pub fn start(&mut self, now: Instant) {
        if self.running {
            return;
        }
        self.running = true;
        for (i, machine) in self.machines.iter_mut().enumerate() {
            machine.resume();
            self.scheduler.schedule(now, EngineTask::Sprite(i));
        }
        if !self.rotator.groups().is_empty() {
            self.scheduler.schedule(now, EngineTask::Groups);
        }
        tracing::info!(
            machines = self.machines.len(),
            groups = self.rotator.groups().len(),
            "animation started"
        );
    }

    /// Cancel every pending sprite and group timer. Frame indices are kept.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.scheduler.clear();
        tracing::info!("animation stopped");
    }

    /// Stop, rewind every machine to frame 0 and start again.
    pub fn restart(&mut self, now: Instant) {
        self.stop();
        for machine in &mut self.machines {
            machine.restart();
        }
        self.start(now);
    }

    /// Fire every timer due at `now`, in deadline order. Timers missed by a
    /// late call are caught up one by one.
    pub fn advance(&mut self, now: Instant) -> AdvanceReport {
        let mut report = AdvanceReport::default();
        if !self.running {
            return report;
        }
        while let Some((fired_at, task)) = self.scheduler.pop_due(now) {
            report.ticks += 1;
            match task {
                EngineTask::Sprite(i) => {
                    let Some(machine) = self.machines.get_mut(i) else {
                        continue;
                    };
                    let tick = machine.tick(&self.scene, &mut self.bus, &mut self.rng);
                    report.warnings.extend(tick.warnings);
                    if tick.running {
                        self.scheduler
                            .schedule_after(fired_at, machine.interval(), task);
                    } else {
                        tracing::debug!(layer_id = %machine.layer_id(), "sprite animation finished");
                    }
                }
                EngineTask::Groups => {
                    let rotation = self.rotator.rotate(&self.scene, &mut self.bus, &mut self.rng);
                    report.warnings.extend(rotation.warnings);
                    self.scheduler
                        .schedule_after(fired_at, self.rotator.interval(), task);
                }
            }
        }
        report
    }

    /// Swap in a new scene. Machines, groups and visibility are rebuilt;
    /// pending commands for the old scene are dropped. A running engine
    /// keeps running on the new scene from `now`.
    pub fn replace_scene(&mut self, scene: Scene, now: Instant) {
        let was_running = self.running;
        self.stop();
        self.machines = build_machines(&scene);
        self.rotator = GroupRotator::new(&scene, self.settings.group_interval);
        self.bus = VisibilityBus::with_layers(scene.layer_ids());
        self.scene = scene;
        if was_running {
            self.start(now);
        }
    }

    /// Visibility changes since the last drain, in emission order.
    pub fn drain_commands(&mut self) -> Vec<VisibilityCommand> {
        self.bus.drain()
    }

    /// Whether visibility changes are waiting to be drained.
    pub fn has_pending_commands(&self) -> bool {
        self.bus.has_pending()
    }

    /// Current visibility of a layer. Every layer starts visible.
    pub fn is_visible(&self, layer_id: &str) -> bool {
        self.bus.is_visible(layer_id)
    }

    /// Whether the engine is started.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// When the next timer is due; `None` when stopped or idle.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Number of scheduled sprite and group timers.
    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending()
    }

    /// The scene being animated.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Every sprite machine, in layer declaration order.
    pub fn machines(&self) -> &[SpriteFrameMachine] {
        &self.machines
    }

    /// Machine driving the sprite layer `layer_id`.
    pub fn machine(&self, layer_id: &str) -> Option<&SpriteFrameMachine> {
        self.machines.iter().find(|m| m.layer_id() == layer_id)
    }
}

/// One machine per sprite layer with a usable animation, in layer order.
fn build_machines(scene: &Scene) -> Vec<SpriteFrameMachine> {
    scene
        .layers()
        .iter()
        .filter_map(|layer| {
            let animation_id = layer.animation_id()?;
            SpriteFrameMachine::new(&layer.id, animation_id, scene).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use emg_config::AtlasDescription;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Holder `h` animates frames `f0..f2` at 10 fps with loop code `mode`;
    /// group `bg` has textures `a` and `b`.
    fn scene_json(mode: i64, with_group: bool) -> String {
        let template = if with_group { r#"[{"g": "bg"}]"# } else { "[]" };
        format!(
            r#"{{
            "layers": [
                {{ "imgType": "Sprite", "assignID": "h", "animID": "anim" }},
                {{ "imgType": "Sprite", "assignID": "f0" }},
                {{ "imgType": "Sprite", "assignID": "f1" }},
                {{ "imgType": "Sprite", "assignID": "f2" }},
                {{ "imgType": "Texture", "textureID": "a", "group": "bg" }},
                {{ "imgType": "Texture", "textureID": "b", "group": "bg" }}
            ],
            "sprites": [{{ "anim": [{{ "useTex": ["f0", "f1", "f2"], "fps": 10, "loop": {mode} }}] }}],
            "templateGroups": {template}
        }}"#
        )
    }

    fn engine(mode: i64, with_group: bool) -> AnimationEngine {
        let description = AtlasDescription::from_json_str(&scene_json(mode, with_group)).unwrap();
        AnimationEngine::seeded(
            Scene::from_description(&description),
            EngineSettings::default(),
            42,
        )
    }

    fn visible_frame(engine: &AnimationEngine) -> Vec<usize> {
        (0..3)
            .filter(|i| engine.is_visible(&format!("f{i}")))
            .collect()
    }

    #[test]
    fn once_animation_fires_exactly_three_ticks() {
        let mut engine = engine(0, false);
        let t0 = Instant::now();
        engine.start(t0);
        let report = engine.advance(t0 + Duration::from_secs(10));
        assert_eq!(report.ticks, 3);
        assert!(!engine.machine("h").unwrap().is_running());
        assert_eq!(engine.pending_timers(), 0, "no further tick scheduled");
        assert_eq!(visible_frame(&engine), [2]);
        assert_eq!(engine.advance(t0 + Duration::from_secs(20)).ticks, 0);
    }

    #[test]
    fn loop_animation_frame_sequence_on_virtual_clock() {
        let mut engine = engine(1, false);
        let t0 = Instant::now();
        engine.start(t0);
        let mut seen = Vec::new();
        for step in 0..5 {
            let report = engine.advance(t0 + ms(100 * step));
            assert_eq!(report.ticks, 1, "step {step}");
            seen.extend(visible_frame(&engine));
        }
        assert_eq!(seen, [0, 1, 2, 0, 1]);
    }

    #[test]
    fn groups_rotate_immediately_on_start() {
        let mut engine = engine(1, true);
        let t0 = Instant::now();
        engine.start(t0);
        assert_eq!(engine.advance(t0).ticks, 2, "sprite and group");
        assert!(engine.is_visible("a") != engine.is_visible("b"));
    }

    #[test]
    fn group_members_never_both_visible_across_ticks() {
        let mut engine = engine(1, true);
        let t0 = Instant::now();
        engine.start(t0);
        for step in 0..12 {
            engine.advance(t0 + ms(100 * step));
            assert!(
                !(engine.is_visible("a") && engine.is_visible("b")),
                "step {step}"
            );
        }

        engine.restart(t0 + ms(1500));
        engine.advance(t0 + ms(1500));
        assert!(engine.is_visible("a") != engine.is_visible("b"));
    }

    #[test]
    fn replaced_scene_groups_rotate_from_now() {
        let mut engine = engine(1, false);
        let t0 = Instant::now();
        engine.start(t0);
        let description = AtlasDescription::from_json_str(&scene_json(1, true)).unwrap();
        engine.replace_scene(Scene::from_description(&description), t0 + ms(50));
        engine.advance(t0 + ms(50));
        assert!(engine.is_visible("a") != engine.is_visible("b"));
    }

    #[test]
    fn group_timer_repeats_every_interval() {
        let mut engine = engine(0, true);
        let t0 = Instant::now();
        engine.start(t0);
        assert_eq!(engine.advance(t0 + ms(300)).ticks, 4, "three frames and a rotation");
        let report = engine.advance(t0 + ms(1600));
        assert_eq!(report.ticks, 3, "rotations at 500, 1000 and 1500 ms");
        assert_eq!(engine.next_deadline(), Some(t0 + ms(2000)));
    }

    #[test]
    fn stop_cancels_everything() {
        let mut engine = engine(1, true);
        let t0 = Instant::now();
        engine.start(t0);
        engine.advance(t0);
        engine.drain_commands();

        engine.stop();
        assert!(!engine.is_running());
        assert_eq!(engine.pending_timers(), 0);
        assert_eq!(engine.next_deadline(), None);
        assert_eq!(engine.advance(t0 + Duration::from_secs(5)).ticks, 0);
        assert!(!engine.has_pending_commands());
    }

    #[test]
    fn start_resumes_without_rewinding() {
        let mut engine = engine(1, false);
        let t0 = Instant::now();
        engine.start(t0);
        engine.advance(t0 + ms(100));
        assert_eq!(engine.machine("h").unwrap().frame_index(), 2);

        engine.stop();
        engine.start(t0 + ms(1000));
        engine.start(t0 + ms(1000));
        assert_eq!(engine.pending_timers(), 1, "second start is a no-op");
        engine.advance(t0 + ms(1000));
        assert_eq!(visible_frame(&engine), [2]);
    }

    #[test]
    fn restart_rewinds_every_machine() {
        let mut engine = engine(0, false);
        let t0 = Instant::now();
        engine.start(t0);
        engine.advance(t0 + Duration::from_secs(1));
        assert!(!engine.machine("h").unwrap().is_running());

        engine.restart(t0 + Duration::from_secs(2));
        assert_eq!(engine.machine("h").unwrap().frame_index(), 0);
        let report = engine.advance(t0 + Duration::from_secs(3));
        assert_eq!(report.ticks, 3);
    }

    #[test]
    fn commands_drain_in_emission_order() {
        let mut engine = engine(1, false);
        let t0 = Instant::now();
        engine.start(t0);
        engine.advance(t0);
        let first: Vec<(String, bool)> = engine
            .drain_commands()
            .into_iter()
            .map(|c| (c.layer_id, c.visible))
            .collect();
        assert_eq!(first, [("f1".to_string(), false), ("f2".to_string(), false)]);

        engine.advance(t0 + ms(100));
        let second: Vec<(String, bool)> = engine
            .drain_commands()
            .into_iter()
            .map(|c| (c.layer_id, c.visible))
            .collect();
        assert_eq!(second, [("f0".to_string(), false), ("f1".to_string(), true)]);
        assert!(engine.drain_commands().is_empty());
    }

    #[test]
    fn undeclared_animation_gets_no_machine() {
        let json = r#"{ "layers": [{ "imgType": "Sprite", "assignID": "h", "animID": "ghost" }] }"#;
        let scene = Scene::from_description(&AtlasDescription::from_json_str(json).unwrap());
        let mut engine = AnimationEngine::seeded(scene, EngineSettings::default(), 1);
        assert!(engine.machines().is_empty());
        let t0 = Instant::now();
        engine.start(t0);
        assert_eq!(engine.advance(t0 + Duration::from_secs(1)).ticks, 0);
    }

    #[test]
    fn replace_scene_swaps_everything() {
        let mut engine = engine(1, true);
        let t0 = Instant::now();
        engine.start(t0);
        engine.advance(t0 + ms(600));

        let json = r#"{ "layers": [{ "imgType": "Texture", "textureID": "solo" }] }"#;
        let next = Scene::from_description(&AtlasDescription::from_json_str(json).unwrap());
        engine.replace_scene(next, t0 + ms(700));

        assert!(engine.is_running());
        assert!(engine.machines().is_empty());
        assert!(!engine.has_pending_commands());
        assert_eq!(engine.pending_timers(), 0);
        assert!(engine.scene().layer("solo").is_some());
        assert!(engine.scene().layer("h").is_none());
    }

    #[test]
    fn settings_from_config() {
        let config = AnimationConfig {
            group_interval_ms: 250,
            autostart: false,
        };
        assert_eq!(EngineSettings::from(&config).group_interval, ms(250));
    }
}
