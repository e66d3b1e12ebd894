use std::time::Duration;

use emg_core::visibility::VisibilitySink;
use rand::Rng;

use crate::atlas::{Scene, SpriteAnimation};
use crate::types::LoopMode;
use crate::warning::{raise, Warning};

/// What one sprite tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Frame index shown by this tick.
    pub shown: usize,
    /// Frame index the next tick will show.
    pub next: usize,
    /// `false` once a play-once animation has shown its last frame.
    pub running: bool,
    /// Missing-data warnings raised during the tick.
    pub warnings: Vec<Warning>,
}

/// Frame-advance state machine for one sprite layer.
///
/// Each [`tick`](Self::tick) shows `frames[frame_index]`, hides the other
/// frames of the same animation and then moves `frame_index` according to
/// the animation's [`LoopMode`]. The machine never schedules itself; the
/// engine calls `tick` every [`interval`](Self::interval).
#[derive(Debug, Clone)]
pub struct SpriteFrameMachine {
    layer_id: String,
    animation: SpriteAnimation,
    interval: Duration,
    frame_index: usize,
    running: bool,
}

impl SpriteFrameMachine {
    /// Bind `layer_id` to its declared animation.
    ///
    /// Fails (with the warning already logged) when the animation is
    /// undeclared, has no frames, or has an unusable frame rate.
    pub fn new(layer_id: &str, animation_id: &str, scene: &Scene) -> Result<Self, Warning> {
        let Some(animation) = scene.animation(animation_id) else {
            return Err(raise(Warning::MissingAnimation {
                layer_id: layer_id.to_string(),
                anim_id: animation_id.to_string(),
            }));
        };
        Self::from_animation(layer_id, animation.clone())
    }

    /// Machine over an already-built animation. Fails when the animation
    /// has no frames or an unusable fps.
    pub fn from_animation(layer_id: &str, animation: SpriteAnimation) -> Result<Self, Warning> {
        if animation.frames.is_empty() {
            return Err(raise(Warning::EmptyAnimation {
                anim_id: animation.id,
            }));
        }
        let Some(interval) = animation.frame_interval() else {
            return Err(raise(Warning::InvalidFps {
                anim_id: animation.id,
                fps: animation.fps,
            }));
        };
        Ok(Self {
            layer_id: layer_id.to_string(),
            animation,
            interval,
            frame_index: 0,
            running: true,
        })
    }

    /// The sprite holder layer this machine drives.
    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    /// The animation being played.
    pub fn animation(&self) -> &SpriteAnimation {
        &self.animation
    }

    /// Delay between two ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Index of the frame the next tick shows.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Layer id of the frame the next tick will show.
    pub fn current_frame_id(&self) -> &str {
        &self.animation.frames[self.frame_index]
    }

    /// Whether further ticks will advance.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Mark running again, keeping the frame index.
    pub fn resume(&mut self) {
        self.running = true;
    }

    /// Back to frame 0, running.
    pub fn restart(&mut self) {
        self.frame_index = 0;
        self.running = true;
    }

    /// Show the current frame and advance. A stopped machine does nothing.
    pub fn tick<S, R>(&mut self, scene: &Scene, sink: &mut S, rng: &mut R) -> TickReport
    where
        S: VisibilitySink + ?Sized,
        R: Rng + ?Sized,
    {
        let mut warnings = Vec::new();
        let shown = self.frame_index;
        if !self.running {
            return TickReport {
                shown,
                next: shown,
                running: false,
                warnings,
            };
        }

        self.show_frame(scene, sink, &mut warnings);
        self.advance(rng, &mut warnings);

        TickReport {
            shown,
            next: self.frame_index,
            running: self.running,
            warnings,
        }
    }

    /// All hides first, then the one reveal. If the current frame's layer is
    /// missing nothing is touched, so the previous frame stays up.
    fn show_frame<S>(&self, scene: &Scene, sink: &mut S, warnings: &mut Vec<Warning>)
    where
        S: VisibilitySink + ?Sized,
    {
        let current = self.current_frame_id();
        if scene.layer(current).is_none() {
            warnings.push(raise(Warning::MissingFrameLayer {
                anim_id: self.animation.id.clone(),
                layer_id: current.to_string(),
            }));
            return;
        }
        for other in self.animation.frames.iter().filter(|f| *f != current) {
            if scene.layer(other).is_some() {
                sink.set_visible(other, false);
            } else {
                warnings.push(raise(Warning::MissingFrameLayer {
                    anim_id: self.animation.id.clone(),
                    layer_id: other.clone(),
                }));
            }
        }
        sink.set_visible(current, true);
    }

    fn advance<R>(&mut self, rng: &mut R, warnings: &mut Vec<Warning>)
    where
        R: Rng + ?Sized,
    {
        let len = self.animation.frames.len();
        let looped = (self.frame_index + 1) % len;
        let anim_id = || self.animation.id.clone();
        self.frame_index = match self.animation.loop_mode {
            LoopMode::Once => {
                if self.frame_index + 1 >= len {
                    self.running = false;
                    self.frame_index
                } else {
                    self.frame_index + 1
                }
            }
            LoopMode::Loop => looped,
            LoopMode::Random => rng.gen_range(0..len),
            LoopMode::Timeline if self.animation.timeline.is_none() => {
                warnings.push(raise(Warning::MissingTimeline { anim_id: anim_id() }));
                looped
            }
            LoopMode::Timeline => match self.animation.timeline_next(self.frame_index) {
                Some(next) => next,
                None => {
                    warnings.push(raise(Warning::MissingTimelineEntry {
                        anim_id: anim_id(),
                        frame: self.frame_index,
                    }));
                    looped
                }
            },
            LoopMode::Unknown(code) => {
                warnings.push(raise(Warning::UnknownLoopMode {
                    anim_id: anim_id(),
                    code,
                }));
                looped
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emg_config::AtlasDescription;
    use emg_core::visibility::{RecordingSink, VisibilityBus, VisibilityCommand};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Scene with sprite layers `f0..f{n}` and no animations.
    fn frames_scene(n: usize) -> Scene {
        let layers: Vec<String> = (0..n)
            .map(|i| format!(r#"{{ "imgType": "Sprite", "assignID": "f{i}", "width": 4, "height": 4 }}"#))
            .collect();
        let json = format!(r#"{{ "layers": [{}] }}"#, layers.join(","));
        Scene::from_description(&AtlasDescription::from_json_str(&json).unwrap())
    }

    fn animation(n: usize, loop_mode: LoopMode, timeline: Option<Vec<i64>>) -> SpriteAnimation {
        SpriteAnimation {
            id: "anim".into(),
            frames: (0..n).map(|i| format!("f{i}")).collect(),
            fps: 10.0,
            loop_mode,
            timeline,
        }
    }

    fn machine(anim: SpriteAnimation) -> SpriteFrameMachine {
        SpriteFrameMachine::from_animation("holder", anim).unwrap()
    }

    fn shown_sequence(m: &mut SpriteFrameMachine, scene: &Scene, ticks: usize) -> Vec<usize> {
        let mut sink = VisibilityBus::new();
        let mut rng = StdRng::seed_from_u64(7);
        (0..ticks).map(|_| m.tick(scene, &mut sink, &mut rng).shown).collect()
    }

    #[test]
    fn loop_mode_wraps() {
        let scene = frames_scene(3);
        let mut m = machine(animation(3, LoopMode::Loop, None));
        assert_eq!(shown_sequence(&mut m, &scene, 5), [0, 1, 2, 0, 1]);
        assert!(m.is_running());
    }

    #[test]
    fn once_mode_stops_after_last_frame() {
        let scene = frames_scene(3);
        let mut m = machine(animation(3, LoopMode::Once, None));
        let mut sink = VisibilityBus::new();
        let mut rng = StdRng::seed_from_u64(1);

        let reports: Vec<TickReport> = (0..3).map(|_| m.tick(&scene, &mut sink, &mut rng)).collect();
        let running: Vec<bool> = reports.iter().map(|r| r.running).collect();
        assert_eq!(running, [true, true, false]);
        assert_eq!(reports[2].shown, 2);
        assert!(!m.is_running());

        sink.drain();
        let after = m.tick(&scene, &mut sink, &mut rng);
        assert!(!after.running);
        assert!(!sink.has_pending(), "a stopped machine touches nothing");
    }

    #[test]
    fn timeline_mode_follows_table() {
        let scene = frames_scene(3);
        let mut m = machine(animation(3, LoopMode::Timeline, Some(vec![2, 0, 1])));
        assert_eq!(shown_sequence(&mut m, &scene, 4), [0, 2, 1, 0]);
    }

    #[test]
    fn timeline_without_table_loops_and_warns() {
        let scene = frames_scene(2);
        let mut m = machine(animation(2, LoopMode::Timeline, None));
        let mut sink = VisibilityBus::new();
        let mut rng = StdRng::seed_from_u64(1);
        let report = m.tick(&scene, &mut sink, &mut rng);
        assert_eq!(report.next, 1);
        assert_eq!(
            report.warnings,
            [Warning::MissingTimeline {
                anim_id: "anim".into()
            }]
        );
    }

    #[test]
    fn timeline_missing_entry_loops_for_that_step() {
        let scene = frames_scene(3);
        let mut m = machine(animation(3, LoopMode::Timeline, Some(vec![2])));
        let mut sink = VisibilityBus::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(m.tick(&scene, &mut sink, &mut rng).next, 2);
        let report = m.tick(&scene, &mut sink, &mut rng);
        assert_eq!(report.next, 0, "(2 + 1) % 3");
        assert_eq!(
            report.warnings,
            [Warning::MissingTimelineEntry {
                anim_id: "anim".into(),
                frame: 2
            }]
        );
    }

    #[test]
    fn unknown_loop_mode_loops_and_warns() {
        let scene = frames_scene(2);
        let mut m = machine(animation(2, LoopMode::Unknown(Some(9)), None));
        assert_eq!(shown_sequence(&mut m, &scene, 3), [0, 1, 0]);
    }

    #[test]
    fn random_mode_stays_in_range_and_is_seeded() {
        let scene = frames_scene(4);
        let mut a = machine(animation(4, LoopMode::Random, None));
        let mut b = machine(animation(4, LoopMode::Random, None));
        let seq_a = shown_sequence(&mut a, &scene, 50);
        let seq_b = shown_sequence(&mut b, &scene, 50);
        assert!(seq_a.iter().all(|&i| i < 4));
        assert_eq!(seq_a, seq_b, "same seed, same sequence");
    }

    #[test]
    fn hides_come_before_the_reveal() {
        let scene = frames_scene(3);
        let mut m = machine(animation(3, LoopMode::Loop, None));
        let mut sink = RecordingSink::default();
        let mut rng = StdRng::seed_from_u64(1);
        m.tick(&scene, &mut sink, &mut rng);
        let hide = |id: &str| VisibilityCommand {
            layer_id: id.into(),
            visible: false,
        };
        assert_eq!(
            sink.commands,
            [
                hide("f1"),
                hide("f2"),
                VisibilityCommand {
                    layer_id: "f0".into(),
                    visible: true
                }
            ]
        );
    }

    #[test]
    fn exactly_one_frame_visible_after_each_tick() {
        let scene = frames_scene(3);
        let mut m = machine(animation(3, LoopMode::Random, None));
        let mut bus = VisibilityBus::with_layers(scene.layer_ids());
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..20 {
            m.tick(&scene, &mut bus, &mut rng);
            let visible = (0..3).filter(|i| bus.is_visible(&format!("f{i}"))).count();
            assert_eq!(visible, 1);
        }
    }

    #[test]
    fn missing_current_frame_layer_skips_visibility() {
        let scene = frames_scene(1);
        let mut m = machine(animation(2, LoopMode::Loop, None));
        let mut sink = RecordingSink::default();
        let mut rng = StdRng::seed_from_u64(1);

        m.tick(&scene, &mut sink, &mut rng);
        assert_eq!(sink.commands.len(), 1, "f1 is missing: warned, f0 shown");

        sink.commands.clear();
        let report = m.tick(&scene, &mut sink, &mut rng);
        assert!(sink.commands.is_empty());
        assert_eq!(
            report.warnings,
            [Warning::MissingFrameLayer {
                anim_id: "anim".into(),
                layer_id: "f1".into()
            }]
        );
        assert_eq!(report.next, 0, "still advances");
    }

    #[test]
    fn construction_rejects_unusable_animations() {
        let scene = frames_scene(1);
        assert_eq!(
            SpriteFrameMachine::new("holder", "ghost", &scene).unwrap_err(),
            Warning::MissingAnimation {
                layer_id: "holder".into(),
                anim_id: "ghost".into()
            }
        );
        assert!(matches!(
            SpriteFrameMachine::from_animation("h", animation(0, LoopMode::Loop, None)),
            Err(Warning::EmptyAnimation { .. })
        ));
        let mut still = animation(1, LoopMode::Loop, None);
        still.fps = 0.0;
        assert!(matches!(
            SpriteFrameMachine::from_animation("h", still),
            Err(Warning::InvalidFps { .. })
        ));
    }

    #[test]
    fn restart_resets_and_resume_keeps_index() {
        let scene = frames_scene(3);
        let mut m = machine(animation(3, LoopMode::Once, None));
        shown_sequence(&mut m, &scene, 3);
        assert!(!m.is_running());

        m.resume();
        assert!(m.is_running());
        assert_eq!(m.frame_index(), 2);

        m.restart();
        assert_eq!(m.frame_index(), 0);
        assert_eq!(m.current_frame_id(), "f0");
        assert_eq!(m.interval(), Duration::from_millis(100));
    }
}
