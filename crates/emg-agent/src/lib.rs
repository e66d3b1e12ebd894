//! Expression resolution and sprite animation for EMG avatars.
//!
//! Two halves share this crate:
//!
//! - **Resolution**: [`Resolver`] turns an [`AvatarState`] plus a model's
//!   mapping table into one image reference; [`Avatar`] wraps it with a
//!   live state, auto-blink and change detection.
//! - **Animation**: [`AnimationEngine`] runs one [`SpriteFrameMachine`] per
//!   animated sprite layer plus a [`GroupRotator`] on a shared scheduler,
//!   emitting layer visibility commands.
//!
//! # Quick start
//!
//! ```no_run
//! use std::time::Instant;
//! use emg_agent::{AnimationEngine, EngineSettings, Scene};
//! use emg_config::AtlasDescription;
//!
//! let description = AtlasDescription::from_path("atlas.json".as_ref()).unwrap();
//! let mut engine = AnimationEngine::new(Scene::from_description(&description), EngineSettings::default());
//! engine.start(Instant::now());
//! engine.advance(Instant::now());
//! for command in engine.drain_commands() {
//!     println!("{} -> {}", command.layer_id, command.visible);
//! }
//! ```

mod atlas;
mod avatar;
mod blink;
mod engine;
mod loader;
mod resolver;
mod rotator;
mod sprite;
mod types;
mod warning;

pub use atlas::{AtlasLayer, LayerKind, Rect, Scene, SpriteAnimation, MIN_FRAME_INTERVAL};
pub use avatar::Avatar;
pub use blink::BlinkController;
pub use engine::{AdvanceReport, AnimationEngine, EngineSettings, EngineTask, DEFAULT_GROUP_INTERVAL};
pub use loader::AtlasImage;
pub use resolver::{choose_slot, file_name, Cues, OverrideRegistry, Resolution, Resolver, Rule, CASCADE};
pub use rotator::{GroupRotator, RotationReport};
pub use sprite::{SpriteFrameMachine, TickReport};
pub use types::{AvatarState, Frame, LoopMode};
pub use warning::Warning;
