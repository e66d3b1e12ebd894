//! Configuration types and loaders for EMG.
//!
//! This crate owns the on-disk schemas the engine consumes: the model
//! definition (state-to-image mapping table), the layered atlas description
//! (layers, sprite animations, rotating groups) and the player settings.

pub mod atlas;
pub mod model;
pub mod player;

pub use atlas::{AtlasDescription, ImageKind, LayerDescriptor, SpriteDescriptor, TextureInfo};
pub use model::{mapping_key, split_mapping_key, AssetBundle, ModelDefinition, Slot, SlotConfig};
pub use player::{AnimationConfig, BlinkConfig, LegacyConfig, LoggingConfig, PlayerConfig};
