use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use emg_agent::AvatarState;
use emg_config::split_mapping_key;

/// Resolve an avatar's image and run its layer animation headlessly,
/// printing one JSON event per line.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "emg")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Player config (default: ./emg.toml)
    #[arg(short = 'c', long, env = "EMG_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Model definition JSON
    #[arg(short = 'm', long, value_name = "FILE")]
    pub model: Option<PathBuf>,

    /// Atlas description JSON
    #[arg(short = 'a', long, value_name = "FILE")]
    pub atlas: Option<PathBuf>,

    /// Atlas PNG, checked against the atlas description
    #[arg(short = 'i', long, value_name = "FILE", requires = "atlas")]
    pub image: Option<PathBuf>,

    /// Activity and emotion as <activity>.<emotion>
    #[arg(long, value_name = "KEY", default_value = "idle.neutral", value_parser = parse_key)]
    pub state: (String, String),

    /// Start with the mouth open
    #[arg(long)]
    pub speaking: bool,

    /// Start asleep
    #[arg(long)]
    pub sleep: bool,

    /// How long to animate, in seconds
    #[arg(short = 's', long, value_name = "SECS", default_value_t = 5.0, value_parser = parse_seconds)]
    pub seconds: f64,
}

impl Args {
    /// State to start the avatar in.
    pub fn avatar_state(&self) -> AvatarState {
        let (activity, emotion) = &self.state;
        AvatarState::new(activity.as_str(), emotion.as_str())
            .speaking(self.speaking)
            .sleeping(self.sleep)
    }

    /// How long the animation loop runs.
    pub fn run_for(&self) -> Duration {
        Duration::from_secs_f64(self.seconds)
    }
}

fn parse_key(raw: &str) -> Result<(String, String)> {
    let (activity, emotion) = split_mapping_key(raw)
        .ok_or_else(|| anyhow!("expected <activity>.<emotion>, got {raw:?}"))?;
    Ok((activity.to_string(), emotion.to_string()))
}

fn parse_seconds(raw: &str) -> Result<f64> {
    let secs: f64 = raw.parse()?;
    if !secs.is_finite() || secs < 0.0 || Duration::try_from_secs_f64(secs).is_err() {
        bail!("expected a non-negative number of seconds, got {raw:?}");
    }
    Ok(secs)
}
