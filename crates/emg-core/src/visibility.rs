use std::collections::{HashMap, VecDeque};

/// A single show/hide instruction for the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityCommand {
    /// Layer the change applies to.
    pub layer_id: String,
    /// New visibility.
    pub visible: bool,
}

/// Receiver of layer visibility changes.
///
/// The engine only ever speaks in terms of layer identifiers; what "visible"
/// means (CSS opacity, a draw call, a terminal cell) is up to the sink.
pub trait VisibilitySink {
    fn set_visible(&mut self, layer_id: &str, visible: bool);
}

/// Tracks the visibility of every known layer and queues a
/// [`VisibilityCommand`] for each change.
///
/// The host uses it in a two-phase cycle:
/// 1. **Publish**: engine ticks call [`set_visible`](VisibilitySink::set_visible).
/// 2. **Drain**: the host pulls all pending commands, in emission order, and
///    applies them to its surface.
///
/// Layers start visible. Setting a layer to the state it already has
/// queues nothing.
#[derive(Debug, Default)]
pub struct VisibilityBus {
    state: HashMap<String, bool>,
    queue: VecDeque<VisibilityCommand>,
}

impl VisibilityBus {
    /// Bus tracking no layers yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus where every listed layer starts visible.
    pub fn with_layers<I, S>(layer_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: layer_ids.into_iter().map(|id| (id.into(), true)).collect(),
            queue: VecDeque::new(),
        }
    }

    /// Current visibility. Unknown layers count as visible.
    pub fn is_visible(&self, layer_id: &str) -> bool {
        self.state.get(layer_id).copied().unwrap_or(true)
    }

    /// Remove and return all pending commands, preserving emission order.
    pub fn drain(&mut self) -> Vec<VisibilityCommand> {
        self.queue.drain(..).collect()
    }

    /// Return `true` if at least one command is waiting.
    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Mark every known layer visible again without queueing commands.
    pub fn reset(&mut self) {
        self.state.values_mut().for_each(|v| *v = true);
        self.queue.clear();
    }
}

impl VisibilitySink for VisibilityBus {
    fn set_visible(&mut self, layer_id: &str, visible: bool) {
        let previous = self.state.insert(layer_id.to_string(), visible);
        if previous.unwrap_or(true) != visible {
            self.queue.push_back(VisibilityCommand {
                layer_id: layer_id.to_string(),
                visible,
            });
        }
    }
}

/// Sink that records every call verbatim, changes or not.
#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Every command received, in order.
    pub commands: Vec<VisibilityCommand>,
}

impl VisibilitySink for RecordingSink {
    fn set_visible(&mut self, layer_id: &str, visible: bool) {
        self.commands.push(VisibilityCommand {
            layer_id: layer_id.to_string(),
            visible,
        });
    }
}
