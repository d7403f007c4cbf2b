use crate::{
    job::Dependency,
    signal::Signal,
    types::{HashMap, ShortChannelId, Vertex},
};

/// Outstanding prerequisite signals, keyed by the ids they gate.
///
/// Presence of a key means a prerequisite touching it has been admitted and
/// has not yet released. Like the limiter, this is plain state guarded by the
/// barrier's lock.
///
/// Each registration cycle of a channel owns one signal. Duplicate
/// announcements admitted during a cycle bind to that cycle's signal, and a
/// release only acts on the cycle it is bound to.
///
/// Node entries outlive their cycle: once fired they stay until a node job
/// for that vertex clears them or a later announcement overwrites them, so
/// `node_dependencies` grows with the number of distinct endpoints seen
/// without a following node announcement. A fired entry never blocks.
#[derive(Debug, Default)]
pub(crate) struct DependencyRegistry {
    /// Signal of each channel announcement still being validated.
    announcements: HashMap<ShortChannelId, Signal>,
    /// Signal channel updates for a channel must wait on.
    channel_dependencies: HashMap<ShortChannelId, Signal>,
    /// Signal node announcements for a node must wait on.
    node_dependencies: HashMap<Vertex, Signal>,
}

impl DependencyRegistry {
    /// Bind a prerequisite to its channel's current cycle, installing a
    /// fresh signal if no cycle is outstanding. Other jobs bind to nothing.
    pub(crate) fn register(&mut self, dependency: &Dependency) -> Option<Registration> {
        let &Dependency::Prerequisite { channel, endpoints } = dependency else {
            return None;
        };
        if let Some(signal) = self.announcements.get(&channel) {
            return Some(Registration {
                signal: signal.clone(),
                fresh: false,
            });
        }
        let signal = Signal::new();
        self.announcements.insert(channel, signal.clone());
        self.channel_dependencies.insert(channel, signal.clone());
        for endpoint in endpoints {
            self.node_dependencies.insert(endpoint, signal.clone());
        }
        Some(Registration {
            signal,
            fresh: true,
        })
    }

    /// Signal a dependent job has to wait on, if any.
    pub(crate) fn lookup(&self, dependency: &Dependency) -> Option<Signal> {
        match dependency {
            Dependency::Channel(channel) => self.channel_dependencies.get(channel).cloned(),
            Dependency::Node(vertex) => self.node_dependencies.get(vertex).cloned(),
            Dependency::Prerequisite { .. } | Dependency::Independent => None,
        }
    }

    /// Clean up after a finished job. Returns the signal fired, if any.
    ///
    /// A prerequisite fires its channel's signal and drops the channel
    /// entries so a later announcement of the same channel starts over. With
    /// `bound` set, this only happens while the outstanding cycle is the one
    /// the job registered in; a duplicate released after its cycle ended is
    /// a no-op. Without it, whatever cycle is outstanding is released.
    ///
    /// Node entries stay behind for node announcements to clear. A dependent
    /// only clears its own entry once that entry's signal has fired: a
    /// pending entry still gates other dependents of the same key.
    pub(crate) fn release(
        &mut self,
        dependency: &Dependency,
        bound: Option<&Signal>,
    ) -> Option<Signal> {
        match dependency {
            Dependency::Prerequisite { channel, .. } => {
                let current = self.announcements.get(channel)?;
                if bound.is_some_and(|bound| !bound.ptr_eq(current)) {
                    return None;
                }
                let signal = self.announcements.remove(channel)?;
                if self
                    .channel_dependencies
                    .get(channel)
                    .is_some_and(|entry| entry.ptr_eq(&signal))
                {
                    self.channel_dependencies.remove(channel);
                }
                signal.fire();
                Some(signal)
            }
            Dependency::Channel(channel) => {
                remove_fired(&mut self.channel_dependencies, channel);
                None
            }
            Dependency::Node(vertex) => {
                remove_fired(&mut self.node_dependencies, vertex);
                None
            }
            Dependency::Independent => None,
        }
    }

    pub(crate) fn pending_announcements(&self) -> usize {
        self.announcements.len()
    }

    pub(crate) fn channel_dependencies(&self) -> usize {
        self.channel_dependencies.len()
    }

    pub(crate) fn node_dependencies(&self) -> usize {
        self.node_dependencies.len()
    }
}

/// Outcome of registering a prerequisite.
#[derive(Debug, Clone)]
pub(crate) struct Registration {
    /// Signal of the cycle the job belongs to.
    pub(crate) signal: Signal,
    /// Whether this registration opened the cycle.
    pub(crate) fresh: bool,
}

fn remove_fired<K: Eq + core::hash::Hash>(map: &mut HashMap<K, Signal>, key: &K) {
    if map.get(key).is_some_and(Signal::is_fired) {
        map.remove(key);
    }
}
