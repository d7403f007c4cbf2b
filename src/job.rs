use crate::types::{ShortChannelId, Vertex};

/// Coordination role of a validation job together with the keys it touches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// Establishes a channel. Its completion unblocks updates for `channel`
    /// and node announcements for either endpoint.
    Prerequisite {
        /// Channel the job announces.
        channel: ShortChannelId,
        /// The channel's two endpoint nodes.
        endpoints: [Vertex; 2],
    },
    /// Must wait for any outstanding announcement of this channel.
    Channel(ShortChannelId),
    /// Must wait for any outstanding channel announcement touching this node.
    Node(Vertex),
    /// Needs nothing beyond an admission slot.
    Independent,
}

/// Role of a job, without its keys.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// Creates a completion signal others wait on.
    Prerequisite,
    /// Waits on a completion signal.
    Dependent,
    /// No coordination.
    Independent,
}

impl Dependency {
    /// The job's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Prerequisite { .. } => Role::Prerequisite,
            Self::Channel(_) | Self::Node(_) => Role::Dependent,
            Self::Independent => Role::Independent,
        }
    }
}

/// Anything the barrier can schedule.
///
/// The default classification is [`Dependency::Independent`], so job types
/// the barrier knows nothing about only consume an admission slot.
pub trait ValidationJob {
    /// Classify this job.
    fn dependency(&self) -> Dependency {
        Dependency::Independent
    }
}

impl<J: ValidationJob + ?Sized> ValidationJob for &J {
    fn dependency(&self) -> Dependency {
        (**self).dependency()
    }
}

/// Wire announcement of a new channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChannelAnnouncement {
    /// Channel being announced.
    pub short_channel_id: ShortChannelId,
    /// First endpoint.
    pub node_id_1: Vertex,
    /// Second endpoint.
    pub node_id_2: Vertex,
}

/// Persisted form of a channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChannelEdgeInfo {
    /// Packed channel id as stored.
    pub channel_id: u64,
    /// First endpoint.
    pub node_key_1: Vertex,
    /// Second endpoint.
    pub node_key_2: Vertex,
}

/// Wire update of one direction of a channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChannelUpdate {
    /// Channel being updated.
    pub short_channel_id: ShortChannelId,
}

/// Persisted routing policy of one direction of a channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChannelEdgePolicy {
    /// Packed channel id as stored.
    pub channel_id: u64,
}

/// Wire announcement of a node's identity.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NodeAnnouncement {
    /// Announcing node.
    pub node_id: Vertex,
}

/// Persisted form of a node.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LightningNode {
    /// Node key.
    pub pub_key: Vertex,
}

/// Signature bundle exchanged before a channel is announced.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AnnounceSignatures {
    /// Channel the signatures are for.
    pub short_channel_id: ShortChannelId,
}

/// Every gossip message kind submitted for validation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, derive_more::From)]
#[non_exhaustive]
pub enum Announcement {
    /// Wire announcement of a new channel.
    ChannelAnnouncement(ChannelAnnouncement),
    /// Persisted channel record.
    ChannelEdgeInfo(ChannelEdgeInfo),
    /// Wire update of a channel's routing policy.
    ChannelUpdate(ChannelUpdate),
    /// Persisted routing policy of one channel direction.
    ChannelEdgePolicy(ChannelEdgePolicy),
    /// Wire announcement of a node.
    NodeAnnouncement(NodeAnnouncement),
    /// Persisted node record.
    LightningNode(LightningNode),
    /// Signatures exchanged by the channel's peers.
    AnnounceSignatures(AnnounceSignatures),
    /// A message type this crate does not recognise.
    #[from(ignore)]
    Unknown {
        /// Wire message type.
        message_type: u16,
    },
}

/// Map an announcement to its role and keys.
#[must_use]
pub fn classify(announcement: &Announcement) -> Dependency {
    match *announcement {
        Announcement::ChannelAnnouncement(ChannelAnnouncement {
            short_channel_id,
            node_id_1,
            node_id_2,
        }) => Dependency::Prerequisite {
            channel: short_channel_id,
            endpoints: [node_id_1, node_id_2],
        },
        Announcement::ChannelEdgeInfo(ChannelEdgeInfo {
            channel_id,
            node_key_1,
            node_key_2,
        }) => Dependency::Prerequisite {
            channel: channel_id.into(),
            endpoints: [node_key_1, node_key_2],
        },
        Announcement::ChannelUpdate(ChannelUpdate { short_channel_id }) => {
            Dependency::Channel(short_channel_id)
        }
        Announcement::ChannelEdgePolicy(ChannelEdgePolicy { channel_id }) => {
            Dependency::Channel(channel_id.into())
        }
        Announcement::NodeAnnouncement(NodeAnnouncement { node_id: vertex })
        | Announcement::LightningNode(LightningNode { pub_key: vertex }) => {
            Dependency::Node(vertex)
        }
        Announcement::AnnounceSignatures(_) | Announcement::Unknown { .. } => {
            Dependency::Independent
        }
    }
}

impl ValidationJob for Announcement {
    fn dependency(&self) -> Dependency {
        classify(self)
    }
}

macro_rules! impl_validation_job {
    ($($kind:ident),* $(,)?) => {$(
        impl ValidationJob for $kind {
            fn dependency(&self) -> Dependency {
                classify(&Announcement::$kind(*self))
            }
        }
    )*};
}

impl_validation_job!(
    ChannelAnnouncement,
    ChannelEdgeInfo,
    ChannelUpdate,
    ChannelEdgePolicy,
    NodeAnnouncement,
    LightningNode,
    AnnounceSignatures,
);

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(byte: u8) -> Vertex {
        Vertex::from([byte; crate::types::VERTEX_LEN])
    }

    #[test]
    fn channel_announcements_are_prerequisites_in_both_forms() {
        let scid = ShortChannelId::new(100, 2, 0);
        let wire = ChannelAnnouncement {
            short_channel_id: scid,
            node_id_1: vertex(2),
            node_id_2: vertex(3),
        };
        let persisted = ChannelEdgeInfo {
            channel_id: scid.to_u64(),
            node_key_1: vertex(2),
            node_key_2: vertex(3),
        };
        let expected = Dependency::Prerequisite {
            channel: scid,
            endpoints: [vertex(2), vertex(3)],
        };
        assert_eq!(wire.dependency(), expected);
        assert_eq!(persisted.dependency(), expected);
        assert_eq!(expected.role(), Role::Prerequisite);
    }

    #[test]
    fn updates_and_policies_depend_on_channel() {
        let scid = ShortChannelId::from(42_u64);
        assert_eq!(
            ChannelUpdate {
                short_channel_id: scid
            }
            .dependency(),
            Dependency::Channel(scid)
        );
        assert_eq!(
            ChannelEdgePolicy { channel_id: 42 }.dependency(),
            Dependency::Channel(scid)
        );
    }

    #[test]
    fn node_announcements_depend_on_node() {
        assert_eq!(
            NodeAnnouncement { node_id: vertex(9) }.dependency(),
            Dependency::Node(vertex(9))
        );
        assert_eq!(
            Announcement::from(LightningNode { pub_key: vertex(9) }).dependency(),
            Dependency::Node(vertex(9))
        );
    }

    #[test]
    fn signatures_and_unknown_kinds_are_independent() {
        let sigs = AnnounceSignatures {
            short_channel_id: ShortChannelId::from(1_u64),
        };
        assert_eq!(sigs.dependency().role(), Role::Independent);
        assert_eq!(
            Announcement::Unknown { message_type: 32_771 }.dependency(),
            Dependency::Independent
        );

        struct Foreign;
        impl ValidationJob for Foreign {}
        assert_eq!(Foreign.dependency(), Dependency::Independent);
    }
}
