#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Host-authority rules deciding which effects run locally and which cross the link.
//!
//! Every request that reaches the world's dispatcher passes through
//! [`Replication::admit`] first. The host owns non-deterministic outcomes:
//! it alone spawns enemies and stamps each spawn with a fresh
//! [`NetworkId`]. The peer mirrors those spawns and the removals that follow
//! them. The host also decides when play ends: a terminal mode change is
//! made by the host alone and the peer adopts it. Everything else is
//! simulated by each side for itself.

use magnet_defence_core::{NetworkId, Request};

/// Role a side plays in the session, fixed when the link is established.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Authority {
    /// Owns ground truth for spawns and removals.
    Host,
    /// Mirrors the host's spawns and removals.
    Peer,
}

impl Authority {
    /// Reports whether this side is the host.
    #[must_use]
    pub const fn is_host(self) -> bool {
        matches!(self, Authority::Host)
    }
}

/// Where a request entered the dispatcher from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Produced by this side's simulation or input.
    Local,
    /// Delivered by the peer link.
    Remote,
}

/// Routing decision for a single request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Route {
    /// The request mutates local state.
    pub apply: bool,
    /// The request is eligible to be sent to the peer.
    ///
    /// Trash requests are only sent when the removed entity carries a
    /// network identity; the world resolves that after applying them.
    pub forward: bool,
}

impl Route {
    const DROP: Route = Route {
        apply: false,
        forward: false,
    };
    const LOCAL: Route = Route {
        apply: true,
        forward: false,
    };
    const REPLICATED: Route = Route {
        apply: true,
        forward: true,
    };
}

/// Authority filter for a leaf request.
///
/// Aggregates must be flattened before routing; a `Multi` request is dropped.
#[must_use]
pub fn route(authority: Authority, request: &Request, origin: Origin) -> Route {
    match (request, origin, authority) {
        (Request::SpawnEnemy { .. }, Origin::Local, Authority::Host) => Route::REPLICATED,
        (Request::SpawnEnemy { .. }, Origin::Remote, Authority::Peer) => Route::LOCAL,
        (Request::SpawnEnemy { .. }, _, _) => Route::DROP,

        (Request::TrashEntity { .. }, Origin::Local, Authority::Host) => Route::REPLICATED,
        (Request::TrashEntity { .. }, _, _) => Route::LOCAL,

        (Request::StartMode { .. }, Origin::Local, _) => Route::REPLICATED,
        (Request::StartMode { .. }, Origin::Remote, _) => Route::LOCAL,

        (Request::SetMode { mode }, Origin::Local, Authority::Host) if mode.is_terminal() => {
            Route::REPLICATED
        }
        (Request::SetMode { mode }, Origin::Local, Authority::Peer) if mode.is_terminal() => {
            Route::DROP
        }
        (Request::SetMode { mode }, Origin::Remote, Authority::Peer) if mode.is_terminal() => {
            Route::LOCAL
        }

        (
            Request::UseTool { .. }
            | Request::SpawnProjectile { .. }
            | Request::SetMode { .. }
            | Request::SelectToolbeltItem { .. },
            Origin::Local,
            _,
        ) => Route::LOCAL,
        (
            Request::UseTool { .. }
            | Request::SpawnProjectile { .. }
            | Request::SetMode { .. }
            | Request::SelectToolbeltItem { .. },
            Origin::Remote,
            _,
        ) => Route::DROP,

        (Request::Multi(_), _, _) => Route::DROP,
    }
}

/// Monotonic source of network identities.
///
/// Identities start at 1, strictly increase and are never reused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityAllocator {
    next: u64,
}

impl Default for IdentityAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdentityAllocator {
    /// Creates an allocator whose first identity is 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out the next identity.
    pub fn allocate(&mut self) -> NetworkId {
        let id = NetworkId::new(self.next);
        self.next += 1;
        id
    }

    /// Identity the next call to [`IdentityAllocator::allocate`] returns.
    #[must_use]
    pub const fn peek(&self) -> NetworkId {
        NetworkId::new(self.next)
    }
}

/// Request admitted by the authority filter.
#[derive(Clone, Debug, PartialEq)]
pub struct Admitted {
    /// Request to apply, with any host-assigned identity filled in.
    pub request: Request,
    /// Whether the request is eligible to be forwarded to the peer.
    pub forward: bool,
}

/// Per-session replication state: the fixed authority and the identity counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replication {
    authority: Authority,
    allocator: IdentityAllocator,
}

impl Replication {
    /// Creates replication state for a side with the given authority.
    #[must_use]
    pub fn new(authority: Authority) -> Self {
        Self {
            authority,
            allocator: IdentityAllocator::new(),
        }
    }

    /// Authority fixed at connection time.
    #[must_use]
    pub const fn authority(&self) -> Authority {
        self.authority
    }

    /// Runs a leaf request through the authority filter.
    ///
    /// Host-originated spawns without an identity receive a freshly allocated
    /// one. Spawns that already carry an identity keep it. Returns `None`
    /// when the request must not touch local state.
    pub fn admit(&mut self, request: Request, origin: Origin) -> Option<Admitted> {
        let decision = route(self.authority, &request, origin);
        if !decision.apply {
            return None;
        }

        let request = match request {
            Request::SpawnEnemy {
                kind,
                position,
                network_id: None,
            } if origin == Origin::Local => Request::SpawnEnemy {
                kind,
                position,
                network_id: Some(self.allocator.allocate()),
            },
            other => other,
        };

        Some(Admitted {
            request,
            forward: decision.forward,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use magnet_defence_core::{EntityId, Mode, PlayerId, TrashTarget};

    #[test]
    fn allocator_starts_at_one() {
        let mut allocator = IdentityAllocator::new();
        assert_eq!(allocator.peek(), NetworkId::new(1));
        assert_eq!(allocator.allocate(), NetworkId::new(1));
        assert_eq!(allocator.allocate(), NetworkId::new(2));
    }

    #[test]
    fn set_mode_never_crosses_the_link() {
        let request = Request::SetMode { mode: Mode::Build };
        assert_eq!(
            route(Authority::Host, &request, Origin::Local),
            Route::LOCAL
        );
        assert_eq!(
            route(Authority::Peer, &request, Origin::Remote),
            Route::DROP
        );
    }

    #[test]
    fn only_the_host_ends_the_game() {
        for mode in [Mode::Victory, Mode::Loss] {
            let request = Request::SetMode { mode };
            assert_eq!(
                route(Authority::Host, &request, Origin::Local),
                Route::REPLICATED
            );
            assert_eq!(
                route(Authority::Peer, &request, Origin::Remote),
                Route::LOCAL
            );
            assert_eq!(route(Authority::Peer, &request, Origin::Local), Route::DROP);
            assert_eq!(route(Authority::Host, &request, Origin::Remote), Route::DROP);
        }
    }

    #[test]
    fn start_mode_is_forwarded_by_its_originator() {
        let request = Request::StartMode {
            player: PlayerId::PEER,
            mode: Mode::Wave,
        };
        assert_eq!(
            route(Authority::Peer, &request, Origin::Local),
            Route::REPLICATED
        );
        assert_eq!(
            route(Authority::Host, &request, Origin::Remote),
            Route::LOCAL
        );
    }

    #[test]
    fn peer_local_trash_stays_local() {
        let request = Request::TrashEntity {
            target: TrashTarget::Local(EntityId::new(3)),
        };
        assert_eq!(
            route(Authority::Peer, &request, Origin::Local),
            Route::LOCAL
        );
        assert_eq!(
            route(Authority::Host, &request, Origin::Local),
            Route::REPLICATED
        );
    }
}
