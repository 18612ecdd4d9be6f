//! Bounded table of sessions, keyed by peer address
// (c) 2024 Ross Younger

use std::{
    collections::{HashMap, hash_map::Entry},
    net::SocketAddr,
    time::Duration,
};

use tokio::time::Instant;

use super::session::Session;

/// Result of [`SessionTable::find_or_create`]
#[derive(Debug)]
pub enum Lookup<'a> {
    /// The peer already had a session
    Existing(&'a mut Session),
    /// A session was created for the peer
    Created(&'a mut Session),
    /// The peer is new and the table is full
    Full,
}

/// Sessions, at most `capacity` of them.
///
/// Eviction is explicit: nothing leaves the table unless it is removed or
/// [evicted for idleness](Self::evict_idle).
#[derive(Debug)]
pub struct SessionTable {
    sessions: HashMap<SocketAddr, Session>,
    capacity: usize,
}

impl SessionTable {
    /// Constructor
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Finds the peer's session, creating one if there is room
    pub fn find_or_create(&mut self, peer: SocketAddr, now: Instant) -> Lookup<'_> {
        let full = self.is_full();
        match self.sessions.entry(peer) {
            Entry::Occupied(e) => Lookup::Existing(e.into_mut()),
            Entry::Vacant(_) if full => Lookup::Full,
            Entry::Vacant(e) => Lookup::Created(e.insert(Session::new(now))),
        }
    }

    /// Finds the peer's session without creating one
    pub fn get_mut(&mut self, peer: &SocketAddr) -> Option<&mut Session> {
        self.sessions.get_mut(peer)
    }

    /// Read-only lookup
    #[must_use]
    pub fn get(&self, peer: &SocketAddr) -> Option<&Session> {
        self.sessions.get(peer)
    }

    /// Removes the peer's session, handing it back so its sink can be closed
    pub fn remove(&mut self, peer: &SocketAddr) -> Option<Session> {
        self.sessions.remove(peer)
    }

    /// Removes every session that has been quiet for longer than `idle`
    pub fn evict_idle(&mut self, now: Instant, idle: Duration) -> Vec<(SocketAddr, Session)> {
        let stale: Vec<SocketAddr> = self
            .sessions
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.last_activity) > idle)
            .map(|(peer, _)| *peer)
            .collect();
        stale
            .into_iter()
            .filter_map(|peer| self.sessions.remove(&peer).map(|s| (peer, s)))
            .collect()
    }

    /// Removes all sessions
    pub fn drain(&mut self) -> Vec<(SocketAddr, Session)> {
        self.sessions.drain().collect()
    }

    /// Number of sessions held
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no sessions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Whether a new peer would be turned away
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.capacity
    }

    /// Maximum number of sessions
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod test {
    use std::{net::SocketAddr, time::Duration};

    use pretty_assertions::assert_eq;
    use tokio::time::Instant;

    use super::{Lookup, SessionTable};

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([192, 0, 2, 1], port))
    }

    #[test]
    fn create_then_find() {
        let now = Instant::now();
        let mut table = SessionTable::new(2);
        assert!(matches!(table.find_or_create(peer(1), now), Lookup::Created(_)));
        assert!(matches!(table.find_or_create(peer(1), now), Lookup::Existing(_)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn port_distinguishes_peers() {
        let now = Instant::now();
        let mut table = SessionTable::new(2);
        assert_eq!(table.capacity(), 2);
        let _ = table.find_or_create(peer(1), now);
        assert!(matches!(table.find_or_create(peer(2), now), Lookup::Created(_)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn capacity() {
        let now = Instant::now();
        let mut table = SessionTable::new(2);
        let _ = table.find_or_create(peer(1), now);
        let _ = table.find_or_create(peer(2), now);
        assert!(table.is_full());
        assert!(matches!(table.find_or_create(peer(3), now), Lookup::Full));
        assert_eq!(table.len(), 2);
        // existing peers still get their session
        assert!(matches!(table.find_or_create(peer(2), now), Lookup::Existing(_)));
        // and freeing a slot makes room again
        assert!(table.remove(&peer(1)).is_some());
        assert!(matches!(table.find_or_create(peer(3), now), Lookup::Created(_)));
    }

    #[test]
    fn evict_idle() {
        let start = Instant::now();
        let mut table = SessionTable::new(4);
        let _ = table.find_or_create(peer(1), start);
        let _ = table.find_or_create(peer(2), start + Duration::from_secs(50));

        let later = start + Duration::from_secs(61);
        let evicted = table.evict_idle(later, Duration::from_secs(60));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].0, peer(1));
        assert!(table.get(&peer(1)).is_none());
        assert!(table.get(&peer(2)).is_some());
    }

    #[test]
    fn drain() {
        let now = Instant::now();
        let mut table = SessionTable::new(4);
        let _ = table.find_or_create(peer(1), now);
        let _ = table.find_or_create(peer(2), now);
        assert_eq!(table.drain().len(), 2);
        assert!(table.is_empty());
    }
}
