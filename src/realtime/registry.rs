//! Connection Registry
//!
//! Live sessions indexed by user, role, institution and branch. All four
//! indices change under one write lock, so readers never see a connection
//! that is only partly indexed.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{HubError, Result};
use crate::realtime::payload::{Audience, Role, Scope};
use crate::realtime::protocol::Frame;

/// Ordered per-connection outbound channel.
pub type Outbox = mpsc::UnboundedSender<Frame>;

// == Connection Id ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// == Connection Record ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub connection_id: ConnectionId,
    pub user_id: String,
    pub role: Role,
    pub institution_id: Option<String>,
    pub branch_id: Option<String>,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionRecord {
    pub fn new(connection_id: ConnectionId, user_id: impl Into<String>, role: Role) -> Self {
        Self {
            connection_id,
            user_id: user_id.into(),
            role,
            institution_id: None,
            branch_id: None,
            connected_at: Utc::now(),
        }
    }

    pub fn institution(mut self, id: impl Into<String>) -> Self {
        self.institution_id = Some(id.into());
        self
    }

    pub fn branch(mut self, id: impl Into<String>) -> Self {
        self.branch_id = Some(id.into());
        self
    }
}

struct Slot {
    record: ConnectionRecord,
    outbox: Outbox,
}

#[derive(Default)]
struct Indices {
    slots: HashMap<ConnectionId, Slot>,
    by_user: HashMap<String, HashSet<ConnectionId>>,
    by_role: HashMap<Role, HashSet<ConnectionId>>,
    by_institution: HashMap<String, HashSet<ConnectionId>>,
    by_branch: HashMap<String, HashSet<ConnectionId>>,
}

fn index_insert<K: Eq + Hash>(index: &mut HashMap<K, HashSet<ConnectionId>>, key: K, id: ConnectionId) {
    index.entry(key).or_default().insert(id);
}

fn index_remove<K: Eq + Hash>(index: &mut HashMap<K, HashSet<ConnectionId>>, key: &K, id: &ConnectionId) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

fn ids_of<K, Q>(index: &HashMap<K, HashSet<ConnectionId>>, key: &Q) -> Vec<ConnectionId>
where
    K: Eq + Hash + std::borrow::Borrow<Q>,
    Q: Eq + Hash + ?Sized,
{
    index
        .get(key)
        .map(|ids| ids.iter().copied().collect())
        .unwrap_or_default()
}

// == Connection Registry ==
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Indices>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // == Register ==
    /// Indexes `record` and attaches its outbound channel.
    pub fn register(&self, record: ConnectionRecord, outbox: Outbox) -> Result<()> {
        let id = record.connection_id;
        let mut inner = self.inner.write();
        if inner.slots.contains_key(&id) {
            return Err(HubError::DuplicateConnection(id.to_string()));
        }

        index_insert(&mut inner.by_user, record.user_id.clone(), id);
        index_insert(&mut inner.by_role, record.role, id);
        if let Some(institution) = &record.institution_id {
            index_insert(&mut inner.by_institution, institution.clone(), id);
        }
        if let Some(branch) = &record.branch_id {
            index_insert(&mut inner.by_branch, branch.clone(), id);
        }

        debug!(connection = %id, user = %record.user_id, role = %record.role, "Connection registered");
        inner.slots.insert(id, Slot { record, outbox });
        Ok(())
    }

    // == Unregister ==
    /// Removes the connection from every index and drops its outbox.
    pub fn unregister(&self, id: &ConnectionId) -> Option<ConnectionRecord> {
        let mut inner = self.inner.write();
        let slot = inner.slots.remove(id)?;
        let record = slot.record;

        index_remove(&mut inner.by_user, &record.user_id, id);
        index_remove(&mut inner.by_role, &record.role, id);
        if let Some(institution) = &record.institution_id {
            index_remove(&mut inner.by_institution, institution, id);
        }
        if let Some(branch) = &record.branch_id {
            index_remove(&mut inner.by_branch, branch, id);
        }

        debug!(connection = %id, user = %record.user_id, "Connection unregistered");
        Some(record)
    }

    // == Lookups ==
    pub fn get(&self, id: &ConnectionId) -> Option<ConnectionRecord> {
        self.inner.read().slots.get(id).map(|slot| slot.record.clone())
    }

    pub fn find_by_user(&self, user_id: &str) -> Vec<ConnectionId> {
        ids_of(&self.inner.read().by_user, user_id)
    }

    pub fn find_by_role(&self, role: Role) -> Vec<ConnectionRecord> {
        let inner = self.inner.read();
        inner
            .by_role
            .get(&role)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.slots.get(id).map(|slot| slot.record.clone()))
            .collect()
    }

    pub fn find_by_institution(&self, institution_id: &str) -> Vec<ConnectionId> {
        ids_of(&self.inner.read().by_institution, institution_id)
    }

    pub fn find_by_branch(&self, branch_id: &str) -> Vec<ConnectionId> {
        ids_of(&self.inner.read().by_branch, branch_id)
    }

    /// Connections in the scope; both ids given means both must match.
    pub fn find_by_scope(&self, scope: &Scope) -> Vec<ConnectionId> {
        let inner = self.inner.read();
        Self::scope_ids(&inner, scope)
    }

    /// Resolves an audience to live connection ids, deduplicated.
    pub fn resolve(&self, audience: &Audience) -> Vec<ConnectionId> {
        let inner = self.inner.read();
        Self::resolve_locked(&inner, audience)
    }

    pub fn is_user_connected(&self, user_id: &str) -> bool {
        self.inner.read().by_user.contains_key(user_id)
    }

    pub fn count_connected(&self) -> usize {
        self.inner.read().slots.len()
    }

    pub fn count_by_role(&self, role: Role) -> usize {
        self.inner.read().by_role.get(&role).map_or(0, HashSet::len)
    }

    /// Distinct users with at least one live connection.
    pub fn connected_users(&self) -> Vec<String> {
        self.inner.read().by_user.keys().cloned().collect()
    }

    // == Delivery ==
    /// Resolves `audience` and queues `frame` on each connection under a
    /// single read lock. Returns (targeted, queued).
    pub fn push(&self, audience: &Audience, frame: &Frame) -> (usize, usize) {
        let inner = self.inner.read();
        let ids = Self::resolve_locked(&inner, audience);
        let mut queued = 0;
        for id in &ids {
            if let Some(slot) = inner.slots.get(id) {
                // A closed outbox means the session is tearing down
                if slot.outbox.send(frame.clone()).is_ok() {
                    queued += 1;
                }
            }
        }
        (ids.len(), queued)
    }

    /// Drops every connection. Session writers see their outbox close.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.write();
        let count = inner.slots.len();
        *inner = Indices::default();
        count
    }

    fn scope_ids(inner: &Indices, scope: &Scope) -> Vec<ConnectionId> {
        match (&scope.institution_id, &scope.branch_id) {
            (Some(institution), Some(branch)) => {
                let in_branch: HashSet<ConnectionId> =
                    ids_of(&inner.by_branch, branch.as_str()).into_iter().collect();
                ids_of(&inner.by_institution, institution.as_str())
                    .into_iter()
                    .filter(|id| in_branch.contains(id))
                    .collect()
            }
            (Some(institution), None) => ids_of(&inner.by_institution, institution.as_str()),
            (None, Some(branch)) => ids_of(&inner.by_branch, branch.as_str()),
            (None, None) => Vec::new(),
        }
    }

    fn resolve_locked(inner: &Indices, audience: &Audience) -> Vec<ConnectionId> {
        match audience {
            Audience::Users { user_ids } => {
                let mut seen = HashSet::new();
                user_ids
                    .iter()
                    .flat_map(|user| ids_of(&inner.by_user, user.as_str()))
                    .filter(|id| seen.insert(*id))
                    .collect()
            }
            Audience::Role { role } => ids_of(&inner.by_role, role),
            Audience::Scope(scope) => Self::scope_ids(inner, scope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::protocol::ServerMessage;

    fn outbox() -> (Outbox, mpsc::UnboundedReceiver<Frame>) {
        mpsc::unbounded_channel()
    }

    fn register(registry: &ConnectionRegistry, record: ConnectionRecord) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = outbox();
        registry.register(record, tx).unwrap();
        rx
    }

    #[test]
    fn test_register_indexes_all_four_keys() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let _rx = register(
            &registry,
            ConnectionRecord::new(id, "u1", Role::Professor)
                .institution("inst-1")
                .branch("cs"),
        );

        assert_eq!(registry.find_by_user("u1"), vec![id]);
        assert_eq!(registry.find_by_role(Role::Professor)[0].connection_id, id);
        assert_eq!(registry.find_by_institution("inst-1"), vec![id]);
        assert_eq!(registry.find_by_branch("cs"), vec![id]);
        assert!(registry.is_user_connected("u1"));
        assert_eq!(registry.count_connected(), 1);
        assert_eq!(registry.count_by_role(Role::Professor), 1);
        assert_eq!(registry.count_by_role(Role::Student), 0);
    }

    #[test]
    fn test_unregister_leaves_no_dangling_entries() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let _rx = register(
            &registry,
            ConnectionRecord::new(id, "u1", Role::Student)
                .institution("inst-1")
                .branch("cs"),
        );

        let record = registry.unregister(&id).unwrap();
        assert_eq!(record.user_id, "u1");

        assert!(registry.find_by_user("u1").is_empty());
        assert!(registry.find_by_role(Role::Student).is_empty());
        assert!(registry.find_by_institution("inst-1").is_empty());
        assert!(registry.find_by_branch("cs").is_empty());
        assert!(!registry.is_user_connected("u1"));
        assert_eq!(registry.count_connected(), 0);

        let inner = registry.inner.read();
        assert!(inner.by_user.is_empty());
        assert!(inner.by_role.is_empty());
        assert!(inner.by_institution.is_empty());
        assert!(inner.by_branch.is_empty());
    }

    #[test]
    fn test_unregister_unknown_is_none() {
        let registry = ConnectionRegistry::new();
        assert!(registry.unregister(&ConnectionId::new()).is_none());
    }

    #[test]
    fn test_multiple_devices_per_user() {
        let registry = ConnectionRegistry::new();
        let phone = ConnectionId::new();
        let laptop = ConnectionId::new();
        let _a = register(&registry, ConnectionRecord::new(phone, "u1", Role::Student));
        let _b = register(&registry, ConnectionRecord::new(laptop, "u1", Role::Student));

        let mut ids = registry.find_by_user("u1");
        ids.sort();
        let mut expected = vec![phone, laptop];
        expected.sort();
        assert_eq!(ids, expected);

        registry.unregister(&phone);
        assert!(registry.is_user_connected("u1"));
        assert_eq!(registry.find_by_user("u1"), vec![laptop]);
        assert_eq!(registry.connected_users(), vec!["u1".to_string()]);
    }

    #[test]
    fn test_duplicate_connection_rejected() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let _rx = register(&registry, ConnectionRecord::new(id, "u1", Role::Student));

        let (tx, _rx2) = outbox();
        let result = registry.register(ConnectionRecord::new(id, "u2", Role::Admin), tx);
        assert!(matches!(result, Err(HubError::DuplicateConnection(_))));
        assert!(!registry.is_user_connected("u2"));
    }

    #[test]
    fn test_scope_resolution() {
        let registry = ConnectionRegistry::new();
        let cs1 = ConnectionId::new();
        let ee1 = ConnectionId::new();
        let cs2 = ConnectionId::new();
        let _a = register(&registry, ConnectionRecord::new(cs1, "a", Role::Student).institution("inst-1").branch("cs"));
        let _b = register(&registry, ConnectionRecord::new(ee1, "b", Role::Student).institution("inst-1").branch("ee"));
        let _c = register(&registry, ConnectionRecord::new(cs2, "c", Role::Student).institution("inst-2").branch("cs"));

        assert_eq!(registry.find_by_scope(&Scope::institution("inst-1")).len(), 2);
        assert_eq!(registry.find_by_scope(&Scope::branch("cs")).len(), 2);
        assert_eq!(
            registry.find_by_scope(&Scope::institution("inst-1").with_branch("cs")),
            vec![cs1]
        );
        assert!(registry.find_by_scope(&Scope::default()).is_empty());
    }

    #[test]
    fn test_resolve_users_deduplicates() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let _rx = register(&registry, ConnectionRecord::new(id, "u1", Role::Student));

        let audience = Audience::Users {
            user_ids: vec!["u1".into(), "u1".into(), "offline".into()],
        };
        assert_eq!(registry.resolve(&audience), vec![id]);
    }

    #[test]
    fn test_push_skips_closed_outboxes() {
        let registry = ConnectionRegistry::new();
        let live = ConnectionId::new();
        let gone = ConnectionId::new();
        let mut live_rx = register(&registry, ConnectionRecord::new(live, "a", Role::Hod));
        drop(register(&registry, ConnectionRecord::new(gone, "b", Role::Hod)));

        let frame = Frame::encode(&ServerMessage::error("ping")).unwrap();
        let (targeted, queued) = registry.push(&Audience::Role { role: Role::Hod }, &frame);

        assert_eq!(targeted, 2);
        assert_eq!(queued, 1);
        assert_eq!(live_rx.try_recv().unwrap(), frame);
    }

    #[test]
    fn test_clear_closes_outboxes() {
        let registry = ConnectionRegistry::new();
        let mut rx = register(&registry, ConnectionRecord::new(ConnectionId::new(), "u1", Role::Admin));

        assert_eq!(registry.clear(), 1);
        assert_eq!(registry.count_connected(), 0);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
