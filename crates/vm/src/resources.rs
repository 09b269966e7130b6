//! Live resource handles and entanglement groups.
//!
//! Groups own their participant lists. Whether a handle is entangled, and
//! with whom, is always derived from the groups, never stored on the
//! handle.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide handle id. Two sessions never share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q#{}", self.0)
    }
}

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_handle_id() -> HandleId {
    HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coherence {
    Coherent,
    Decoherent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purity {
    Pure,
    Entangled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementStatus {
    Unmeasured,
    Measured,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub id: HandleId,
    pub name: String,
    pub dimension: u32,
    pub coherence: Coherence,
    pub measurement: MeasurementStatus,
    pub created_at_ms: u64,
    pub last_interaction_ms: u64,
    pub coherence_deadline_ms: u64,
    /// Gates applied so far, in order.
    pub gates: Vec<String>,
}

impl ResourceHandle {
    pub fn new(name: &str, dimension: u32, now_ms: u64, coherence_time_ms: u64) -> Self {
        Self {
            id: next_handle_id(),
            name: name.to_string(),
            dimension,
            coherence: Coherence::Coherent,
            measurement: MeasurementStatus::Unmeasured,
            created_at_ms: now_ms,
            last_interaction_ms: now_ms,
            coherence_deadline_ms: now_ms.saturating_add(coherence_time_ms),
            gates: Vec::new(),
        }
    }

    /// Coherent as of `now_ms`. A deadline that has passed counts even if
    /// the timer has not fired yet.
    pub fn is_coherent_at(&self, now_ms: u64) -> bool {
        self.coherence == Coherence::Coherent && now_ms < self.coherence_deadline_ms
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_interaction_ms = now_ms;
    }

    pub fn is_measured(&self) -> bool {
        self.measurement == MeasurementStatus::Measured
    }

    pub fn reset_deadline(&mut self, now_ms: u64, coherence_time_ms: u64) {
        self.touch(now_ms);
        self.coherence_deadline_ms = now_ms.saturating_add(coherence_time_ms);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Bipartite,
    Multipartite,
}

impl GroupKind {
    pub fn for_size(participants: usize) -> Self {
        if participants <= 2 {
            GroupKind::Bipartite
        } else {
            GroupKind::Multipartite
        }
    }
}

/// Strength of a freshly created group.
pub const FULL_STRENGTH: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntanglementGroup {
    pub id: GroupId,
    pub participants: Vec<HandleId>,
    pub kind: GroupKind,
    /// In `[0, 1]`.
    pub strength: f64,
    pub coherence_time_ms: u64,
    pub created_at_ms: u64,
}

impl EntanglementGroup {
    pub fn contains(&self, id: HandleId) -> bool {
        self.participants.contains(&id)
    }
}

/// What remains of a handle after measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassicalRecord {
    pub name: String,
    pub handle: HandleId,
    pub dimension: u32,
    pub outcome: u32,
    pub probability: f64,
    pub measured_at_ms: u64,
    /// Handles that were entangled with this one when it collapsed.
    pub released_partners: Vec<HandleId>,
}

/// The live handle table and the groups over it.
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    handles: BTreeMap<HandleId, ResourceHandle>,
    groups: BTreeMap<GroupId, EntanglementGroup>,
    next_group: u64,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: ResourceHandle) -> HandleId {
        let id = handle.id;
        self.handles.insert(id, handle);
        id
    }

    pub fn get(&self, id: HandleId) -> Option<&ResourceHandle> {
        self.handles.get(&id)
    }

    pub fn get_mut(&mut self, id: HandleId) -> Option<&mut ResourceHandle> {
        self.handles.get_mut(&id)
    }

    pub fn contains(&self, id: HandleId) -> bool {
        self.handles.contains_key(&id)
    }

    pub fn handles(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.handles.values()
    }

    pub fn handles_mut(&mut self) -> impl Iterator<Item = &mut ResourceHandle> {
        self.handles.values_mut()
    }

    pub fn groups(&self) -> impl Iterator<Item = &EntanglementGroup> {
        self.groups.values()
    }

    pub fn group(&self, id: GroupId) -> Option<&EntanglementGroup> {
        self.groups.get(&id)
    }

    /// Every handle sharing a group with `id`.
    pub fn entangled_with(&self, id: HandleId) -> BTreeSet<HandleId> {
        self.groups
            .values()
            .filter(|g| g.contains(id))
            .flat_map(|g| g.participants.iter().copied())
            .filter(|&other| other != id)
            .collect()
    }

    pub fn purity(&self, id: HandleId) -> Purity {
        if self.groups.values().any(|g| g.contains(id)) {
            Purity::Entangled
        } else {
            Purity::Pure
        }
    }

    /// The group that joins exactly `a` and `b`, if any.
    pub fn group_between(&self, a: HandleId, b: HandleId) -> Option<GroupId> {
        self.groups
            .values()
            .find(|g| g.contains(a) && g.contains(b))
            .map(|g| g.id)
    }

    pub fn create_group(
        &mut self,
        participants: Vec<HandleId>,
        now_ms: u64,
        coherence_time_ms: u64,
    ) -> GroupId {
        self.next_group += 1;
        let id = GroupId(self.next_group);
        self.groups.insert(
            id,
            EntanglementGroup {
                id,
                kind: GroupKind::for_size(participants.len()),
                participants,
                strength: FULL_STRENGTH,
                coherence_time_ms,
                created_at_ms: now_ms,
            },
        );
        id
    }

    pub fn remove_group(&mut self, id: GroupId) -> Option<EntanglementGroup> {
        self.groups.remove(&id)
    }

    /// Take `id` out of every group. Groups left with fewer than two
    /// members are destroyed; their ids are returned.
    pub fn detach(&mut self, id: HandleId) -> Vec<GroupId> {
        let mut destroyed = Vec::new();
        for group in self.groups.values_mut() {
            group.participants.retain(|&p| p != id);
            if group.participants.len() < 2 {
                destroyed.push(group.id);
            }
        }
        for gid in &destroyed {
            self.groups.remove(gid);
        }
        destroyed
    }

    /// Detach and drop a handle from the live table.
    pub fn remove(&mut self, id: HandleId) -> Option<(ResourceHandle, Vec<GroupId>)> {
        let handle = self.handles.remove(&id)?;
        let destroyed = self.detach(id);
        Some((handle, destroyed))
    }

    /// Groups whose participant list does not round-trip against the live
    /// table, with a reason for each.
    pub fn inconsistencies(&self) -> Vec<(GroupId, String)> {
        let mut found = Vec::new();
        for group in self.groups.values() {
            if group.participants.len() < 2 {
                found.push((
                    group.id,
                    format!("{} member(s), at least 2 required", group.participants.len()),
                ));
            }
            let unique: BTreeSet<_> = group.participants.iter().collect();
            if unique.len() != group.participants.len() {
                found.push((group.id, "duplicate member".to_string()));
            }
            for member in &group.participants {
                if !self.handles.contains_key(member) {
                    found.push((group.id, format!("member {member} is not live")));
                }
            }
        }
        found
    }

    /// Test-only access for constructing inconsistent states.
    #[cfg(test)]
    pub(crate) fn group_mut(&mut self, id: GroupId) -> Option<&mut EntanglementGroup> {
        self.groups.get_mut(&id)
    }
}
