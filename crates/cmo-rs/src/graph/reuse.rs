use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::NodeId;

/// Which buffer family of a node a reuse entry or CMO label refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Output,
    Workspace,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Output => "output",
            ObjectKind::Workspace => "workspace",
        }
    }

    /// Short slot prefix used by the text format (`out0`, `ws1`).
    pub fn short_name(self) -> &'static str {
        match self {
            ObjectKind::Output => "out",
            ObjectKind::Workspace => "ws",
        }
    }

    /// Key under which [`MemReuseInfo`] stores the slot, e.g. `output0`.
    pub fn reuse_key(self, index: u32) -> String {
        format!("{}{}", self.as_str(), index)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A future buffer that will physically alias the keyed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReuseEntry {
    pub node: NodeId,
    pub kind: ObjectKind,
    pub index: u32,
}

/// Memory-reuse map computed by the upstream memory planner.
///
/// Keys are `output<idx>` / `workspace<idx>`; each value lists reusers nearest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemReuseInfo {
    entries: BTreeMap<String, Vec<ReuseEntry>>,
}

impl MemReuseInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ObjectKind, index: u32, entry: ReuseEntry) {
        self.entries
            .entry(kind.reuse_key(index))
            .or_default()
            .push(entry);
    }

    pub fn reusers(&self, kind: ObjectKind, index: u32) -> &[ReuseEntry] {
        self.entries
            .get(&kind.reuse_key(index))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Nearest reuser of the slot; only this one is relevant for hazards.
    pub fn first_reuser(&self, kind: ObjectKind, index: u32) -> Option<&ReuseEntry> {
        self.reusers(kind, index).first()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ReuseEntry])> {
        self.entries
            .iter()
            .map(|(key, entries)| (key.as_str(), entries.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_reuser_is_reported() {
        let mut info = MemReuseInfo::new();
        let near = ReuseEntry {
            node: NodeId(3),
            kind: ObjectKind::Output,
            index: 0,
        };
        let far = ReuseEntry {
            node: NodeId(7),
            kind: ObjectKind::Workspace,
            index: 1,
        };
        info.push(ObjectKind::Workspace, 0, near);
        info.push(ObjectKind::Workspace, 0, far);

        assert_eq!(info.first_reuser(ObjectKind::Workspace, 0), Some(&near));
        assert_eq!(info.reusers(ObjectKind::Workspace, 0).len(), 2);
        assert_eq!(info.first_reuser(ObjectKind::Output, 0), None);
        assert_eq!(
            info.iter().map(|(key, _)| key).collect::<Vec<_>>(),
            ["workspace0"]
        );
    }
}
