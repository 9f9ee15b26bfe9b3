//! Lifecycle event kinds and the named signal combinations a webhook can
//! subscribe to.
//!
//! A [`Signal`] is stored on every registration and names a union of event
//! kinds. Membership is derived from a [`KindSet`] bitset, never from
//! hand-maintained lists, so every combination always matches its own
//! constituents.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// Set of atomic lifecycle kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KindSet: u8 {
        const CREATE = 1 << 0;
        const UPDATE = 1 << 1;
        const DELETE = 1 << 2;
        const M2M_ADD = 1 << 3;
        const M2M_REMOVE = 1 << 4;
        const M2M_CLEAR = 1 << 5;
        /// Any many-to-many mutation.
        const M2M = Self::M2M_ADD.bits() | Self::M2M_REMOVE.bits() | Self::M2M_CLEAR.bits();
    }
}

/// A single lifecycle event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Create,
    Update,
    Delete,
    M2mAdd,
    M2mRemove,
    M2mClear,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Create,
        EventKind::Update,
        EventKind::Delete,
        EventKind::M2mAdd,
        EventKind::M2mRemove,
        EventKind::M2mClear,
    ];

    /// The bit this kind occupies in a [`KindSet`].
    pub fn bit(self) -> KindSet {
        match self {
            EventKind::Create => KindSet::CREATE,
            EventKind::Update => KindSet::UPDATE,
            EventKind::Delete => KindSet::DELETE,
            EventKind::M2mAdd => KindSet::M2M_ADD,
            EventKind::M2mRemove => KindSet::M2M_REMOVE,
            EventKind::M2mClear => KindSet::M2M_CLEAR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Create => "CREATE",
            EventKind::Update => "UPDATE",
            EventKind::Delete => "DELETE",
            EventKind::M2mAdd => "M2M_ADD",
            EventKind::M2mRemove => "M2M_REMOVE",
            EventKind::M2mClear => "M2M_CLEAR",
        }
    }

    /// Capitalized label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            EventKind::Create => "Create",
            EventKind::Update => "Update",
            EventKind::Delete => "Delete",
            EventKind::M2mAdd => "M2M add",
            EventKind::M2mRemove => "M2M remove",
            EventKind::M2mClear => "M2M clear",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known signal or kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown signal {0:?}")]
pub struct UnknownSignal(pub String);

impl FromStr for EventKind {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownSignal(s.to_string()))
    }
}

/// Named combination of lifecycle kinds a registration fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Create,
    Update,
    Delete,
    M2m,
    CreateOrUpdate,
    CreateOrDelete,
    CreateOrM2m,
    UpdateOrDelete,
    UpdateOrM2m,
    DeleteOrM2m,
    CreateUpdateOrDelete,
    CreateUpdateOrM2m,
    CreateDeleteOrM2m,
    UpdateDeleteOrM2m,
    CreateUpdateDeleteOrM2m,
}

impl Signal {
    pub const ALL: [Signal; 15] = [
        Signal::Create,
        Signal::Update,
        Signal::Delete,
        Signal::M2m,
        Signal::CreateOrUpdate,
        Signal::CreateOrDelete,
        Signal::CreateOrM2m,
        Signal::UpdateOrDelete,
        Signal::UpdateOrM2m,
        Signal::DeleteOrM2m,
        Signal::CreateUpdateOrDelete,
        Signal::CreateUpdateOrM2m,
        Signal::CreateDeleteOrM2m,
        Signal::UpdateDeleteOrM2m,
        Signal::CreateUpdateDeleteOrM2m,
    ];

    /// The atomic kinds this signal is the union of.
    pub fn kinds(self) -> KindSet {
        match self {
            Signal::Create => KindSet::CREATE,
            Signal::Update => KindSet::UPDATE,
            Signal::Delete => KindSet::DELETE,
            Signal::M2m => KindSet::M2M,
            Signal::CreateOrUpdate => KindSet::CREATE | KindSet::UPDATE,
            Signal::CreateOrDelete => KindSet::CREATE | KindSet::DELETE,
            Signal::CreateOrM2m => KindSet::CREATE | KindSet::M2M,
            Signal::UpdateOrDelete => KindSet::UPDATE | KindSet::DELETE,
            Signal::UpdateOrM2m => KindSet::UPDATE | KindSet::M2M,
            Signal::DeleteOrM2m => KindSet::DELETE | KindSet::M2M,
            Signal::CreateUpdateOrDelete => KindSet::CREATE | KindSet::UPDATE | KindSet::DELETE,
            Signal::CreateUpdateOrM2m => KindSet::CREATE | KindSet::UPDATE | KindSet::M2M,
            Signal::CreateDeleteOrM2m => KindSet::CREATE | KindSet::DELETE | KindSet::M2M,
            Signal::UpdateDeleteOrM2m => KindSet::UPDATE | KindSet::DELETE | KindSet::M2M,
            Signal::CreateUpdateDeleteOrM2m => KindSet::all(),
        }
    }

    /// Whether an event of `kind` fires registrations with this signal.
    pub fn matches(self, kind: EventKind) -> bool {
        self.kinds().contains(kind.bit())
    }

    /// Every signal whose union includes `kind`.
    ///
    /// Used as the `IN` set when looking up registrations for an event.
    pub fn members_containing(kind: EventKind) -> Vec<Signal> {
        Signal::ALL
            .into_iter()
            .filter(|signal| signal.matches(kind))
            .collect()
    }

    /// The named signal covering exactly `kinds`, if there is one.
    pub fn from_kinds(kinds: KindSet) -> Option<Signal> {
        Signal::ALL.into_iter().find(|signal| signal.kinds() == kinds)
    }

    /// Map an integer code of the three-kind scheme onto its current name.
    pub fn from_legacy_code(code: i32) -> Option<Signal> {
        match code {
            0 => Some(Signal::Create),
            1 => Some(Signal::Update),
            2 => Some(Signal::Delete),
            3 => Some(Signal::CreateOrUpdate),
            4 => Some(Signal::CreateOrDelete),
            5 => Some(Signal::UpdateOrDelete),
            6 => Some(Signal::CreateUpdateOrDelete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Create => "CREATE",
            Signal::Update => "UPDATE",
            Signal::Delete => "DELETE",
            Signal::M2m => "M2M",
            Signal::CreateOrUpdate => "CREATE_OR_UPDATE",
            Signal::CreateOrDelete => "CREATE_OR_DELETE",
            Signal::CreateOrM2m => "CREATE_OR_M2M",
            Signal::UpdateOrDelete => "UPDATE_OR_DELETE",
            Signal::UpdateOrM2m => "UPDATE_OR_M2M",
            Signal::DeleteOrM2m => "DELETE_OR_M2M",
            Signal::CreateUpdateOrDelete => "CREATE_UPDATE_OR_DELETE",
            Signal::CreateUpdateOrM2m => "CREATE_UPDATE_OR_M2M",
            Signal::CreateDeleteOrM2m => "CREATE_DELETE_OR_M2M",
            Signal::UpdateDeleteOrM2m => "UPDATE_DELETE_OR_M2M",
            Signal::CreateUpdateDeleteOrM2m => "CREATE_UPDATE_DELETE_OR_M2M",
        }
    }

    /// Human-readable label for admin listings.
    pub fn label(self) -> &'static str {
        match self {
            Signal::Create => "Create",
            Signal::Update => "Update",
            Signal::Delete => "Delete",
            Signal::M2m => "M2M changed",
            Signal::CreateOrUpdate => "Create or Update",
            Signal::CreateOrDelete => "Create or Delete",
            Signal::CreateOrM2m => "Create or M2M changed",
            Signal::UpdateOrDelete => "Update or Delete",
            Signal::UpdateOrM2m => "Update or M2M changed",
            Signal::DeleteOrM2m => "Delete or M2M changed",
            Signal::CreateUpdateOrDelete => "Create, Update or Delete",
            Signal::CreateUpdateOrM2m => "Create, Update or M2M changed",
            Signal::CreateDeleteOrM2m => "Create, Delete or M2M changed",
            Signal::UpdateDeleteOrM2m => "Update, Delete or M2M changed",
            Signal::CreateUpdateDeleteOrM2m => "Create, Update or Delete, or M2M changed",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = UnknownSignal;

    /// Accepts current names and the integer codes of the legacy scheme.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(signal) = Signal::ALL.into_iter().find(|signal| signal.as_str() == s) {
            return Ok(signal);
        }
        s.parse::<i32>()
            .ok()
            .and_then(Signal::from_legacy_code)
            .ok_or_else(|| UnknownSignal(s.to_string()))
    }
}
