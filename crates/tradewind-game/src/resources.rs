//! Resource accounting.
//!
//! [`ResourceSet`] is a plain value: five named counts plus an "unknown"
//! bucket for cards whose type the observer can't see (another player's
//! robbery loot, a hidden discard). [`Holding`] wraps a set behind a lock so
//! a player's hand can be credited and debited from more than one thread.
//!
//! Known counts never go negative. Taking more of a type than is known to be
//! held takes the deficit from the unknown bucket instead, which *may* go
//! negative: that means the local view has drifted from the authoritative
//! one, and is reported as [`Accounting::Desynced`] rather than clamped.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ResourceType
// ---------------------------------------------------------------------------

/// A named resource, numbered as on the wire (1..=5; 6 is "unknown").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Clay = 1,
    Ore = 2,
    Sheep = 3,
    Wheat = 4,
    Wood = 5,
}

/// Wire number of the unknown bucket.
pub const UNKNOWN_RESOURCE: i32 = 6;

impl ResourceType {
    pub const ALL: [Self; 5] = [Self::Clay, Self::Ore, Self::Sheep, Self::Wheat, Self::Wood];

    pub fn from_wire(value: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.to_wire() == value)
    }

    pub fn to_wire(self) -> i32 {
        self as i32
    }

    fn index(self) -> usize {
        self as usize - 1
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Clay => "clay",
            Self::Ore => "ore",
            Self::Sheep => "sheep",
            Self::Wheat => "wheat",
            Self::Wood => "wood",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Accounting
// ---------------------------------------------------------------------------

/// Outcome of a subtraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Accounting {
    /// The set still adds up.
    Balanced,
    /// The unknown bucket went negative: this view of the hand no longer
    /// matches the authoritative one and needs a recount.
    Desynced { unknown: i32 },
}

impl Accounting {
    pub fn is_desynced(self) -> bool {
        matches!(self, Self::Desynced { .. })
    }
}

// ---------------------------------------------------------------------------
// ResourceSet
// ---------------------------------------------------------------------------

/// Counts of each resource type plus the unknown bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceSet {
    known: [i32; 5],
    unknown: i32,
}

impl ResourceSet {
    /// An empty set.
    pub const fn new() -> Self {
        Self {
            known: [0; 5],
            unknown: 0,
        }
    }

    /// Builds a set from explicit counts. Negative known counts are clamped
    /// to zero; the unknown count is taken as given.
    pub fn from_counts(clay: i32, ore: i32, sheep: i32, wheat: i32, wood: i32, unknown: i32) -> Self {
        Self {
            known: [clay.max(0), ore.max(0), sheep.max(0), wheat.max(0), wood.max(0)],
            unknown,
        }
    }

    /// A set holding `amount` of one type.
    pub fn of(rtype: ResourceType, amount: i32) -> Self {
        let mut set = Self::new();
        set.add(rtype, amount);
        set
    }

    /// A set holding only `amount` unknown resources.
    pub fn unknown_only(amount: i32) -> Self {
        Self {
            known: [0; 5],
            unknown: amount,
        }
    }

    /// The six wire values: clay, ore, sheep, wheat, wood, unknown.
    pub fn to_wire(&self) -> [i32; 6] {
        let [clay, ore, sheep, wheat, wood] = self.known;
        [clay, ore, sheep, wheat, wood, self.unknown]
    }

    /// Rebuilds a set from its six wire values. Returns `None` when a known
    /// count is negative; a negative unknown count is representable.
    pub fn from_wire(values: [i32; 6]) -> Option<Self> {
        let [clay, ore, sheep, wheat, wood, unknown] = values;
        let known = [clay, ore, sheep, wheat, wood];
        if known.iter().any(|n| *n < 0) {
            return None;
        }
        Some(Self { known, unknown })
    }

    pub fn amount(&self, rtype: ResourceType) -> i32 {
        self.known[rtype.index()]
    }

    pub fn unknown(&self) -> i32 {
        self.unknown
    }

    /// Sum of the known counts.
    pub fn known_total(&self) -> i32 {
        self.known.iter().sum()
    }

    /// Sum of known and unknown counts.
    pub fn total(&self) -> i32 {
        self.known_total() + self.unknown
    }

    pub fn is_empty(&self) -> bool {
        self.known.iter().all(|n| *n == 0) && self.unknown == 0
    }

    /// Iterates the non-zero known counts.
    pub fn iter_known(&self) -> impl Iterator<Item = (ResourceType, i32)> + '_ {
        ResourceType::ALL
            .into_iter()
            .map(|r| (r, self.amount(r)))
            .filter(|(_, n)| *n != 0)
    }

    /// Adds `amount`, which may be negative. A known count stops at zero.
    pub fn add(&mut self, rtype: ResourceType, amount: i32) {
        let slot = &mut self.known[rtype.index()];
        let sum = slot.saturating_add(amount);
        if sum < 0 {
            tracing::debug!(%rtype, held = *slot, amount, "clamping known count at zero");
        }
        *slot = sum.max(0);
    }

    pub fn add_unknown(&mut self, amount: i32) {
        self.unknown += amount;
    }

    pub fn add_set(&mut self, other: &Self) {
        for rtype in ResourceType::ALL {
            self.add(rtype, other.amount(rtype));
        }
        self.unknown += other.unknown;
    }

    /// Takes `amount` of one type. A shortfall comes out of the unknown
    /// bucket instead of driving the known count negative.
    pub fn subtract(&mut self, rtype: ResourceType, amount: i32) -> Accounting {
        let slot = &mut self.known[rtype.index()];
        if *slot >= amount {
            *slot -= amount;
        } else {
            let deficit = amount - *slot;
            *slot = 0;
            self.unknown -= deficit;
        }
        self.accounting()
    }

    /// Takes a whole set.
    ///
    /// Unknown resources in `other` come out of this set's unknown bucket;
    /// if that isn't enough, every known resource is folded into the unknown
    /// bucket first (we can no longer tell which types are left).
    pub fn subtract_set(&mut self, other: &Self) -> Accounting {
        for rtype in ResourceType::ALL {
            let amount = other.amount(rtype);
            if amount > 0 {
                let _ = self.subtract(rtype, amount);
            }
        }
        if other.unknown > 0 {
            if self.unknown < other.unknown {
                self.convert_to_unknown();
            }
            self.unknown -= other.unknown;
        }
        self.accounting()
    }

    /// Whether every known count of `other` is covered by this set, and the
    /// totals cover `other`'s unknown part.
    pub fn contains(&self, other: &Self) -> bool {
        let known_ok = ResourceType::ALL
            .into_iter()
            .all(|r| self.amount(r) >= other.amount(r));
        known_ok && self.total() >= other.total()
    }

    /// Moves every known count into the unknown bucket.
    pub fn convert_to_unknown(&mut self) {
        self.unknown += self.known_total();
        self.known = [0; 5];
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    fn accounting(&self) -> Accounting {
        if self.unknown < 0 {
            Accounting::Desynced {
                unknown: self.unknown,
            }
        } else {
            Accounting::Balanced
        }
    }
}

impl fmt::Display for ResourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [clay, ore, sheep, wheat, wood] = self.known;
        write!(
            f,
            "clay={clay}|ore={ore}|sheep={sheep}|wheat={wheat}|wood={wood}|unknown={}",
            self.unknown
        )
    }
}

// ---------------------------------------------------------------------------
// Holding
// ---------------------------------------------------------------------------

/// One player's hand, safe to mutate from several threads.
///
/// Each holding has its own lock; every operation locks it exactly once,
/// so add/subtract are atomic with respect to each other. No ordering is
/// implied between different holdings.
#[derive(Debug, Default)]
pub struct Holding {
    inner: Mutex<HoldingInner>,
}

#[derive(Debug, Default)]
struct HoldingInner {
    set: ResourceSet,
    desynced: bool,
}

impl Holding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(set: ResourceSet) -> Self {
        Self {
            inner: Mutex::new(HoldingInner {
                set,
                desynced: false,
            }),
        }
    }

    /// A copy of the current counts.
    pub fn snapshot(&self) -> ResourceSet {
        self.lock().set
    }

    pub fn total(&self) -> i32 {
        self.lock().set.total()
    }

    pub fn add(&self, rtype: ResourceType, amount: i32) {
        self.lock().set.add(rtype, amount);
    }

    pub fn add_unknown(&self, amount: i32) {
        self.lock().set.add_unknown(amount);
    }

    pub fn add_set(&self, other: &ResourceSet) {
        self.lock().set.add_set(other);
    }

    pub fn subtract(&self, rtype: ResourceType, amount: i32) -> Accounting {
        let mut inner = self.lock();
        let outcome = inner.set.subtract(rtype, amount);
        inner.record(outcome)
    }

    pub fn subtract_set(&self, other: &ResourceSet) -> Accounting {
        let mut inner = self.lock();
        let outcome = inner.set.subtract_set(other);
        inner.record(outcome)
    }

    /// Replaces the counts with an authoritative copy and clears the
    /// desync flag.
    pub fn replace(&self, set: ResourceSet) {
        let mut inner = self.lock();
        inner.set = set;
        inner.desynced = false;
    }

    /// Recounts from an authoritative total: if the local total differs,
    /// everything becomes unknown. Returns `true` if the counts changed.
    pub fn resync(&self, authoritative_total: i32) -> bool {
        let mut inner = self.lock();
        let changed = inner.set.total() != authoritative_total || inner.set.unknown() < 0;
        if changed {
            tracing::debug!(
                local = %inner.set,
                authoritative_total,
                "recounting holding from authoritative total"
            );
            inner.set = ResourceSet::unknown_only(authoritative_total);
        }
        inner.desynced = false;
        changed
    }

    /// Whether a subtraction has driven the unknown bucket negative since
    /// the last `replace`/`resync`.
    pub fn needs_resync(&self) -> bool {
        self.lock().desynced
    }

    fn lock(&self) -> MutexGuard<'_, HoldingInner> {
        // A panic while holding the lock can't leave the counts half-written
        // (every update is a single assignment), so poisoning is ignored.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HoldingInner {
    fn record(&mut self, outcome: Accounting) -> Accounting {
        if let Accounting::Desynced { unknown } = outcome {
            if !self.desynced {
                tracing::warn!(unknown, set = %self.set, "resource accounting went negative");
            }
            self.desynced = true;
        }
        outcome
    }
}
