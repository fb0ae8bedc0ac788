//! Pointer events as immutable value types
//!
//! One event carries every pointer that is down at its timestamp. Routing a
//! multi-pointer gesture to several owners splits the event into sub-events
//! that only carry the owner's pointers ([`PointerEvent::restricted_to`]).

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

/// Number of distinct pointer ids a gesture can track
pub const MAX_POINTERS: u8 = 32;

/// Kind of pointer event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerAction {
    /// First pointer of a gesture went down
    Begin,
    /// One or more pointers moved
    Move,
    /// Last pointer of a gesture went up
    End,
    /// An additional pointer went down
    PointerDown,
    /// A pointer other than the last went up
    PointerUp,
    /// The gesture was aborted
    Cancel,
}

/// Pointer identifier, stable for the duration of a gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointerId(u8);

impl PointerId {
    /// Wrap a raw id; ids must be below [`MAX_POINTERS`].
    ///
    /// An out-of-range id is accepted here but rejected by
    /// [`PointerEvent::new`]; use [`PointerId::try_new`] to check up front.
    pub fn new(id: u8) -> Self {
        debug_assert!(id < MAX_POINTERS, "pointer id {id} out of range");
        Self(id)
    }

    /// Wrap a raw id, or `None` if it is not below [`MAX_POINTERS`]
    pub fn try_new(id: u8) -> Option<Self> {
        (id < MAX_POINTERS).then_some(Self(id))
    }

    /// Whether the id fits in a [`PointerIdBits`] mask
    pub fn is_valid(self) -> bool {
        self.0 < MAX_POINTERS
    }

    /// Raw id
    pub fn raw(self) -> u8 {
        self.0
    }
}

/// Set of pointer ids as a bitmask
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PointerIdBits(u32);

impl PointerIdBits {
    /// No pointers
    pub const EMPTY: Self = Self(0);

    /// Set holding only `id`
    pub fn of(id: PointerId) -> Self {
        Self(1u32.checked_shl(u32::from(id.0)).unwrap_or(0))
    }

    /// Raw mask
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether no pointer is in the set
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether `id` is in the set
    pub fn contains(self, id: PointerId) -> bool {
        !(self & Self::of(id)).is_empty()
    }

    /// Set with `id` added
    pub fn with(self, id: PointerId) -> Self {
        self | Self::of(id)
    }

    /// Set with `id` removed
    pub fn without(self, id: PointerId) -> Self {
        self.difference(Self::of(id))
    }

    /// Ids in `self` but not in `other`
    pub fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Number of ids in the set
    pub fn len(self) -> u32 {
        self.0.count_ones()
    }
}

impl std::ops::BitOr for PointerIdBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for PointerIdBits {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl FromIterator<PointerId> for PointerIdBits {
    fn from_iter<I: IntoIterator<Item = PointerId>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl fmt::Debug for PointerIdBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PointerIdBits({:#b})", self.0)
    }
}

/// One pointer's position in screen pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    /// Gesture-stable id
    pub id: PointerId,
    /// Horizontal position
    pub x: f32,
    /// Vertical position
    pub y: f32,
}

impl Pointer {
    /// Create a pointer sample
    pub fn new(id: u8, x: f32, y: f32) -> Self {
        Self { id: PointerId::new(id), x, y }
    }
}

/// Rejected pointer event construction
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventError {
    /// The event carried no pointers
    #[error("pointer event has no pointers")]
    NoPointers,

    /// A pointer id does not fit in a [`PointerIdBits`] mask
    #[error("pointer id {0} out of range (max {MAX_POINTERS})")]
    IdOutOfRange(u8),
}

/// Immutable multi-pointer event
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    action: PointerAction,
    action_index: usize,
    pointers: Rc<[Pointer]>,
    timestamp: f64,
}

impl PointerEvent {
    /// Create an event.
    ///
    /// `action_index` selects the pointer the action concerns (the one going
    /// down or up); it is clamped into range. Fails on an empty pointer list
    /// or a pointer id of [`MAX_POINTERS`] or above.
    pub fn new(
        action: PointerAction,
        action_index: usize,
        pointers: Vec<Pointer>,
        timestamp: f64,
    ) -> Result<Self, PointerEventError> {
        if pointers.is_empty() {
            return Err(PointerEventError::NoPointers);
        }
        if let Some(pointer) = pointers.iter().find(|pointer| !pointer.id.is_valid()) {
            return Err(PointerEventError::IdOutOfRange(pointer.id.raw()));
        }
        Ok(Self::from_checked(action, action_index, pointers, timestamp))
    }

    /// Single-pointer event
    pub fn single(action: PointerAction, id: u8, x: f32, y: f32, timestamp: f64) -> Result<Self, PointerEventError> {
        Self::new(action, 0, vec![Pointer::new(id, x, y)], timestamp)
    }

    /// `pointers` must be non-empty with valid ids
    fn from_checked(action: PointerAction, action_index: usize, pointers: Vec<Pointer>, timestamp: f64) -> Self {
        let action_index = action_index.min(pointers.len() - 1);
        Self {
            action,
            action_index,
            pointers: pointers.into(),
            timestamp,
        }
    }

    /// Kind of event
    pub fn action(&self) -> PointerAction {
        self.action
    }

    /// Index of the pointer the action concerns
    pub fn action_index(&self) -> usize {
        self.action_index
    }

    /// The pointer the action concerns
    pub fn action_pointer(&self) -> Pointer {
        self.pointers[self.action_index]
    }

    /// Id of the pointer the action concerns
    pub fn action_pointer_id(&self) -> PointerId {
        self.action_pointer().id
    }

    /// Every pointer carried by the event
    pub fn pointers(&self) -> &[Pointer] {
        &self.pointers
    }

    /// Number of pointers carried by the event
    pub fn pointer_count(&self) -> usize {
        self.pointers.len()
    }

    /// Event time in seconds
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Horizontal position of the primary (first) pointer
    pub fn x(&self) -> f32 {
        self.pointers[0].x
    }

    /// Vertical position of the primary (first) pointer
    pub fn y(&self) -> f32 {
        self.pointers[0].y
    }

    /// Ids of every pointer carried by the event
    pub fn pointer_id_bits(&self) -> PointerIdBits {
        self.pointers.iter().map(|pointer| pointer.id).collect()
    }

    /// Sub-event carrying only the pointers in `bits`.
    ///
    /// A `PointerDown`/`PointerUp` whose action pointer is filtered out
    /// becomes a `Move`; one whose action pointer is the only pointer left
    /// becomes a `Begin`/`End`. Returns `None` when no pointer survives.
    pub fn restricted_to(&self, bits: PointerIdBits) -> Option<PointerEvent> {
        let pointers: Vec<Pointer> = self
            .pointers
            .iter()
            .copied()
            .filter(|pointer| bits.contains(pointer.id))
            .collect();
        if pointers.is_empty() {
            return None;
        }

        let action_id = self.action_pointer_id();
        let action_index = pointers.iter().position(|pointer| pointer.id == action_id);
        let (action, action_index) = match (self.action, action_index) {
            (PointerAction::PointerDown | PointerAction::PointerUp, None) => (PointerAction::Move, 0),
            (PointerAction::PointerDown, Some(_)) if pointers.len() == 1 => (PointerAction::Begin, 0),
            (PointerAction::PointerUp, Some(_)) if pointers.len() == 1 => (PointerAction::End, 0),
            (action, index) => (action, index.unwrap_or(0)),
        };

        Some(Self::from_checked(action, action_index, pointers, self.timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_finger(action: PointerAction, action_index: usize) -> PointerEvent {
        PointerEvent::new(
            action,
            action_index,
            vec![Pointer::new(0, 10.0, 10.0), Pointer::new(3, 50.0, 60.0)],
            1.5,
        )
        .unwrap()
    }

    #[test]
    fn test_bits_membership() {
        let bits = PointerIdBits::of(PointerId::new(3)).with(PointerId::new(5));

        assert!(bits.contains(PointerId::new(3)));
        assert!(!bits.contains(PointerId::new(4)));
        assert_eq!(bits.without(PointerId::new(3)), PointerIdBits::of(PointerId::new(5)));
        assert_eq!(bits.len(), 2);
    }

    #[test]
    fn test_restrict_to_all_is_identity() {
        let event = two_finger(PointerAction::Move, 0);

        assert_eq!(event.restricted_to(event.pointer_id_bits()), Some(event));
    }

    #[test]
    fn test_restrict_to_none_is_none() {
        let event = two_finger(PointerAction::Move, 0);

        assert_eq!(event.restricted_to(PointerIdBits::of(PointerId::new(7))), None);
    }

    #[test]
    fn test_secondary_down_becomes_begin_for_its_owner() {
        let event = two_finger(PointerAction::PointerDown, 1);

        let split = event.restricted_to(PointerIdBits::of(PointerId::new(3))).unwrap();

        assert_eq!(split.action(), PointerAction::Begin);
        assert_eq!(split.pointers(), &[Pointer::new(3, 50.0, 60.0)]);
        assert_eq!(split.timestamp(), 1.5);
    }

    #[test]
    fn test_secondary_up_becomes_move_for_other_owner() {
        let event = two_finger(PointerAction::PointerUp, 1);

        let split = event.restricted_to(PointerIdBits::of(PointerId::new(0))).unwrap();

        assert_eq!(split.action(), PointerAction::Move);
        assert_eq!(split.pointer_count(), 1);
        assert_eq!(split.x(), 10.0);
    }

    #[test]
    fn test_secondary_up_becomes_end_for_its_owner() {
        let event = two_finger(PointerAction::PointerUp, 1);

        let split = event.restricted_to(PointerIdBits::of(PointerId::new(3))).unwrap();

        assert_eq!(split.action(), PointerAction::End);
        assert_eq!(split.action_pointer_id(), PointerId::new(3));
    }

    #[test]
    fn test_action_index_is_clamped() {
        let event = PointerEvent::new(PointerAction::Move, 9, vec![Pointer::new(1, 0.0, 0.0)], 0.0).unwrap();

        assert_eq!(event.action_index(), 0);
    }

    #[test]
    fn test_empty_event_is_rejected() {
        assert_eq!(
            PointerEvent::new(PointerAction::Begin, 0, Vec::new(), 0.0),
            Err(PointerEventError::NoPointers)
        );
    }

    #[test]
    fn test_out_of_range_id_is_rejected() {
        let pointers = vec![Pointer::new(1, 0.0, 0.0), Pointer { id: PointerId(MAX_POINTERS), x: 0.0, y: 0.0 }];

        assert_eq!(
            PointerEvent::new(PointerAction::Move, 0, pointers, 0.0),
            Err(PointerEventError::IdOutOfRange(MAX_POINTERS))
        );
        assert_eq!(PointerId::try_new(MAX_POINTERS), None);
        assert_eq!(PointerId::try_new(31), Some(PointerId::new(31)));
    }
}
