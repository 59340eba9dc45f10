// src/body.rs
//
// Body mapping vocabulary: operator signs, body-part groups and lateral flags.
//
// The numeric codes are the ones hosts pass across the C boundary, so every
// enum here is `repr(i32)` and convertible from a raw integer.
//
// The group hierarchy is an explicit lookup table (`Group::parents`) rather
// than numeric banding. Phalanges belong to every digit, so the table is a
// DAG, not a tree.

use thiserror::Error;

/// A raw integer that does not name a known body-mapping value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid {kind} code {code}")]
pub struct InvalidCode {
    pub kind: &'static str,
    pub code: i32,
}

// ═══════════════════════════════════════════════════════════════════
// Sign
// ═══════════════════════════════════════════════════════════════════

/// Operator of a target: include (`Plus`), exclude (`Minus`) or either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum Sign {
    Minus = -1,
    Neutral = 0,
    Plus = 1,
}

impl Sign {
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// `Neutral` agrees with any sign.
    #[inline]
    pub fn agrees(self, other: Sign) -> bool {
        self == other || self == Sign::Neutral || other == Sign::Neutral
    }

    #[inline]
    pub fn is_exclusion(self) -> bool {
        self == Sign::Minus
    }
}

impl TryFrom<i32> for Sign {
    type Error = InvalidCode;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            -1 => Ok(Sign::Minus),
            0 => Ok(Sign::Neutral),
            1 => Ok(Sign::Plus),
            _ => Err(InvalidCode { kind: "sign", code }),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Side
// ═══════════════════════════════════════════════════════════════════

/// Lateral flag of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum Side {
    Unknown = -1,
    Global = 0,
    Right = 1,
    Left = 2,
    Center = 3,
}

impl Side {
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// `Global` agrees with any side.
    #[inline]
    pub fn agrees(self, other: Side) -> bool {
        self == other || self == Side::Global || other == Side::Global
    }
}

impl TryFrom<i32> for Side {
    type Error = InvalidCode;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            -1 => Ok(Side::Unknown),
            0 => Ok(Side::Global),
            1 => Ok(Side::Right),
            2 => Ok(Side::Left),
            3 => Ok(Side::Center),
            _ => Err(InvalidCode { kind: "side", code }),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Group
// ═══════════════════════════════════════════════════════════════════

/// Body-part group, from the whole body down to single phalanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum Group {
    Unknown = -1,
    All = 0,
    Top = 100,
    Down = 101,
    Arm = 200,
    Head = 201,
    Chest = 202,
    Waist = 203,
    Leg = 204,
    UpperArm = 300,
    LowerArm = 301,
    Hand = 302,
    Skull = 303,
    Neck = 304,
    UpperLeg = 305,
    LowerLeg = 306,
    Foot = 307,
    Palm = 400,
    Finger = 401,
    Sole = 402,
    Toe = 403,
    Thumb = 500,
    Index = 501,
    Middle = 502,
    Ring = 503,
    Pinky = 504,
    Hallux = 505,
    IndexToe = 506,
    MiddleToe = 507,
    RingToe = 508,
    PinkyToe = 509,
    First = 600,
    Second = 601,
    Third = 602,
}

const DIGITS: [Group; 10] = [
    Group::Thumb,
    Group::Index,
    Group::Middle,
    Group::Ring,
    Group::Pinky,
    Group::Hallux,
    Group::IndexToe,
    Group::MiddleToe,
    Group::RingToe,
    Group::PinkyToe,
];

impl Group {
    /// Every group, in code order.
    pub const VARIANTS: [Group; 34] = [
        Group::Unknown,
        Group::All,
        Group::Top,
        Group::Down,
        Group::Arm,
        Group::Head,
        Group::Chest,
        Group::Waist,
        Group::Leg,
        Group::UpperArm,
        Group::LowerArm,
        Group::Hand,
        Group::Skull,
        Group::Neck,
        Group::UpperLeg,
        Group::LowerLeg,
        Group::Foot,
        Group::Palm,
        Group::Finger,
        Group::Sole,
        Group::Toe,
        Group::Thumb,
        Group::Index,
        Group::Middle,
        Group::Ring,
        Group::Pinky,
        Group::Hallux,
        Group::IndexToe,
        Group::MiddleToe,
        Group::RingToe,
        Group::PinkyToe,
        Group::First,
        Group::Second,
        Group::Third,
    ];

    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Direct parents in the body hierarchy.
    pub fn parents(self) -> &'static [Group] {
        use Group::*;
        match self {
            Unknown | All => &[],
            Top | Down => &[All],
            Arm | Head | Chest => &[Top],
            Waist | Leg => &[Down],
            UpperArm | LowerArm | Hand => &[Arm],
            Skull | Neck => &[Head],
            UpperLeg | LowerLeg | Foot => &[Leg],
            Palm | Finger => &[Hand],
            Sole | Toe => &[Foot],
            Thumb | Index | Middle | Ring | Pinky => &[Finger],
            Hallux | IndexToe | MiddleToe | RingToe | PinkyToe => &[Toe],
            First | Second | Third => &DIGITS,
        }
    }

    /// Direct children in the body hierarchy.
    pub fn children(self) -> impl Iterator<Item = Group> {
        Self::VARIANTS
            .into_iter()
            .filter(move |g| g.parents().contains(&self))
    }

    /// Strict descendant test (a group is not its own descendant).
    pub fn is_descendant_of(self, ancestor: Group) -> bool {
        self.parents()
            .iter()
            .any(|&p| p == ancestor || p.is_descendant_of(ancestor))
    }

    /// True if `self` is `other` or one of its ancestors.
    #[inline]
    pub fn covers(self, other: Group) -> bool {
        self == other || other.is_descendant_of(self)
    }
}

impl TryFrom<i32> for Group {
    type Error = InvalidCode;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::VARIANTS
            .into_iter()
            .find(|g| g.code() == code)
            .ok_or(InvalidCode { kind: "group", code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for group in Group::VARIANTS {
            assert_eq!(Group::try_from(group.code()), Ok(group));
        }
        assert_eq!(Side::try_from(2), Ok(Side::Left));
        assert_eq!(Sign::try_from(-1), Ok(Sign::Minus));
        assert!(Group::try_from(205).is_err());
        assert!(Side::try_from(4).is_err());
    }

    #[test]
    fn test_hierarchy_descendants() {
        assert!(Group::UpperArm.is_descendant_of(Group::Arm));
        assert!(Group::Index.is_descendant_of(Group::Arm));
        assert!(Group::Index.is_descendant_of(Group::All));
        assert!(Group::Second.is_descendant_of(Group::Toe));
        assert!(Group::Second.is_descendant_of(Group::Hand));
        assert!(!Group::Arm.is_descendant_of(Group::Arm));
        assert!(!Group::Arm.is_descendant_of(Group::UpperArm));
        assert!(!Group::Skull.is_descendant_of(Group::Leg));
        assert!(!Group::Unknown.is_descendant_of(Group::All));
    }

    #[test]
    fn test_children() {
        let children: Vec<_> = Group::Head.children().collect();
        assert_eq!(children, vec![Group::Skull, Group::Neck]);
        assert_eq!(Group::Chest.children().count(), 0);
        assert_eq!(Group::Thumb.children().count(), 3);
    }

    #[test]
    fn test_agreement() {
        assert!(Side::Global.agrees(Side::Left));
        assert!(Side::Right.agrees(Side::Global));
        assert!(!Side::Right.agrees(Side::Left));
        assert!(Sign::Neutral.agrees(Sign::Minus));
        assert!(!Sign::Plus.agrees(Sign::Minus));
    }
}
