// src/target.rs
//
// Target descriptors and the set operations the source registry relies on.
//
// Two kinds of comparison live here and must not be confused:
// - `Target::matches` is hierarchy-aware and used for mixing and queries
// - `TargetSet::difference` removes exact structural matches only

use crate::body::{Group, InvalidCode, Side, Sign};

/// A `(sign, group, side)` descriptor selecting body-part endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub sign: Sign,
    pub group: Group,
    pub side: Side,
}

impl Target {
    pub fn new(sign: Sign, group: Group, side: Side) -> Self {
        Self { sign, group, side }
    }

    /// Additive target on `group`/`side`.
    pub fn plus(group: Group, side: Side) -> Self {
        Self::new(Sign::Plus, group, side)
    }

    /// Exclusion target on `group`/`side`.
    pub fn minus(group: Group, side: Side) -> Self {
        Self::new(Sign::Minus, group, side)
    }

    /// Build a target from host integer codes.
    pub fn from_codes(sign: i32, group: i32, side: i32) -> Result<Self, InvalidCode> {
        Ok(Self::new(
            Sign::try_from(sign)?,
            Group::try_from(group)?,
            Side::try_from(side)?,
        ))
    }

    /// Hierarchy-aware match with `self` as the query.
    ///
    /// A coarse query group matches a stored descendant group. Sides agree
    /// when equal or when either is `Global`; signs when equal or when either
    /// is `Neutral`.
    #[inline]
    pub fn matches(&self, candidate: &Target) -> bool {
        self.group.covers(candidate.group)
            && self.side.agrees(candidate.side)
            && self.sign.agrees(candidate.sign)
    }

    /// Whether this target reaches a concrete endpoint (sign ignored).
    #[inline]
    pub fn reaches(&self, endpoint: &Endpoint) -> bool {
        self.group.covers(endpoint.group) && self.side.agrees(endpoint.side)
    }
}

/// Free-function form of [`Target::matches`].
#[inline]
pub fn matches(candidate: &Target, query: &Target) -> bool {
    query.matches(candidate)
}

/// A resolved actuation target. Frame output is keyed by endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub group: Group,
    pub side: Side,
}

impl Endpoint {
    pub fn new(group: Group, side: Side) -> Self {
        Self { group, side }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Body map collaborator
// ═══════════════════════════════════════════════════════════════════

/// Maps an abstract target onto the endpoints a device layout provides.
///
/// Implemented by the avatar/device calibration layer.
pub trait BodyMap: Send + Sync {
    fn endpoints(&self, target: &Target) -> Vec<Endpoint>;

    /// Call `f` for every endpoint `target` reaches.
    ///
    /// Used on the frame path; override to avoid building the `Vec`.
    fn for_each_endpoint(&self, target: &Target, f: &mut dyn FnMut(Endpoint)) {
        for endpoint in self.endpoints(target) {
            f(endpoint);
        }
    }
}

/// Every target maps to the single endpoint named by its group and side.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityBodyMap;

impl BodyMap for IdentityBodyMap {
    fn endpoints(&self, target: &Target) -> Vec<Endpoint> {
        vec![Endpoint::new(target.group, target.side)]
    }

    fn for_each_endpoint(&self, target: &Target, f: &mut dyn FnMut(Endpoint)) {
        f(Endpoint::new(target.group, target.side));
    }
}

/// A fixed list of device endpoints; a target reaches every endpoint in its
/// subtree with an agreeing side.
#[derive(Debug, Clone, Default)]
pub struct EndpointMap {
    endpoints: Vec<Endpoint>,
}

impl EndpointMap {
    pub fn new(endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        let mut endpoints: Vec<Endpoint> = endpoints.into_iter().collect();
        endpoints.sort();
        endpoints.dedup();
        Self { endpoints }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }
}

impl BodyMap for EndpointMap {
    fn endpoints(&self, target: &Target) -> Vec<Endpoint> {
        self.endpoints
            .iter()
            .filter(|e| target.reaches(e))
            .copied()
            .collect()
    }

    fn for_each_endpoint(&self, target: &Target, f: &mut dyn FnMut(Endpoint)) {
        self.endpoints
            .iter()
            .filter(|e| target.reaches(e))
            .for_each(|e| f(*e));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Target set
// ═══════════════════════════════════════════════════════════════════

/// One target of a source together with its per-target state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetEntry {
    pub target: Target,
    /// Override intensity, never negative.
    pub intensity: f64,
    pub texture_position: f64,
    pub stiffness_position: f64,
}

impl TargetEntry {
    fn new(target: Target) -> Self {
        Self {
            target,
            intensity: 1.0,
            texture_position: 0.0,
            stiffness_position: 0.0,
        }
    }
}

/// An endpoint reached by a source, with the state of the target that won it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedEndpoint {
    pub endpoint: Endpoint,
    pub intensity: f64,
    pub texture_position: f64,
    pub stiffness_position: f64,
}

/// Set of targets with structural (not multiset) semantics.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    entries: Vec<TargetEntry>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every incoming target not already present. Returns how many were added.
    pub fn union(&mut self, incoming: &[Target]) -> usize {
        let before = self.entries.len();
        for target in incoming {
            if !self.contains(target) {
                self.entries.push(TargetEntry::new(*target));
            }
        }
        self.entries.len() - before
    }

    /// Remove exact structural matches only. Returns how many were removed.
    pub fn difference(&mut self, to_remove: &[Target]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !to_remove.contains(&e.target));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Exact structural membership.
    pub fn contains(&self, target: &Target) -> bool {
        self.entries.iter().any(|e| e.target == *target)
    }

    /// Hierarchy-aware membership: any stored target matched by `query`.
    pub fn any_matches(&self, query: &Target) -> bool {
        self.entries.iter().any(|e| query.matches(&e.target))
    }

    /// Whether the set actually drives the body part `query` names.
    ///
    /// An additive target must match the query, and no `Minus` target may
    /// cover the query's group and side. This agrees with [`resolve`].
    ///
    /// [`resolve`]: TargetSet::resolve
    pub fn drives(&self, query: &Target) -> bool {
        let mut driven = false;
        for entry in &self.entries {
            let target = &entry.target;
            if target.sign.is_exclusion() {
                if target.group.covers(query.group) && target.side.agrees(query.side) {
                    return false;
                }
            } else if query.matches(target) {
                driven = true;
            }
        }
        driven
    }

    pub fn get(&self, target: &Target) -> Option<&TargetEntry> {
        self.entries.iter().find(|e| e.target == *target)
    }

    pub fn get_mut(&mut self, target: &Target) -> Option<&mut TargetEntry> {
        self.entries.iter_mut().find(|e| e.target == *target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetEntry> {
        self.entries.iter()
    }

    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.entries.iter().map(|e| e.target)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the set into concrete endpoints through `map`, sorted by
    /// endpoint.
    ///
    /// Endpoints reached by a `Minus` target are excluded even when an
    /// additive target also reaches them. When several additive targets
    /// reach one endpoint, the most intense one wins.
    pub fn resolve(&self, map: &dyn BodyMap) -> Vec<ResolvedEndpoint> {
        let mut resolved = Vec::new();
        self.resolve_into(map, &mut resolved);
        resolved.sort_unstable_by_key(|r| r.endpoint);
        resolved
    }

    /// Same as [`resolve`](TargetSet::resolve), writing into a caller-owned
    /// buffer and leaving it unsorted.
    pub fn resolve_into(&self, map: &dyn BodyMap, out: &mut Vec<ResolvedEndpoint>) {
        out.clear();

        for entry in self.entries.iter().filter(|e| !e.target.sign.is_exclusion()) {
            map.for_each_endpoint(&entry.target, &mut |endpoint| {
                let candidate = ResolvedEndpoint {
                    endpoint,
                    intensity: entry.intensity,
                    texture_position: entry.texture_position,
                    stiffness_position: entry.stiffness_position,
                };
                match out.iter_mut().find(|r| r.endpoint == endpoint) {
                    Some(r) if candidate.intensity > r.intensity => *r = candidate,
                    Some(_) => {}
                    None => out.push(candidate),
                }
            });
        }

        for entry in self.entries.iter().filter(|e| e.target.sign.is_exclusion()) {
            map.for_each_endpoint(&entry.target, &mut |endpoint| {
                out.retain(|r| r.endpoint != endpoint);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arm_right() -> Target {
        Target::plus(Group::Arm, Side::Right)
    }

    #[test]
    fn test_union_ignores_duplicates() {
        let mut set = TargetSet::new();
        assert_eq!(set.union(&[arm_right(), arm_right()]), 1);
        assert_eq!(set.union(&[arm_right()]), 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_difference_is_exact() {
        let mut set = TargetSet::new();
        set.union(&[Target::plus(Group::UpperArm, Side::Right)]);

        // Coarse target matches but does not remove the finer one
        assert!(set.any_matches(&arm_right()));
        assert_eq!(set.difference(&[arm_right()]), 0);
        assert_eq!(set.len(), 1);

        assert_eq!(set.difference(&[Target::plus(Group::UpperArm, Side::Right)]), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn test_matching_rules() {
        let stored = Target::plus(Group::Hand, Side::Left);
        assert!(Target::new(Sign::Neutral, Group::Top, Side::Global).matches(&stored));
        assert!(!Target::plus(Group::Hand, Side::Right).matches(&stored));
        assert!(!Target::minus(Group::Hand, Side::Left).matches(&stored));
        assert!(!Target::plus(Group::Palm, Side::Left).matches(&stored));
        assert!(matches(&stored, &Target::plus(Group::All, Side::Left)));
    }

    #[test]
    fn test_exclusion_blocks_drive_query() {
        let mut set = TargetSet::new();
        set.union(&[
            Target::plus(Group::Leg, Side::Left),
            Target::minus(Group::Hand, Side::Left),
        ]);
        let hand = Target::new(Sign::Neutral, Group::Hand, Side::Left);

        // Structurally present, but excluded from output
        assert!(set.any_matches(&hand));
        assert!(!set.drives(&hand));
        assert!(!set.drives(&Target::new(Sign::Neutral, Group::Palm, Side::Left)));
        assert!(set.drives(&Target::new(Sign::Neutral, Group::Leg, Side::Global)));
        assert!(set.drives(&Target::new(Sign::Neutral, Group::All, Side::Global)));
    }

    #[test]
    fn test_resolve_into_reuses_buffer() {
        let map = EndpointMap::new([
            Endpoint::new(Group::UpperArm, Side::Right),
            Endpoint::new(Group::Palm, Side::Right),
        ]);
        let mut set = TargetSet::new();
        set.union(&[arm_right()]);

        let mut out = Vec::with_capacity(8);
        set.resolve_into(&map, &mut out);
        assert_eq!(out.len(), 2);

        set.union(&[Target::minus(Group::Hand, Side::Right)]);
        set.resolve_into(&map, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].endpoint, Endpoint::new(Group::UpperArm, Side::Right));
        assert!(out.capacity() >= 8);
    }

    #[test]
    fn test_from_codes() {
        assert_eq!(Target::from_codes(1, 200, 1), Ok(arm_right()));
        assert_eq!(
            Target::from_codes(-1, 302, 2),
            Ok(Target::minus(Group::Hand, Side::Left))
        );
        assert!(Target::from_codes(0, 250, 0).is_err());
        assert!(Target::from_codes(2, 200, 0).is_err());
    }

    #[test]
    fn test_identity_resolution() {
        let mut set = TargetSet::new();
        set.union(&[arm_right()]);
        let resolved = set.resolve(&IdentityBodyMap);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].endpoint, Endpoint::new(Group::Arm, Side::Right));
        assert_eq!(resolved[0].intensity, 1.0);
    }

    #[test]
    fn test_exclusion_resolution() {
        let map = EndpointMap::new([
            Endpoint::new(Group::UpperArm, Side::Right),
            Endpoint::new(Group::LowerArm, Side::Right),
            Endpoint::new(Group::Palm, Side::Right),
            Endpoint::new(Group::Palm, Side::Left),
        ]);

        let mut set = TargetSet::new();
        set.union(&[arm_right(), Target::minus(Group::Hand, Side::Right)]);

        let endpoints: Vec<_> = set.resolve(&map).into_iter().map(|r| r.endpoint).collect();
        assert_eq!(
            endpoints,
            vec![
                Endpoint::new(Group::UpperArm, Side::Right),
                Endpoint::new(Group::LowerArm, Side::Right),
            ]
        );
    }

    #[test]
    fn test_most_intense_target_wins() {
        let map = EndpointMap::new([Endpoint::new(Group::Palm, Side::Left)]);
        let mut set = TargetSet::new();
        let hand = Target::plus(Group::Hand, Side::Left);
        let all = Target::plus(Group::All, Side::Global);
        set.union(&[hand, all]);
        if let Some(entry) = set.get_mut(&hand) {
            entry.intensity = 0.25;
        }
        if let Some(entry) = set.get_mut(&all) {
            entry.intensity = 0.75;
        }

        let resolved = set.resolve(&map);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].intensity, 0.75);
    }
}
