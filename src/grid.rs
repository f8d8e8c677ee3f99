use glam::IVec3;

/// Index of the unused center entry in the 3x3x3 peer direction cube.
pub const CENTER: IVec3 = IVec3::new(1, 1, 1);

/// An inclusive rectangular range of integer grid coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridRange {
    pub min: IVec3,
    pub max: IVec3,
}

impl GridRange {
    pub fn new(min: IVec3, max: IVec3) -> Self {
        debug_assert!(min.x <= max.x && min.y <= max.y && min.z <= max.z);
        Self { min, max }
    }

    pub fn size(&self) -> usize {
        let d = self.max - self.min + IVec3::ONE;
        (d.x * d.y * d.z) as usize
    }

    pub fn contains(&self, i: IVec3) -> bool {
        self.min.x <= i.x
            && i.x <= self.max.x
            && self.min.y <= i.y
            && i.y <= self.max.y
            && self.min.z <= i.z
            && i.z <= self.max.z
    }

    /// Maps a coordinate that may lie outside the range back into it by
    /// periodic wrapping, component-wise.
    pub fn wrap(&self, i: IVec3) -> IVec3 {
        IVec3::new(
            wrap_component(i.x, self.min.x, self.max.x),
            wrap_component(i.y, self.min.y, self.max.y),
            wrap_component(i.z, self.min.z, self.max.z),
        )
    }

    /// Iterates the range with z fastest, then y, then x. Sender and receiver
    /// of the halo protocol rely on this order being identical on both sides.
    pub fn iter(&self) -> impl Iterator<Item = IVec3> {
        let min = self.min;
        let max = self.max;
        (min.x..=max.x).flat_map(move |x| {
            (min.y..=max.y)
                .flat_map(move |y| (min.z..=max.z).map(move |z| IVec3::new(x, y, z)))
        })
    }
}

fn wrap_component(v: i32, min: i32, max: i32) -> i32 {
    if v < min {
        v + (max - min + 1)
    } else if v > max {
        v - (max - min + 1)
    } else {
        v
    }
}

/// The 26 unit offsets to the neighboring cells, (-1..=1)^3 without the
/// origin, in lexicographic order.
pub fn directions() -> impl Iterator<Item = IVec3> {
    GridRange::new(IVec3::NEG_ONE, IVec3::ONE)
        .iter()
        .filter(|d| *d != IVec3::ZERO)
}

/// The 26 peer directions, (0..=2)^3 without the center, in lexicographic
/// order. A peer direction addresses one slot of the 3x3x3 peer buffer cube;
/// component value 0 means "peer at lower process coordinate", 2 "higher".
pub fn peer_directions() -> impl Iterator<Item = IVec3> {
    GridRange::new(IVec3::ZERO, IVec3::new(2, 2, 2))
        .iter()
        .filter(|d| *d != CENTER)
}

/// The peer direction facing the other way. Data sent in direction `d`
/// arrives at the peer in direction `opposite(d)`.
pub fn opposite(d: IVec3) -> IVec3 {
    IVec3::new(2, 2, 2) - d
}

/// Flat index of a peer direction, also used as its message tag. The tag of
/// the opposite direction is `26 - direction_tag(d)`, which keeps messages
/// apart when periodic wrapping makes a rank its own peer.
pub fn direction_tag(d: IVec3) -> i32 {
    d.x * 9 + d.y * 3 + d.z
}

/// Lexicographic `d < (0, 0, 0)`, used to visit every local-local cell pair
/// exactly once in the force driver.
pub fn lexicographically_negative(d: IVec3) -> bool {
    d.x < 0 || (d.x == 0 && (d.y < 0 || (d.y == 0 && d.z < 0)))
}
