use glam::DVec3;
use glam::IVec3;

/// An axis-aligned box, half-open on every axis: a position belongs to the
/// extent if `min <= r < max` component-wise. This convention is what keeps
/// cell ownership unambiguous for particles sitting exactly on a face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
    pub min: DVec3,
    pub max: DVec3,
}

impl Extent {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        debug_assert!(min.x <= max.x && min.y <= max.y && min.z <= max.z);
        Self { min, max }
    }

    pub fn side_lengths(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn contains(&self, pos: DVec3) -> bool {
        self.min.x <= pos.x
            && pos.x < self.max.x
            && self.min.y <= pos.y
            && pos.y < self.max.y
            && self.min.z <= pos.z
            && pos.z < self.max.z
    }

    /// Classifies a position relative to this extent, component-wise:
    /// 0 below the lower bound, 1 inside, 2 at or above the upper bound.
    /// `relative_index(pos) == (1, 1, 1)` iff `contains(pos)`, and the result
    /// addresses the 3x3x3 neighbor table of a cell directly.
    pub fn relative_index(&self, pos: DVec3) -> IVec3 {
        IVec3::new(
            relative_index_component(pos.x, self.min.x, self.max.x),
            relative_index_component(pos.y, self.min.y, self.max.y),
            relative_index_component(pos.z, self.min.z, self.max.z),
        )
    }
}

fn relative_index_component(x: f64, low: f64, high: f64) -> i32 {
    if x < low {
        0
    } else if x >= high {
        2
    } else {
        1
    }
}
