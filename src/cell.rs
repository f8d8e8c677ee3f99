use glam::DVec3;
use glam::IVec3;

use crate::extent::Extent;
use crate::lj::LjTable;
use crate::lj::PairCoefficients;
use crate::particle::ParticleArena;
use crate::particle::ParticleId;
use crate::particle::ParticleList;

/// One cell of the spatial decomposition on a single rank: a region of
/// space, the particles inside it, and the indices of its 26 neighbor cells
/// in the flat cell array of the owning process.
///
/// The neighbor table and the extent are fixed at initialization; everything
/// else changes every step.
pub struct Cell {
    extent: Extent,
    pub(crate) list: ParticleList,
    neighbors: [[[usize; 3]; 3]; 3],
    /// Potential energy contribution of this cell, accumulated on output
    /// rounds only [u Angstrom^2 fs^-2].
    up: f64,
    /// Kinetic energy contribution, likewise [u Angstrom^2 fs^-2].
    uk: f64,
}

impl Cell {
    pub fn new(extent: Extent) -> Self {
        Self {
            extent,
            list: ParticleList::new(),
            neighbors: [[[usize::MAX; 3]; 3]; 3],
            up: 0.0,
            uk: 0.0,
        }
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    /// Registers the neighbor at relative position `offset`, where every
    /// component is 0, 1 or 2. The (1, 1, 1) entry is the cell itself and is
    /// never looked up.
    pub fn set_neighbor(&mut self, offset: IVec3, cell: usize) {
        self.neighbors[offset.x as usize][offset.y as usize][offset.z as usize] = cell;
    }

    pub fn neighbor(&self, offset: IVec3) -> usize {
        let index = self.neighbors[offset.x as usize][offset.y as usize][offset.z as usize];
        assert!(index != usize::MAX, "neighbor table entry not initialized");
        index
    }

    /// Takes ownership of a particle. The caller must have placed it inside
    /// this cell's extent; a violation means a particle crossed more than one
    /// cell in a single step.
    pub fn add_particle(&mut self, arena: &mut ParticleArena, id: ParticleId) {
        debug_assert!(
            self.extent.contains(arena[id].pos),
            "particle outside the cell it is added to"
        );
        self.list.push_back(arena, id);
    }

    pub fn move_all_particles_to(&mut self, arena: &mut ParticleArena, other: &mut ParticleList) {
        self.list.move_all_to(arena, other);
    }

    pub fn head(&self) -> Option<ParticleId> {
        self.list.head()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn up(&self) -> f64 {
        self.up
    }

    pub fn uk(&self) -> f64 {
        self.uk
    }

    pub fn clear_forces(&self, arena: &mut ParticleArena) {
        let mut cur = self.list.head();
        while let Some(id) = cur {
            arena[id].acc_dt2_half = DVec3::ZERO;
            cur = arena.next_of(id);
        }
    }

    pub fn clear_up(&mut self) {
        self.up = 0.0;
    }

    /// r += v*dt for every resident. Migration is a separate pass.
    pub fn update_position(&self, arena: &mut ParticleArena) {
        let mut cur = self.list.head();
        while let Some(id) = cur {
            let p = arena.get_mut(id);
            p.pos += p.vel_dt;
            cur = arena.next_of(id);
        }
    }

    /// The Verlet half-kick: v*dt += a*dt^2/2 for every resident.
    pub fn update_velocity_half(&self, arena: &mut ParticleArena) {
        let mut cur = self.list.head();
        while let Some(id) = cur {
            let p = arena.get_mut(id);
            p.vel_dt += p.acc_dt2_half;
            cur = arena.next_of(id);
        }
    }

    /// Half-kick plus kinetic energy accumulation for output rounds.
    pub fn update_velocity_half_and_calc_uk(&mut self, arena: &mut ParticleArena, table: &LjTable) {
        self.uk = 0.0;
        let mut cur = self.list.head();
        while let Some(id) = cur {
            let p = arena.get_mut(id);
            p.vel_dt += p.acc_dt2_half;
            self.uk += p.vel_dt.length_squared() * table.species(p.kind).m_by_2dt2;
            cur = arena.next_of(id);
        }
    }

    /// Forces between the ordered pairs (i < j in list order) of this cell.
    /// Each pair contributes to both particles, and its potential once.
    pub fn calc_force_within_self(
        &mut self,
        arena: &mut ParticleArena,
        table: &LjTable,
        with_up: bool,
    ) {
        let mut cur_i = self.list.head();
        while let Some(i) = cur_i {
            let pos_i = arena[i].pos;
            let kind_i = arena[i].kind;
            let dt2_by_2m_i = table.species(kind_i).dt2_by_2m;
            let mut cur_j = arena.next_of(i);
            while let Some(j) = cur_j {
                let disp = arena[j].pos - pos_i;
                let r2 = disp.length_squared();
                if r2 < table.cutoff_sq {
                    let kind_j = arena[j].kind;
                    let pair = table.pair(kind_i, kind_j);
                    let force = lj_force(disp, r2, pair);
                    arena[i].acc_dt2_half += force * dt2_by_2m_i;
                    arena[j].acc_dt2_half -= force * table.species(kind_j).dt2_by_2m;
                    if with_up {
                        self.up += pair_potential(r2, pair);
                    }
                }
                cur_j = arena.next_of(j);
            }
            cur_i = arena.next_of(i);
        }
    }

    /// Forces between this cell and a neighboring local cell, given the head
    /// of the other cell's list. Visited once per unordered cell pair; both
    /// particles accumulate force, this cell accumulates the full potential.
    pub fn calc_force_with_local_cell(
        &mut self,
        arena: &mut ParticleArena,
        table: &LjTable,
        other: Option<ParticleId>,
        with_up: bool,
    ) {
        self.calc_force_with_list(arena, table, other, false, with_up);
    }

    /// Forces between this cell and a surrounding (halo) cell. Ghosts never
    /// accumulate force, and only half the potential is attributed here; the
    /// peer rank attributes the other half on its own side.
    pub fn calc_force_with_surrounding_cell(
        &mut self,
        arena: &mut ParticleArena,
        table: &LjTable,
        other: Option<ParticleId>,
        with_up: bool,
    ) {
        self.calc_force_with_list(arena, table, other, true, with_up);
    }

    fn calc_force_with_list(
        &mut self,
        arena: &mut ParticleArena,
        table: &LjTable,
        other: Option<ParticleId>,
        ghost: bool,
        with_up: bool,
    ) {
        let mut cur_i = self.list.head();
        while let Some(i) = cur_i {
            let pos_i = arena[i].pos;
            let kind_i = arena[i].kind;
            let dt2_by_2m_i = table.species(kind_i).dt2_by_2m;
            let mut cur_j = other;
            while let Some(j) = cur_j {
                let disp = arena[j].pos - pos_i;
                let r2 = disp.length_squared();
                if r2 < table.cutoff_sq {
                    let kind_j = arena[j].kind;
                    let pair = table.pair(kind_i, kind_j);
                    let force = lj_force(disp, r2, pair);
                    arena[i].acc_dt2_half += force * dt2_by_2m_i;
                    if ghost {
                        if with_up {
                            self.up += pair_potential(r2, pair) / 2.0;
                        }
                    } else {
                        arena[j].acc_dt2_half -= force * table.species(kind_j).dt2_by_2m;
                        if with_up {
                            self.up += pair_potential(r2, pair);
                        }
                    }
                }
                cur_j = arena.next_of(j);
            }
            cur_i = arena.next_of(i);
        }
    }
}

/// The Lennard-Jones force on the particle at the origin of `disp`, with the
/// signs baked into the pair coefficients: `d * (a/r^14 + b/r^8)`, written
/// without any call to `powf`.
fn lj_force(disp: DVec3, r2: f64, pair: &PairCoefficients) -> DVec3 {
    let r8 = r2 * r2 * r2 * r2;
    disp * ((pair.a * r2) / (r8 * r8) + pair.b / r8)
}

/// The pair potential `-a/(12 r^12) - b/(6 r^6)`.
fn pair_potential(r2: f64, pair: &PairCoefficients) -> f64 {
    let r6 = r2 * r2 * r2;
    -pair.a / (r6 * r6 * 12.0) - pair.b / (r6 * 6.0)
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use super::Cell;
    use crate::extent::Extent;
    use crate::lj::LjTable;
    use crate::particle::Particle;
    use crate::particle::ParticleArena;
    use crate::particle::ParticleId;
    use crate::particle::ParticleList;

    const EPSILON_HE: f64 = 0.141e-21 * 6.02e16;
    const SIGMA_HE: f64 = 2.56;

    fn big_cell() -> Cell {
        Cell::new(Extent::new(DVec3::splat(-100.0), DVec3::splat(100.0)))
    }

    fn add_he(cell: &mut Cell, arena: &mut ParticleArena, pos: DVec3) -> ParticleId {
        let id = arena.push(Particle {
            kind: 0,
            pos,
            ..Particle::default()
        });
        cell.add_particle(arena, id);
        id
    }

    #[test]
    fn forces_within_a_cell_obey_the_third_law() {
        let mut arena = ParticleArena::new();
        let mut cell = big_cell();
        let table = LjTable::from_parameters(1.0, 10.0);
        let i = add_he(&mut cell, &mut arena, DVec3::new(0.0, 0.0, 0.0));
        let j = add_he(&mut cell, &mut arena, DVec3::new(2.0, 0.0, 0.0));
        cell.calc_force_within_self(&mut arena, &table, false);
        // Equal masses, so the half-accelerations are exactly opposite, and
        // at r < sigma the pair is repulsive.
        assert_eq!(arena[i].acc_dt2_half, -arena[j].acc_dt2_half);
        assert!(arena[i].acc_dt2_half.x < 0.0);
        assert_eq!(arena[i].acc_dt2_half.y, 0.0);
    }

    #[test]
    fn potential_minimum_at_the_equilibrium_distance() {
        let mut arena = ParticleArena::new();
        let mut cell = big_cell();
        let table = LjTable::from_parameters(1.0, 10.0);
        let r_min = 2f64.powf(1.0 / 6.0) * SIGMA_HE;
        add_he(&mut cell, &mut arena, DVec3::ZERO);
        let j = add_he(&mut cell, &mut arena, DVec3::new(r_min, 0.0, 0.0));
        cell.calc_force_within_self(&mut arena, &table, true);
        // phi(r_min) = -epsilon, and the force vanishes there.
        assert!(
            (cell.up() + EPSILON_HE).abs() < 1e-9 * EPSILON_HE,
            "up = {}",
            cell.up()
        );
        assert!(arena[j].acc_dt2_half.length() < 1e-12);
    }

    #[test]
    fn pairs_at_exactly_the_cutoff_are_skipped() {
        let mut arena = ParticleArena::new();
        let mut cell = big_cell();
        let table = LjTable::from_parameters(1.0, 4.0);
        let i = add_he(&mut cell, &mut arena, DVec3::ZERO);
        let j = add_he(&mut cell, &mut arena, DVec3::new(4.0, 0.0, 0.0));
        cell.calc_force_within_self(&mut arena, &table, true);
        assert_eq!(arena[i].acc_dt2_half, DVec3::ZERO);
        assert_eq!(arena[j].acc_dt2_half, DVec3::ZERO);
        assert_eq!(cell.up(), 0.0);
    }

    #[test]
    fn ghosts_receive_no_force_and_half_the_potential() {
        let mut arena = ParticleArena::new();
        let table = LjTable::from_parameters(1.0, 10.0);

        let mut local = big_cell();
        let i = add_he(&mut local, &mut arena, DVec3::ZERO);
        let mut ghosts = ParticleList::new();
        let g = arena.push(Particle {
            kind: 0,
            pos: DVec3::new(3.0, 0.0, 0.0),
            ..Particle::default()
        });
        ghosts.push_back(&mut arena, g);

        local.calc_force_with_surrounding_cell(&mut arena, &table, ghosts.head(), true);
        let half_up = local.up();
        let acc_i = arena[i].acc_dt2_half;
        assert!(acc_i.length() > 0.0);
        assert_eq!(arena[g].acc_dt2_half, DVec3::ZERO);

        // The same pair through the local-cell kernel yields the full
        // potential and the opposite force on the other particle.
        arena[i].acc_dt2_half = DVec3::ZERO;
        local.clear_up();
        local.calc_force_with_local_cell(&mut arena, &table, ghosts.head(), true);
        assert_eq!(local.up(), 2.0 * half_up);
        assert_eq!(arena[i].acc_dt2_half, acc_i);
        assert_eq!(arena[g].acc_dt2_half, -acc_i);
    }

    #[test]
    fn velocity_half_kick_accumulates_kinetic_energy() {
        let mut arena = ParticleArena::new();
        let mut cell = big_cell();
        let table = LjTable::from_parameters(2.0, 10.0);
        let id = add_he(&mut cell, &mut arena, DVec3::ZERO);
        arena[id].vel_dt = DVec3::new(1.0, 0.0, 0.0);
        arena[id].acc_dt2_half = DVec3::new(0.5, 0.0, 0.0);
        cell.update_velocity_half_and_calc_uk(&mut arena, &table);
        assert_eq!(arena[id].vel_dt, DVec3::new(1.5, 0.0, 0.0));
        let expected = 1.5 * 1.5 * table.species(0).m_by_2dt2;
        assert!((cell.uk() - expected).abs() < 1e-12 * expected);
    }
}
