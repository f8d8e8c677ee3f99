use std::io::BufRead;

use glam::DVec3;
use glam::IVec3;

use crate::case::CaseData;
use crate::cell::Cell;
use crate::communication::CommData;
use crate::error::Result;
use crate::extent::Extent;
use crate::grid;
use crate::grid::GridRange;
use crate::io::LineReader;
use crate::lj;
use crate::lj::LjTable;
use crate::particle::Particle;
use crate::particle::ParticleArena;
use crate::particle::ParticleId;
use crate::particle::ParticleList;

fn range_index(d: IVec3) -> usize {
    grid::direction_tag(d) as usize
}

/// The bounds of the surface cells (sent from) along one axis, for axis
/// direction 0, 1 or 2 and n local cells.
fn surface_bounds(i: i32, n: i32) -> (i32, i32) {
    match i {
        0 => (1, 1),
        1 => (1, n),
        2 => (n, n),
        _ => unreachable!("direction component out of range"),
    }
}

/// The bounds of the surrounding cells (received into), likewise.
fn surrounding_bounds(i: i32, n: i32) -> (i32, i32) {
    match i {
        0 => (0, 0),
        1 => (1, n),
        2 => (n + 1, n + 1),
        _ => unreachable!("direction component out of range"),
    }
}

/// The simulation state of one rank: the cell grid including the halo, the
/// particle arena with its free list, and the precomputed per-direction cell
/// ranges of the halo protocol.
pub struct ProcData {
    arena: ParticleArena,
    free_list: ParticleList,
    cells: Vec<Cell>,
    local_cells: GridRange,
    surface_ranges: Vec<GridRange>,
    surrounding_ranges: Vec<GridRange>,
    /// Cells per axis including the halo layers.
    ac: IVec3,
    local_box: Extent,
    cell_l: DVec3,
    total_molecule_count: usize,
}

impl ProcData {
    pub fn new(case: &CaseData) -> Self {
        let nc = case.nc;
        let ac = nc + 2;
        let all_cells = GridRange::new(IVec3::ZERO, nc + IVec3::ONE);
        let local_cells = GridRange::new(IVec3::ONE, nc);

        let cells = all_cells
            .iter()
            .map(|idx| Cell::new(case.box_for_cell(idx)))
            .collect();

        let mut ranges = (Vec::new(), Vec::new());
        for x in 0..3 {
            for y in 0..3 {
                for z in 0..3 {
                    let (sxl, sxh) = surface_bounds(x, nc.x);
                    let (syl, syh) = surface_bounds(y, nc.y);
                    let (szl, szh) = surface_bounds(z, nc.z);
                    ranges.0.push(GridRange::new(
                        IVec3::new(sxl, syl, szl),
                        IVec3::new(sxh, syh, szh),
                    ));
                    let (uxl, uxh) = surrounding_bounds(x, nc.x);
                    let (uyl, uyh) = surrounding_bounds(y, nc.y);
                    let (uzl, uzh) = surrounding_bounds(z, nc.z);
                    ranges.1.push(GridRange::new(
                        IVec3::new(uxl, uyl, uzl),
                        IVec3::new(uxh, uyh, uzh),
                    ));
                }
            }
        }

        let mut data = Self {
            arena: ParticleArena::new(),
            free_list: ParticleList::new(),
            cells,
            local_cells,
            surface_ranges: ranges.0,
            surrounding_ranges: ranges.1,
            ac,
            local_box: case.local_box,
            cell_l: case.cell_l,
            total_molecule_count: 0,
        };
        data.init_neighbors();
        data
    }

    /// Wires the permanent 3x3x3 neighbor tables of all local cells. Halo
    /// cells never initiate migration or force computation and need none.
    fn init_neighbors(&mut self) {
        for idx in self.local_cells.iter() {
            let ci = self.cell_id(idx);
            for dir in grid::directions() {
                let ni = self.cell_id(idx + dir);
                self.cells[ci].set_neighbor(dir + IVec3::ONE, ni);
            }
        }
    }

    /// Flat index of a cell coordinate (halo included, z fastest).
    fn cell_id(&self, idx: IVec3) -> usize {
        assert!(
            idx.min_element() >= 0 && idx.x < self.ac.x && idx.y < self.ac.y && idx.z < self.ac.z,
            "cell coordinate {:?} outside the grid",
            idx
        );
        (idx.x * self.ac.y * self.ac.z + idx.y * self.ac.z + idx.z) as usize
    }

    pub fn cell(&self, idx: IVec3) -> &Cell {
        &self.cells[self.cell_id(idx)]
    }

    pub fn is_local_cell(&self, idx: IVec3) -> bool {
        self.local_cells.contains(idx)
    }

    pub fn surface_range_for(&self, d: IVec3) -> GridRange {
        self.surface_ranges[range_index(d)]
    }

    pub fn surrounding_range_for(&self, d: IVec3) -> GridRange {
        self.surrounding_ranges[range_index(d)]
    }

    pub fn total_molecule_count(&self) -> usize {
        self.total_molecule_count
    }

    /// The cell coordinate a position belongs to, relative to this rank's
    /// box; positions in the halo map to the halo coordinates 0 and n+1.
    pub fn cell_index_for_pos(&self, pos: DVec3) -> IVec3 {
        let offset = (pos - self.local_box.min) / self.cell_l;
        IVec3::ONE + IVec3::new(
            offset.x.floor() as i32,
            offset.y.floor() as i32,
            offset.z.floor() as i32,
        )
    }

    /// Satisfies an allocation from the free list before growing the arena.
    fn allocate_particle(&mut self) -> ParticleId {
        match self.free_list.pop_back(&mut self.arena) {
            Some(id) => id,
            None => self.arena.push(Particle::default()),
        }
    }

    /// Reads the whole initial-state file and keeps the particles whose
    /// position lies in this rank's box. The line order defines the global
    /// serial numbers.
    pub fn read_initial_state(&mut self, case: &CaseData) -> Result<()> {
        let rdr = LineReader::open(&case.initial_state_file)?;
        self.read_initial_state_from(rdr, case)
    }

    pub fn read_initial_state_from<R: BufRead>(
        &mut self,
        mut rdr: LineReader<R>,
        case: &CaseData,
    ) -> Result<()> {
        let mut serial = 0;
        while rdr.next_line()? {
            let name = rdr.read_string("Molecule type")?;
            let kind = lj::species_index(&name)?;
            let pos = DVec3::new(
                rdr.read_f64("x")?,
                rdr.read_f64("y")?,
                rdr.read_f64("z")?,
            );
            let vel = DVec3::new(
                rdr.read_f64("u")?,
                rdr.read_f64("v")?,
                rdr.read_f64("w")?,
            );
            if self.local_box.contains(pos) {
                let cell_idx = self.cell_index_for_pos(pos);
                let id = self.allocate_particle();
                let p = self.arena.get_mut(id);
                p.kind = kind;
                p.serial = serial;
                p.pos = pos;
                p.vel_dt = vel * case.delta_t;
                p.acc_dt2_half = DVec3::ZERO;
                let ci = self.cell_id(cell_idx);
                self.cells[ci].add_particle(&mut self.arena, id);
            }
            serial += 1;
        }
        self.total_molecule_count = serial as usize;
        Ok(())
    }

    /// Splices every halo cell's particles back into the free list.
    pub fn clear_surrounding_cells(&mut self) {
        for d in grid::peer_directions() {
            let range = self.surrounding_range_for(d);
            for idx in range.iter() {
                let ci = self.cell_id(idx);
                self.cells[ci].move_all_particles_to(&mut self.arena, &mut self.free_list);
            }
        }
    }

    /// Copies the residents of all surrounding cells, which have left this
    /// rank's volume, into the full-state send buffers of their directions.
    pub fn export_exiting_molecule_full(&mut self, comm: &mut CommData) {
        for d in grid::peer_directions() {
            let range = self.surrounding_range_for(d);
            let peer = comm.buffer_for_mut(d);
            debug_assert!(peer.send_count_per_cell.is_empty() && peer.send_full.is_empty());
            for idx in range.iter() {
                peer.add_molecule_full_from(&self.cells[self.cell_id(idx)], &self.arena);
            }
        }
    }

    /// Distributes received full-state records into the surface cells, in
    /// the same cell order the peer used on its side.
    pub fn import_entering_molecule_full(&mut self, comm: &mut CommData) {
        for d in grid::peer_directions() {
            let range = self.surface_range_for(d);
            let mut count_index = 0;
            let mut data_index = 0;
            for idx in range.iter() {
                let count = comm.buffer_for(d).recv_count_per_cell[count_index] as usize;
                count_index += 1;
                for _ in 0..count {
                    let record = comm.buffer_for(d).recv_full[data_index];
                    data_index += 1;
                    let id = self.allocate_particle();
                    let p = self.arena.get_mut(id);
                    p.kind = record.kind as usize;
                    p.serial = record.serial;
                    p.pos = record.pos();
                    p.vel_dt = record.vel_dt();
                    p.acc_dt2_half = record.acc_dt2_half();
                    let ci = self.cell_id(idx);
                    self.cells[ci].add_particle(&mut self.arena, id);
                }
            }
            let peer = comm.buffer_for_mut(d);
            assert!(
                count_index == peer.recv_count_per_cell.len()
                    && data_index == peer.recv_full.len(),
                "received full-state records do not match the surface cells"
            );
            peer.recv_full.clear();
            peer.recv_count_per_cell.clear();
        }
    }

    /// Copies the residents of all surface cells into the position-only send
    /// buffers, to become ghosts on the peers.
    pub fn export_surfacing_molecule_pos(&mut self, comm: &mut CommData) {
        for d in grid::peer_directions() {
            let range = self.surface_range_for(d);
            let peer = comm.buffer_for_mut(d);
            debug_assert!(peer.send_count_per_cell.is_empty() && peer.send_pos.is_empty());
            for idx in range.iter() {
                peer.add_molecule_pos_from(&self.cells[self.cell_id(idx)], &self.arena);
            }
        }
    }

    /// Distributes received position-only records into the surrounding
    /// cells as ghosts. Ghosts carry no velocity or acceleration; they exist
    /// for one force computation and are discarded with the halo.
    pub fn import_surrounding_molecule_pos(&mut self, comm: &mut CommData) {
        for d in grid::peer_directions() {
            let range = self.surrounding_range_for(d);
            let mut count_index = 0;
            let mut data_index = 0;
            for idx in range.iter() {
                let count = comm.buffer_for(d).recv_count_per_cell[count_index] as usize;
                count_index += 1;
                for _ in 0..count {
                    let record = comm.buffer_for(d).recv_pos[data_index];
                    data_index += 1;
                    let id = self.allocate_particle();
                    let p = self.arena.get_mut(id);
                    p.kind = record.kind as usize;
                    p.pos = record.pos();
                    let ci = self.cell_id(idx);
                    self.cells[ci].add_particle(&mut self.arena, id);
                }
            }
            let peer = comm.buffer_for_mut(d);
            assert!(
                count_index == peer.recv_count_per_cell.len()
                    && data_index == peer.recv_pos.len(),
                "received ghost records do not match the surrounding cells"
            );
            peer.recv_pos.clear();
            peer.recv_count_per_cell.clear();
        }
    }

    pub fn calc_force(&mut self, table: &LjTable) {
        self.calc_force_impl(table, false);
    }

    /// Force computation for output rounds, additionally accumulating the
    /// potential energy per cell.
    pub fn calc_force_and_up(&mut self, table: &LjTable) {
        self.calc_force_impl(table, true);
    }

    fn calc_force_impl(&mut self, table: &LjTable, with_up: bool) {
        for idx in self.local_cells.iter() {
            let ci = self.cell_id(idx);
            self.cells[ci].clear_forces(&mut self.arena);
            if with_up {
                self.cells[ci].clear_up();
            }
        }
        for idx in self.local_cells.iter() {
            let ci = self.cell_id(idx);
            self.cells[ci].calc_force_within_self(&mut self.arena, table, with_up);
            for dir in grid::directions() {
                let other_idx = idx + dir;
                let other_head = self.cells[self.cell_id(other_idx)].head();
                if self.is_local_cell(other_idx) {
                    // Visit each local pair of cells from one side only.
                    if grid::lexicographically_negative(dir) {
                        self.cells[ci].calc_force_with_local_cell(
                            &mut self.arena,
                            table,
                            other_head,
                            with_up,
                        );
                    }
                } else {
                    // Ghosts never initiate, so each local-ghost pair is
                    // visited exactly once from the local side.
                    self.cells[ci].calc_force_with_surrounding_cell(
                        &mut self.arena,
                        table,
                        other_head,
                        with_up,
                    );
                }
            }
        }
    }

    /// Moves every local particle by its `v*dt`, then migrates the ones that
    /// left their cell. The two phases are separate so a particle that just
    /// arrived in a cell is not moved twice.
    pub fn update_position(&mut self) {
        for idx in self.local_cells.iter() {
            let ci = self.cell_id(idx);
            self.cells[ci].update_position(&mut self.arena);
        }
        for idx in self.local_cells.iter() {
            let ci = self.cell_id(idx);
            self.migrate_to_neighbor(ci);
        }
    }

    /// Routes every resident that left the cell to the neighbor its position
    /// classifies into. A particle that moved farther than one cell trips
    /// the destination's containment check.
    fn migrate_to_neighbor(&mut self, ci: usize) {
        let mut cur = self.cells[ci].head();
        while let Some(id) = cur {
            cur = self.arena.next_of(id);
            let rel = self.cells[ci].extent().relative_index(self.arena[id].pos);
            if rel == grid::CENTER {
                continue;
            }
            let dest = self.cells[ci].neighbor(rel);
            self.cells[ci].list.remove(&mut self.arena, id);
            self.cells[dest].add_particle(&mut self.arena, id);
        }
    }

    pub fn update_velocity_half(&mut self) {
        for idx in self.local_cells.iter() {
            let ci = self.cell_id(idx);
            self.cells[ci].update_velocity_half(&mut self.arena);
        }
    }

    pub fn update_velocity_half_and_calc_uk(&mut self, table: &LjTable) {
        for idx in self.local_cells.iter() {
            let ci = self.cell_id(idx);
            self.cells[ci].update_velocity_half_and_calc_uk(&mut self.arena, table);
        }
    }

    /// Copies every local resident into the trajectory send buffer, with the
    /// velocity converted back to unscaled units.
    pub fn export_trajectory_data(&mut self, comm: &mut CommData, delta_t: f64) {
        for idx in self.local_cells.iter() {
            let ci = self.cell_id(idx);
            comm.add_trajectory_data_from(&self.cells[ci], &self.arena, delta_t);
        }
    }

    /// Sums the per-cell energy contributions into the communicator's send
    /// scalars.
    pub fn export_energy_data(&mut self, comm: &mut CommData) {
        comm.send_uk = 0.0;
        comm.send_up = 0.0;
        for idx in self.local_cells.iter() {
            let cell = &self.cells[self.cell_id(idx)];
            comm.send_uk += cell.uk();
            comm.send_up += cell.up();
        }
    }

    /// Number of particles currently owned by local cells.
    pub fn count_local_particles(&self) -> usize {
        self.local_cells
            .iter()
            .map(|idx| self.cells[self.cell_id(idx)].list.count(&self.arena))
            .sum()
    }

    /// Number of particles currently sitting in halo cells.
    pub fn count_surrounding_particles(&self) -> usize {
        let mut n = 0;
        for d in grid::peer_directions() {
            for idx in self.surrounding_range_for(d).iter() {
                n += self.cells[self.cell_id(idx)].list.count(&self.arena);
            }
        }
        n
    }

    /// Allocated slots not owned by any cell.
    pub fn count_free_particles(&self) -> usize {
        self.free_list.count(&self.arena)
    }

    pub fn allocated_particles(&self) -> usize {
        self.arena.len()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use glam::DVec3;
    use glam::IVec3;

    use super::ProcData;
    use crate::case::tests::case_from_text;
    use crate::case::tests::case_text;
    use crate::case::CaseData;
    use crate::communication::CommData;
    use crate::communication::LocalCommunicator;
    use crate::io::LineReader;

    fn single_process_case() -> CaseData {
        let text = case_text((30.0, 30.0, 30.0), (1, 1, 1), (3, 3, 3), 2.0, 100.0, 10, 5.0);
        case_from_text(&text, 0, 1)
    }

    fn ingest(data: &mut ProcData, case: &CaseData, contents: &str) {
        let rdr = LineReader::new(Cursor::new(contents.to_owned()), "initial.txt");
        data.read_initial_state_from(rdr, case).unwrap();
    }

    #[test]
    fn range_endpoints_for_three_cells_per_axis() {
        let case = single_process_case();
        let data = ProcData::new(&case);

        let r = data.surface_range_for(IVec3::new(0, 1, 1));
        assert_eq!(r.min, IVec3::new(1, 1, 1));
        assert_eq!(r.max, IVec3::new(1, 3, 3));

        let r = data.surrounding_range_for(IVec3::new(1, 2, 1));
        assert_eq!(r.min, IVec3::new(1, 4, 1));
        assert_eq!(r.max, IVec3::new(3, 4, 3));

        // Sender and receiver ranges of a direction pair cover equally many
        // cells, which is what lets the receiver re-use the count order.
        for d in crate::grid::peer_directions() {
            assert_eq!(
                data.surface_range_for(d).size(),
                data.surrounding_range_for(crate::grid::opposite(d)).size()
            );
            assert_eq!(
                data.surface_range_for(d).size(),
                data.surrounding_range_for(d).size()
            );
        }
    }

    #[test]
    fn ingest_keeps_only_local_particles_but_counts_all_serials() {
        let text = case_text((90.0, 90.0, 90.0), (3, 3, 3), (3, 3, 3), 2.0, 100.0, 10, 5.0);
        let case = case_from_text(&text, 0, 27);
        let mut data = ProcData::new(&case);
        // rank 0 owns [0, 30) on every axis
        ingest(
            &mut data,
            &case,
            "He 5 5 5 0 0 0\nAr 45 5 5 0 0 0\nNe 25 25 25 1 0 0\n",
        );
        assert_eq!(data.total_molecule_count(), 3);
        assert_eq!(data.count_local_particles(), 2);
        let cell = data.cell(data.cell_index_for_pos(DVec3::new(25.0, 25.0, 25.0)));
        let id = cell.head().unwrap();
        assert_eq!(data.arena[id].serial, 2);
        assert_eq!(data.arena[id].kind, 1);
        assert_eq!(data.arena[id].vel_dt, DVec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn migration_routes_a_leaving_particle_to_the_right_neighbor() {
        let case = single_process_case();
        let mut data = ProcData::new(&case);
        // cell (2, 2, 2) covers [10, 20) on every axis
        ingest(&mut data, &case, "He 15 15 15 3 -5.5 0\n");
        assert_eq!(data.cell(IVec3::new(2, 2, 2)).list.count(&data.arena), 1);

        // vel_dt = (6, -11, 0), so the position update crosses into the
        // neighbor above in x and below in y.
        data.update_position();

        assert!(data.cell(IVec3::new(2, 2, 2)).is_empty());
        let dest = data.cell(IVec3::new(3, 1, 2));
        assert_eq!(dest.list.count(&data.arena), 1);
        let id = dest.head().unwrap();
        assert_eq!(data.arena[id].pos, DVec3::new(21.0, 4.0, 15.0));
        assert_eq!(data.count_local_particles(), 1);
    }

    #[test]
    fn ghost_round_trip_through_the_local_exchange() {
        let case = single_process_case();
        let mut data = ProcData::new(&case);
        let mut comm = CommData::new();
        comm.init_peers(&case);
        let mut communicator = LocalCommunicator::new();

        // One particle near the lower x face, in surface cell (1, 2, 2).
        ingest(&mut data, &case, "He 0.5 15 15 0 0 0\n");

        data.export_surfacing_molecule_pos(&mut comm);
        communicator.exchange_molecule_pos(&mut comm);
        data.import_surrounding_molecule_pos(&mut comm);

        // With the process as its own peer it arrives, among others, as a
        // ghost beyond the upper x face, translated by the box length.
        let halo = data.cell(IVec3::new(4, 2, 2));
        let id = halo.head().expect("expected a ghost in the halo cell");
        assert_eq!(data.arena[id].pos, DVec3::new(30.5, 15.0, 15.0));
        assert_eq!(data.count_local_particles(), 1);
        let ghosts = data.count_surrounding_particles();
        assert!(ghosts > 0);

        // Clearing the halo returns every ghost to the free list.
        data.clear_surrounding_cells();
        assert_eq!(data.count_surrounding_particles(), 0);
        assert_eq!(data.count_free_particles(), ghosts);
        assert_eq!(
            data.count_local_particles() + data.count_free_particles(),
            data.allocated_particles()
        );
    }

    /// The cell machinery (within-self, local-pair and ghost kernels over
    /// the halo refresh) must agree with a direct minimum-image sum over all
    /// pairs. The configuration puts pairs in one cell, across local cells,
    /// across faces and across a corner of the periodic box.
    #[test]
    fn forces_match_a_brute_force_periodic_reference() {
        let case = single_process_case();
        let mut data = ProcData::new(&case);
        ingest(
            &mut data,
            &case,
            "He 1.0 1.0 1.0 0 0 0\n\
             He 28.5 1.5 2.0 0 0 0\n\
             He 1.5 28.0 29.0 0 0 0\n\
             He 15.0 15.5 14.5 0 0 0\n\
             He 13.0 16.0 16.5 0 0 0\n\
             He 29.0 29.0 0.5 0 0 0\n",
        );
        let mut comm = CommData::new();
        comm.init_peers(&case);
        let mut communicator = LocalCommunicator::new();
        data.export_surfacing_molecule_pos(&mut comm);
        communicator.exchange_molecule_pos(&mut comm);
        data.import_surrounding_molecule_pos(&mut comm);

        let table = crate::lj::LjTable::new(&case);
        data.calc_force(&table);

        let n = data.total_molecule_count();
        let mut positions = vec![DVec3::ZERO; n];
        let mut computed = vec![DVec3::ZERO; n];
        for idx in data.local_cells.iter() {
            for id in data.cell(idx).list.ids(&data.arena) {
                let p = &data.arena[id];
                positions[p.serial as usize] = p.pos;
                computed[p.serial as usize] = p.acc_dt2_half;
            }
        }

        let l = case.box_l.x;
        let pair = table.pair(0, 0);
        let dt2_by_2m = table.species(0).dt2_by_2m;
        let minimum_image = |mut d: DVec3| {
            d.x -= l * (d.x / l).round();
            d.y -= l * (d.y / l).round();
            d.z -= l * (d.z / l).round();
            d
        };
        for i in 0..n {
            let mut acc = DVec3::ZERO;
            for j in 0..n {
                if i == j {
                    continue;
                }
                let d = minimum_image(positions[j] - positions[i]);
                let r2 = d.length_squared();
                if r2 < table.cutoff_sq {
                    let r8 = r2 * r2 * r2 * r2;
                    acc += d * ((pair.a * r2) / (r8 * r8) + pair.b / r8) * dt2_by_2m;
                }
            }
            assert!(
                (computed[i] - acc).length() <= 1e-9 * acc.length().max(1e-12),
                "particle {}: {:?} vs {:?}",
                i,
                computed[i],
                acc
            );
        }
    }

    #[test]
    fn migration_round_trip_through_the_local_exchange() {
        let case = single_process_case();
        let mut data = ProcData::new(&case);
        let mut comm = CommData::new();
        comm.init_peers(&case);
        let mut communicator = LocalCommunicator::new();

        // A particle that steps over the upper x boundary of the box.
        ingest(&mut data, &case, "He 29.5 15 15 0.5 0 0\n");
        data.update_position();
        assert_eq!(data.count_local_particles(), 0);
        assert_eq!(data.count_surrounding_particles(), 1);

        data.export_exiting_molecule_full(&mut comm);
        data.clear_surrounding_cells();
        communicator.exchange_molecule_full(&mut comm);
        data.import_entering_molecule_full(&mut comm);

        // It re-enters at the opposite face with the same serial, wrapped to
        // position 0.5.
        assert_eq!(data.count_local_particles(), 1);
        assert_eq!(data.count_surrounding_particles(), 0);
        let cell = data.cell(IVec3::new(1, 2, 2));
        let id = cell.head().unwrap();
        assert_eq!(data.arena[id].serial, 0);
        assert_eq!(data.arena[id].pos, DVec3::new(0.5, 15.0, 15.0));
        assert_eq!(data.arena[id].vel_dt, DVec3::new(1.0, 0.0, 0.0));
    }
}
