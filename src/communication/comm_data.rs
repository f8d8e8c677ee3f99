use glam::IVec3;

use super::peer_buffer::PeerBuffer;
use super::records::MoleculeTrajData;
use crate::case::CaseData;
use crate::cell::Cell;
use crate::grid;
use crate::particle::ParticleArena;

/// Index of a peer direction into the flat buffer array; the center slot 13
/// is allocated but never used.
fn buffer_index(d: IVec3) -> usize {
    grid::direction_tag(d) as usize
}

/// All communication staging of one rank: the 26 per-direction peer buffers,
/// the trajectory gather buffers and the energy scalars.
pub struct CommData {
    peer_buffers: Vec<PeerBuffer>,

    /// Trajectory records of the local cells, bound for rank 0.
    pub send_traj: Vec<MoleculeTrajData>,
    /// On rank 0: one peer's worth of received trajectory records.
    pub recv_traj: Vec<MoleculeTrajData>,
    /// On rank 0: the whole system's records, indexed by serial.
    pub all_traj: Vec<MoleculeTrajData>,

    pub send_uk: f64,
    pub send_up: f64,
    pub total_uk: f64,
    pub total_up: f64,
}

impl CommData {
    pub fn new() -> Self {
        Self {
            peer_buffers: (0..27).map(|_| PeerBuffer::new()).collect(),
            send_traj: Vec::new(),
            recv_traj: Vec::new(),
            all_traj: Vec::new(),
            send_uk: 0.0,
            send_up: 0.0,
            total_uk: 0.0,
            total_up: 0.0,
        }
    }

    /// Computes peer rank, message tags and the outbound position offset for
    /// each of the 26 directions. Periodic wrapping is applied to the process
    /// index only; particle coordinates are wrapped indirectly through the
    /// per-direction offset on the send side.
    pub fn init_peers(&mut self, case: &CaseData) {
        let my_index = case.process_index_for_rank(case.my_rank);
        for d in grid::peer_directions() {
            // The raw neighbor index may stick out of the process grid.
            let other = my_index + d - IVec3::ONE;
            let wrapped = case.all_processes.wrap(other);
            // Whenever wrapping moved the index, outgoing coordinates need
            // the translation that makes them land in the peer's frame.
            let offset = (wrapped - other).as_dvec3() * case.proc_l;
            let rank = case.rank_for_process(wrapped);
            let tag = grid::direction_tag(d);
            let peer = self.buffer_for_mut(d);
            peer.set_rank_and_tags(rank, tag, 26 - tag);
            peer.set_offset(offset);
        }
    }

    pub fn buffer_for(&self, d: IVec3) -> &PeerBuffer {
        &self.peer_buffers[buffer_index(d)]
    }

    pub fn buffer_for_mut(&mut self, d: IVec3) -> &mut PeerBuffer {
        &mut self.peer_buffers[buffer_index(d)]
    }

    /// The 26 peer buffers, skipping the unused center slot. The flat index
    /// of each yielded buffer equals its direction tag.
    pub fn peer_buffers_mut(&mut self) -> impl Iterator<Item = &mut PeerBuffer> {
        self.peer_buffers
            .iter_mut()
            .enumerate()
            .filter(|(i, _)| *i != buffer_index(grid::CENTER))
            .map(|(_, buffer)| buffer)
    }

    /// Appends every resident of a local cell to the trajectory send buffer,
    /// converting the stored `v*dt` back to a velocity.
    pub fn add_trajectory_data_from(
        &mut self,
        cell: &Cell,
        arena: &ParticleArena,
        delta_t: f64,
    ) {
        let inv_delta_t = 1.0 / delta_t;
        for id in cell.list.ids(arena) {
            let p = &arena[id];
            let vel = p.vel_dt * inv_delta_t;
            self.send_traj.push(MoleculeTrajData {
                kind: p.kind as i32,
                serial: p.serial,
                rx: p.pos.x,
                ry: p.pos.y,
                rz: p.pos.z,
                vx: vel.x,
                vy: vel.y,
                vz: vel.z,
            });
        }
    }

    /// On rank 0, its own contribution is "received" by an in-process copy
    /// instead of a message.
    pub fn append_send_trajectory_to_recv(&mut self) {
        self.recv_traj.extend_from_slice(&self.send_traj);
    }

    pub fn clear_send_trajectory(&mut self) {
        self.send_traj.clear();
    }

    pub fn clear_recv_trajectory(&mut self) {
        self.recv_traj.clear();
    }

    pub fn set_all_molecule_count(&mut self, count: usize) {
        self.all_traj
            .resize(count, MoleculeTrajData::default());
    }

    /// Distributes one peer's worth of received records into the
    /// serial-ordered array. Records arrive in arbitrary order; the serial
    /// is the only index that matters.
    pub fn order_recv_trajectory_to_all(&mut self) {
        for record in &self.recv_traj {
            let serial = record.serial as usize;
            assert!(
                serial < self.all_traj.len(),
                "trajectory record with serial {} outside the known range {}",
                serial,
                self.all_traj.len()
            );
            self.all_traj[serial] = *record;
        }
    }
}

impl Default for CommData {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;
    use glam::IVec3;

    use super::CommData;
    use crate::case::tests::case_from_text;
    use crate::case::tests::case_text;
    use crate::communication::records::MoleculeTrajData;
    use crate::grid;

    fn comm_for_rank_5() -> CommData {
        let text = case_text((100.0, 200.0, 300.0), (3, 3, 3), (3, 3, 3), 2.0, 100.0, 10, 5.0);
        let case = case_from_text(&text, 5, 27);
        let mut comm = CommData::new();
        comm.init_peers(&case);
        comm
    }

    #[test]
    fn peer_ranks_and_offsets_under_periodic_wrap() {
        let comm = comm_for_rank_5();
        // my process index is (0, 1, 2)

        // lower in x wraps to process (2, 1, 2)
        let peer = comm.buffer_for(IVec3::new(0, 1, 1));
        assert_eq!(peer.rank, 23);
        assert!((peer.offset - DVec3::new(100.0, 0.0, 0.0)).length() < 1e-9);

        // higher in x does not wrap
        let peer = comm.buffer_for(IVec3::new(2, 1, 1));
        assert_eq!(peer.rank, 14);
        assert_eq!(peer.offset, DVec3::ZERO);

        // lower and higher in y do not wrap
        assert_eq!(comm.buffer_for(IVec3::new(1, 0, 1)).rank, 2);
        assert_eq!(comm.buffer_for(IVec3::new(1, 2, 1)).rank, 8);

        // lower in z does not wrap
        assert_eq!(comm.buffer_for(IVec3::new(1, 1, 0)).rank, 4);

        // higher in z wraps to process (0, 1, 0)
        let peer = comm.buffer_for(IVec3::new(1, 1, 2));
        assert_eq!(peer.rank, 3);
        assert_eq!(peer.offset, DVec3::new(0.0, 0.0, -300.0));
    }

    #[test]
    fn tags_disambiguate_a_self_peer() {
        let comm = comm_for_rank_5();
        for d in grid::peer_directions() {
            let peer = comm.buffer_for(d);
            assert_eq!(peer.tag_send, grid::direction_tag(d));
            assert_eq!(peer.tag_send + peer.tag_recv, 26);
            assert_eq!(peer.tag_recv, grid::direction_tag(grid::opposite(d)));
        }
    }

    #[test]
    fn trajectory_records_are_ordered_by_serial() {
        let mut comm = CommData::new();
        comm.set_all_molecule_count(4);
        comm.recv_traj = vec![
            MoleculeTrajData {
                serial: 2,
                rx: 2.0,
                ..MoleculeTrajData::default()
            },
            MoleculeTrajData {
                serial: 0,
                rx: 0.5,
                ..MoleculeTrajData::default()
            },
        ];
        comm.order_recv_trajectory_to_all();
        comm.clear_recv_trajectory();
        comm.recv_traj = vec![
            MoleculeTrajData {
                serial: 1,
                rx: 1.0,
                ..MoleculeTrajData::default()
            },
            MoleculeTrajData {
                serial: 3,
                rx: 3.0,
                ..MoleculeTrajData::default()
            },
        ];
        comm.order_recv_trajectory_to_all();
        for (serial, record) in comm.all_traj.iter().enumerate() {
            assert_eq!(record.serial as usize, serial);
        }
    }
}
