use glam::DVec3;
use mpi::Count;
use mpi::Tag;

use super::records::MoleculeFullData;
use super::records::MoleculePosData;
use super::Rank;
use crate::cell::Cell;
use crate::particle::ParticleArena;

/// Send and receive staging for one of the 26 peer directions.
///
/// Send counts are recorded for every iterated cell, empty ones included;
/// the receiver consumes its count vector in the same cell order, which is
/// the only indexing mechanism the payload needs.
pub struct PeerBuffer {
    /// Rank of the peer process in this direction, under periodic wrap.
    pub rank: Rank,
    pub tag_send: Tag,
    pub tag_recv: Tag,
    /// Added to every outgoing position. Nonzero exactly when this direction
    /// crosses a periodic boundary; it translates a coordinate from the
    /// sender's frame into the receiver's.
    pub offset: DVec3,

    pub send_count_per_cell: Vec<Count>,
    pub recv_count_per_cell: Vec<Count>,
    pub send_full: Vec<MoleculeFullData>,
    pub recv_full: Vec<MoleculeFullData>,
    pub send_pos: Vec<MoleculePosData>,
    pub recv_pos: Vec<MoleculePosData>,
}

impl PeerBuffer {
    pub fn new() -> Self {
        Self {
            rank: 0,
            tag_send: 0,
            tag_recv: 0,
            offset: DVec3::ZERO,
            send_count_per_cell: Vec::new(),
            recv_count_per_cell: Vec::new(),
            send_full: Vec::new(),
            recv_full: Vec::new(),
            send_pos: Vec::new(),
            recv_pos: Vec::new(),
        }
    }

    pub fn set_rank_and_tags(&mut self, rank: Rank, tag_send: Tag, tag_recv: Tag) {
        self.rank = rank;
        self.tag_send = tag_send;
        self.tag_recv = tag_recv;
    }

    pub fn set_offset(&mut self, offset: DVec3) {
        self.offset = offset;
    }

    /// Appends every resident of `cell` to the full-state payload, with the
    /// direction's offset applied, and records the per-cell count.
    pub fn add_molecule_full_from(&mut self, cell: &Cell, arena: &ParticleArena) {
        let mut count = 0;
        for id in cell.list.ids(arena) {
            let p = &arena[id];
            let pos = p.pos + self.offset;
            self.send_full.push(MoleculeFullData {
                kind: p.kind as i32,
                serial: p.serial,
                rx: pos.x,
                ry: pos.y,
                rz: pos.z,
                vdtx: p.vel_dt.x,
                vdty: p.vel_dt.y,
                vdtz: p.vel_dt.z,
                adt2x: p.acc_dt2_half.x,
                adt2y: p.acc_dt2_half.y,
                adt2z: p.acc_dt2_half.z,
            });
            count += 1;
        }
        self.send_count_per_cell.push(count);
    }

    /// As above, but position-only records for the ghost refresh.
    pub fn add_molecule_pos_from(&mut self, cell: &Cell, arena: &ParticleArena) {
        let mut count = 0;
        for id in cell.list.ids(arena) {
            let p = &arena[id];
            let pos = p.pos + self.offset;
            self.send_pos.push(MoleculePosData {
                kind: p.kind as i32,
                rx: pos.x,
                ry: pos.y,
                rz: pos.z,
            });
            count += 1;
        }
        self.send_count_per_cell.push(count);
    }

    /// Drops payload and counts, keeping the capacity for the next round.
    pub fn clear_send_full(&mut self) {
        self.send_full.clear();
        self.send_count_per_cell.clear();
    }

    pub fn clear_send_pos(&mut self) {
        self.send_pos.clear();
        self.send_count_per_cell.clear();
    }

    /// Sizes the full-state receive payload from the received counts.
    pub fn prepare_recv_full(&mut self) {
        let total: Count = self.recv_count_per_cell.iter().sum();
        self.recv_full.resize(total as usize, MoleculeFullData::default());
    }

    pub fn prepare_recv_pos(&mut self) {
        let total: Count = self.recv_count_per_cell.iter().sum();
        self.recv_pos.resize(total as usize, MoleculePosData::default());
    }
}

impl Default for PeerBuffer {
    fn default() -> Self {
        Self::new()
    }
}
