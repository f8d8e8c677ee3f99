use std::sync::Arc;
use std::sync::Mutex;

use lazy_static::lazy_static;
use mpi::collective::SystemOperation;
use mpi::environment::Universe;
use mpi::request::scope;
use mpi::request::WaitGuard;
use mpi::topology::SystemCommunicator;
use mpi::traits::Communicator as MpiCommunicator;
use mpi::traits::Destination;
use mpi::traits::Root;
use mpi::traits::Source;
use mpi::Count;

use super::comm_data::CommData;
use super::Rank;
use crate::case::CaseData;

/// A wrapper around the MPI universe which contains it in an Option. This
/// allows calling `.drop` at program completion so that the universe is
/// dropped, which runs MPI_FINALIZE. Necessary because anything in a
/// lazy_static is otherwise never dropped.
pub struct StaticUniverse(Arc<Mutex<Option<Universe>>>);

impl StaticUniverse {
    pub fn world(&self) -> SystemCommunicator {
        self.0.lock().unwrap().as_ref().unwrap().world()
    }

    pub fn drop(&self) {
        let _ = self.0.lock().unwrap().take();
    }
}

lazy_static! {
    pub static ref MPI_UNIVERSE: StaticUniverse = {
        let universe = mpi::initialize().expect("Failed to initialize MPI");
        StaticUniverse(Arc::new(Mutex::new(Some(universe))))
    };
}

/// The message-passing side of the halo protocol: the two-phase non-blocking
/// exchanges, the trajectory gather and the energy reduction.
pub struct Communicator {
    world: SystemCommunicator,
}

impl Communicator {
    pub fn new() -> Self {
        Self {
            world: MPI_UNIVERSE.world(),
        }
    }

    pub fn rank(&self) -> Rank {
        self.world.rank()
    }

    pub fn size(&self) -> usize {
        self.world.size() as usize
    }

    /// Phase 1 of either exchange: every direction posts a non-blocking send
    /// of its per-cell send counts and a matching receive, then all 52
    /// requests are waited on. The count vectors of opposite directions have
    /// equal lengths by construction of the ranges, so the receive side can
    /// be sized up front.
    fn exchange_counts(&mut self, comm: &mut CommData) {
        for peer in comm.peer_buffers_mut() {
            peer.recv_count_per_cell
                .resize(peer.send_count_per_cell.len(), 0);
        }
        scope(|scope| {
            let mut guards = Vec::new();
            for peer in comm.peer_buffers_mut() {
                let process = self.world.process_at_rank(peer.rank);
                guards.push(WaitGuard::from(process.immediate_send_with_tag(
                    scope,
                    &peer.send_count_per_cell[..],
                    peer.tag_send,
                )));
                guards.push(WaitGuard::from(process.immediate_receive_into_with_tag(
                    scope,
                    &mut peer.recv_count_per_cell[..],
                    peer.tag_recv,
                )));
            }
        });
    }

    /// Exchanges the full-state records of particles that migrated across a
    /// process boundary, all 26 directions overlapping on the network.
    pub fn exchange_molecule_full(&mut self, comm: &mut CommData) {
        self.exchange_counts(comm);
        for peer in comm.peer_buffers_mut() {
            peer.prepare_recv_full();
        }
        scope(|scope| {
            let mut guards = Vec::new();
            for peer in comm.peer_buffers_mut() {
                let process = self.world.process_at_rank(peer.rank);
                guards.push(WaitGuard::from(process.immediate_send_with_tag(
                    scope,
                    &peer.send_full[..],
                    peer.tag_send,
                )));
                guards.push(WaitGuard::from(process.immediate_receive_into_with_tag(
                    scope,
                    &mut peer.recv_full[..],
                    peer.tag_recv,
                )));
            }
        });
        for peer in comm.peer_buffers_mut() {
            peer.clear_send_full();
        }
    }

    /// Exchanges the position-only records that refresh the ghosts before a
    /// force computation.
    pub fn exchange_molecule_pos(&mut self, comm: &mut CommData) {
        self.exchange_counts(comm);
        for peer in comm.peer_buffers_mut() {
            peer.prepare_recv_pos();
        }
        scope(|scope| {
            let mut guards = Vec::new();
            for peer in comm.peer_buffers_mut() {
                let process = self.world.process_at_rank(peer.rank);
                guards.push(WaitGuard::from(process.immediate_send_with_tag(
                    scope,
                    &peer.send_pos[..],
                    peer.tag_send,
                )));
                guards.push(WaitGuard::from(process.immediate_receive_into_with_tag(
                    scope,
                    &mut peer.recv_pos[..],
                    peer.tag_recv,
                )));
            }
        });
        for peer in comm.peer_buffers_mut() {
            peer.clear_send_pos();
        }
    }

    /// Non-root side of the trajectory gather: a count message followed by
    /// the payload, on the fixed tag-0 channel to rank 0.
    pub fn send_trajectory_to_root(&mut self, case: &CaseData, comm: &mut CommData) {
        debug_assert!(!case.is_root_rank());
        let root = self.world.process_at_rank(0);
        let count = comm.send_traj.len() as Count;
        root.send_with_tag(&count, 0);
        root.send_with_tag(&comm.send_traj[..], 0);
        comm.clear_send_trajectory();
    }

    /// Root side of the trajectory gather. Peers are visited in process-grid
    /// order; rank 0's own contribution is an in-process copy. Every batch is
    /// distributed into the serial-ordered array immediately, so the result
    /// is deterministic regardless of per-record arrival order.
    pub fn recv_trajectory_at_root(&mut self, case: &CaseData, comm: &mut CommData) {
        assert!(case.is_root_rank());
        for proc in case.all_processes.iter() {
            let rank = case.rank_for_process(proc);
            if rank == 0 {
                comm.append_send_trajectory_to_recv();
                comm.clear_send_trajectory();
            } else {
                let process = self.world.process_at_rank(rank);
                let (count, _status) = process.receive_with_tag::<Count>(0);
                comm.recv_traj
                    .resize(count as usize, Default::default());
                process.receive_into_with_tag(&mut comm.recv_traj[..], 0);
            }
            comm.order_recv_trajectory_to_all();
            comm.clear_recv_trajectory();
        }
    }

    /// Sum-reduces the per-rank energy contributions to rank 0.
    pub fn reduce_energy(&mut self, case: &CaseData, comm: &mut CommData) {
        let root = self.world.process_at_rank(0);
        if case.is_root_rank() {
            let mut uk = 0.0;
            let mut up = 0.0;
            root.reduce_into_root(&comm.send_uk, &mut uk, SystemOperation::sum());
            root.reduce_into_root(&comm.send_up, &mut up, SystemOperation::sum());
            comm.total_uk = uk;
            comm.total_up = up;
        } else {
            root.reduce_into(&comm.send_uk, SystemOperation::sum());
            root.reduce_into(&comm.send_up, SystemOperation::sum());
        }
    }
}

impl Default for Communicator {
    fn default() -> Self {
        Self::new()
    }
}
