use std::mem;

use super::comm_data::CommData;
use crate::grid;

/// Drop-in replacement for the message-passing exchanges when the whole
/// simulation runs in a single process. Every peer is the process itself, so
/// an exchange moves each direction's send staging into the receive staging
/// of the opposite direction. The per-direction offsets have already
/// translated the coordinates, exactly as they would for a real peer.
pub struct LocalCommunicator;

impl LocalCommunicator {
    pub fn new() -> Self {
        Self
    }

    pub fn exchange_molecule_full(&mut self, comm: &mut CommData) {
        for d in grid::peer_directions() {
            let sender = comm.buffer_for_mut(d);
            let payload = mem::take(&mut sender.send_full);
            let counts = mem::take(&mut sender.send_count_per_cell);
            let receiver = comm.buffer_for_mut(grid::opposite(d));
            receiver.recv_full = payload;
            receiver.recv_count_per_cell = counts;
        }
    }

    pub fn exchange_molecule_pos(&mut self, comm: &mut CommData) {
        for d in grid::peer_directions() {
            let sender = comm.buffer_for_mut(d);
            let payload = mem::take(&mut sender.send_pos);
            let counts = mem::take(&mut sender.send_count_per_cell);
            let receiver = comm.buffer_for_mut(grid::opposite(d));
            receiver.recv_pos = payload;
            receiver.recv_count_per_cell = counts;
        }
    }

    /// The single-process rendition of the gather: the send buffer is copied
    /// into the receive buffer and distributed by serial.
    pub fn gather_trajectory(&mut self, comm: &mut CommData) {
        comm.append_send_trajectory_to_recv();
        comm.clear_send_trajectory();
        comm.order_recv_trajectory_to_all();
        comm.clear_recv_trajectory();
    }

    pub fn reduce_energy(&mut self, comm: &mut CommData) {
        comm.total_uk = comm.send_uk;
        comm.total_up = comm.send_up;
    }
}

impl Default for LocalCommunicator {
    fn default() -> Self {
        Self::new()
    }
}
