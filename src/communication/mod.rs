mod comm_data;
mod local;
mod mpi_world;
mod peer_buffer;
mod records;

pub use comm_data::CommData;
pub use local::LocalCommunicator;
pub use mpi_world::Communicator;
pub use mpi_world::MPI_UNIVERSE;
pub use peer_buffer::PeerBuffer;
pub use records::MoleculeFullData;
pub use records::MoleculePosData;
pub use records::MoleculeTrajData;

pub type Rank = mpi::Rank;
