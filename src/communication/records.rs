use glam::DVec3;
use mpi::traits::Equivalence;

/// Wire record for a particle that crossed a process boundary and migrates
/// with its full state. Layout is fixed by the exchange protocol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Equivalence)]
pub struct MoleculeFullData {
    pub kind: i32,
    pub serial: i32,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
    pub vdtx: f64,
    pub vdty: f64,
    pub vdtz: f64,
    pub adt2x: f64,
    pub adt2y: f64,
    pub adt2z: f64,
}

impl MoleculeFullData {
    pub fn pos(&self) -> DVec3 {
        DVec3::new(self.rx, self.ry, self.rz)
    }

    pub fn vel_dt(&self) -> DVec3 {
        DVec3::new(self.vdtx, self.vdty, self.vdtz)
    }

    pub fn acc_dt2_half(&self) -> DVec3 {
        DVec3::new(self.adt2x, self.adt2y, self.adt2z)
    }
}

/// Wire record for a ghost: species and position only. Ghosts exist for one
/// force computation and are discarded with the halo.
#[derive(Clone, Copy, Debug, Default, PartialEq, Equivalence)]
pub struct MoleculePosData {
    pub kind: i32,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl MoleculePosData {
    pub fn pos(&self) -> DVec3 {
        DVec3::new(self.rx, self.ry, self.rz)
    }
}

/// Wire record for the trajectory gather to rank 0, with the velocity in
/// unscaled units [Angstrom/fs].
#[derive(Clone, Copy, Debug, Default, PartialEq, Equivalence)]
pub struct MoleculeTrajData {
    pub kind: i32,
    pub serial: i32,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
}
