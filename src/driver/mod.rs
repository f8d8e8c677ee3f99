mod local;

pub use local::LocalDriver;

use log::debug;

use crate::case::CaseData;
use crate::communication::CommData;
use crate::communication::Communicator;
use crate::error::Result;
use crate::io::OutputFiles;
use crate::lj::LjTable;
use crate::proc_data::ProcData;

/// Owns every part of the multi-process simulation and sequences the
/// velocity-Verlet step loop: force computation, integration, halo refresh
/// and the output-round reductions.
pub struct Driver {
    case: CaseData,
    table: LjTable,
    comm_data: CommData,
    proc_data: ProcData,
    communicator: Communicator,
    output: Option<OutputFiles>,
}

impl Driver {
    pub fn new(case: CaseData) -> Result<Self> {
        let table = LjTable::new(&case);
        let mut comm_data = CommData::new();
        comm_data.init_peers(&case);
        let mut proc_data = ProcData::new(&case);
        proc_data.read_initial_state(&case)?;
        let output = if case.is_root_rank() {
            comm_data.set_all_molecule_count(proc_data.total_molecule_count());
            Some(OutputFiles::create(&case)?)
        } else {
            None
        };
        Ok(Self {
            case,
            table,
            comm_data,
            proc_data,
            communicator: Communicator::new(),
            output,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        while self.case.should_proceed() {
            if self.case.step_count == 0 {
                self.initial_step();
            }
            if self.case.is_output_round() {
                self.step_with_output()?;
            } else {
                self.step_without_output();
            }
        }
        Ok(())
    }

    /// Bootstraps accelerations consistent with the initial positions. No
    /// motion has happened yet, so the pre-force migration phase and the
    /// first half-kick are omitted.
    fn initial_step(&mut self) {
        debug!("initial step, t = {}", self.case.t);

        self.proc_data.export_surfacing_molecule_pos(&mut self.comm_data);
        self.communicator.exchange_molecule_pos(&mut self.comm_data);
        self.proc_data.import_surrounding_molecule_pos(&mut self.comm_data);

        self.proc_data.calc_force(&self.table);
        self.proc_data.clear_surrounding_cells();

        self.proc_data.update_velocity_half();

        self.case.increment_step();
    }

    fn step_without_output(&mut self) {
        debug!("step, t = {}", self.case.t);

        self.proc_data.update_velocity_half();
        self.proc_data.update_position();

        // Residents of the halo have left this rank; migrate them.
        self.proc_data.export_exiting_molecule_full(&mut self.comm_data);
        self.proc_data.clear_surrounding_cells();
        self.communicator.exchange_molecule_full(&mut self.comm_data);
        self.proc_data.import_entering_molecule_full(&mut self.comm_data);

        // Refresh the ghosts for the force computation.
        self.proc_data.export_surfacing_molecule_pos(&mut self.comm_data);
        self.communicator.exchange_molecule_pos(&mut self.comm_data);
        self.proc_data.import_surrounding_molecule_pos(&mut self.comm_data);

        self.proc_data.calc_force(&self.table);
        self.proc_data.clear_surrounding_cells();

        self.proc_data.update_velocity_half();

        self.case.increment_step();
    }

    /// The same sequence with the energy-accumulating kernels, followed by
    /// the trajectory gather and the energy reduction to rank 0.
    fn step_with_output(&mut self) -> Result<()> {
        debug!("output step, t = {}", self.case.t);

        self.proc_data.update_velocity_half();
        self.proc_data.update_position();

        self.proc_data.export_exiting_molecule_full(&mut self.comm_data);
        self.proc_data.clear_surrounding_cells();
        self.communicator.exchange_molecule_full(&mut self.comm_data);
        self.proc_data.import_entering_molecule_full(&mut self.comm_data);

        self.proc_data.export_surfacing_molecule_pos(&mut self.comm_data);
        self.communicator.exchange_molecule_pos(&mut self.comm_data);
        self.proc_data.import_surrounding_molecule_pos(&mut self.comm_data);

        self.proc_data.calc_force_and_up(&self.table);
        self.proc_data.clear_surrounding_cells();

        self.proc_data
            .update_velocity_half_and_calc_uk(&self.table);

        self.proc_data
            .export_trajectory_data(&mut self.comm_data, self.case.delta_t);
        self.proc_data.export_energy_data(&mut self.comm_data);
        self.communicator
            .reduce_energy(&self.case, &mut self.comm_data);

        if self.case.is_root_rank() {
            self.communicator
                .recv_trajectory_at_root(&self.case, &mut self.comm_data);
            let output = self.output.as_mut().expect("output files on rank 0");
            output.write_trajectory(&self.comm_data.all_traj)?;
            output.write_energy(
                self.case.t,
                self.comm_data.total_uk,
                self.comm_data.total_up,
            )?;
        } else {
            self.communicator
                .send_trajectory_to_root(&self.case, &mut self.comm_data);
        }

        self.case.increment_step();
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<()> {
        if let Some(output) = self.output.as_mut() {
            output.finalize()?;
        }
        Ok(())
    }
}
