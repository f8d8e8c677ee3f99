use log::debug;

use crate::case::CaseData;
use crate::communication::CommData;
use crate::communication::LocalCommunicator;
use crate::error::Result;
use crate::io::OutputFiles;
use crate::lj::LjTable;
use crate::proc_data::ProcData;

/// The single-process driver behind `mdlj_sp`. It runs the same phase
/// sequence as the multi-process [`super::Driver`], with every halo exchange
/// served in-process by the [`LocalCommunicator`], so an `mdlj_sp` run and a
/// 1x1x1 `mdlj` run agree bit-for-bit.
pub struct LocalDriver {
    case: CaseData,
    table: LjTable,
    comm_data: CommData,
    proc_data: ProcData,
    communicator: LocalCommunicator,
    output: Option<OutputFiles>,
}

impl LocalDriver {
    pub fn new(case: CaseData) -> Result<Self> {
        let mut proc_data = ProcData::new(&case);
        proc_data.read_initial_state(&case)?;
        Ok(Self::from_parts(case, proc_data))
    }

    pub(crate) fn from_parts(case: CaseData, proc_data: ProcData) -> Self {
        assert!(case.is_root_rank() && case.num_procs == 1);
        let table = LjTable::new(&case);
        let mut comm_data = CommData::new();
        comm_data.init_peers(&case);
        comm_data.set_all_molecule_count(proc_data.total_molecule_count());
        Self {
            case,
            table,
            comm_data,
            proc_data,
            communicator: LocalCommunicator::new(),
            output: None,
        }
    }

    pub fn open_output(&mut self) -> Result<()> {
        self.output = Some(OutputFiles::create(&self.case)?);
        Ok(())
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

        self.proc_data.export_exiting_molecule_full(&mut self.comm_data);
        self.proc_data.clear_surrounding_cells();
        self.communicator.exchange_molecule_full(&mut self.comm_data);
        self.proc_data.import_entering_molecule_full(&mut self.comm_data);

        self.proc_data.export_surfacing_molecule_pos(&mut self.comm_data);
        self.communicator.exchange_molecule_pos(&mut self.comm_data);
        self.proc_data.import_surrounding_molecule_pos(&mut self.comm_data);

        self.proc_data.calc_force(&self.table);
        self.proc_data.clear_surrounding_cells();

        self.proc_data.update_velocity_half();

        self.case.increment_step();
    }

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
        self.communicator.reduce_energy(&mut self.comm_data);
        self.communicator.gather_trajectory(&mut self.comm_data);

        if let Some(output) = self.output.as_mut() {
            output.write_trajectory(&self.comm_data.all_traj)?;
            output.write_energy(
                self.case.t,
                self.comm_data.total_uk,
                self.comm_data.total_up,
            )?;
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
