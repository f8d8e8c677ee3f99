use std::io::BufRead;
use std::path::Path;

use glam::DVec3;
use glam::IVec3;

use crate::error::MdError;
use crate::error::Result;
use crate::extent::Extent;
use crate::grid::GridRange;
use crate::io::LineReader;

/// Everything the case file specifies, the geometry derived from it, and the
/// time cursor of the run.
#[derive(Debug)]
pub struct CaseData {
    /// Process grid dimensions.
    pub np: IVec3,
    /// Local cells per process, per dimension.
    pub nc: IVec3,
    /// Total box size [Angstrom].
    pub box_l: DVec3,
    /// Per-process box size [Angstrom].
    pub proc_l: DVec3,
    /// Per-cell box size [Angstrom].
    pub cell_l: DVec3,
    /// Cutoff radius [Angstrom].
    pub cutoff_radius: f64,
    /// Timestep [fs].
    pub delta_t: f64,
    /// Simulated time to reach [fs].
    pub duration: f64,
    /// Output files are written once per this many steps.
    pub output_interval: i32,

    pub initial_state_file: String,
    /// Recognized in the case file but reserved for future use.
    pub restart_file: String,
    pub trajectory_file: String,
    pub energy_file: String,

    /// The process coordinates that exist in this run.
    pub all_processes: GridRange,

    pub my_rank: i32,
    pub num_procs: i32,
    /// Process coordinate of this rank.
    pub local_process: IVec3,
    /// The sub-volume this rank integrates [Angstrom].
    pub local_box: Extent,

    /// Simulated time so far [fs].
    pub t: f64,
    pub step_count: i32,
}

impl CaseData {
    pub fn init(path: impl AsRef<Path>, my_rank: i32, num_procs: i32) -> Result<Self> {
        let reader = LineReader::open(path)?;
        Self::from_reader(reader, my_rank, num_procs)
    }

    pub fn from_reader<R: BufRead>(
        mut rdr: LineReader<R>,
        my_rank: i32,
        num_procs: i32,
    ) -> Result<Self> {
        assert!(my_rank >= 0 && my_rank < num_procs);

        let initial_state_file = rdr.labeled_string_line("initial_state_file")?;
        let restart_file = rdr.labeled_string_line("restart_file")?;
        let trajectory_file = rdr.labeled_string_line("trajectory_file")?;
        let energy_file = rdr.labeled_string_line("energy_file")?;

        rdr.next_line()?;
        rdr.keyword("box_size")?;
        let box_l = DVec3::new(
            rdr.read_f64("Lx")?,
            rdr.read_f64("Ly")?,
            rdr.read_f64("Lz")?,
        );

        rdr.next_line()?;
        rdr.keyword("process_division")?;
        let np = IVec3::new(
            rdr.read_i32("Npx")?,
            rdr.read_i32("Npy")?,
            rdr.read_i32("Npz")?,
        );

        rdr.next_line()?;
        rdr.keyword("cell_division")?;
        let nc = IVec3::new(
            rdr.read_i32("Ncx")?,
            rdr.read_i32("Ncy")?,
            rdr.read_i32("Ncz")?,
        );

        let delta_t = rdr.labeled_f64_line("delta_t")?;
        let duration = rdr.labeled_f64_line("duration")?;
        let output_interval = rdr.labeled_i32_line("output_interval")?;
        let cutoff_radius = rdr.labeled_f64_line("cutoff_radius")?;

        if np.min_element() < 1 || nc.min_element() < 1 {
            return Err(MdError::data(format!(
                "process_division {} {} {} and cell_division {} {} {} must be positive",
                np.x, np.y, np.z, nc.x, nc.y, nc.z
            )));
        }
        if output_interval < 1 {
            return Err(MdError::data(format!(
                "output_interval = {} must be positive",
                output_interval
            )));
        }
        if np.x * np.y * np.z != num_procs {
            return Err(MdError::data(format!(
                "num_procs = {}, does not match npx*npy*npz = {}*{}*{}",
                num_procs, np.x, np.y, np.z
            )));
        }

        let proc_l = box_l / np.as_dvec3();
        let cell_l = proc_l / nc.as_dvec3();
        if cutoff_radius > cell_l.min_element() {
            return Err(MdError::data(format!(
                "cutoff_radius = {} exceeds the cell edge lengths ({}, {}, {}); \
                 a single layer of surrounding cells would not be sufficient",
                cutoff_radius, cell_l.x, cell_l.y, cell_l.z
            )));
        }

        let all_processes = GridRange::new(IVec3::ZERO, np - IVec3::ONE);
        let mut case = Self {
            np,
            nc,
            box_l,
            proc_l,
            cell_l,
            cutoff_radius,
            delta_t,
            duration,
            output_interval,
            initial_state_file,
            restart_file,
            trajectory_file,
            energy_file,
            all_processes,
            my_rank,
            num_procs,
            local_process: IVec3::ZERO,
            local_box: Extent::new(DVec3::ZERO, box_l),
            t: 0.0,
            step_count: 0,
        };
        case.local_process = case.process_index_for_rank(my_rank);
        case.local_box = case.box_for_process(case.local_process);
        Ok(case)
    }

    /// Inverse of [`Self::rank_for_process`].
    pub fn process_index_for_rank(&self, rank: i32) -> IVec3 {
        debug_assert!(rank >= 0 && rank < self.num_procs);
        let ipx = rank / (self.np.y * self.np.z);
        let rank_yz = rank % (self.np.y * self.np.z);
        IVec3::new(ipx, rank_yz / self.np.z, rank_yz % self.np.z)
    }

    pub fn rank_for_process(&self, idx: IVec3) -> i32 {
        debug_assert!(self.all_processes.contains(idx));
        idx.x * self.np.y * self.np.z + idx.y * self.np.z + idx.z
    }

    pub fn box_for_process(&self, idx: IVec3) -> Extent {
        let min = idx.as_dvec3() * self.proc_l;
        Extent::new(min, min + self.proc_l)
    }

    /// The extent of a cell given its grid coordinate including the halo,
    /// i.e. local cells have coordinates 1..=nc on each axis.
    pub fn box_for_cell(&self, cell_idx: IVec3) -> Extent {
        let min = self.local_box.min + (cell_idx - IVec3::ONE).as_dvec3() * self.cell_l;
        Extent::new(min, min + self.cell_l)
    }

    pub fn should_proceed(&self) -> bool {
        self.t <= self.duration
    }

    pub fn is_output_round(&self) -> bool {
        self.step_count % self.output_interval == 0
    }

    pub fn increment_step(&mut self) {
        self.t += self.delta_t;
        self.step_count += 1;
    }

    pub fn is_root_rank(&self) -> bool {
        self.my_rank == 0
    }
}

#[cfg(test)]
pub mod tests {
    use std::io::Cursor;

    use glam::DVec3;
    use glam::IVec3;

    use super::CaseData;
    use crate::io::LineReader;

    pub fn case_text(
        box_l: (f64, f64, f64),
        np: (i32, i32, i32),
        nc: (i32, i32, i32),
        delta_t: f64,
        duration: f64,
        output_interval: i32,
        cutoff: f64,
    ) -> String {
        format!(
            "initial_state_file initial.txt\n\
             restart_file restart.txt\n\
             trajectory_file trajectory.txt\n\
             energy_file energy.txt\n\
             box_size {} {} {}\n\
             process_division {} {} {}\n\
             cell_division {} {} {}\n\
             delta_t {}\n\
             duration {}\n\
             output_interval {}\n\
             cutoff_radius {}\n",
            box_l.0, box_l.1, box_l.2, np.0, np.1, np.2, nc.0, nc.1, nc.2, delta_t, duration,
            output_interval, cutoff
        )
    }

    pub fn case_from_text(text: &str, my_rank: i32, num_procs: i32) -> CaseData {
        let rdr = LineReader::new(Cursor::new(text.to_owned()), "case.txt");
        CaseData::from_reader(rdr, my_rank, num_procs).unwrap()
    }

    fn test_case(my_rank: i32) -> CaseData {
        let text = case_text((100.0, 200.0, 300.0), (3, 3, 3), (3, 3, 3), 2.0, 100.0, 10, 5.0);
        case_from_text(&text, my_rank, 27)
    }

    #[test]
    fn derived_geometry() {
        let case = test_case(0);
        assert_eq!(case.proc_l, DVec3::new(100.0 / 3.0, 200.0 / 3.0, 100.0));
        assert_eq!(case.cell_l, case.proc_l / 3.0);
        assert_eq!(case.restart_file, "restart.txt");
    }

    #[test]
    fn rank_process_mapping_is_a_bijection() {
        let case = test_case(5);
        assert_eq!(case.local_process, IVec3::new(0, 1, 2));
        for rank in 0..27 {
            assert_eq!(case.rank_for_process(case.process_index_for_rank(rank)), rank);
        }
        assert_eq!(case.rank_for_process(IVec3::new(2, 1, 2)), 23);
    }

    #[test]
    fn local_box_follows_the_process_index() {
        let case = test_case(5);
        // process (0, 1, 2)
        assert_eq!(case.local_box.min, DVec3::new(0.0, 200.0 / 3.0, 200.0));
        let cell = case.box_for_cell(IVec3::new(1, 1, 1));
        assert_eq!(cell.min, case.local_box.min);
        assert!((cell.side_lengths() - case.cell_l).length() < 1e-12);
        let halo = case.box_for_cell(IVec3::new(0, 1, 1));
        assert!(halo.min.x < case.local_box.min.x);
    }

    #[test]
    fn mismatched_process_count_is_a_data_error() {
        let text = case_text((100.0, 100.0, 100.0), (3, 3, 3), (3, 3, 3), 2.0, 100.0, 10, 5.0);
        let rdr = LineReader::new(Cursor::new(text), "case.txt");
        let err = CaseData::from_reader(rdr, 0, 8).unwrap_err().to_string();
        assert!(err.contains("num_procs = 8, does not match npx*npy*npz = 3*3*3"));
    }

    #[test]
    fn oversized_cutoff_is_a_data_error() {
        let text = case_text((100.0, 100.0, 100.0), (1, 1, 1), (10, 10, 10), 2.0, 100.0, 10, 12.0);
        let rdr = LineReader::new(Cursor::new(text), "case.txt");
        let err = CaseData::from_reader(rdr, 0, 1).unwrap_err().to_string();
        assert!(err.contains("cutoff_radius = 12"));
    }

    #[test]
    fn time_cursor_and_output_cadence() {
        let mut case = test_case(0);
        assert!(case.should_proceed());
        assert!(case.is_output_round());
        case.increment_step();
        assert_eq!(case.t, 2.0);
        assert!(!case.is_output_round());
        for _ in 0..9 {
            case.increment_step();
        }
        assert!(case.is_output_round());
    }
}
