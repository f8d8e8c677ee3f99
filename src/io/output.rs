use std::fs::File;
use std::io::BufWriter;
use std::io::Write;

use crate::case::CaseData;
use crate::communication::MoleculeTrajData;
use crate::error::MdError;
use crate::error::Result;
use crate::lj::SPECIES;

/// The two output files written by rank 0.
pub struct OutputFiles {
    trajectory: BufWriter<File>,
    trajectory_path: String,
    energy: BufWriter<File>,
    energy_path: String,
}

impl OutputFiles {
    pub fn create(case: &CaseData) -> Result<Self> {
        let trajectory = File::create(&case.trajectory_file)
            .map_err(|source| MdError::io(source, &case.trajectory_file))?;
        let energy = File::create(&case.energy_file)
            .map_err(|source| MdError::io(source, &case.energy_file))?;
        Ok(Self {
            trajectory: BufWriter::new(trajectory),
            trajectory_path: case.trajectory_file.clone(),
            energy: BufWriter::new(energy),
            energy_path: case.energy_file.clone(),
        })
    }

    /// Appends one frame: a count line, a comment line, then every particle
    /// in serial order.
    pub fn write_trajectory(&mut self, records: &[MoleculeTrajData]) -> Result<()> {
        write_trajectory_to(&mut self.trajectory, records)
            .map_err(|source| MdError::io(source, &self.trajectory_path))
    }

    /// Appends one energy line: `t  U_k  U_p  U_k+U_p`.
    pub fn write_energy(&mut self, t: f64, uk: f64, up: f64) -> Result<()> {
        write_energy_to(&mut self.energy, t, uk, up)
            .map_err(|source| MdError::io(source, &self.energy_path))
    }

    pub fn finalize(&mut self) -> Result<()> {
        self.trajectory
            .flush()
            .map_err(|source| MdError::io(source, &self.trajectory_path))?;
        self.energy
            .flush()
            .map_err(|source| MdError::io(source, &self.energy_path))
    }
}

fn write_trajectory_to(w: &mut impl Write, records: &[MoleculeTrajData]) -> std::io::Result<()> {
    writeln!(w, "{}", records.len())?;
    writeln!(w, "# Output of mdlj")?;
    for record in records {
        writeln!(
            w,
            "{} {} {} {} {} {} {}",
            SPECIES[record.kind as usize].label,
            record.rx,
            record.ry,
            record.rz,
            record.vx,
            record.vy,
            record.vz
        )?;
    }
    Ok(())
}

fn write_energy_to(w: &mut impl Write, t: f64, uk: f64, up: f64) -> std::io::Result<()> {
    writeln!(w, "{} {} {} {}", t, uk, up, uk + up)
}

#[cfg(test)]
mod tests {
    use super::write_energy_to;
    use super::write_trajectory_to;
    use crate::communication::MoleculeTrajData;

    #[test]
    fn trajectory_frame_has_header_and_one_line_per_particle() {
        let records = vec![
            MoleculeTrajData {
                kind: 0,
                serial: 0,
                rx: 1.0,
                ry: 2.0,
                rz: 3.0,
                vx: 0.5,
                vy: 0.0,
                vz: 0.0,
            },
            MoleculeTrajData {
                kind: 2,
                serial: 1,
                rx: 4.0,
                ry: 5.0,
                rz: 6.0,
                vx: 0.0,
                vy: -0.5,
                vz: 0.0,
            },
        ];
        let mut out = Vec::new();
        write_trajectory_to(&mut out, &records).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "2");
        assert_eq!(lines[1], "# Output of mdlj");
        assert_eq!(lines[2], "He 1 2 3 0.5 0 0");
        assert_eq!(lines[3], "Ar 4 5 6 0 -0.5 0");
    }

    #[test]
    fn energy_line_contains_the_total() {
        let mut out = Vec::new();
        write_energy_to(&mut out, 4.0, 1.5, -2.25).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "4 1.5 -2.25 -0.75\n");
    }
}
