use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;
use log::error;
use log::info;
use mdlj::case::CaseData;
use mdlj::driver::LocalDriver;
use mdlj::error::Result;
use mdlj::logging;

/// Single-process convenience driver: the same simulation without the MPI
/// launcher, for debugging force computation and integration, and as a
/// baseline for parallel speedup measurements.
#[derive(Parser, Debug)]
#[clap(author, version, about = "Single-process Lennard-Jones molecular dynamics", long_about = None)]
struct Options {
    /// The case file describing the simulation run.
    case_file: PathBuf,
    #[clap(short, parse(from_occurrences))]
    verbosity: usize,
}

fn run(options: &Options) -> Result<()> {
    let case = CaseData::init(&options.case_file, 0, 1)?;
    let mut driver = LocalDriver::new(case)?;
    driver.open_output()?;
    driver.run()?;
    driver.finalize()
}

fn main() {
    let start = Instant::now();
    let options = Options::parse();
    logging::initialize("mdlj_sp", 0, 1, options.verbosity);

    if let Err(err) = run(&options) {
        error!("{}", err);
        eprintln!("{}", err);
        process::exit(1);
    }

    info!("time = {:.3} sec", start.elapsed().as_secs_f64());
}
