use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;
use log::error;
use log::info;
use mdlj::case::CaseData;
use mdlj::communication::Communicator;
use mdlj::communication::MPI_UNIVERSE;
use mdlj::driver::Driver;
use mdlj::error::Result;
use mdlj::logging;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Parallel Lennard-Jones molecular dynamics", long_about = None)]
struct Options {
    /// The case file describing the simulation run.
    case_file: PathBuf,
    #[clap(short, parse(from_occurrences))]
    verbosity: usize,
}

fn run(options: &Options, rank: i32, num_procs: i32) -> Result<()> {
    let case = CaseData::init(&options.case_file, rank, num_procs)?;
    let mut driver = Driver::new(case)?;
    driver.run()?;
    driver.finalize()
}

fn main() {
    let start = Instant::now();
    // Initialize MPI before touching the arguments.
    let communicator = Communicator::new();
    let rank = communicator.rank();
    let num_procs = communicator.size() as i32;

    let options = Options::parse();
    logging::initialize("mdlj", rank, num_procs as usize, options.verbosity);

    if let Err(err) = run(&options, rank, num_procs) {
        error!("{}", err);
        eprintln!("{}", err);
        MPI_UNIVERSE.drop();
        process::exit(1);
    }

    if rank == 0 {
        info!("time = {:.3} sec", start.elapsed().as_secs_f64());
    }
    MPI_UNIVERSE.drop();
}
