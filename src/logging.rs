use std::fs::File;

use log::LevelFilter;
use simplelog::ColorChoice;
use simplelog::CombinedLogger;
use simplelog::ConfigBuilder;
use simplelog::LevelPadding;
use simplelog::TermLogger;
use simplelog::TerminalMode;
use simplelog::WriteLogger;

fn level_for_verbosity(verbosity: usize) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Sets up logging for one rank: rank 0 logs to the terminal and a file,
/// every other rank to its own file only.
pub fn initialize(name: &str, rank: i32, num_ranks: usize, verbosity: usize) {
    let level = level_for_verbosity(verbosity);
    let config = ConfigBuilder::default()
        .set_level_padding(LevelPadding::Right)
        .set_thread_level(LevelFilter::Off)
        .build();
    let padding = ((num_ranks as f64).log10().floor() as usize) + 1;
    let file_name = format!("{}_rank_{:0padding$}.log", name, rank, padding = padding);
    let log_file = File::create(&file_name)
        .unwrap_or_else(|_| panic!("Failed to create log file at {:?}", file_name));
    if rank == 0 {
        CombinedLogger::init(vec![
            TermLogger::new(
                level,
                config.clone(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            ),
            WriteLogger::new(level, config, log_file),
        ])
        .unwrap();
    } else {
        WriteLogger::init(level, config, log_file).unwrap();
    }
}
