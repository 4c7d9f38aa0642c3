use clap::{value_parser, Arg, ArgAction, Command};
use epinet::*;
use itertools::Itertools;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};

fn cli() -> Command {
    Command::new("epinet")
        .about("Epidemic spreading on a dynamic contact network (SSA / SSATAN-X)")
        .arg(
            Arg::new("config")
                .help("JSON settings file")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("algorithm")
                .help("SSA or SSX")
                .required(true)
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::new("repetitions")
                .long("repetitions")
                .help("Independent replicates, run in parallel")
                .default_value("1")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .default_value(".")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue),
        )
}

fn run(matches: &clap::ArgMatches) -> Result<()> {
    let config = matches
        .get_one::<PathBuf>("config")
        .ok_or_else(|| SimulationError::config("missing settings file"))?;
    let mode: RunMode = matches
        .get_one::<String>("algorithm")
        .ok_or_else(|| SimulationError::config("missing algorithm"))?
        .parse()?;
    let repetitions = matches.get_one::<usize>("repetitions").copied().unwrap_or(1);
    let output_dir = matches
        .get_one::<PathBuf>("output-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    if repetitions == 0 {
        return Err(SimulationError::config("--repetitions must be at least 1"));
    }

    let settings = Settings::from_file(config)?;
    let seed = settings.effective_seed();
    info!(config = %config.display(), %mode, seed, "settings loaded");

    if repetitions == 1 {
        let pb = time_progress_bar();
        let report = RunReport::simulate(&settings, mode, seed, true, &pb)?;
        pb.finish_with_message("simulation complete");
        let path = report.write_to_dir(&output_dir)?;
        println!(
            "{} finished in {} ms: {} -> {}, written to {}",
            report.algorithm,
            report.duration_ms,
            format_counts(&report.initial_counts),
            format_counts(&report.final_counts),
            path.display()
        );
    } else {
        let pb = progress_bar(repetitions as u64);
        let summary = run_ensemble(&settings, mode, seed, repetitions, pb.clone())?;
        pb.finish_with_message("ensemble complete");
        let path = summary.write_to_dir(&output_dir)?;
        println!(
            "{} x{}: {}, written to {}",
            summary.algorithm,
            summary.repetitions,
            summary
                .statistics
                .iter()
                .map(|s| format!("{} {:.2} ± {:.2}", s.state, s.mean, s.stddev))
                .join(", "),
            path.display()
        );
    }
    Ok(())
}

fn format_counts(counts: &StateCounts) -> String {
    EpidemicState::ALL
        .iter()
        .map(|&st| format!("{}={}", st, counts.get(st)))
        .join(" ")
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    let level = if matches.get_flag("verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
