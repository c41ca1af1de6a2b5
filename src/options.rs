//! Parsing Options.
//! `--strategy {dfs|bfs|rdfs|heur}` picks the search order, `--generator`
//! the successor scheduling; everything else points at files.

use clap::{Arg, ArgAction, Command};
use std::error::Error;

use crate::search::queue::Strategy;
use crate::search::successor::GeneratorMode;

fn make_options_parser() -> clap::Command {
    let parser = Command::new("CPN")
        .no_binary_name(true)
        .version("v0.1.0")
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("FILE")
                .help("Path to the model file (json, ron or yaml)"),
        )
        .arg(
            Arg::new("query")
                .short('q')
                .long("query")
                .value_name("NAME")
                .help("The query to check; defaults to the model's first one"),
        )
        .arg(
            Arg::new("strategy")
                .short('s')
                .long("strategy")
                .help("Search order of the waiting list")
                .value_parser(["dfs", "bfs", "rdfs", "heur"]),
        )
        .arg(
            Arg::new("generator")
                .short('g')
                .long("generator")
                .help("Transition scheduling of the successor generator")
                .value_parser(["fixed", "even", "constrained"]),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("N")
                .help("Seed for the randomized strategies")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("trace")
                .short('t')
                .long("trace")
                .help("Record a counter-example trace and include it in the report")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("kbound")
                .short('k')
                .long("kbound")
                .value_name("N")
                .help("Refuse models whose initial marking exceeds N tokens")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file supplying defaults for the flags above"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Path to file where the verification report will be stored"),
        )
        .arg(
            Arg::new("graph")
                .long("graph")
                .value_name("FILE")
                .help("Dump the explored state space as graphviz dot"),
        );
    parser
}

#[derive(Debug, Default)]
pub struct Options {
    pub model: Option<String>,
    pub query: Option<String>,
    pub strategy: Option<Strategy>,
    pub generator: Option<GeneratorMode>,
    pub seed: Option<u64>,
    pub trace: bool,
    pub kbound: Option<u64>,
    pub config: Option<String>,
    pub output: Option<String>,
    pub graph: Option<String>,
}

impl Options {
    pub fn parse_from_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let flags = shellwords::split(s)?;
        Self::parse_from_args(&flags)
    }

    pub fn parse_from_args(flags: &[String]) -> Result<Self, Box<dyn Error>> {
        let app = make_options_parser();
        let matches = app.try_get_matches_from(flags.iter())?;
        let strategy = match matches.get_one::<String>("strategy") {
            Some(name) => Some(name.parse::<Strategy>()?),
            None => None,
        };
        let generator = match matches.get_one::<String>("generator") {
            Some(name) => Some(name.parse::<GeneratorMode>()?),
            None => None,
        };

        Ok(Options {
            model: matches.get_one::<String>("model").cloned(),
            query: matches.get_one::<String>("query").cloned(),
            strategy,
            generator,
            seed: matches.get_one::<u64>("seed").copied(),
            trace: matches.get_flag("trace"),
            kbound: matches.get_one::<u64>("kbound").copied(),
            config: matches.get_one::<String>("config").cloned(),
            output: matches.get_one::<String>("output").cloned(),
            graph: matches.get_one::<String>("graph").cloned(),
        })
    }

    /// Merges two parses, the receiver winning wherever it set a value.
    pub fn or(self, fallback: Options) -> Options {
        Options {
            model: self.model.or(fallback.model),
            query: self.query.or(fallback.query),
            strategy: self.strategy.or(fallback.strategy),
            generator: self.generator.or(fallback.generator),
            seed: self.seed.or(fallback.seed),
            trace: self.trace || fallback.trace,
            kbound: self.kbound.or(fallback.kbound),
            config: self.config.or(fallback.config),
            output: self.output.or(fallback.output),
            graph: self.graph.or(fallback.graph),
        }
    }
}

/// A fresh seed for runs that did not pin one.
pub fn draw_seed() -> u64 {
    let mut bytes = [0u8; 8];
    match getrandom::fill(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes),
        Err(_) => 0x5eed,
    }
}
