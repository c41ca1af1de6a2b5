//! The `cpn` command line checker.
//!
//! Reads a net model, picks one of its queries, runs the reachability
//! engine and prints a report. Flags come from the command line, then the
//! `CPN_FLAGS` environment variable, then the config file, in that order
//! of precedence.

use std::error::Error;

use anyhow::{Context, bail};
use log::{debug, info};

use RustCPN::config::EngineConfig;
use RustCPN::error::{BuildError, EngineError};
use RustCPN::io::read_model;
use RustCPN::options::{self, Options};
use RustCPN::query::{Condition, Quantifier};
use RustCPN::report::{CheckReport, TraceRow};
use RustCPN::search::{SearchSettings, Verdict, Worklist};
use RustCPN::util::MemoryWatcher;

/// Unwraps a parse, letting clap render help, version and usage errors.
fn parsed_options(parsed: Result<Options, Box<dyn Error>>) -> Options {
    match parsed {
        Ok(options) => options,
        Err(err) => match err.downcast::<clap::Error>() {
            Ok(err) => err.exit(),
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(2);
            }
        },
    }
}

fn quantifier_of(condition: &Condition) -> Result<Quantifier, EngineError> {
    match condition {
        Condition::ExistsFinally(_) => Ok(Quantifier::ExistsFinally),
        Condition::AlwaysGlobally(_) => Ok(Quantifier::AlwaysGlobally),
        _ => Err(EngineError::UnsupportedQuery),
    }
}

fn main() -> anyhow::Result<()> {
    if std::env::var("CPN_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("CPN_LOG")
            .write_style("CPN_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    let env_options = match std::env::var("CPN_FLAGS") {
        Ok(flags) => parsed_options(Options::parse_from_str(&flags)),
        Err(_) => Options::default(),
    };
    debug!("Options from CPN_FLAGS: {:?}", env_options);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = parsed_options(Options::parse_from_args(&args)).or(env_options);
    debug!("Options after merging the command line: {:?}", options);

    let config_path = options.config.as_deref().unwrap_or("cpn.toml");
    let config = EngineConfig::load_from_file(config_path)?;

    let settings = SearchSettings {
        strategy: options.strategy.unwrap_or(config.strategy),
        mode: options.generator.unwrap_or(config.generator),
        seed: options
            .seed
            .or(config.seed)
            .unwrap_or_else(options::draw_seed),
        record_trace: options.trace || config.trace,
        record_graph: options.graph.is_some(),
    };
    let kbound = options.kbound.or(config.kbound);

    let Some(model_path) = options.model.as_deref() else {
        bail!("no model file given, pass one with --model");
    };
    let mut model = read_model(model_path)
        .with_context(|| format!("Failed to read model file: {:?}", model_path))?;

    let queries = std::mem::take(&mut model.queries);
    let query = match options.query.as_deref() {
        Some(name) => queries
            .into_iter()
            .find(|query| query.name == name)
            .with_context(|| format!("model has no query named '{}'", name))?,
        None => queries
            .into_iter()
            .next()
            .context("model declares no queries")?,
    };

    let net = match model.into_builder().build() {
        Ok(net) => net,
        Err(BuildError::TooManyBindings(transition)) => {
            // Not checkable, but not a malformed model either
            info!("Transition {} has too many bindings, giving up", transition);
            let report = CheckReport::new(
                query.name,
                quantifier_of(&query.condition)?,
                Verdict::Inconclusive,
                false,
                Default::default(),
            );
            println!("{report}");
            if let Some(path) = options.output.as_deref() {
                report
                    .save_to_file(path)
                    .with_context(|| format!("Failed to write report to {:?}", path))?;
            }
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(bound) = kbound {
        let tokens = net.initial_marking().total_tokens();
        if tokens > bound {
            bail!(
                "initial marking holds {} tokens, over the bound of {}",
                tokens,
                bound
            );
        }
    }

    info!(
        "Checking query {} with strategy {}, generator {}, seed {}",
        query.name, settings.strategy, settings.mode, settings.seed
    );

    let mut worklist = Worklist::new(&net, &query.condition, &settings)?;
    let mut watcher = MemoryWatcher::new();
    watcher.start();
    let verdict = worklist.check();
    watcher.stop();

    let mut report = CheckReport::new(
        query.name,
        worklist.quantifier(),
        verdict,
        worklist.was_complete(),
        worklist.statistics().clone(),
    );
    if settings.record_trace {
        if let Some(id) = worklist.counter_example_id() {
            let rows: Vec<TraceRow> = worklist
                .trace_to(id)?
                .iter()
                .map(|step| TraceRow {
                    transition: net.transition(step.transition).name.clone(),
                    binding: step.binding,
                })
                .collect();
            report = report.with_trace(rows);
        }
    }

    println!("{report}");
    if let Some(path) = options.output.as_deref() {
        report
            .save_to_file(path)
            .with_context(|| format!("Failed to write report to {:?}", path))?;
    }
    if let Some(path) = options.graph.as_deref() {
        if let Some(graph) = worklist.state_graph() {
            graph.dot(Some(path))?;
        }
    }

    Ok(())
}
