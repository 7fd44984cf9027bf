//! `board-preview` command line

use anyhow::Context;
use board_cli::{render_file, run_simulator, RenderOptions, SimulatorConfig};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("board-preview")
        .version(board_cli::VERSION)
        .about("Board card preview cache: workload simulator and markdown renderer")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON (filter with RUST_LOG)"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run a randomised mount/unmount/drag/edit workload")
                .arg(
                    Arg::new("cards")
                        .long("cards")
                        .default_value("200")
                        .value_parser(value_parser!(usize))
                        .help("Number of distinct cards"),
                )
                .arg(
                    Arg::new("lanes")
                        .long("lanes")
                        .default_value("4")
                        .value_parser(value_parser!(usize))
                        .help("Number of lanes"),
                )
                .arg(
                    Arg::new("operations")
                        .long("operations")
                        .default_value("5000")
                        .value_parser(value_parser!(u64))
                        .help("Number of random operations"),
                )
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .default_value("50")
                        .value_parser(value_parser!(usize))
                        .help("Render queue ceiling"),
                )
                .arg(
                    Arg::new("delay-ms")
                        .long("delay-ms")
                        .default_value("0")
                        .value_parser(value_parser!(u64))
                        .help("Simulated render latency in milliseconds"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                ),
        )
        .subcommand(
            Command::new("render")
                .about("Render a markdown file as a card and print the tree")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Markdown file"),
                )
                .arg(
                    Arg::new("search")
                        .long("search")
                        .help("Highlight this query"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Preview configuration (TOML)"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn required<T: Clone + Send + Sync + 'static>(args: &ArgMatches, name: &str) -> anyhow::Result<T> {
    args.get_one::<T>(name)
        .cloned()
        .with_context(|| format!("missing --{name}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let config = SimulatorConfig {
                seed: required(args, "seed")?,
                cards: required(args, "cards")?,
                lanes: required(args, "lanes")?,
                operations: required(args, "operations")?,
                concurrency: required(args, "concurrency")?,
                render_delay_ms: required(args, "delay-ms")?,
            };

            let report = run_simulator(config).await?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.generate_text());
            }
            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("render", args)) => {
            let options = RenderOptions {
                path: required(args, "file")?,
                search: args.get_one::<String>("search").cloned(),
                config: args.get_one::<PathBuf>("config").cloned(),
            };
            print!("{}", render_file(&options).await?);
        }
        _ => cli().print_help()?,
    }
    Ok(())
}
