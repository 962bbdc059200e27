//! Entry point for probetop. Parses args, starts the engine and runs the App.

mod app;
mod format;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use app::{App, OutputMode};
use probetop_core::{Category, Engine, EngineConfig, Rate, SortColumn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: probetop [--cpu-ms MS] [--procs-ms MS] [--net-ms MS] [--sys-ms MS] \
[--fps N] [--frames N] [--filter TEXT] [--sort COL[:asc|:desc]] [--json] \
[--proc-root DIR] [--sys-root DIR]";

#[derive(Debug, Default, PartialEq)]
struct ParsedArgs {
    intervals: Vec<(Category, Duration)>,
    fps: Option<u32>,
    frames: Option<u64>,
    filter: Option<String>,
    sort: Option<(SortColumn, bool)>,
    json: bool,
    proc_root: Option<PathBuf>,
    sys_root: Option<PathBuf>,
}

#[derive(Debug, PartialEq)]
enum Invocation {
    Run(ParsedArgs),
    Help,
}

fn parse_sort(v: &str) -> Result<(SortColumn, bool), String> {
    let (col, dir) = v.split_once(':').unwrap_or((v, "desc"));
    let ascending = match dir {
        "asc" => true,
        "desc" => false,
        other => return Err(format!("sort direction must be asc or desc, got '{other}'")),
    };
    Ok((col.parse()?, ascending))
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Invocation, String> {
    let mut it = args.into_iter();
    let _prog = it.next();
    let mut parsed = ParsedArgs::default();

    let value = |flag: &str, it: &mut I::IntoIter| {
        it.next().ok_or_else(|| format!("{flag} needs a value. {USAGE}"))
    };
    let num = |flag: &str, v: String| {
        v.parse::<u64>()
            .map_err(|_| format!("{flag}: expected a number, got '{v}'"))
    };

    while let Some(arg) = it.next() {
        // accept --flag=value as well as --flag value
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let take = |it: &mut I::IntoIter| match inline.clone() {
            Some(v) => Ok(v),
            None => value(&flag, it),
        };
        match flag.as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            "--cpu-ms" | "--procs-ms" | "--net-ms" | "--sys-ms" => {
                let category = match flag.as_str() {
                    "--cpu-ms" => Category::Cpu,
                    "--procs-ms" => Category::Processes,
                    "--net-ms" => Category::Network,
                    _ => Category::System,
                };
                let ms = num(&flag, take(&mut it)?)?;
                parsed
                    .intervals
                    .push((category, Duration::from_millis(ms)));
            }
            "--fps" => {
                let fps = num(&flag, take(&mut it)?)?;
                if fps == 0 {
                    return Err("--fps must be at least 1".into());
                }
                parsed.fps = Some(fps.min(u32::MAX as u64) as u32);
            }
            "--frames" => parsed.frames = Some(num(&flag, take(&mut it)?)?),
            "--filter" => parsed.filter = Some(take(&mut it)?),
            "--sort" => parsed.sort = Some(parse_sort(&take(&mut it)?)?),
            "--json" => parsed.json = true,
            "--proc-root" => parsed.proc_root = Some(PathBuf::from(take(&mut it)?)),
            "--sys-root" => parsed.sys_root = Some(PathBuf::from(take(&mut it)?)),
            other => return Err(format!("Unexpected argument '{other}'. {USAGE}")),
        }
    }
    Ok(Invocation::Run(parsed))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("probetop=info,probetop_core=info"));
    // stdout carries snapshot output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(Invocation::Run(p)) => p,
        Ok(Invocation::Help) => {
            println!("{USAGE}");
            return Ok(());
        }
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };
    init_logging();

    // flags win over PROBETOP_* environment overrides
    let mut cfg = EngineConfig::from_env();
    for (category, interval) in &parsed.intervals {
        Rate::Interval(*interval)
            .to_interval(*category)
            .with_context(|| format!("{category} interval"))?;
        cfg.set_interval(*category, *interval);
    }
    if let Some(p) = parsed.proc_root.clone() {
        cfg.proc_root = p;
    }
    if let Some(p) = parsed.sys_root.clone() {
        cfg.sys_root = p;
    }

    let engine = Engine::start(cfg).context("starting sampling engine")?;
    if let Some(filter) = parsed.filter {
        engine.set_filter(filter).await;
    }
    if let Some((column, ascending)) = parsed.sort {
        engine.set_sort_column(column, ascending).await;
    }

    let mode = if parsed.json {
        OutputMode::Json
    } else {
        OutputMode::Summary
    };
    let app = App::new(engine, parsed.fps.unwrap_or(4), parsed.frames, mode);
    app.run(&mut std::io::stdout()).await
}
