#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use vkv_store::demo::run_conflict_retry_demo;
use vkv_wordcount::{RunConfig, run_word_count};

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "demo" => demo(),
        "count" => {
            let rest: Vec<String> = args.collect();
            count(&rest)
        }
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            bail!("unknown command: {command}")
        }
    }
}

fn print_usage() {
    println!("vkv\n");
    println!("USAGE:");
    println!("  vkv demo");
    println!("  vkv count <path> [--workers N] [--stagger-ms a,b,...] [--json]");
}

fn demo() -> Result<()> {
    let result = run_conflict_retry_demo().context("conflict/retry demo")?;
    for line in result.output_lines() {
        println!("{line}");
    }
    if !result.lost_update_prevented {
        bail!("demo detected a lost update");
    }
    Ok(())
}

fn count(args: &[String]) -> Result<()> {
    let mut path: Option<&str> = None;
    let mut config = RunConfig::default();
    let mut json = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--workers" => {
                let value = iter.next().context("--workers requires a value")?;
                config.workers = value
                    .parse()
                    .with_context(|| format!("invalid worker count: {value}"))?;
            }
            "--stagger-ms" => {
                let value = iter.next().context("--stagger-ms requires a value")?;
                config.work_delays = parse_delays(value)?;
            }
            "--json" => json = true,
            other if other.starts_with("--") => bail!("unknown flag: {other}"),
            other => {
                if path.replace(other).is_some() {
                    bail!("count takes exactly one path argument");
                }
            }
        }
    }

    let Some(path) = path else {
        bail!("count requires a path argument");
    };
    let text = fs::read_to_string(Path::new(path))
        .with_context(|| format!("failed to read {path}"))?;

    let report = run_word_count(&text, &config).context("word-count run")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "counted {} words ({} distinct) across {} workers",
        report.total_words,
        report.distinct_words,
        report.workers.len()
    );
    println!(
        "final version: {} ({} conflicts retried)",
        report.final_version, report.conflicts
    );
    println!("top {}:", report.top.len());
    for (word, count) in &report.top {
        println!("  {count:>6}  {word}");
    }
    Ok(())
}

fn parse_delays(value: &str) -> Result<Vec<Duration>> {
    value
        .split(',')
        .map(|part| {
            let ms: u64 = part
                .trim()
                .parse()
                .with_context(|| format!("invalid delay in --stagger-ms: {part}"))?;
            Ok(Duration::from_millis(ms))
        })
        .collect()
}
