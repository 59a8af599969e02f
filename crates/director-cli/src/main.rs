use std::env;
use std::fs;
use std::net::SocketAddr;
use std::process::ExitCode;

use contracts::{DirectorConfig, Project};
use director_api::serve;
use director_core::{validate_project, Director, StoryThread};

fn print_usage() {
    println!("director-cli <command>");
    println!("commands:");
    println!("  validate <project.json>");
    println!("  tick <project.json> [steps] [seed]");
    println!("  explain <project.json> <storylet_id>");
    println!("  replay <project.json> <from_tick> <to_tick> [seed]");
    println!("  serve [addr]");
    println!("    default addr: 127.0.0.1:8080");
}

fn load_project(path: &str) -> Result<Project, String> {
    let raw = fs::read_to_string(path).map_err(|err| format!("cannot read {path}: {err}"))?;
    let project =
        serde_json::from_str::<Project>(&raw).map_err(|err| format!("cannot parse {path}: {err}"))?;
    validate_project(&project).map_err(|err| err.to_string())?;
    Ok(project)
}

fn parse_u64(value: Option<&String>, label: &str) -> Result<u64, String> {
    let raw = value.ok_or_else(|| format!("missing {label}"))?;
    raw.parse::<u64>()
        .map_err(|_| format!("invalid {label}: {raw}"))
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn config_with_seed(seed: Option<u64>) -> DirectorConfig {
    DirectorConfig {
        rng_seed: seed.unwrap_or(0),
        ..DirectorConfig::default()
    }
}

fn run_ticks(path: &str, steps: u64, seed: Option<u64>) -> Result<(), String> {
    let project = load_project(path)?;
    let director = Director::with_stub_judge();
    let mut thread = StoryThread::new("main", &project);
    let config = config_with_seed(seed);
    for _ in 0..steps {
        let record = director
            .tick(&project, &mut thread, &config)
            .map_err(|err| err.to_string())?;
        let line = serde_json::to_string(&record).map_err(|err| err.to_string())?;
        println!("{line}");
    }
    Ok(())
}

fn run_explain(path: &str, storylet_id: &str) -> Result<(), String> {
    let project = load_project(path)?;
    let director = Director::with_stub_judge();
    let thread = StoryThread::new("main", &project);
    let config = DirectorConfig::default();
    let reports = director
        .explain(&project, storylet_id, &thread.state, &config)
        .map_err(|err| err.to_string())?;
    if reports.is_empty() {
        println!("{storylet_id}: no preconditions (always satisfied)");
    }
    for report in reports {
        let marker = if report.satisfied { "pass" } else { "fail" };
        println!("{marker}: {}", report.reason);
    }
    Ok(())
}

fn run_replay(path: &str, from_tick: u64, to_tick: u64, seed: Option<u64>) -> Result<(), String> {
    let project = load_project(path)?;
    let director = Director::with_stub_judge();
    let config = config_with_seed(seed);
    let records = director
        .replay(&project, &config, from_tick, to_tick)
        .map_err(|err| err.to_string())?;
    for record in records {
        let line = serde_json::to_string(&record).map_err(|err| err.to_string())?;
        println!("{line}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    let outcome = match command {
        Some("validate") => match args.get(2) {
            Some(path) => load_project(path).map(|project| {
                println!(
                    "ok: {} ({} storylets)",
                    project.project_id,
                    project.storylets.len()
                );
            }),
            None => Err("missing project path".to_string()),
        },
        Some("tick") => match args.get(2) {
            Some(path) => {
                let steps = args.get(3).and_then(|v| v.parse::<u64>().ok()).unwrap_or(1);
                let seed = args.get(4).and_then(|v| v.parse::<u64>().ok());
                run_ticks(path, steps, seed)
            }
            None => Err("missing project path".to_string()),
        },
        Some("explain") => match (args.get(2), args.get(3)) {
            (Some(path), Some(storylet_id)) => run_explain(path, storylet_id),
            _ => Err("usage: explain <project.json> <storylet_id>".to_string()),
        },
        Some("replay") => match args.get(2) {
            Some(path) => {
                let parsed = parse_u64(args.get(3), "from_tick")
                    .and_then(|from_tick| Ok((from_tick, parse_u64(args.get(4), "to_tick")?)));
                match parsed {
                    Ok((from_tick, to_tick)) => {
                        let seed = args.get(5).and_then(|v| v.parse::<u64>().ok());
                        run_replay(path, from_tick, to_tick, seed)
                    }
                    Err(err) => Err(err),
                }
            }
            None => Err("missing project path".to_string()),
        },
        Some("serve") => match parse_socket_addr(args.get(2)) {
            Ok(addr) => {
                println!("serving director api on http://{addr}");
                serve(addr).await.map_err(|err| err.to_string())
            }
            Err(err) => Err(err),
        },
        _ => {
            print_usage();
            return ExitCode::SUCCESS;
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            print_usage();
            ExitCode::from(2)
        }
    }
}
