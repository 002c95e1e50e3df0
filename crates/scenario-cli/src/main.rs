use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use contracts::PrepareRequest;
use scenario_api::config::EnvConfig;
use scenario_api::{serve, ScenarioEngine};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!("gridshock <command>");
    println!("commands:");
    println!("  serve [addr]            run the scenario engine HTTP service");
    println!("    default addr: 127.0.0.1:8080 (or GRIDSHOCK_ADDR)");
    println!("  import-rules <path>     import a rule CSV into the store");
    println!("  prepare <request.json>  materialize a scenario from a request file");
    println!("  status                  print store row counts");
    println!("environment:");
    println!("  GRIDSHOCK_DB_PATH, GRIDSHOCK_ADDR, GRIDSHOCK_TEMPLATE_DIR,");
    println!("  GRIDSHOCK_AUTOLOAD_RULES");
}

fn open_engine(config: &EnvConfig) -> ScenarioEngine {
    match ScenarioEngine::open(&config.db_path) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("error: cannot open store at {}: {err}", config.db_path.display());
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    let config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    match command {
        Some("serve") => {
            let addr = match args.get(2) {
                Some(raw) => match raw.parse::<SocketAddr>() {
                    Ok(addr) => addr,
                    Err(_) => {
                        eprintln!("error: invalid addr: {raw}");
                        std::process::exit(2);
                    }
                },
                None => config.addr,
            };

            let engine = open_engine(&config);
            if config.autoload_rules {
                match engine.autoload_templates(&config.template_dir) {
                    Ok(summary) => info!(
                        templates = summary.templates,
                        rules = summary.rules,
                        dir = %config.template_dir.display(),
                        "autoloaded rule templates"
                    ),
                    Err(err) => warn!(error = %err, "template autoload failed"),
                }
            }

            println!("serving scenario engine on http://{addr}");
            if let Err(err) = serve(addr, Arc::new(engine)).await {
                eprintln!("server error: {err}");
                std::process::exit(1);
            }
        }
        Some("import-rules") => {
            let Some(path) = args.get(2) else {
                eprintln!("error: missing csv path");
                print_usage();
                std::process::exit(2);
            };
            let engine = open_engine(&config);
            match engine.import_rules(path) {
                Ok(summary) => {
                    println!(
                        "imported {} template(s), {} rule(s)",
                        summary.templates, summary.rules
                    );
                }
                Err(err) => {
                    eprintln!("import error: {err}");
                    std::process::exit(1);
                }
            }
        }
        Some("prepare") => {
            let Some(path) = args.get(2) else {
                eprintln!("error: missing request file");
                print_usage();
                std::process::exit(2);
            };
            let raw = match std::fs::read_to_string(path) {
                Ok(raw) => raw,
                Err(err) => {
                    eprintln!("error: cannot read {path}: {err}");
                    std::process::exit(1);
                }
            };
            let request: PrepareRequest = match serde_json::from_str(&raw) {
                Ok(request) => request,
                Err(err) => {
                    eprintln!("error: invalid prepare request: {err}");
                    std::process::exit(2);
                }
            };

            let engine = open_engine(&config);
            match engine.prepare(&request) {
                Ok(summary) => match serde_json::to_string_pretty(&summary) {
                    Ok(rendered) => println!("{rendered}"),
                    Err(err) => eprintln!("error: {err}"),
                },
                Err(err) => {
                    eprintln!("prepare failed: {err}");
                    std::process::exit(1);
                }
            }
        }
        Some("status") => {
            let engine = open_engine(&config);
            match engine.store_stats() {
                Ok(stats) => {
                    println!("store: {}", config.db_path.display());
                    println!("  assets:       {}", stats.assets);
                    println!("  dependencies: {}", stats.dependencies);
                    println!("  templates:    {}", stats.templates);
                    println!("  rules:        {}", stats.rules);
                    println!("  instances:    {}", stats.instances);
                    println!("  events:       {}", stats.events);
                }
                Err(err) => {
                    eprintln!("error: {err}");
                    std::process::exit(1);
                }
            }
        }
        _ => {
            print_usage();
        }
    }
}
