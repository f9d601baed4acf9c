//! Microgrid entry point: CLI wiring and role-driven service construction.

use std::path::Path;
use std::process;

use tracing::error;
use tracing_subscriber::EnvFilter;

use microgrid_dispatch::config::MicrogridConfig;
use microgrid_dispatch::dispatch::{CoordinationReport, CoordinatorService, LocalAgents, TelemetryPayload};

/// Process role selected with `--role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Standalone,
    Coordinator,
    Solar,
    Battery,
    Vehicle,
    Load,
    Once,
}

impl Role {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "standalone" => Role::Standalone,
            "coordinator" => Role::Coordinator,
            "solar" => Role::Solar,
            "battery" => Role::Battery,
            "vehicle" => Role::Vehicle,
            "load" => Role::Load,
            "once" => Role::Once,
            _ => return None,
        })
    }
}

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<String>,
    role: Role,
    telemetry_path: Option<String>,
}

fn print_help() {
    eprintln!("microgrid: residential microgrid dispatch coordinator and agents");
    eprintln!();
    eprintln!("Usage: microgrid [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>          Load configuration from TOML file");
    eprintln!("  --role <name>            standalone | coordinator | solar | battery |");
    eprintln!("                           vehicle | load | once (default: once)");
    eprintln!("  --telemetry <path>       Telemetry JSON pushed before the cycle (once)");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("SERVICE_API_KEY, HTTP_CLIENT_TIMEOUT and <AGENT>_AGENT_URL override the file.");
    eprintln!("Log verbosity follows RUST_LOG (default: info).");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        role: Role::Once,
        telemetry_path: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --config requires a path argument");
                    process::exit(1);
                }
                cli.config_path = Some(args[i].clone());
            }
            "--role" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --role requires a name argument");
                    process::exit(1);
                }
                match Role::parse(&args[i]) {
                    Some(role) => cli.role = role,
                    None => {
                        eprintln!("error: unknown role \"{}\"", args[i]);
                        process::exit(1);
                    }
                }
            }
            "--telemetry" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --telemetry requires a path argument");
                    process::exit(1);
                }
                cli.telemetry_path = Some(args[i].clone());
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn load_config(cli: &CliArgs) -> MicrogridConfig {
    let mut config = if let Some(ref path) = cli.config_path {
        match MicrogridConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        MicrogridConfig::default()
    };

    if let Err(e) = config.apply_env() {
        eprintln!("{e}");
        process::exit(1);
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    config
}

fn local_agents(config: &MicrogridConfig) -> LocalAgents {
    LocalAgents::new(
        config.initial_solar(),
        config.initial_battery(),
        config.initial_vehicle(),
        config.initial_load(),
        &config.auth.api_key,
    )
}

fn read_telemetry(path: &str) -> TelemetryPayload {
    let content = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error: cannot read \"{path}\": {e}");
        process::exit(1);
    });
    serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("error: invalid telemetry in \"{path}\": {e}");
        process::exit(1);
    })
}

fn print_report(report: &CoordinationReport) {
    for step in &report.plan.steps {
        println!("{step}");
    }
    println!();
    println!(
        "net power: {:.3} kW -> {:.3} kW",
        report.plan.initial_net_power_kw, report.plan.net_power_kw
    );
    match serde_json::to_string_pretty(&report.status) {
        Ok(status) => println!("{status}"),
        Err(e) => eprintln!("error: cannot render status: {e}"),
    }
}

async fn run_once(config: &MicrogridConfig, telemetry: Option<TelemetryPayload>) {
    let agents = local_agents(config);
    let key = &config.auth.api_key;
    let coordinator =
        CoordinatorService::new(agents.ports(key, config.coordinator.request_timeout()), key.clone());
    match coordinator.coordinate(telemetry).await {
        Ok(report) => print_report(&report),
        Err(e) => {
            error!(kind = ?e.kind(), "coordination failed: {e}");
            process::exit(1);
        }
    }
}

#[cfg(feature = "api")]
async fn run_server(config: &MicrogridConfig, role: Role) {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use microgrid_dispatch::agent::AgentService;
    use microgrid_dispatch::api::{agent_router, coordinator_router, http_ports, serve};

    let key = &config.auth.api_key;
    let agents = &config.agents;
    let (app, bind) = match role {
        Role::Standalone | Role::Coordinator => {
            let timeout = config.coordinator.request_timeout();
            let ports = if role == Role::Standalone || config.coordinator.binding == "local" {
                local_agents(config).ports(key, timeout)
            } else {
                http_ports(agents, key, timeout).unwrap_or_else(|e| {
                    eprintln!("error: {e}");
                    process::exit(1);
                })
            };
            let coordinator = Arc::new(CoordinatorService::new(ports, key.clone()));
            (coordinator_router(coordinator), &config.coordinator.bind_addr)
        }
        Role::Solar => (
            agent_router(Arc::new(AgentService::new(config.initial_solar(), key.clone()))),
            &agents.solar_bind,
        ),
        Role::Battery => (
            agent_router(Arc::new(AgentService::new(config.initial_battery(), key.clone()))),
            &agents.battery_bind,
        ),
        Role::Vehicle => (
            agent_router(Arc::new(AgentService::new(config.initial_vehicle(), key.clone()))),
            &agents.vehicle_bind,
        ),
        Role::Load => (
            agent_router(Arc::new(AgentService::new(config.initial_load(), key.clone()))),
            &agents.load_bind,
        ),
        Role::Once => unreachable!("handled by run_once"),
    };

    let addr: SocketAddr = bind.parse().unwrap_or_else(|e| {
        eprintln!("error: invalid bind address \"{bind}\": {e}");
        process::exit(1);
    });
    if let Err(e) = serve(app, addr).await {
        error!(%addr, "server error: {e}");
        process::exit(1);
    }
}

fn main() {
    let cli = parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli);
    let telemetry = cli.telemetry_path.as_deref().map(read_telemetry);

    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("error: failed to create tokio runtime: {e}");
        process::exit(1);
    });

    match cli.role {
        Role::Once => rt.block_on(run_once(&config, telemetry)),
        #[cfg(feature = "api")]
        role => rt.block_on(run_server(&config, role)),
        #[cfg(not(feature = "api"))]
        role => {
            eprintln!("error: role {role:?} requires the \"api\" feature");
            process::exit(1);
        }
    }
}
