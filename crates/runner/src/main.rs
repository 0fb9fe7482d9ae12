use vtime_runner::{MachineConfig, Simulation};

fn print_help() {
    eprintln!(
        r#"vtime runner - virtual time machine simulator

USAGE:
    vtime-runner [OPTIONS]

OPTIONS:
    --config <PATH>     Load machine configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter (default: info)

EXAMPLES:
    # Run the built-in machine
    vtime-runner

    # Run with config file
    RUST_LOG=debug vtime-runner --config machine.json
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = if let Some(path) = config_path {
        log::info!("Loading configuration from: {}", path);
        MachineConfig::from_file(&path)?
    } else {
        log::info!("Using default configuration");
        MachineConfig::with_default_timers()
    };
    log::info!("Machine: {}", config.name);
    log::info!("Timers: {}", config.timers.len());

    let simulation = Simulation::new(config)?;
    let machine = simulation.machine().clone();
    let results = simulation.run().await;

    log::debug!("Final clock state:\n{}", machine.snapshot_json()?);
    println!("{}", serde_json::to_string_pretty(&results)?);

    if !results.success {
        std::process::exit(1);
    }
    Ok(())
}
