use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 17] = [
        "RUST_LOG",
        "ORDERS_HOST",
        "ORDERS_PORT",
        "ORDERS_DATABASE_URL",
        "ORDERS_MAX_DB_CONNECTIONS",
        "ORDERS_GATEWAY_URL",
        "ORDERS_GATEWAY_TIMEOUT_MS",
        "ORDERS_GATEWAY_RETRY_ATTEMPTS",
        "ORDERS_GATEWAY_RETRY_WAIT_MS",
        "ORDERS_BREAKER_WINDOW",
        "ORDERS_BREAKER_MIN_CALLS",
        "ORDERS_BREAKER_FAILURE_RATE",
        "ORDERS_BREAKER_OPEN_SECS",
        "ORDERS_BREAKER_HALF_OPEN_CALLS",
        "ORDERS_PAYMENT_TIMEOUT_MINS",
        "ORDERS_PAYMENT_SWEEP_SECS",
        "ORDERS_EVENT_BUFFER",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
