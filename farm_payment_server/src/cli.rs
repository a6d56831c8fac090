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

const README: &str = include_str!("./cli-help.txt");

// Secrets are left off this list
const DISPLAY_ENVS: [&str; 15] = [
    "RUST_LOG",
    "FPG_HOST",
    "FPG_PORT",
    "FPG_DATABASE_URL",
    "FPG_SIGNATURE_HEADER",
    "FPG_SIGNATURE_TOLERANCE_SECS",
    "FPG_RELAY_URL",
    "FPG_RELAY_TIMEOUT_SECS",
    "FPG_ORDER_LOOKUP_ATTEMPTS",
    "FPG_ORDER_LOOKUP_DELAY_MS",
    "FPG_ORDER_NUMBER_PREFIX",
    "FPG_SWEEP_INTERVAL_SECS",
    "FPG_PROCESSOR_IP_WHITELIST",
    "FPG_USE_X_FORWARDED_FOR",
    "FPG_USE_FORWARDED",
];

fn display_readme() {
    println!("\n{README}\n");
}

fn display_envs() {
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
