use std::process;
use std::time::Duration;

use quark_host::{ExitReason, HostCatalog, PathEntry, Session, SessionConfig, SwitchUsb};

fn usage() {
    eprintln!("Usage: quark-host [OPTIONS]");
    eprintln!();
    eprintln!("Serve the host file system to Goldleaf over USB.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --timeout <MS>          USB transfer timeout in ms (default: 0, wait forever)");
    eprintln!("  --special <LABEL=PATH>  Offer an extra special path (repeatable)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG=info    Show session activity (default)");
    eprintln!("  RUST_LOG=debug   Show every command");
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let mut timeout_ms: u64 = 0;
    let mut extra_paths: Vec<PathEntry> = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--timeout" => {
                timeout_ms = args
                    .next()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        eprintln!("--timeout requires a number of milliseconds");
                        process::exit(1);
                    });
            }
            "--special" => {
                let spec = args.next().unwrap_or_default();
                match spec.split_once('=') {
                    Some((label, path)) if !label.is_empty() && !path.is_empty() => {
                        extra_paths.push(PathEntry::new(label, path));
                    }
                    _ => {
                        eprintln!("--special requires LABEL=PATH");
                        process::exit(1);
                    }
                }
            }
            "--help" | "-h" => {
                usage();
                process::exit(0);
            }
            _ => {
                eprintln!("unexpected argument: {arg}");
                process::exit(1);
            }
        }
    }

    let mut catalog = HostCatalog::discover();
    for entry in extra_paths {
        catalog.add_special_path(entry);
    }

    eprintln!("==> Looking for Goldleaf...");
    let usb = SwitchUsb::open(Duration::from_millis(timeout_ms)).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        eprintln!("Make sure the Switch is connected and Goldleaf is running.");
        process::exit(1);
    });

    let mut session = Session::new(usb, SessionConfig::new(catalog));
    match session.run() {
        ExitReason::Disconnected => {
            eprintln!("==> Switch disconnected");
        }
        ExitReason::Aborted(e) => {
            eprintln!("==> Session aborted: {e}");
            process::exit(1);
        }
    }
}
