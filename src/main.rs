use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use lanscope::cli::Cli;
use lanscope::network::{resolve_local_network, NetworkConfig, DEFAULT_SWEEP_PREFIX};
use lanscope::output::{self, OutputWriter, ScanSummary};
use lanscope::scanner::probe::{NoopResolver, TcpPingProbe};
use lanscope::scanner::Scanner;
use lanscope::selection::{parse_selection, select};

const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "✖ Error:".truecolor(255, 64, 64).bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "lanscope=debug" } else { "lanscope=warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let writer = OutputWriter::new(cli.output_format, cli.output_file.clone())?;
    writer.say(&output::banner());

    let config = match &cli.network {
        Some(cidr) => NetworkConfig::from_cidr(cidr)?,
        None => {
            let config = resolve_local_network()?;
            if cli.full_subnet || config.prefix_len() >= DEFAULT_SWEEP_PREFIX {
                config
            } else {
                let narrowed = config.narrowed_to(DEFAULT_SWEEP_PREFIX);
                let warning = format!(
                    "⚠ {} has {} addresses, sweeping {} only (use --full-subnet or --network to widen)",
                    config,
                    config.candidate_count(),
                    narrowed,
                );
                writer.say(&warning.truecolor(255, 140, 0).to_string());
                narrowed
            }
        }
    };

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", "Interrupted, waiting for in-flight probes...".truecolor(255, 140, 0));
            signal.cancel();
        }
    });

    let mut scanner = Scanner::new(cli.scan_options()).with_cancellation(cancel.clone());
    if cli.tcp_ping {
        scanner = scanner.with_probe(Arc::new(TcpPingProbe::default()));
    }
    if cli.no_dns {
        scanner = scanner.with_resolver(Arc::new(NoopResolver));
    }
    writer.say(&output::network_info(&config, scanner.probe_name()));

    // Hosts
    writer.say(&output::section("Scanning Network for Hosts"));
    let live = writer.clone();
    let discovery = scanner
        .discover_hosts(&config, move |index, host| live.say(&output::host_line(index, host)))
        .await;

    let mut summary = ScanSummary {
        discovery,
        selected: None,
        port_scan: None,
    };

    if summary.discovery.cancelled {
        writer.write(&summary)?;
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    if summary.discovery.hosts.is_empty() {
        writer.say(&format!("\n{}\n", "✖ No hosts detected on the local network.".truecolor(255, 64, 64)));
        writer.write(&summary)?;
        return Ok(ExitCode::FAILURE);
    }

    // Selection
    let host_count = summary.discovery.hosts.len();
    let choice = match &cli.select {
        Some(raw) => raw.clone(),
        None => {
            writer.say(&output::section("Select Host to Scan Ports"));
            writer.prompt(&format!("> Enter host number (1-{}): ", host_count));
            match read_line(&cancel).await {
                Some(line) => line,
                None => return Ok(ExitCode::from(EXIT_INTERRUPTED)),
            }
        }
    };

    let selected = match parse_selection(&choice).and_then(|index| select(&summary.discovery.hosts, index).cloned()) {
        Ok(host) => host,
        Err(e) => {
            writer.say(&format!("\n{}\n", format!("✖ Invalid selection: {}", e).truecolor(255, 64, 64)));
            writer.write(&summary)?;
            return Ok(ExitCode::FAILURE);
        }
    };

    // Ports
    writer.say(&output::section(&format!("Scanning {}", selected.address)));
    let pb = ProgressBar::new(cli.ports.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("⟦{spinner:.bright_magenta}⟧ [{elapsed_precise}] ⟨{bar:40.bright_green/bright_black}⟩ {pos}/{len} ports ({eta}) {msg}")?
            .progress_chars("█▉▊▋▌▍▎▏ ")
    );
    let scanner = scanner.with_progress(pb);

    let report = scanner.scan_ports(selected.address, cli.ports).await;
    let interrupted = report.cancelled;

    summary.selected = Some(selected);
    summary.port_scan = Some(report);
    writer.write(&summary)?;

    if interrupted {
        Ok(ExitCode::from(EXIT_INTERRUPTED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Read one line from the operator, or `None` if the run was interrupted.
/// Stdin is read on a plain thread so a pending read never holds up exit.
async fn read_line(cancel: &CancellationToken) -> Option<String> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_ok() {
            let _ = tx.send(line);
        }
    });

    tokio::select! {
        _ = cancel.cancelled() => None,
        line = rx => Some(line.unwrap_or_default()),
    }
}
