use std::fs::File;
use std::io::{self, Write, BufWriter};
use std::path::PathBuf;
use anyhow::Result;
use colored::*;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::network::NetworkConfig;
use crate::scanner::{DiscoveryReport, Host, PortScanReport};

/// Everything a finished run produced, in the order it was produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub discovery: DiscoveryReport,
    pub selected: Option<Host>,
    pub port_scan: Option<PortScanReport>,
}

#[derive(Debug, Clone)]
pub struct OutputWriter {
    format: OutputFormat,
    file: Option<PathBuf>,
}

impl OutputWriter {
    pub fn new(format: OutputFormat, file: Option<PathBuf>) -> Result<Self> {
        Ok(Self { format, file })
    }

    /// Progress chatter goes to stdout only when stdout carries nothing else.
    pub fn say(&self, text: &str) {
        if self.chatter_on_stdout() {
            println!("{}", text);
            let _ = io::stdout().flush();
        } else {
            eprintln!("{}", text);
        }
    }

    pub fn prompt(&self, text: &str) {
        if self.chatter_on_stdout() {
            print!("{}", text);
            let _ = io::stdout().flush();
        } else {
            eprint!("{}", text);
        }
    }

    fn chatter_on_stdout(&self) -> bool {
        self.format == OutputFormat::Human && self.file.is_none()
    }

    pub fn write(&self, summary: &ScanSummary) -> Result<()> {
        let output = match self.format {
            OutputFormat::Human => self.format_human(summary),
            OutputFormat::Json => self.format_json(summary)?,
        };

        match &self.file {
            Some(path) => {
                let file = File::create(path)?;
                let mut writer = BufWriter::new(file);
                writer.write_all(output.as_bytes())?;
                writer.flush()?;
            }
            None => {
                print!("{}", output);
                io::stdout().flush()?;
            }
        }

        Ok(())
    }

    fn format_human(&self, summary: &ScanSummary) -> String {
        let mut output = String::new();

        if self.file.is_some() {
            // The live host list went to stderr, repeat it for the file.
            output.push_str(&section("Discovered Hosts"));
            for (i, host) in summary.discovery.hosts.iter().enumerate() {
                output.push_str(&host_line(i + 1, host));
                output.push('\n');
            }
        }

        if let Some(report) = &summary.port_scan {
            output.push_str(&port_report(report));
        }

        output
    }

    fn format_json(&self, summary: &ScanSummary) -> Result<String> {
        let mut json = serde_json::to_string_pretty(summary)?;
        json.push('\n');
        Ok(json)
    }
}

pub fn banner() -> String {
    format!(
        "\n{}\n{}\n{}\n{}",
        "╔════════════════════════════════════════════╗".truecolor(0, 212, 255),
        "║               ⟦ LanScope ⟧                 ║".truecolor(0, 212, 255).bold(),
        "║       local subnet host & port sweep       ║".truecolor(0, 212, 255),
        "╚════════════════════════════════════════════╝".truecolor(0, 212, 255),
    )
}

pub fn section(title: &str) -> String {
    format!("\n{}\n", format!("[ {} ]", title).truecolor(0, 212, 255).bold())
}

pub fn network_info(config: &NetworkConfig, liveness: &str) -> String {
    let mut output = section("Local Network Information");
    output.push_str(&format!("> IP Address   : {}\n", config.local_address().to_string().truecolor(255, 140, 0)));
    output.push_str(&format!("> Subnet Mask  : {}\n", config.subnet_mask().to_string().truecolor(255, 140, 0)));
    output.push_str(&format!("> Network CIDR : {}\n", config.to_string().truecolor(255, 140, 0)));
    output.push_str(&format!("> Liveness     : {}", liveness.truecolor(255, 140, 0)));
    output
}

pub fn host_line(index: usize, host: &Host) -> String {
    format!(
        "{} {} {}",
        format!("[{}] {:<15}", index, host.address).truecolor(0, 255, 65),
        "-".truecolor(64, 64, 64),
        host.display_name.truecolor(255, 140, 0),
    )
}

pub fn port_report(report: &PortScanReport) -> String {
    let mut output = section(&format!("Open Ports on {}", report.target));

    if report.has_open_ports() {
        for port in &report.open_ports {
            output.push_str(&format!(
                "{} {} {}\n",
                "> Port".truecolor(0, 255, 65),
                port.to_string().truecolor(255, 140, 0).bold(),
                "is OPEN".truecolor(0, 255, 65),
            ));
        }
    } else {
        output.push_str(&format!(
            "{} {}\n",
            "> No open ports found on".truecolor(255, 64, 64),
            report.target.to_string().truecolor(255, 140, 0),
        ));
    }

    output.push_str(&format!(
        "{}\n",
        format!(
            "⟦ {} ports • {}ms{} ⟧",
            report.attempted,
            (report.end_time - report.start_time).num_milliseconds(),
            if report.cancelled { " • interrupted" } else { "" },
        ).truecolor(128, 128, 128),
    ));

    output.push_str(&format!("\n{}\n\n", "[ ✔ Scan Completed ]".truecolor(0, 212, 255).bold()));
    output
}
