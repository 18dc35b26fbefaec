//! Output formatting and progress display

use crate::network::{PortRange, ProbeOutcome};
use crate::scanner::{ScanObserver, ScanReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, Write};
use std::net::IpAddr;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<String>,
    pub colored: bool,
    pub verbose: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            file: None,
            colored: true,
            verbose: false,
        }
    }
}

/// Renders scan reports for the terminal or a file
pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Write scan results to the configured file, or stdout
    pub fn write_results(&self, report: &ScanReport) -> crate::Result<()> {
        let output = self.render(report)?;

        match &self.config.file {
            Some(filename) => {
                let mut file = File::create(filename)?;
                file.write_all(output.as_bytes())?;
            }
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(output.as_bytes())?;
                stdout.flush()?;
            }
        }

        Ok(())
    }

    /// Render a report in the configured format
    pub fn render(&self, report: &ScanReport) -> crate::Result<String> {
        match self.config.format {
            OutputFormat::Text => Ok(self.format_text(report)),
            OutputFormat::Json => self.format_json(report),
        }
    }

    /// Files never get ANSI escapes; the terminal honours `colored`'s own detection
    fn use_color(&self) -> bool {
        self.config.colored && self.config.file.is_none()
    }

    fn paint<F>(&self, text: &str, style: F) -> String
    where
        F: FnOnce(&str) -> ColoredString,
    {
        if self.use_color() {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn format_text(&self, report: &ScanReport) -> String {
        let rule = "-".repeat(50);
        let mut out = String::new();

        out.push_str(&format!("{}\n", rule));
        out.push_str(&format!(
            "Scan completed in {:.3}s\n",
            report.duration().as_secs_f64()
        ));

        if report.open_ports().is_empty() {
            out.push_str(&format!(
                "{}\n",
                self.paint("No open ports found.", |s| s.bright_yellow())
            ));
        } else {
            let ports = report
                .open_ports()
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!(
                "{} {}\n",
                self.paint("Open Ports:", |s| s.bright_green().bold()),
                self.paint(&format!("[{}]", ports), |s| s.bright_white())
            ));
        }

        if self.config.verbose {
            let stats = report.stats();
            out.push_str(&format!(
                "Probed {} ports on {} ({:.0} ports/s): {} open, {} refused, {} timed out, {} errors\n",
                stats.probed,
                report.target(),
                report.scan_rate(),
                stats.open,
                stats.refused,
                stats.timed_out,
                stats.errors
            ));

            for (port, failure) in report.failures() {
                out.push_str(&format!(
                    "  {} {}: {}\n",
                    self.paint("[!]", |s| s.bright_red()),
                    port,
                    failure
                ));
            }
        }

        out.push_str(&format!("{}\n", rule));
        out
    }

    fn format_json(&self, report: &ScanReport) -> crate::Result<String> {
        let mut json = serde_json::to_string_pretty(report)
            .map_err(|e| crate::ScanError::OutputError(e.to_string()))?;
        json.push('\n');
        Ok(json)
    }
}

/// Progress bar fed by scan outcomes
pub struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ports ({eta})",
        ) {
            bar.set_style(style.progress_chars("=>-"));
        }

        Self { bar }
    }

    /// Progress display that draws nothing, for non-interactive runs
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ScanObserver for ProgressDisplay {
    fn on_scan_start(&self, _target: IpAddr, range: PortRange) {
        self.bar.set_length(range.len() as u64);
    }

    fn on_outcome(&self, outcome: &ProbeOutcome) {
        if let ProbeOutcome::Open(port) = outcome {
            self.bar
                .println(format!("{} Port {} is OPEN", "[+]".bright_green(), port));
        }
        self.bar.inc(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{CloseReason, ProbeFailure};
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn sample_report(outcomes: Vec<ProbeOutcome>) -> ScanReport {
        ScanReport::from_outcomes(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            PortRange::new(1, 1024).unwrap(),
            outcomes,
            Duration::from_millis(1500),
        )
    }

    fn plain_text() -> OutputManager {
        OutputManager::new(OutputConfig {
            colored: false,
            ..Default::default()
        })
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_text_lists_open_ports() {
        let report = sample_report(vec![ProbeOutcome::Open(443), ProbeOutcome::Open(22)]);
        let text = plain_text().render(&report).unwrap();

        assert!(text.contains("Scan completed in 1.500s"));
        assert!(text.contains("Open Ports: [22, 443]"));
    }

    #[test]
    fn test_text_without_open_ports() {
        let report = sample_report(vec![ProbeOutcome::Closed(80, CloseReason::TimedOut)]);
        let text = plain_text().render(&report).unwrap();

        assert!(text.contains("No open ports found."));
        assert!(!text.contains("timed out"));
    }

    #[test]
    fn test_verbose_text_shows_counts() {
        let report = sample_report(vec![
            ProbeOutcome::Open(22),
            ProbeOutcome::Closed(23, CloseReason::Refused),
            ProbeOutcome::Closed(24, CloseReason::TimedOut),
        ]);
        let manager = OutputManager::new(OutputConfig {
            colored: false,
            verbose: true,
            ..Default::default()
        });

        let text = manager.render(&report).unwrap();
        assert!(text.contains("1 open, 1 refused, 1 timed out, 0 errors"));
    }

    #[test]
    fn test_json_output() {
        let report = sample_report(vec![ProbeOutcome::Open(80), ProbeOutcome::Open(22)]);
        let manager = OutputManager::new(OutputConfig {
            format: OutputFormat::Json,
            ..Default::default()
        });

        let json: serde_json::Value = serde_json::from_str(&manager.render(&report).unwrap()).unwrap();
        assert_eq!(json["target"], "127.0.0.1");
        assert_eq!(json["open_ports"], serde_json::json!([22, 80]));
        assert_eq!(json["stats"]["probed"], 2);
        assert_eq!(json["range"]["start"], 1);
    }

    #[test]
    fn test_file_output_has_no_escape_codes() {
        let report = sample_report(vec![
            ProbeOutcome::Open(22),
            ProbeOutcome::Error(25, ProbeFailure::new(std::io::ErrorKind::Other, "unreachable")),
        ]);
        let file = tempfile::NamedTempFile::new().unwrap();
        let manager = OutputManager::new(OutputConfig {
            file: Some(file.path().to_string_lossy().into_owned()),
            verbose: true,
            ..Default::default()
        });

        manager.write_results(&report).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();

        assert!(text.contains("Open Ports: [22]"));
        assert!(text.contains("[!] 25: "));
        assert!(!text.contains("\x1b["));
    }
}
