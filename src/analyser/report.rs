//! Per-transaction reports and their text/JSON rendering

use crate::errors::{AnalysisError, AppError, AppResult};
use crate::utils::currency::{format_btc, format_signed_btc};
use serde::Serialize;
use std::io::Write;
use std::str::FromStr;

/// Output format options for transaction reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable multi-line report per transaction
    #[default]
    Console,
    /// One JSON object per line for programmatic use
    Json,
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "text" => Ok(OutputFormat::Console),
            "json" => Ok(OutputFormat::Json),
            other => Err(AppError::Config(format!("Unknown output format: {}", other))),
        }
    }
}

/// Resolved addresses and value of one output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportOutput {
    pub addresses: Vec<String>,
    pub value_sats: u64,
}

/// One input line: coinbase or the output it spends
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportInput {
    Coinbase,
    Spends(ReportOutput),
}

/// Analysis of one block transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionReport {
    /// Position in the block
    pub index: usize,
    pub txid: String,
    pub inputs: Vec<ReportInput>,
    pub outputs: Vec<ReportOutput>,
    /// Inputs minus outputs; absent for coinbase transactions
    pub fee_sats: Option<i64>,
}

impl TransactionReport {
    pub fn total_input_sats(&self) -> u64 {
        self.inputs
            .iter()
            .map(|input| match input {
                ReportInput::Coinbase => 0,
                ReportInput::Spends(output) => output.value_sats,
            })
            .sum()
    }

    pub fn total_output_sats(&self) -> u64 {
        self.outputs.iter().map(|output| output.value_sats).sum()
    }

    /// Multi-line console rendering, without trailing newline
    pub fn render_console(&self) -> String {
        let mut lines = Vec::with_capacity(self.inputs.len() + self.outputs.len() + 4);

        lines.push(format!("Tx:{} {}", self.index, self.txid));
        lines.push("\tinputs:".to_string());
        for input in &self.inputs {
            match input {
                ReportInput::Coinbase => lines.push("\t\tcoinbase".to_string()),
                ReportInput::Spends(output) => lines.push(output_line(output)),
            }
        }
        lines.push("\toutputs:".to_string());
        for output in &self.outputs {
            lines.push(output_line(output));
        }
        if let Some(fee) = self.fee_sats {
            lines.push(format!("\tfee: {}", format_signed_btc(fee)));
        }

        lines.join("\n")
    }
}

fn output_line(output: &ReportOutput) -> String {
    format!(
        "\t\t[{}] {}",
        output.addresses.join(","),
        format_btc(output.value_sats)
    )
}

/// Failure record for a transaction whose analysis did not complete
#[derive(Debug, Serialize)]
struct FailureRecord<'a> {
    index: usize,
    txid: &'a str,
    error: String,
}

/// Writes reports to a sink in the configured format
pub struct ReportWriter<W: Write> {
    out: W,
    format: OutputFormat,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    pub fn write_report(&mut self, report: &TransactionReport) -> AppResult<()> {
        match self.format {
            OutputFormat::Console => writeln!(self.out, "{}", report.render_console())?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, report)?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }

    pub fn write_failure(
        &mut self,
        index: usize,
        txid: &str,
        error: &AnalysisError,
    ) -> AppResult<()> {
        match self.format {
            OutputFormat::Console => {
                writeln!(self.out, "Tx:{} {}\n\terror: {}", index, txid, error)?
            }
            OutputFormat::Json => {
                let record = FailureRecord {
                    index,
                    txid,
                    error: error.to_string(),
                };
                serde_json::to_writer(&mut self.out, &record)?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> AppResult<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
