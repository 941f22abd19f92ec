//! Console output: progress and failure reports for replay, message dumps
//! for inspection.

use std::io::{self, Write};

use flow_collator::{Flow, FlowKey, HttpMessage, TcpPacket};
use serde::Serialize;

use crate::replay::{ReplayOutcome, ReplayStats};

const RULE_WIDTH: usize = 70;

/// Prints a dot per matching request and a block per failed one
pub struct ConsoleReporter<W> {
    out:         W,
    /// A line of dots is open and needs a newline before anything else
    dots_opened: bool,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            dots_opened: false,
        }
    }

    pub fn outcome(&mut self, outcome: &ReplayOutcome) -> io::Result<()> {
        if outcome.is_match() {
            write!(self.out, ".")?;
            self.dots_opened = true;
            return self.out.flush();
        }

        self.close_dots()?;
        let comparison = &outcome.comparison;
        writeln!(self.out, "{}", "*".repeat(RULE_WIDTH))?;
        writeln!(self.out, "FAILED request: ({})", outcome.key)?;
        write!(self.out, "{}", outcome.request)?;
        if let Some(mismatch) = &comparison.mismatch {
            writeln!(self.out, "Reason: {mismatch}")?;
        }
        writeln!(self.out, "Original reply:")?;
        write!(self.out, "{}", comparison.original)?;
        writeln!(self.out, "Replayed reply:")?;
        write!(self.out, "{}", comparison.replayed)?;
        self.out.flush()
    }

    pub fn summary(&mut self, stats: &ReplayStats) -> io::Result<()> {
        self.close_dots()?;
        writeln!(self.out, "{stats}")?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn close_dots(&mut self) -> io::Result<()> {
        if self.dots_opened {
            writeln!(self.out)?;
            self.dots_opened = false;
        }
        Ok(())
    }
}

/// Output format of [`dump_flows`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DumpFormat {
    #[default]
    Text,
    /// One JSON object per message
    Json,
}

#[derive(Serialize)]
struct DumpRecord<'a> {
    flow:    String,
    index:   usize,
    message: &'a HttpMessage,
}

/// Print every parsed message of every flow, returning the number of flows
pub fn dump_flows<I, P, W>(flows: I, out: &mut W, format: DumpFormat) -> io::Result<usize>
where
    I: IntoIterator<Item = Flow<P>>,
    P: TcpPacket,
    W: Write,
{
    let mut count = 0;
    for flow in flows {
        count += 1;
        let key = flow.key();
        if format == DumpFormat::Text {
            writeln!(out, "=== Flow {key} ===")?;
        }
        for (index, message) in flow.messages().enumerate() {
            dump_message(out, format, key, index, &message)?;
        }
    }
    out.flush()?;
    Ok(count)
}

fn dump_message<W: Write>(
    out: &mut W,
    format: DumpFormat,
    key: FlowKey,
    index: usize,
    message: &HttpMessage,
) -> io::Result<()> {
    match format {
        DumpFormat::Text => {
            let kind = if message.is_request() { "Request" } else { "Response" };
            writeln!(out, "--- {kind} #{index} ---")?;
            write!(out, "{message}")
        },
        DumpFormat::Json => {
            let record = DumpRecord {
                flow: key.to_string(),
                index,
                message,
            };
            serde_json::to_writer(&mut *out, &record)?;
            writeln!(out)
        },
    }
}
