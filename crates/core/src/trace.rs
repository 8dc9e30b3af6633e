//! Append-only trace of packet events, replayable after a run

use std::io::{self, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Send,
    Recv,
}

impl RecordKind {
    pub fn tag(&self) -> &'static str {
        match self {
            RecordKind::Send => "send",
            RecordKind::Recv => "recv",
        }
    }
}

/// One traced packet event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub time: Duration,
    pub node: NodeId,
    pub kind: RecordKind,
    pub size: usize,
}

impl TraceRecord {
    pub fn send(time: Duration, node: NodeId, size: usize) -> Self {
        Self {
            time,
            node,
            kind: RecordKind::Send,
            size,
        }
    }

    pub fn recv(time: Duration, node: NodeId, size: usize) -> Self {
        Self {
            time,
            node,
            kind: RecordKind::Recv,
            size,
        }
    }

    fn write_line<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            self.time.as_secs_f64(),
            self.node,
            self.kind.tag(),
            self.size
        )
    }
}

/// Records packet events in dispatch order. Append-only: records are never
/// reordered or rewritten, so a replay sees exactly what the run saw.
#[derive(Debug, Clone, Default)]
pub struct TraceRecorder {
    records: Vec<TraceRecord>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: TraceRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// Iterate over the trace from the start. Can be called any number of
    /// times; the underlying records are immutable.
    pub fn replay(&self) -> impl Iterator<Item = &TraceRecord> {
        self.records.iter()
    }

    /// Write the trace as tab-separated lines: time, node, tag, size.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for record in &self.records {
            record.write_line(w)?;
        }
        Ok(())
    }

    pub fn to_tsv(&self) -> String {
        let mut buf = Vec::new();
        // Writing to a Vec<u8> cannot fail.
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}
