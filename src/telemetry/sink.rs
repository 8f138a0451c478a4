//! Telemetry sinks.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use super::entry::{Direction, FrameRecord, NodeRecord, TelemetryEntry};
use crate::frame::NodeAddress;

/// Destination for telemetry records.
///
/// `append` cannot fail from the protocol's point of view.
pub trait TelemetrySink {
    /// Record one entry.
    fn append(&mut self, entry: TelemetryEntry);
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for Box<S> {
    fn append(&mut self, entry: TelemetryEntry) {
        (**self).append(entry);
    }
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for &mut S {
    fn append(&mut self, entry: TelemetryEntry) {
        (**self).append(entry);
    }
}

/// Several single-threaded roles writing to one sink.
impl<S: TelemetrySink> TelemetrySink for Rc<RefCell<S>> {
    fn append(&mut self, entry: TelemetryEntry) {
        self.borrow_mut().append(entry);
    }
}

/// Roles on different tasks writing to one sink.
impl<S: TelemetrySink> TelemetrySink for Arc<Mutex<S>> {
    fn append(&mut self, entry: TelemetryEntry) {
        let mut sink = match self.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sink.append(entry);
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn append(&mut self, _entry: TelemetryEntry) {}
}

/// In-memory sink, mostly for tests and post-run inspection.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Vec<TelemetryEntry>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in arrival order.
    pub fn entries(&self) -> &[TelemetryEntry] {
        &self.entries
    }

    /// Frame records in arrival order.
    pub fn frames(&self) -> impl Iterator<Item = &FrameRecord> {
        self.entries.iter().filter_map(TelemetryEntry::as_frame)
    }

    /// Node records in arrival order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.entries.iter().filter_map(TelemetryEntry::as_node)
    }

    /// Frame records logged by `node` in `direction`.
    pub fn frames_of(
        &self,
        node: NodeAddress,
        direction: Direction,
    ) -> impl Iterator<Item = &FrameRecord> {
        self.frames()
            .filter(move |r| r.node == node && r.direction == direction)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no entries were recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl TelemetrySink for MemorySink {
    fn append(&mut self, entry: TelemetryEntry) {
        self.entries.push(entry);
    }
}

/// Comma-separated line writer.
///
/// Node lines: `address,x,y,z,processing_delay_ps`.
/// Frame lines: `node,direction,begin_ps,end_ps,source,destination,sequence`.
/// Addresses are written as 48-bit integers, timestamps in picoseconds;
/// absent values are left empty.
#[derive(Debug)]
pub struct CsvSink<W: Write> {
    writer: W,
    lines: u64,
    write_errors: u64,
}

impl<W: Write> CsvSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            lines: 0,
            write_errors: 0,
        }
    }

    /// Lines written successfully.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Entries lost to I/O errors.
    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_entry(&mut self, entry: &TelemetryEntry) -> io::Result<()> {
        match entry {
            TelemetryEntry::Node(node) => {
                write!(self.writer, "{}", node.address.as_u64())?;
                match node.position {
                    Some(p) => write!(self.writer, ",{:.6},{:.6},{:.6}", p.x, p.y, p.z)?,
                    None => write!(self.writer, ",,,")?,
                }
                match node.processing_delay {
                    Some(delay) => writeln!(self.writer, ",{}", delay.as_nanos() * 1000),
                    None => writeln!(self.writer, ","),
                }
            }
            TelemetryEntry::Frame(frame) => writeln!(
                self.writer,
                "{},{},{},{},{},{},{}",
                frame.node.as_u64(),
                frame.direction,
                frame.begin.as_picos(),
                frame.end.as_picos(),
                frame.source.as_u64(),
                frame.destination.as_u64(),
                frame.sequence
            ),
        }
    }
}

impl<W: Write> TelemetrySink for CsvSink<W> {
    fn append(&mut self, entry: TelemetryEntry) {
        match self.write_entry(&entry) {
            Ok(()) => self.lines += 1,
            Err(e) => {
                self.write_errors += 1;
                tracing::warn!(error = %e, "telemetry line dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::Timestamp;
    use crate::telemetry::Position;

    fn frame_entry() -> TelemetryEntry {
        TelemetryEntry::Frame(FrameRecord {
            node: NodeAddress::new([0, 0, 0, 0, 0, 1]),
            direction: Direction::Rx,
            begin: Timestamp::from_millis(1),
            end: Timestamp::from_millis(2),
            source: NodeAddress::new([0, 0, 0, 0, 0, 2]),
            destination: NodeAddress::new([0, 0, 0, 0, 0, 1]),
            sequence: 5,
        })
    }

    #[test]
    fn test_memory_sink_filters() {
        let mut sink = MemorySink::new();
        sink.append(TelemetryEntry::Node(NodeRecord {
            address: NodeAddress::new([0, 0, 0, 0, 0, 1]),
            position: None,
            processing_delay: None,
        }));
        sink.append(frame_entry());

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.nodes().count(), 1);
        assert_eq!(sink.frames().count(), 1);
        assert_eq!(
            sink.frames_of(NodeAddress::new([0, 0, 0, 0, 0, 1]), Direction::Rx).count(),
            1
        );
        assert_eq!(
            sink.frames_of(NodeAddress::new([0, 0, 0, 0, 0, 1]), Direction::Tx).count(),
            0
        );
    }

    #[test]
    fn test_csv_lines() {
        let mut sink = CsvSink::new(Vec::new());
        sink.append(TelemetryEntry::Node(NodeRecord {
            address: NodeAddress::new([0x10, 0, 0, 0, 0, 0x02]),
            position: Some(Position::new(75.0, 0.0, 0.0)),
            processing_delay: Some(Duration::from_millis(35)),
        }));
        sink.append(frame_entry());

        assert_eq!(sink.lines(), 2);
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "17592186044418,75.000000,0.000000,0.000000,35000000000");
        assert_eq!(lines[1], "1,RX,1000000000,2000000000,2,1,5");
    }

    #[test]
    fn test_csv_absent_fields() {
        let mut sink = CsvSink::new(Vec::new());
        sink.append(TelemetryEntry::Node(NodeRecord {
            address: NodeAddress::new([0, 0, 0, 0, 0, 3]),
            position: None,
            processing_delay: None,
        }));

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "3,,,,\n");
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_csv_write_errors_are_counted() {
        let mut sink = CsvSink::new(FailingWriter);
        sink.append(frame_entry());
        sink.append(frame_entry());

        assert_eq!(sink.lines(), 0);
        assert_eq!(sink.write_errors(), 2);
    }

    #[test]
    fn test_shared_sinks() {
        let shared = Rc::new(RefCell::new(MemorySink::new()));
        let mut a = Rc::clone(&shared);
        let mut b = Rc::clone(&shared);
        a.append(frame_entry());
        b.append(frame_entry());
        assert_eq!(shared.borrow().len(), 2);

        let shared = Arc::new(Mutex::new(MemorySink::new()));
        let mut c = Arc::clone(&shared);
        c.append(frame_entry());
        assert_eq!(shared.lock().unwrap().len(), 1);
    }
}
