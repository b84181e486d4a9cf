// # Audit Sinks
//
// Durable, append-only records of received datagrams.

pub mod csv;

pub use self::csv::{AuditRecord, CsvAuditSink};
