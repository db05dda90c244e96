//! Shared test helpers for integration tests
//!
//! Note: Functions may appear unused because each test file compiles separately.

#![allow(dead_code)]

use xmlgrid::config::{EchoDetection, EngineConfig};
use xmlgrid::document::DocumentChange;
use xmlgrid::sync::{ManualClock, SyncEngine};
use xmlgrid::tree::{Node, TreeCodec, XmlCodec};
use xmlgrid::{Cmd, EditSession};

/// Two-row, two-column table of items
pub const ITEMS: &str = "\
<Items>
  <Item>
    <a>1</a>
    <b>2</b>
  </Item>
  <Item>
    <a>3</a>
    <b>4</b>
  </Item>
</Items>
";

/// Two orders with nested line tables
pub const ORDERS: &str = "\
<Orders>
  <Order id=\"1\">
    <Line><sku>A</sku><qty>1</qty></Line>
    <Line><sku>B</sku><qty>2</qty></Line>
  </Order>
  <Order id=\"2\">
    <Line><sku>C</sku><qty>3</qty></Line>
    <Line><sku>D</sku><qty>4</qty></Line>
  </Order>
</Orders>
";

pub fn parse(xml: &str) -> Node {
    XmlCodec::default().parse(xml).expect("test XML should parse")
}

pub fn serialize(tree: &Node) -> String {
    XmlCodec::default().serialize(tree)
}

/// Session over `xml` with default config
pub fn session(xml: &str) -> EditSession {
    EditSession::open(parse(xml), EngineConfig::default()).0
}

/// Every cell of the active table as text
pub fn cells(session: &EditSession) -> Vec<Vec<String>> {
    (0..session.row_count())
        .map(|row| {
            (0..session.column_count())
                .map(|col| session.cell_text(row, col))
                .collect()
        })
        .collect()
}

pub fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
    data.iter()
        .map(|r| r.iter().map(|s| s.to_string()).collect())
        .collect()
}

/// Engine with a manual clock, opened on `xml`
pub fn engine(xml: &str, detection: EchoDetection) -> (SyncEngine, ManualClock) {
    let clock = ManualClock::new();
    let config = EngineConfig {
        echo_detection: detection,
        ..EngineConfig::default()
    };
    let mut engine = SyncEngine::new(config).with_clock(clock.clone());
    engine.open(xml);
    (engine, clock)
}

/// Text and sequence number of the write carried by `cmd`
pub fn written(cmd: &Cmd) -> (String, u64) {
    let (text, seq) = cmd.document_write().expect("expected a document write");
    (text.to_string(), seq)
}

pub fn change(text: &str, seq: Option<u64>) -> DocumentChange {
    DocumentChange {
        text: text.to_string(),
        seq,
    }
}
