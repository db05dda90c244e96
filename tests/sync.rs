//! Sync engine tests
//!
//! Echo detection under both strategies, external reloads and the full
//! message loop over an in-memory document.

mod common;

use std::time::Duration;

use common::{change, engine, written, ITEMS};
use xmlgrid::clipboard::MemoryClipboard;
use xmlgrid::commands::{Cmd, Notice};
use xmlgrid::config::{EchoDetection, EngineConfig};
use xmlgrid::document::MemoryDocument;
use xmlgrid::messages::{GridMsg, Key};
use xmlgrid::runtime::Runtime;
use xmlgrid::session::{CellPosition, Selection};
use xmlgrid::sync::{ChangeKind, SyncState};

const COMPACT_ITEMS: &str = "<Items><Item><a>1</a><b>2</b></Item><Item><a>3</a><b>4</b></Item></Items>";

fn notices(cmd: Cmd) -> Vec<Notice> {
    cmd.into_vec()
        .into_iter()
        .filter_map(|cmd| match cmd {
            Cmd::Notify(notice) => Some(notice),
            _ => None,
        })
        .collect()
}

// ========================================================================
// Echoes
// ========================================================================

#[test]
fn test_echo_is_idempotent() {
    let (mut engine, _) = engine(ITEMS, EchoDetection::Sequence);
    engine.dispatch(GridMsg::SelectCell { row: 1, col: 1 });
    let cmd = engine.dispatch(GridMsg::SetCell {
        row: 0,
        col: 0,
        value: "9".into(),
    });
    let (text, seq) = written(&cmd);
    let tree = engine.session().unwrap().tree().clone();

    let cmd = engine.on_document_changed(change(&text, Some(seq)));
    assert!(cmd.document_write().is_none());
    assert_eq!(engine.state(), SyncState::Idle);

    let session = engine.session().unwrap();
    assert_eq!(session.tree(), &tree);
    assert_eq!(session.selection(), Some(Selection::cell(CellPosition::new(1, 1))));

    // A repeat of the same text is ignored
    assert_eq!(engine.on_document_changed(change(&text, None)), Cmd::None);
}

#[test]
fn test_echo_keeps_pending_edit() {
    let (mut engine, _) = engine(ITEMS, EchoDetection::GraceWindow);
    let cmd = engine.dispatch(GridMsg::AddColumns(1));
    let (text, _) = written(&cmd);
    engine.dispatch(GridMsg::Key(Key::Char('x').into()));

    engine.on_document_changed(change(&text, None));
    let session = engine.session().unwrap();
    assert!(session.is_editing());
    assert_eq!(session.edit_cursor().unwrap().buffer.text(), "x");
}

#[test]
fn test_sequence_mode_ignores_stale_echo() {
    let (mut engine, _) = engine(ITEMS, EchoDetection::Sequence);
    let first = written(&engine.dispatch(GridMsg::SetCell {
        row: 0,
        col: 0,
        value: "first".into(),
    }));
    let second = written(&engine.dispatch(GridMsg::SetCell {
        row: 0,
        col: 0,
        value: "second".into(),
    }));

    let stale = change(&first.0, Some(first.1));
    assert_eq!(engine.classify(&stale), ChangeKind::StaleEcho);
    assert_eq!(engine.on_document_changed(stale), Cmd::None);
    assert_eq!(engine.session().unwrap().cell_text(0, 0), "second");
    assert!(matches!(engine.state(), SyncState::AwaitingEcho { seq, .. } if seq == second.1));

    engine.on_document_changed(change(&second.0, Some(second.1)));
    assert_eq!(engine.state(), SyncState::Idle);
}

#[test]
fn test_sequence_mode_untagged_change_is_external() {
    let (mut engine, _) = engine(ITEMS, EchoDetection::Sequence);
    let cmd = engine.dispatch(GridMsg::SetCell {
        row: 0,
        col: 0,
        value: "9".into(),
    });
    written(&cmd);

    let external = change(COMPACT_ITEMS, None);
    assert_eq!(engine.classify(&external), ChangeKind::External);
    engine.on_document_changed(external);
    assert_eq!(engine.session().unwrap().cell_text(0, 0), "1");
    assert_eq!(engine.state(), SyncState::Idle);
}

// ========================================================================
// External changes
// ========================================================================

#[test]
fn test_external_change_resets_view_state() {
    let (mut engine, clock) = engine(ITEMS, EchoDetection::GraceWindow);
    engine.dispatch(GridMsg::SetFrozenRows(1));
    engine.dispatch(GridMsg::SelectCell { row: 1, col: 1 });
    engine.dispatch(GridMsg::Key(Key::Char('q').into()));
    clock.advance(Duration::from_secs(5));

    // Same content, different formatting: still someone else's edit
    let cmd = engine.on_document_changed(change(COMPACT_ITEMS, None));
    let notices = notices(cmd);
    assert!(matches!(
        notices.as_slice(),
        [Notice::EditDiscarded { position, text, .. }]
            if *position == CellPosition::new(1, 1) && text == "q"
    ));

    let session = engine.session().unwrap();
    assert!(!session.is_editing());
    assert_eq!(session.selection(), Some(Selection::cell(CellPosition::new(0, 0))));
    assert_eq!(session.view_state("Item").unwrap().frozen_rows, 0);
    assert_eq!(session.cell_text(1, 1), "4");
}

#[test]
fn test_grace_window_race_treats_quick_edit_as_echo() {
    let (mut engine, clock) = engine(ITEMS, EchoDetection::GraceWindow);
    engine.dispatch(GridMsg::SetFrozenRows(1));
    let (text, _) = written(&engine.dispatch(GridMsg::SetCell {
        row: 0,
        col: 0,
        value: "9".into(),
    }));
    engine.on_document_changed(change(&text, None));
    assert_eq!(engine.state(), SyncState::Idle);

    // Another writer inside the window is mistaken for our echo
    clock.advance(Duration::from_millis(500));
    let quick = text.replace("<b>4</b>", "<b>44</b>");
    assert_eq!(engine.classify(&change(&quick, None)), ChangeKind::Echo);
    engine.on_document_changed(change(&quick, None));
    let session = engine.session().unwrap();
    assert_eq!(session.cell_text(1, 1), "44");
    assert_eq!(session.view_state("Item").unwrap().frozen_rows, 1);

    clock.advance(Duration::from_secs(3));
    let late = quick.replace("<b>44</b>", "<b>5</b>");
    assert_eq!(engine.classify(&change(&late, None)), ChangeKind::External);
}

#[test]
fn test_unchanged_commit_does_not_wait_for_echo() {
    let (mut engine, clock) = engine(ITEMS, EchoDetection::GraceWindow);
    engine.dispatch(GridMsg::Key(Key::Enter.into()));
    let cmd = engine.dispatch(GridMsg::Key(Key::Enter.into()));
    assert!(cmd.document_write().is_none());
    assert_eq!(engine.state(), SyncState::Idle);

    engine.dispatch(GridMsg::SelectCell { row: 1, col: 1 });
    engine.dispatch(GridMsg::SetFrozenRows(1));
    clock.advance(Duration::from_secs(60));
    let external = ITEMS.replace("<b>4</b>", "<b>5</b>");
    assert_eq!(engine.classify(&change(&external, None)), ChangeKind::External);
    engine.on_document_changed(change(&external, None));

    let session = engine.session().unwrap();
    assert_eq!(session.cell_text(1, 1), "5");
    assert_eq!(session.selection(), Some(Selection::cell(CellPosition::new(0, 0))));
    assert_eq!(session.view_state("Item").unwrap().frozen_rows, 0);
}

#[test]
fn test_rejected_command_still_writes_committed_edit() {
    let (mut engine, _) = engine(ITEMS, EchoDetection::GraceWindow);
    engine.dispatch(GridMsg::StartEdit {
        row: 0,
        col: 0,
        initial: Some("x".into()),
    });
    let cmd = engine.dispatch(GridMsg::RenameColumn {
        old: "a".into(),
        new: "b".into(),
    });
    let (text, _) = written(&cmd);
    assert!(text.contains("<a>x</a>"), "{}", text);
    assert!(notices(cmd)
        .iter()
        .any(|notice| matches!(notice, Notice::Rejected(_))));
}

#[test]
fn test_unparseable_change_keeps_last_good_state() {
    let (mut engine, clock) = engine(ITEMS, EchoDetection::GraceWindow);
    clock.advance(Duration::from_secs(5));
    let cmd = engine.on_document_changed(change("<Items><Item>", None));
    assert!(matches!(notices(cmd).as_slice(), [Notice::ParseFailed(_)]));
    assert_eq!(engine.session().unwrap().cell_text(1, 0), "3");
}

#[test]
fn test_engine_config_defaults_to_grace_window() {
    let config = EngineConfig::default();
    assert_eq!(config.echo_detection, EchoDetection::GraceWindow);
    assert_eq!(config.echo_grace_ms, 2000);
}

// ========================================================================
// Runtime loop
// ========================================================================

#[test]
fn test_runtime_round_trip_with_memory_document() {
    let config = EngineConfig {
        echo_detection: EchoDetection::Sequence,
        ..EngineConfig::default()
    };
    let store = MemoryDocument::new(ITEMS);
    let mut runtime = Runtime::new(config, store, MemoryClipboard::new());
    runtime.open().unwrap();

    runtime.send(GridMsg::SelectCell { row: 1, col: 0 }.into());
    runtime.send(GridMsg::Key(Key::Char('7').into()).into());
    runtime.send(GridMsg::Key(Key::Enter.into()).into());
    assert!(runtime.store().text().contains("<a>7</a>"));
    assert!(matches!(runtime.engine().state(), SyncState::AwaitingEcho { .. }));

    runtime.process_async_messages();
    assert_eq!(runtime.engine().state(), SyncState::Idle);

    runtime.store_mut().external_edit(COMPACT_ITEMS);
    runtime.process_async_messages();
    let session = runtime.engine().session().unwrap();
    assert_eq!(session.cell_text(1, 0), "3");
    assert!(runtime.take_notices().is_empty());
}

#[test]
fn test_runtime_transposed_paste_reads_clipboard() {
    let store = MemoryDocument::new(ITEMS);
    let clipboard = MemoryClipboard::with_text("x\ny\n");
    let mut runtime = Runtime::new(EngineConfig::default(), store, clipboard);
    runtime.open().unwrap();

    runtime.send(GridMsg::PasteTransposed { row: 0, col: 0 }.into());
    assert!(runtime.wait_for_message());
    let session = runtime.engine().session().unwrap();
    assert_eq!(session.cell_text(0, 0), "x");
    assert_eq!(session.cell_text(0, 1), "y");
    assert!(runtime.store().text().contains("<a>x</a>"));
}
