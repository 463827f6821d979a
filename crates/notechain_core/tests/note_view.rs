use notechain_core::db::open_db_in_memory;
use notechain_core::{
    ChainConfig, DiffOp, DiffTag, InMemoryNoteVersionRepository, NoteViewService, SizeLimit,
    SqliteNoteVersionRepository, VersionChain, VersionError,
};
use rusqlite::{params, Connection};
use uuid::Uuid;

fn seeded_service(contents: &[&str]) -> (NoteViewService<InMemoryNoteVersionRepository>, Uuid) {
    let service = NoteViewService::new(InMemoryNoteVersionRepository::new());
    let note_id = Uuid::new_v4();
    let author_id = Uuid::new_v4();
    for content in contents {
        service
            .chain()
            .create_version(note_id, author_id, content)
            .unwrap();
    }
    (service, note_id)
}

#[test]
fn view_without_compare_has_no_diff() {
    let (service, note_id) = seeded_service(&["v1", "v2"]);

    let view = service.view(note_id, None).unwrap();
    assert_eq!(view.version, 2);
    assert_eq!(view.content, "v2\n");
    assert!(view.diffs.is_none());
    assert!(view.stats.is_none());
    assert!(!view.has_diff());

    let json = serde_json::to_value(&view).unwrap();
    assert!(json.get("diffs").is_none());
}

#[test]
fn view_compares_against_non_adjacent_version() {
    let (service, note_id) = seeded_service(&["a\nb\nc", "a\nx\nc", "a\nx\nc\nd"]);

    let view = service.view(note_id, Some(1)).unwrap();
    assert_eq!(view.compared_to, Some(1));
    assert!(view.has_diff());
    assert_eq!(
        view.diffs.unwrap(),
        vec![
            DiffOp {
                tag: DiffTag::Equal,
                lines: vec!["a".to_string()],
            },
            DiffOp {
                tag: DiffTag::Delete,
                lines: vec!["b".to_string()],
            },
            DiffOp {
                tag: DiffTag::Insert,
                lines: vec!["x".to_string()],
            },
            DiffOp {
                tag: DiffTag::Equal,
                lines: vec!["c".to_string()],
            },
            DiffOp {
                tag: DiffTag::Insert,
                lines: vec!["d".to_string()],
            },
        ]
    );
    let stats = view.stats.unwrap();
    assert_eq!((stats.inserted, stats.deleted, stats.unchanged), (2, 1, 2));
}

#[test]
fn view_of_reverted_content_has_empty_change_but_some_diff() {
    let (service, note_id) = seeded_service(&["same", "other", "same"]);

    let view = service.view(note_id, Some(1)).unwrap();
    let diffs = view.diffs.expect("comparison was requested");
    assert_eq!(
        diffs,
        vec![DiffOp {
            tag: DiffTag::Equal,
            lines: vec!["same".to_string()],
        }]
    );
    assert!(!view.stats.unwrap().has_changes());
    assert_eq!(view.changed_sections, Some(Vec::new()));
}

#[test]
fn view_reports_changed_sections() {
    let (service, note_id) = seeded_service(&[
        "# Tanks\nPull left\n\n# Heals\nCD on 2\n",
        "# Tanks\nPull left\n\n# Heals\nCD on 3\n",
    ]);

    let view = service.view(note_id, Some(1)).unwrap();
    assert_eq!(view.changed_sections, Some(vec!["heals".to_string()]));
}

#[test]
fn view_rejects_compare_to_latest_or_later() {
    let (service, note_id) = seeded_service(&["v1", "v2"]);

    for requested in [0, 2, 7] {
        let err = service.view(note_id, Some(requested)).unwrap_err();
        match err {
            VersionError::InvalidCompareVersion {
                requested: got,
                latest,
            } => {
                assert_eq!(got, requested);
                assert_eq!(latest, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[test]
fn view_of_unknown_note_is_not_found() {
    let service = NoteViewService::new(InMemoryNoteVersionRepository::new());
    let note_id = Uuid::new_v4();
    assert!(matches!(
        service.view(note_id, None).unwrap_err(),
        VersionError::NoteNotFound(id) if id == note_id
    ));
}

#[test]
fn view_works_over_sqlite_and_shared_chain() {
    let conn = open_db_in_memory().unwrap();
    let chain = VersionChain::new(SqliteNoteVersionRepository::try_new(&conn).unwrap());
    let note_id = Uuid::new_v4();
    let author_id = Uuid::new_v4();
    chain.create_version(note_id, author_id, "draft").unwrap();
    let latest = chain.create_version(note_id, author_id, "final").unwrap();

    let service = NoteViewService::from_chain(chain);
    let view = service.view(note_id, Some(1)).unwrap();
    assert_eq!(view.version, 2);
    assert_eq!(view.author_id, author_id);
    assert_eq!(view.updated_at, latest.created_at);
    assert_eq!(view.content_hash, latest.content_hash);
}

#[test]
fn view_reports_tampered_base_version() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteViewService::new(SqliteNoteVersionRepository::try_new(&conn).unwrap());
    let note_id = Uuid::new_v4();
    for content in ["first", "second", "third"] {
        service
            .chain()
            .create_version(note_id, Uuid::new_v4(), content)
            .unwrap();
    }

    conn.execute_batch("DROP TRIGGER IF EXISTS note_versions_no_update;")
        .unwrap();
    let changed = conn
        .execute(
            "UPDATE note_versions SET content = ?3 WHERE note_id = ?1 AND version = ?2;",
            params![note_id.to_string(), 1, "forged\n"],
        )
        .unwrap();
    assert_eq!(changed, 1);

    assert!(matches!(
        service.view(note_id, Some(1)).unwrap_err(),
        VersionError::Integrity { version: 1, .. }
    ));
    // Untouched versions still compare.
    assert_eq!(service.view(note_id, Some(2)).unwrap().compared_to, Some(2));
    assert_eq!(service.view(note_id, None).unwrap().version, 3);
    assert_eq!(version_rows(&conn), 3);
}

#[test]
fn view_rejects_comparison_over_cell_budget() {
    let repo = InMemoryNoteVersionRepository::new();
    let writer = VersionChain::new(&repo);
    let note_id = Uuid::new_v4();
    let author_id = Uuid::new_v4();
    writer.create_version(note_id, author_id, "a\nb\nc\nd\n").unwrap();
    writer.create_version(note_id, author_id, "a\nb\n").unwrap();
    writer.create_version(note_id, author_id, "a\nb\nc\n").unwrap();

    let service = NoteViewService::from_chain(VersionChain::with_config(
        &repo,
        ChainConfig {
            max_diff_cells: 10,
            ..ChainConfig::default()
        },
    ));

    match service.view(note_id, Some(1)).unwrap_err() {
        VersionError::OversizeInput { limit, max, actual } => {
            assert_eq!(limit, SizeLimit::DiffCells);
            assert_eq!(max, 10);
            assert_eq!(actual, 12);
        }
        other => panic!("unexpected error: {other}"),
    }
    // 2 x 3 lines fits.
    assert!(service.view(note_id, Some(2)).unwrap().has_diff());
}

fn version_rows(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM note_versions;", [], |row| row.get(0))
        .unwrap()
}
