use std::path::PathBuf;

use scrapefin_scanner::parser::{is_video_file, parse_library_path};
use scrapefin_scanner::walk::walk_media_dir;

#[test]
fn recognizes_common_video_extensions() {
    for name in [
        "a.mp4", "b.MKV", "c.mov", "d.m2ts", "e.webm", "f.avi", "g.mpeg", "h.ts", "i.m4v", "j.WMV",
        "k.flv", "l.3gp", "m.ogv", "n.vob", "o.mxf", "p.f4v", "q.3g2", "r.mts", "s.asf", "t.mpe",
        "u.mpv",
    ] {
        assert!(is_video_file(name), "should detect {name}");
    }
}

#[test]
fn rejects_non_video_files() {
    for name in [
        "notes.txt",
        "poster.jpg",
        "subs.srt",
        "metadata.nfo",
        "archive.zip",
        "mkv",
    ] {
        assert!(!is_video_file(name), "should NOT detect {name}");
    }
}

fn temp_library() -> PathBuf {
    let root = std::env::temp_dir().join(format!("scrapefin-lib-{}", uuid::Uuid::new_v4()));
    for (dir, file) in [
        ("One Piece [cr=GRMG8ZQZR]/Season 9 - 1", "S9E690.mp4"),
        ("One Piece [cr=GRMG8ZQZR]/Season 9 - 2", "S9E700.mp4"),
        ("One Piece [cr=GRMG8ZQZR]/Season 9 - 2", "poster.jpg"),
        ("One Piece [cr=GRMG8ZQZR]/@eaDir", "S9E700.mp4"),
        ("One Piece [cr=GRMG8ZQZR]/.hidden", "S1E1.mkv"),
    ] {
        let dir = root.join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), b"").unwrap();
    }
    root
}

#[test]
fn walk_finds_episode_files_and_parses_them() {
    let root = temp_library();

    let entries = walk_media_dir(&root);
    let rel: Vec<_> = entries.iter().map(|e| e.relative_to(&root).to_path_buf()).collect();
    assert_eq!(
        rel,
        vec![
            PathBuf::from("One Piece [cr=GRMG8ZQZR]/Season 9 - 1/S9E690.mp4"),
            PathBuf::from("One Piece [cr=GRMG8ZQZR]/Season 9 - 2/S9E700.mp4"),
        ]
    );

    let parsed = parse_library_path(&rel[1]).unwrap();
    assert_eq!(parsed.series.catalog_id.as_deref(), Some("GRMG8ZQZR"));
    assert_eq!(parsed.season.and_then(|s| s.duplicate), Some(2));
    assert_eq!(parsed.episode.ordinal, Some(700));

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn missing_root_yields_nothing() {
    let root = std::env::temp_dir().join(format!("scrapefin-missing-{}", uuid::Uuid::new_v4()));
    assert!(walk_media_dir(&root).is_empty());
}
