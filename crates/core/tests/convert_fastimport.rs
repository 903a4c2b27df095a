//! End-to-end conversion tests.
//!
//! The scenario tests drive the commit emitter through the debug writer
//! with an in-memory content source, asserting on the exact fast-import
//! wire text. The final test converts a real SVN repository created with
//! `svnadmin` into a real git repository through `git fast-import`; it
//! skips gracefully when the svn or git tooling is not installed.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use svn_lfs_export_core::config::Config;
use svn_lfs_export_core::emitter::CommitEmitter;
use svn_lfs_export_core::engine;
use svn_lfs_export_core::errors::{ConvertError, SvnError};
use svn_lfs_export_core::lfs;
use svn_lfs_export_core::svn::{Change, ChangedFile, ContentSource, Revision};
use svn_lfs_export_core::writer::{DebugWriter, MultiRepoWriter, Writer};

// ===========================================================================
// Helpers
// ===========================================================================

struct FakeSource(HashMap<(i64, String), Vec<u8>>);

impl FakeSource {
    fn new(entries: &[(i64, &str, &[u8])]) -> Self {
        Self(
            entries
                .iter()
                .map(|(rev, path, bytes)| ((*rev, path.to_string()), bytes.to_vec()))
                .collect(),
        )
    }
}

impl ContentSource for FakeSource {
    fn contents(&self, rev: i64, path: &str) -> Result<Vec<u8>, SvnError> {
        self.0
            .get(&(rev, path.to_string()))
            .cloned()
            .ok_or_else(|| SvnError::ParseError(format!("no content for r{rev} {path}")))
    }
}

fn file(path: &str, change: Change) -> ChangedFile {
    ChangedFile {
        path: path.to_string(),
        is_directory: false,
        change,
        is_executable: false,
        is_symlink: false,
        is_binary: false,
        size: 0,
        copied_from: None,
    }
}

fn revision(number: i64, author: &str, log: &str, files: Vec<ChangedFile>) -> Revision {
    Revision {
        number,
        author: author.to_string(),
        log: log.to_string(),
        date: "2003-04-01T06:17:43.000000Z".to_string(),
        files,
    }
}

fn debug_writer() -> (tempfile::TempDir, Writer) {
    let dir = tempfile::tempdir().unwrap();
    let writer = Writer::Debug(DebugWriter::new(dir.path().to_path_buf()));
    (dir, writer)
}

fn output_string(writer: &Writer, repo: &str) -> String {
    match writer {
        Writer::Debug(debug) => {
            String::from_utf8(debug.output(repo).unwrap_or_default().to_vec()).unwrap()
        }
        _ => panic!("expected the debug writer"),
    }
}

// ===========================================================================
// Wire-format scenarios
// ===========================================================================

#[test]
fn test_simple_single_branch() {
    let config = Config::parse(
        r#"
svn_repository = "/srv/svn/proj"
commit_message = "{log}"
[[rule]]
svn_path = "trunk/"
repository = "main"
branch = "master"
"#,
    )
    .unwrap();
    let (_dir, mut writer) = debug_writer();
    let source = FakeSource::new(&[(1, "trunk/foo.txt", b"hello\n")]);
    let mut emitter = CommitEmitter::new(&config);

    let rev = revision(1, "alice", "add foo", vec![file("trunk/foo.txt", Change::Add)]);
    let commits = emitter.emit(&rev, &source, &mut writer).unwrap();
    assert_eq!(commits, 1);

    assert_eq!(
        output_string(&writer, "main"),
        "commit refs/heads/master\n\
         mark :1\n\
         original-oid r1\n\
         committer alice <alice@localhost> 1049177863 +0000\n\
         data 7\n\
         add foo\n\
         M 100644 inline foo.txt\n\
         data 6\n\
         hello\n\n"
    );
}

#[test]
fn test_prefix_rewrite_with_capture() {
    let config = Config::parse(
        r#"
svn_repository = "/srv/svn/proj"
commit_message = "{log}"
[[rule]]
svn_path = 'branches/([^/]+)/'
repository = "proj"
branch = '\1'
"#,
    )
    .unwrap();
    let (_dir, mut writer) = debug_writer();
    let source = FakeSource::new(&[(4, "branches/feature-x/src/a.c", b"int x;\n")]);
    let mut emitter = CommitEmitter::new(&config);

    let rev = revision(
        4,
        "bob",
        "work",
        vec![file("branches/feature-x/src/a.c", Change::Add)],
    );
    emitter.emit(&rev, &source, &mut writer).unwrap();

    let out = output_string(&writer, "proj");
    assert!(out.starts_with("commit refs/heads/feature-x\n"));
    assert!(out.contains("M 100644 inline src/a.c\n"));
}

#[test]
fn test_explicit_skip_rule() {
    let config = Config::parse(
        r#"
svn_repository = "/srv/svn/proj"
commit_message = "{log}"
[[rule]]
svn_path = "tags/"
[[rule]]
svn_path = "trunk/"
repository = "main"
branch = "master"
"#,
    )
    .unwrap();
    let (_dir, mut writer) = debug_writer();
    let source = FakeSource::new(&[(2, "trunk/file", b"content")]);
    let mut emitter = CommitEmitter::new(&config);

    // A tagging revision produces nothing.
    let rev = revision(1, "alice", "tag v1", vec![file("tags/v1/file", Change::Add)]);
    assert_eq!(emitter.emit(&rev, &source, &mut writer).unwrap(), 0);
    assert_eq!(output_string(&writer, "main"), "");

    // A trunk revision still converts.
    let rev = revision(2, "alice", "edit", vec![file("trunk/file", Change::Add)]);
    assert_eq!(emitter.emit(&rev, &source, &mut writer).unwrap(), 1);
    assert!(output_string(&writer, "main").contains("M 100644 inline file\n"));
}

#[test]
fn test_lfs_routing() {
    let config = Config::parse(
        r#"
svn_repository = "/srv/svn/proj"
commit_message = "{log}"
LFS = ["*.bin"]
[[rule]]
svn_path = "trunk/"
repository = "main"
branch = "master"
"#,
    )
    .unwrap();
    let (dir, mut writer) = debug_writer();
    let payload: Vec<u8> = (0..128u8).collect();
    let source = FakeSource::new(&[(3, "trunk/blob.bin", payload.as_slice())]);
    let mut emitter = CommitEmitter::new(&config);

    let rev = revision(3, "alice", "big file", vec![file("trunk/blob.bin", Change::Add)]);
    emitter.emit(&rev, &source, &mut writer).unwrap();

    let oid = lfs::sha256_hex(&payload);
    let blob_path = dir
        .path()
        .join("lfs/objects")
        .join(&oid[0..2])
        .join(&oid[2..4])
        .join(&oid);
    assert_eq!(std::fs::read(&blob_path).unwrap(), payload);

    let out = output_string(&writer, "main");
    assert!(out.contains("version https://git-lfs.github.com/spec/v1\n"));
    assert!(out.contains(&format!("oid sha256:{oid}\n")));
    assert!(out.contains("size 128\n"));
    assert!(out.contains("*.bin filter=lfs diff=lfs merge=lfs -text\n"));
}

#[test]
fn test_strict_mode_miss_aborts_revision() {
    let config = Config::parse(
        r#"
svn_repository = "/srv/svn/proj"
commit_message = "{log}"
strict_mode = true
[[rule]]
svn_path = "trunk/"
repository = "main"
branch = "master"
"#,
    )
    .unwrap();
    let (_dir, mut writer) = debug_writer();
    let source = FakeSource::new(&[(5, "trunk/ok.txt", b"fine")]);
    let mut emitter = CommitEmitter::new(&config);

    let rev = revision(
        5,
        "alice",
        "mixed",
        vec![
            file("trunk/ok.txt", Change::Add),
            file("unmapped/lost.txt", Change::Add),
        ],
    );
    let err = emitter.emit(&rev, &source, &mut writer).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("unmapped/lost.txt"));
    assert!(message.contains("r5"));
    assert!(matches!(err, ConvertError::UnmappedPath { .. }));

    // Nothing was written for the failed revision.
    assert_eq!(output_string(&writer, "main"), "");
}

#[test]
fn test_multi_commit_revision() {
    let config = Config::parse(
        r#"
svn_repository = "/srv/svn/proj"
commit_message = "{log}"
[[rule]]
svn_path = "projects/([^/]+)/trunk/"
repository = '\1'
branch = "master"
"#,
    )
    .unwrap();
    let (_dir, mut writer) = debug_writer();
    let source = FakeSource::new(&[
        (6, "projects/editor/trunk/a.c", b"a"),
        (6, "projects/server/trunk/b.c", b"b"),
    ]);
    let mut emitter = CommitEmitter::new(&config);

    let rev = revision(
        6,
        "alice",
        "cross-project change",
        vec![
            file("projects/editor/trunk/a.c", Change::Add),
            file("projects/server/trunk/b.c", Change::Add),
        ],
    );
    assert_eq!(emitter.emit(&rev, &source, &mut writer).unwrap(), 2);

    let editor = output_string(&writer, "editor");
    let server = output_string(&writer, "server");

    // Two distinct commit blocks, neither carrying a mark.
    assert!(editor.starts_with("commit refs/heads/master\n"));
    assert!(server.starts_with("commit refs/heads/master\n"));
    assert!(!editor.contains("mark :"));
    assert!(!server.contains("mark :"));

    // Identical committer, time, and message on both.
    let metadata_line = "committer alice <alice@localhost> 1049177863 +0000\n";
    assert!(editor.contains(metadata_line));
    assert!(server.contains(metadata_line));
    assert!(editor.contains("data 20\ncross-project change\n"));
    assert!(server.contains("data 20\ncross-project change\n"));
}

// ===========================================================================
// Real-tooling smoke test
// ===========================================================================

fn tool_available(tool: &str, arg: &str) -> bool {
    Command::new(tool)
        .arg(arg)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn conversion_tools_available() -> bool {
    tool_available("svnadmin", "--version")
        && tool_available("svn", "--version")
        && tool_available("svnlook", "--version")
        && tool_available("git", "--version")
}

fn svn(wc: &Path, args: &[&str]) {
    let status = Command::new("svn")
        .args(args)
        .current_dir(wc)
        .stdout(std::process::Stdio::null())
        .status()
        .expect("failed to run svn");
    assert!(status.success(), "svn {args:?} failed");
}

#[test]
fn test_convert_real_repository_through_fast_import() {
    if !conversion_tools_available() {
        eprintln!("skipping: svn / svnadmin / svnlook / git not all available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let svn_repo = dir.path().join("svn_repo");
    let wc = dir.path().join("wc");
    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();

    // Build a small SVN history: r1 adds trunk with a text file, r2 adds a
    // binary that the config routes through LFS.
    let status = Command::new("svnadmin")
        .args(["create", svn_repo.to_str().unwrap()])
        .status()
        .expect("failed to run svnadmin create");
    assert!(status.success(), "svnadmin create failed");

    let url = format!("file://{}", svn_repo.display());
    let status = Command::new("svn")
        .args(["checkout", &url, wc.to_str().unwrap()])
        .stdout(std::process::Stdio::null())
        .status()
        .expect("failed to run svn checkout");
    assert!(status.success(), "svn checkout failed");

    std::fs::create_dir(wc.join("trunk")).unwrap();
    std::fs::write(wc.join("trunk/foo.txt"), "hello\n").unwrap();
    svn(&wc, &["add", "trunk"]);
    svn(&wc, &["commit", "-m", "add foo"]);

    let payload: Vec<u8> = (0..128u8).collect();
    std::fs::write(wc.join("trunk/blob.bin"), &payload).unwrap();
    svn(&wc, &["add", "trunk/blob.bin"]);
    svn(&wc, &["commit", "-m", "add blob"]);

    let config = Config::parse(&format!(
        r#"
svn_repository = "{}"
domain = "example.com"
LFS = ["*.bin"]
[[rule]]
svn_path = "trunk/"
repository = "main"
branch = "master"
"#,
        svn_repo.display()
    ))
    .unwrap();

    // The writer must drop before inspecting the result so every
    // fast-import child is flushed and reaped.
    let stats = {
        let mut writer = Writer::MultiRepo(MultiRepoWriter::new(out.clone()));
        engine::run(&config, &mut writer, 1, None).expect("conversion failed")
    };
    assert_eq!(stats.revisions, 2);
    assert_eq!(stats.commits, 2);

    let git_repo = git2::Repository::open(out.join("main")).expect("git repo missing");
    let tree = git_repo
        .find_reference("refs/heads/master")
        .expect("master branch missing")
        .peel_to_commit()
        .expect("no commit on master")
        .tree()
        .unwrap();

    // Text file carried through unchanged.
    let foo = tree.get_name("foo.txt").expect("foo.txt missing");
    let foo_blob = git_repo.find_blob(foo.id()).unwrap();
    assert_eq!(foo_blob.content(), b"hello\n");

    // Binary replaced by an LFS pointer; blob stored out-of-band.
    let blob_entry = tree.get_name("blob.bin").expect("blob.bin missing");
    let pointer = git_repo.find_blob(blob_entry.id()).unwrap();
    let pointer_text = String::from_utf8(pointer.content().to_vec()).unwrap();
    assert!(pointer_text.starts_with("version https://git-lfs.github.com/spec/v1\n"));
    assert!(pointer_text.contains("size 128\n"));

    let oid = lfs::sha256_hex(&payload);
    let lfs_blob = out
        .join("main/.git/lfs/objects")
        .join(&oid[0..2])
        .join(&oid[2..4])
        .join(&oid);
    assert_eq!(std::fs::read(&lfs_blob).unwrap(), payload);

    // .gitattributes routes the pattern through LFS.
    let attrs = tree.get_name(".gitattributes").expect(".gitattributes missing");
    let attrs_blob = git_repo.find_blob(attrs.id()).unwrap();
    assert_eq!(
        attrs_blob.content(),
        b"*.bin filter=lfs diff=lfs merge=lfs -text\n"
    );

    // Marks were exported for resumability.
    assert!(out.join("main/.git/svn_lfs_export_marks").exists());
}
