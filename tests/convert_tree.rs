// tests/convert_tree.rs

//! End-to-end conversion tree tests over directory-backed indexes.

mod common;

use common::{CountingFetcher, TestArtifact, TestIndex};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use wheelwright::{
    ConvertOptions, ConvertTree, Error, JsonIndex, PackageIndex, RepoWriter, Requirement,
};

fn req(spec: &str) -> Requirement {
    Requirement::parse(spec).unwrap()
}

fn make_tree(
    repo: &Path,
    index_dirs: &[&Path],
    fetcher: Arc<CountingFetcher>,
    options: ConvertOptions,
) -> ConvertTree {
    let writer = RepoWriter::open(repo).unwrap();
    let indexes: Vec<Box<dyn PackageIndex>> = index_dirs
        .iter()
        .map(|dir| Box::new(JsonIndex::open(dir).unwrap()) as Box<dyn PackageIndex>)
        .collect();
    ConvertTree::new(writer, indexes, fetcher, options)
}

/// a -> {b, c}, b -> d, c -> d
fn diamond_index(root: &Path) -> TestIndex {
    let mut index = TestIndex::create(root, "main");
    index.add_wheel(&TestArtifact::new("a", "1.0").requires("b>=1.0").requires("c>=1.0"));
    index.add_wheel(&TestArtifact::new("b", "1.0").requires("d>=1.0"));
    index.add_wheel(&TestArtifact::new("c", "1.0").requires("d>=1.0"));
    index.add_wheel(&TestArtifact::new("d", "1.0"));
    index.finish();
    index
}

#[test]
fn test_diamond_converts_shared_dependency_once() {
    let tmp = tempfile::tempdir().unwrap();
    let index = diamond_index(tmp.path());
    let repo = tmp.path().join("repo");

    let fetcher = Arc::new(CountingFetcher::new());
    let tree = make_tree(&repo, &[&index.dir], fetcher.clone(), ConvertOptions::default());

    let report = tree.convert_tree(&[req("a")]).unwrap();

    assert!(report.is_complete());
    assert_eq!(report.converted.len(), 4);
    assert_eq!(fetcher.fetches(), 4, "d must be fetched exactly once");
    assert_eq!(tree.repository().entries().len(), 4);
}

#[test]
fn test_second_run_converts_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let index = diamond_index(tmp.path());
    let repo = tmp.path().join("repo");

    let first = make_tree(
        &repo,
        &[&index.dir],
        Arc::new(CountingFetcher::new()),
        ConvertOptions::default(),
    );
    assert_eq!(first.convert_tree(&[req("a")]).unwrap().converted.len(), 4);

    let fetcher = Arc::new(CountingFetcher::new());
    let second = make_tree(&repo, &[&index.dir], fetcher.clone(), ConvertOptions::default());
    let report = second.convert_tree(&[req("a")]).unwrap();

    assert!(report.is_complete());
    assert!(report.converted.is_empty());
    // The walk still covers the whole closure through the committed entries
    assert_eq!(report.already_present.len(), 4);
    assert_eq!(fetcher.fetches(), 0);
    assert_eq!(second.repository().entries().len(), 4);
}

#[test]
fn test_second_session_completes_partial_closure() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");

    // First session: b is nowhere to be found
    let mut partial = TestIndex::create(tmp.path(), "partial");
    partial.add_wheel(&TestArtifact::new("a", "1.0").requires("b>=1.0"));
    partial.finish();

    let first = make_tree(
        &repo,
        &[&partial.dir],
        Arc::new(CountingFetcher::new()),
        ConvertOptions::default(),
    );
    let report = first.convert_tree(&[req("a")]).unwrap();
    assert_eq!(report.converted.len(), 1);
    assert_eq!(report.unsatisfied.len(), 1);

    // Second session against an index that now publishes b: the walk must
    // continue below the already-committed a and convert b
    let mut updated = TestIndex::create(tmp.path(), "updated");
    updated.add_wheel(&TestArtifact::new("a", "1.0").requires("b>=1.0"));
    updated.add_wheel(&TestArtifact::new("b", "1.2"));
    updated.finish();

    let second = make_tree(
        &repo,
        &[&updated.dir],
        Arc::new(CountingFetcher::new()),
        ConvertOptions::default(),
    );
    let report = second.convert_tree(&[req("a")]).unwrap();

    assert!(report.is_complete());
    assert_eq!(report.already_present.len(), 1);
    assert_eq!(report.converted.len(), 1);
    assert_eq!(report.converted[0].name, "b");
    assert_eq!(second.repository().entries().len(), 2);
}

#[test]
fn test_dependency_cycle_terminates() {
    let tmp = tempfile::tempdir().unwrap();
    let mut index = TestIndex::create(tmp.path(), "main");
    index.add_wheel(&TestArtifact::new("a", "1.0").requires("b"));
    index.add_wheel(&TestArtifact::new("b", "1.0").requires("a"));
    index.finish();

    let tree = make_tree(
        &tmp.path().join("repo"),
        &[&index.dir],
        Arc::new(CountingFetcher::new()),
        ConvertOptions::default(),
    );
    let report = tree.convert_tree(&[req("a")]).unwrap();

    assert!(report.is_complete());
    assert_eq!(report.converted.len(), 2);
}

#[test]
fn test_partial_failure_continues_past_unresolvable() {
    let tmp = tempfile::tempdir().unwrap();
    let mut index = TestIndex::create(tmp.path(), "main");
    index.add_wheel(&TestArtifact::new("x", "1.0"));
    index.finish();

    let tree = make_tree(
        &tmp.path().join("repo"),
        &[&index.dir],
        Arc::new(CountingFetcher::new()),
        ConvertOptions::default(),
    );
    let report = tree.convert_tree(&[req("x"), req("ghost>=1.0")]).unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.converted.len(), 1);
    assert_eq!(report.unsatisfied.len(), 1);
    assert!(matches!(report.unsatisfied[0].error, Error::NoMatch(_)));
}

#[test]
fn test_fail_fast_aborts_on_unresolvable() {
    let tmp = tempfile::tempdir().unwrap();
    let mut index = TestIndex::create(tmp.path(), "main");
    index.add_wheel(&TestArtifact::new("x", "1.0"));
    index.finish();

    let options = ConvertOptions {
        fail_fast: true,
        ..ConvertOptions::default()
    };
    let tree = make_tree(
        &tmp.path().join("repo"),
        &[&index.dir],
        Arc::new(CountingFetcher::new()),
        options,
    );

    assert!(tree.convert_tree(&[req("ghost>=1.0")]).is_err());
}

#[test]
fn test_defeat_cache_reconverts_everything() {
    let tmp = tempfile::tempdir().unwrap();
    let index = diamond_index(tmp.path());
    let repo = tmp.path().join("repo");

    let first = make_tree(
        &repo,
        &[&index.dir],
        Arc::new(CountingFetcher::new()),
        ConvertOptions::default(),
    );
    first.convert_tree(&[req("a")]).unwrap();

    let fetcher = Arc::new(CountingFetcher::new());
    let options = ConvertOptions {
        defeat_cache: true,
        ..ConvertOptions::default()
    };
    let second = make_tree(&repo, &[&index.dir], fetcher.clone(), options);
    let report = second.convert_tree(&[req("a")]).unwrap();

    assert_eq!(report.converted.len(), 4);
    assert_eq!(fetcher.fetches(), 4);
    // Identical content converts to identical identities: no new entries
    assert_eq!(second.repository().entries().len(), 4);
}

#[test]
fn test_cancellation_stops_before_work() {
    let tmp = tempfile::tempdir().unwrap();
    let index = diamond_index(tmp.path());

    let options = ConvertOptions::default();
    options.cancel.store(true, Ordering::SeqCst);
    let tree = make_tree(
        &tmp.path().join("repo"),
        &[&index.dir],
        Arc::new(CountingFetcher::new()),
        options,
    );
    let report = tree.convert_tree(&[req("a")]).unwrap();

    assert!(report.cancelled);
    assert!(!report.is_complete());
    assert!(report.converted.is_empty());
}

#[test]
fn test_requested_extras_pull_optional_dependencies() {
    let tmp = tempfile::tempdir().unwrap();
    let mut index = TestIndex::create(tmp.path(), "main");
    index.add_wheel(&TestArtifact::new("a", "1.0").extra("fast", &["z>=1.0"]));
    index.add_wheel(&TestArtifact::new("z", "1.5"));
    index.finish();

    let tree = make_tree(
        &tmp.path().join("repo"),
        &[&index.dir],
        Arc::new(CountingFetcher::new()),
        ConvertOptions::default(),
    );

    let report = tree.convert_tree(&[req("a[fast]")]).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.converted.len(), 2);
    assert!(report.converted.iter().any(|id| id.name == "z"));
}

#[test]
fn test_extras_resolved_for_already_present_package() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    let mut index = TestIndex::create(tmp.path(), "main");
    index.add_wheel(&TestArtifact::new("a", "1.0").extra("fast", &["z>=1.0"]));
    index.add_wheel(&TestArtifact::new("z", "1.5"));
    index.finish();

    // Plain a first: z is not reachable without the extra
    let first = make_tree(
        &repo,
        &[&index.dir],
        Arc::new(CountingFetcher::new()),
        ConvertOptions::default(),
    );
    let report = first.convert_tree(&[req("a")]).unwrap();
    assert_eq!(report.converted.len(), 1);

    // a[fast] must still pull the extra group even though a is committed
    let second = make_tree(
        &repo,
        &[&index.dir],
        Arc::new(CountingFetcher::new()),
        ConvertOptions::default(),
    );
    let report = second.convert_tree(&[req("a[fast]")]).unwrap();

    assert!(report.is_complete());
    assert!(report.converted.iter().any(|id| id.name == "z"));
}

#[test]
fn test_different_extras_in_one_session_both_resolve() {
    let tmp = tempfile::tempdir().unwrap();
    let mut index = TestIndex::create(tmp.path(), "main");
    index.add_wheel(
        &TestArtifact::new("root", "1.0")
            .requires("shared[x]")
            .requires("helper"),
    );
    index.add_wheel(&TestArtifact::new("helper", "1.0").requires("shared[y]"));
    index.add_wheel(
        &TestArtifact::new("shared", "2.0")
            .extra("x", &["need-x"])
            .extra("y", &["need-y"]),
    );
    index.add_wheel(&TestArtifact::new("need-x", "1.0"));
    index.add_wheel(&TestArtifact::new("need-y", "1.0"));
    index.finish();

    let tree = make_tree(
        &tmp.path().join("repo"),
        &[&index.dir],
        Arc::new(CountingFetcher::new()),
        ConvertOptions::default(),
    );
    let report = tree.convert_tree(&[req("root")]).unwrap();

    assert!(report.is_complete());
    assert!(report.converted.iter().any(|id| id.name == "need-x"));
    assert!(report.converted.iter().any(|id| id.name == "need-y"));
}

#[test]
fn test_unbuildable_sdist_recorded_as_unsatisfied() {
    let tmp = tempfile::tempdir().unwrap();
    let mut index = TestIndex::create(tmp.path(), "main");
    index.add_wheel(&TestArtifact::new("a", "1.0").requires("native-ext"));
    index.add_sdist(&TestArtifact::new("native-ext", "2.0").build_backend("setuptools"));
    index.finish();

    let tree = make_tree(
        &tmp.path().join("repo"),
        &[&index.dir],
        Arc::new(CountingFetcher::new()),
        ConvertOptions::default(),
    );
    let report = tree.convert_tree(&[req("a")]).unwrap();

    assert_eq!(report.converted.len(), 1);
    assert_eq!(report.unsatisfied.len(), 1);
    assert!(matches!(
        report.unsatisfied[0].error,
        Error::UnsupportedArtifact(_)
    ));
}

#[test]
fn test_plain_sdist_converts_by_copy() {
    let tmp = tempfile::tempdir().unwrap();
    let mut index = TestIndex::create(tmp.path(), "main");
    index.add_sdist(&TestArtifact::new("pure", "0.3"));
    index.finish();

    let tree = make_tree(
        &tmp.path().join("repo"),
        &[&index.dir],
        Arc::new(CountingFetcher::new()),
        ConvertOptions::default(),
    );
    let report = tree.convert_tree(&[req("pure")]).unwrap();

    assert!(report.is_complete());
    assert_eq!(report.converted.len(), 1);
}
