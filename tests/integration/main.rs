//! Integration tests for Understory
//!
//! These drive the engine, a spawned detector worker, and an in-memory data
//! source together.

use std::io::Write;

use understory::{
    EdgeRecord, EngineConfig, Exploration, Explorer, MemorySource, NodeId, NodeRecord, Reason,
};

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

fn source(nodes: &[NodeRecord], edges: &[(&str, &str)]) -> MemorySource {
    let mut source = MemorySource::new();
    for node in nodes {
        source.add_node(node.clone());
    }
    for (s, t) in edges {
        source
            .add_edge(EdgeRecord::new(format!("{}->{}", s, t), *s, *t))
            .unwrap();
    }
    source
}

fn plain(ids: &[&str]) -> Vec<NodeRecord> {
    ids.iter().map(|i| NodeRecord::new(*i)).collect()
}

/// A hub pointing at two directed triangles.
fn two_triangles() -> MemorySource {
    source(
        &plain(&["root", "a", "b", "c", "d", "e", "f"]),
        &[
            ("root", "a"),
            ("root", "b"),
            ("root", "c"),
            ("root", "d"),
            ("root", "e"),
            ("root", "f"),
            ("a", "b"),
            ("b", "c"),
            ("c", "a"),
            ("d", "e"),
            ("e", "f"),
            ("f", "d"),
        ],
    )
}

#[tokio::test]
async fn test_root_children_are_bucketed() {
    let mut nodes = vec![NodeRecord::new("root")];
    nodes.extend(["p1", "p2", "p3"].map(|p| NodeRecord::new(p).with("type", "person")));
    nodes.extend(["l1", "l2"].map(|l| NodeRecord::new(l).with("type", "place")));
    nodes.push(NodeRecord::new("loner"));
    let edges: Vec<(&str, &str)> = ["p1", "p2", "p3", "l1", "l2", "loner"]
        .iter()
        .map(|c| ("root", *c))
        .collect();

    let config = EngineConfig {
        child_limit: 4,
        priority_attributes: vec!["type".into()],
        ..EngineConfig::default()
    };
    let (mut explorer, task) = Explorer::spawn(config, source(&nodes, &edges)).unwrap();
    explorer.load_root(&id("root")).await.unwrap();

    let engine = explorer.engine();
    let communities: Vec<_> = engine.communities().collect();
    assert_eq!(communities.len(), 2);
    assert_eq!(
        communities[0].reason(),
        Some(&Reason::Attribute { key: "type".into(), value: "person".into() })
    );
    assert_eq!(communities[1].size(), 2);
    // A bucket of one stays a plain node.
    assert!(engine.is_plain(&id("loner")));
    assert_eq!(engine.load(), 4);
    assert_eq!(engine.known_node_ids().len(), 7);

    drop(explorer);
    task.await.unwrap();
}

#[tokio::test]
async fn test_budget_is_enforced_after_loading() {
    let config = EngineConfig {
        node_limit: 4,
        ..EngineConfig::default()
    };
    let (mut explorer, task) = Explorer::spawn(config, two_triangles()).unwrap();
    explorer.load_root(&id("root")).await.unwrap();

    let engine = explorer.engine();
    assert!(!engine.is_join_pending());
    assert!(engine.load() <= 4);
    assert_eq!(engine.communities().count(), 2);
    assert!(engine.communities().all(|c| c.reason() == Some(&Reason::Modularity)));
    assert!(engine.is_plain(&id("root")));
    assert_eq!(engine.counters(&id("root")).unwrap().outbound, 6);
    assert_eq!(engine.known_node_ids().len(), 7);

    drop(explorer);
    task.await.unwrap();
}

#[tokio::test]
async fn test_dissolve_conserves_nodes() {
    let config = EngineConfig {
        node_limit: 4,
        ..EngineConfig::default()
    };
    let (mut explorer, _task) = Explorer::spawn(config, two_triangles()).unwrap();
    explorer.load_root(&id("root")).await.unwrap();
    let known = explorer.engine().known_node_ids();
    let edges = explorer.engine().known_edge_ids();

    let first = explorer.engine().communities().next().unwrap().id().clone();
    let restored = explorer.dissolve_community(&first).await.unwrap();
    assert_eq!(restored.len(), 3);

    assert_eq!(explorer.engine().known_node_ids(), known);
    assert_eq!(explorer.engine().known_edge_ids(), edges);
    assert!(explorer.engine().load() <= 4);
}

#[tokio::test]
async fn test_explore_fetches_then_collapses() {
    let chain = source(&plain(&["root", "a", "b"]), &[("root", "a"), ("a", "b")]);
    let (mut explorer, _task) = Explorer::spawn(EngineConfig::default(), chain).unwrap();
    explorer.load_root(&id("root")).await.unwrap();
    assert_eq!(explorer.engine().visible_ids().count(), 2);

    let opened = explorer.explore(&id("a")).await.unwrap();
    assert_eq!(opened, Exploration::FetchRequired(id("a")));
    assert_eq!(explorer.engine().visible_ids().count(), 3);
    assert!(explorer.engine().entity(&id("a")).unwrap().is_expanded());

    let closed = explorer.explore(&id("root")).await.unwrap();
    assert_eq!(closed, Exploration::Collapsed);
    let left: Vec<_> = explorer.engine().known_node_ids().into_iter().collect();
    assert_eq!(left, vec![id("root")]);
}

#[tokio::test]
async fn test_expand_community_respects_budget() {
    let config = EngineConfig {
        node_limit: 4,
        ..EngineConfig::default()
    };
    let (mut explorer, _task) = Explorer::spawn(config, two_triangles()).unwrap();
    explorer.load_root(&id("root")).await.unwrap();

    let first = explorer.engine().communities().next().unwrap().id().clone();
    explorer.expand_community(&first).await.unwrap();

    let engine = explorer.engine();
    assert!(engine.community(&first).unwrap().is_expanded());
    assert!(!engine.is_join_pending());
    assert_eq!(engine.load(), 6);

    let check = explorer.set_node_limit(3).await.unwrap();
    assert!(matches!(check, understory::LimitCheck::Relieved(_)));
    assert_eq!(explorer.engine().load(), 3);
}

#[tokio::test]
async fn test_unknown_root_is_an_error() {
    let (mut explorer, _task) = Explorer::spawn(EngineConfig::default(), MemorySource::new()).unwrap();
    assert!(explorer.load_root(&id("missing")).await.is_err());
    assert!(explorer.explore(&id("missing")).await.is_err());
}

#[test]
fn test_config_file_feeds_the_engine() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "node_limit = 12").unwrap();
    writeln!(file, "child_limit = 3").unwrap();
    writeln!(file, "priority_attributes = [\"type\"]").unwrap();

    let config = understory::load_config(Some(file.path())).unwrap();
    assert_eq!(config.node_limit, 12);
    assert_eq!(config.child_limit, 3);
    assert_eq!(config.priority_attributes, vec!["type".to_string()]);

    let (handle, _worker, _responses) = understory::channel();
    let engine = understory::Engine::builder()
        .config(config)
        .detector(handle)
        .build()
        .unwrap();
    assert_eq!(engine.node_limit(), 12);
}

#[test]
fn test_logging_can_be_installed_twice() {
    understory::init_logging(false);
    understory::init_logging(true);
}
