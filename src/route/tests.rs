use std::sync::Arc;

use super::{Level, RouteError, RouteNode, RouteTable};
use crate::graph::{DependencyGraph, DependentId};

struct Fixture {
    graph: Arc<DependencyGraph>,
    table: Arc<RouteTable<&'static str>>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            graph: DependencyGraph::new(DependencyGraph::DEFAULT_DEBOUNCE),
            table: RouteTable::new(),
        }
    }

    fn id(&self) -> DependentId {
        self.graph.allocate_id()
    }

    fn route(
        &self,
        level: Level,
        is_page: bool,
        url: &str,
        name: &'static str,
    ) -> Result<RouteNode<&'static str>, RouteError> {
        let node = RouteNode::new(&self.table, self.id(), level, is_page, url)?;
        node.register(name)?;
        Ok(node)
    }
}

#[test]
fn second_owner_of_same_slot_is_rejected() {
    let fx = Fixture::new();
    let first = fx.route(Level::User, true, "/about/", "first").unwrap();

    let err = fx.route(Level::User, true, "/about", "second").unwrap_err();
    assert_eq!(
        err,
        RouteError::Conflict {
            level: Level::User,
            dist_path: "/about/index.html".into(),
            owner_url: "/about/".into(),
        }
    );

    assert!(first.is_registered());
    assert_eq!(fx.table.get(Level::User, "/about/index.html"), Some("first"));
    assert_eq!(fx.table.len(), 1);
}

#[test]
fn same_slot_on_other_levels_is_allowed() {
    let fx = Fixture::new();
    fx.route(Level::Theme, false, "/style.css", "theme").unwrap();
    fx.route(Level::User, false, "/style.css", "user").unwrap();

    assert_eq!(fx.table.len(), 2);
    assert_eq!(fx.table.find("/style.css"), Some("user"));
}

#[test]
fn find_falls_back_to_index_file() {
    let fx = Fixture::new();
    fx.route(Level::User, true, "/blog/", "blog").unwrap();

    assert_eq!(fx.table.find("/blog/"), Some("blog"));
    assert_eq!(fx.table.find("/blog"), Some("blog"));
    assert_eq!(fx.table.find("/blog/index.html"), Some("blog"));
    assert_eq!(fx.table.find("/blog/other"), None);
}

#[test]
fn find_matches_exact_dist_path() {
    let fx = Fixture::new();
    fx.route(Level::User, false, "/blog", "feed").unwrap();

    assert_eq!(fx.table.get(Level::User, "/blog"), Some("feed"));
    assert_eq!(fx.table.find("/blog"), Some("feed"));
}

#[test]
fn find_prefers_virtual_then_user_then_theme() {
    let fx = Fixture::new();
    fx.route(Level::Theme, true, "/", "theme").unwrap();
    assert_eq!(fx.table.find("/"), Some("theme"));

    fx.route(Level::User, true, "/", "user").unwrap();
    assert_eq!(fx.table.find("/"), Some("user"));

    fx.route(Level::Virtual, true, "/", "virtual").unwrap();
    assert_eq!(fx.table.find("/"), Some("virtual"));
}

#[test]
fn find_normalizes_request() {
    let fx = Fixture::new();
    fx.route(Level::User, false, "/a/b.css", "css").unwrap();

    assert_eq!(fx.table.find("a//./b.css"), Some("css"));
    assert_eq!(fx.table.find("/a/x/../b.css"), Some("css"));
}

#[test]
fn root_asset_is_rejected() {
    let fx = Fixture::new();
    let err = fx.route(Level::User, false, "/", "asset").unwrap_err();
    assert!(matches!(err, RouteError::RootNotPage(_)));
    assert!(fx.table.is_empty());
}

#[test]
fn update_url_moves_slot() {
    let fx = Fixture::new();
    let node = fx.route(Level::Virtual, true, "/tags/rust/", "tag").unwrap();

    assert!(node.update_url("/topics/rust/", "tag").unwrap());
    assert_eq!(node.url().as_str(), "/topics/rust/");
    assert_eq!(node.dist_path().as_str(), "/topics/rust/index.html");
    assert_eq!(fx.table.find("/tags/rust/"), None);
    assert_eq!(fx.table.find("/topics/rust/"), Some("tag"));
    assert_eq!(fx.table.len(), 1);

    assert!(!node.update_url("/topics//rust/", "tag").unwrap());
}

#[test]
fn update_url_conflict_keeps_previous_state() {
    let fx = Fixture::new();
    let a = fx.route(Level::Virtual, true, "/a/", "a").unwrap();
    let b = fx.route(Level::Virtual, true, "/b/", "b").unwrap();

    let err = b.update_url("/a/", "b").unwrap_err();
    assert!(matches!(err, RouteError::Conflict { .. }));

    assert_eq!(b.url().as_str(), "/b/");
    assert!(a.is_registered());
    assert!(b.is_registered());
    assert_eq!(fx.table.find("/a/"), Some("a"));
    assert_eq!(fx.table.find("/b/"), Some("b"));
}

#[test]
fn release_frees_slot_for_next_owner() {
    let fx = Fixture::new();
    let first = fx.route(Level::User, false, "/app.js", "first").unwrap();

    assert_eq!(first.release(), Some("first"));
    assert_eq!(first.release(), None);
    assert!(!first.is_registered());

    let second = fx.route(Level::User, false, "/app.js", "second").unwrap();
    assert!(second.is_registered());
    // A stale node never evicts the new owner.
    assert_eq!(first.release(), None);
    assert_eq!(fx.table.find("/app.js"), Some("second"));
}

#[test]
fn routes_and_drain() {
    let fx = Fixture::new();
    fx.route(Level::User, false, "/b.css", "b").unwrap();
    fx.route(Level::User, false, "/a.css", "a").unwrap();
    fx.route(Level::Theme, false, "/t.css", "t").unwrap();

    assert_eq!(fx.table.routes(Level::User), vec!["a", "b"]);
    assert_eq!(fx.table.routes(Level::Virtual), Vec::<&str>::new());

    let mut drained = fx.table.drain();
    drained.sort_unstable();
    assert_eq!(drained, vec!["a", "b", "t"]);
    assert!(fx.table.is_empty());
}
