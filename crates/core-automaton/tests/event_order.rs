//! Event-ordering contract of the `updated_nodes` and `found_substrings`
//! ports: initial-state replay, then node additions in insertion order,
//! then link computation in breadth-first order with children in
//! alphabet-index order; within one scan position, the immediate match
//! precedes matches surfaced through the compressed suffix chain.

use std::cell::RefCell;
use std::rc::Rc;

use core_automaton::{AcTrie, FoundSubstring, NodeIndex, NodeUpdate, NodeUpdateKind};
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Seen {
    node: NodeIndex,
    parent: NodeIndex,
    edge_symbol: Option<u8>,
    kind: NodeUpdateKind,
}

fn record(trie: &mut AcTrie) -> Rc<RefCell<Vec<Seen>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    trie.subscribe_updated_nodes(move |u: &NodeUpdate| {
        sink.borrow_mut().push(Seen {
            node: u.node,
            parent: u.parent,
            edge_symbol: u.edge_symbol,
            kind: u.kind,
        });
    });
    seen
}

#[test]
fn preamble_then_insertion_order_then_bfs_links() {
    let mut trie = AcTrie::default();
    let seen = record(&mut trie);

    trie.add_pattern(b"ab");
    trie.add_pattern(b"ac");
    trie.build();

    let events = seen.borrow();
    let nodes: Vec<NodeIndex> = events.iter().map(|e| e.node).collect();

    // Three reserved nodes, three insertions ("a", "b", "c"), then root
    // plus the three trie nodes in BFS order — no interleaving.
    assert_eq!(events.len(), 3 + 3 + 4);

    let added: Vec<&Seen> = events
        .iter()
        .filter(|e| e.kind == NodeUpdateKind::Added)
        .collect();
    let linked: Vec<&Seen> = events
        .iter()
        .filter(|e| e.kind == NodeUpdateKind::LinksComputed)
        .collect();

    // Preamble covers the reserved indices in arena order.
    assert_eq!(
        added[..3]
            .iter()
            .map(|e| e.node.as_usize())
            .collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert!(added[..3].iter().all(|e| e.parent == NodeIndex::NULL));
    assert!(added[..3].iter().all(|e| e.edge_symbol.is_none()));

    // Insertion order: "a" under root, "b" under "a", then "c" under "a".
    assert_eq!(
        added[3..]
            .iter()
            .map(|e| (e.node.as_usize(), e.parent.as_usize(), e.edge_symbol))
            .collect::<Vec<_>>(),
        vec![
            (3, 2, Some(b'a')),
            (4, 3, Some(b'b')),
            (5, 3, Some(b'c')),
        ]
    );

    // All additions precede all link events.
    let first_link = nodes.len() - linked.len();
    assert!(
        events[..first_link]
            .iter()
            .all(|e| e.kind == NodeUpdateKind::Added)
    );

    // BFS: root first (no parent edge), then depth-1 "a", then its
    // children in alphabet order ('b' before 'c').
    assert_eq!(
        linked
            .iter()
            .map(|e| (e.node.as_usize(), e.parent.as_usize(), e.edge_symbol))
            .collect::<Vec<_>>(),
        vec![
            (2, 0, None),
            (3, 2, Some(b'a')),
            (4, 3, Some(b'b')),
            (5, 3, Some(b'c')),
        ]
    );
}

#[test]
fn link_snapshots_expose_suffix_targets() {
    let mut trie = AcTrie::default();
    let snapshots = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&snapshots);
    trie.subscribe_updated_nodes(move |u: &NodeUpdate| {
        if u.kind == NodeUpdateKind::LinksComputed {
            sink.borrow_mut().push((
                u.node,
                u.snapshot.suffix_link,
                u.snapshot.compressed_suffix_link,
            ));
        }
    });

    trie.add_pattern(b"a");
    trie.add_pattern(b"aa");
    trie.build();

    // Nodes: "a" = n3 (accepting), "aa" = n4. link(n4) = n3, and since n3
    // accepts, csl(n4) = n3 as well.
    let snapshots = snapshots.borrow();
    assert_eq!(
        *snapshots,
        vec![
            (NodeIndex::ROOT, NodeIndex::PRE_ROOT, NodeIndex::ROOT),
            (NodeIndex(3), NodeIndex::ROOT, NodeIndex::ROOT),
            (NodeIndex(4), NodeIndex(3), NodeIndex(3)),
        ]
    );
}

#[test]
fn immediate_match_precedes_compressed_chain_matches() {
    let mut trie = AcTrie::default();
    for pattern in [&b"a"[..], b"aa", b"aaa"] {
        trie.add_pattern(pattern);
    }
    let found = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&found);
    trie.subscribe_found_substrings(move |f: &FoundSubstring| {
        sink.borrow_mut().push((f.matched_lossy(), f.start));
    });

    trie.scan(b"aaa");

    // Each position emits its longest (immediate) match first, then the
    // chain in decreasing length.
    assert_eq!(
        *found.borrow(),
        vec![
            ("a".to_string(), 0),
            ("aa".to_string(), 0),
            ("a".to_string(), 1),
            ("aaa".to_string(), 0),
            ("aa".to_string(), 1),
            ("a".to_string(), 2),
        ]
    );
}
