//! Breadth-first suffix-link and compressed-suffix-link computation.
//!
//! One pass over the trie turns the partial child function into a total
//! transition function and assigns both link kinds to every node. Observers
//! on the `updated_nodes` port see one `LinksComputed` event per trie node,
//! in breadth-first order with children visited in alphabet-index order;
//! edge patching emits nothing because no node changes identity.

use std::collections::VecDeque;

use core_config::Alphabet;
use core_ports::MulticastPort;
use tracing::debug;

use crate::arena::{NodeArena, NodeIndex};
use crate::events::{NodeUpdate, NodeUpdateKind};

pub(crate) fn build(
    arena: &mut NodeArena,
    alphabet: &Alphabet,
    updated_nodes: &mut MulticastPort<NodeUpdate>,
) {
    let width = arena.width();
    debug_assert_eq!(width, alphabet.len());

    // link(root) = pre-root, csl(root) = root. Pre-root's edges all point
    // at the root, which is what makes to(link(root), σ) total from the
    // first BFS step.
    {
        let root = arena.get_mut(NodeIndex::ROOT);
        root.suffix_link = NodeIndex::PRE_ROOT;
        root.compressed_suffix_link = NodeIndex::ROOT;
    }
    updated_nodes.notify(&NodeUpdate {
        node: NodeIndex::ROOT,
        parent: NodeIndex::NULL,
        edge_symbol: None,
        kind: NodeUpdateKind::LinksComputed,
        snapshot: arena.get(NodeIndex::ROOT).clone(),
    });

    let mut bfs_queue = VecDeque::new();
    bfs_queue.push_back(NodeIndex::ROOT);

    while let Some(vertex) = bfs_queue.pop_front() {
        for slot in 0..width {
            // to(link(v), σ). The suffix target was dequeued earlier, so
            // its edges are already total.
            let suffix = arena.get(vertex).suffix_link;
            let fallback = arena.get(suffix).edge(slot);
            debug_assert!(!fallback.is_null(), "suffix chain lost totality");

            let child = arena.get(vertex).edge(slot);
            if child.is_null() {
                // Missing edge: short-circuit through the suffix link.
                // Pure transition-function completion, no event.
                arena.get_mut(vertex).set_edge(slot, fallback);
                continue;
            }

            // csl(c) compresses the suffix chain down to the nearest
            // accepting state, stopping at the root.
            let compressed = if arena.get(fallback).is_accepting() || fallback == NodeIndex::ROOT {
                fallback
            } else {
                arena.get(fallback).compressed_suffix_link
            };
            {
                let node = arena.get_mut(child);
                node.suffix_link = fallback;
                node.compressed_suffix_link = compressed;
            }
            updated_nodes.notify(&NodeUpdate {
                node: child,
                parent: vertex,
                edge_symbol: Some(alphabet.symbol(slot)),
                kind: NodeUpdateKind::LinksComputed,
                snapshot: arena.get(child).clone(),
            });
            bfs_queue.push_back(child);
        }
    }

    debug!(target: "actrie", nodes = arena.len(), "links_computed");
}
