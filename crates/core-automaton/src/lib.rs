//! Aho–Corasick automaton with observable internals.
//!
//! [`AcTrie`] owns the node arena and the pattern-length table, and exposes
//! four outbound multicast ports so every structural change and every
//! scan-time transition is visible to subscribers without coupling the
//! automaton to any consumer:
//!
//! * `updated_nodes` — node appended / links computed (plus the
//!   initial-state replay, see below),
//! * `found_substrings` — pattern occurrence during a scan,
//! * `bad_input` — rejected pattern byte,
//! * `passing_through` — state reached after each consumed text byte.
//!
//! All notification is synchronous and in-thread: an operation returns only
//! after every event it produced has been delivered on the caller's stack.
//! One automaton instance belongs to one thread.
//!
//! Lifecycle: the automaton is either *editable* (accepting patterns) or
//! *ready* (links computed, accepting scans). `scan` on an editable
//! automaton builds first; `add_pattern` on a ready automaton resets first.
//! `build` on a ready automaton is a no-op. There is no terminal state.
//!
//! Invariants outside an ongoing mutation:
//! * the three reserved nodes exist and keep their meaning;
//! * every pre-root edge points at the root;
//! * edges of reachable nodes are null or in-arena while editable, and
//!   real in-arena nodes once ready;
//! * once ready, suffix and compressed links of every node past the null
//!   sentinel are in-arena;
//! * an accepting node's pattern id indexes the pattern-length table;
//! * `link(root) = pre-root` and `csl(root) = root` once ready.
//!
//! [`AcTrie::verify`] checks all of these and is callable in release
//! builds; `build` additionally asserts them in debug builds.

pub mod arena;
pub mod events;
mod links;
mod scan;

pub use arena::{Node, NodeArena, NodeIndex, PatternIndex};
pub use core_ports::{NotifyHandler, SubscriptionId};
pub use events::{BadPatternByte, FoundSubstring, NodeUpdate, NodeUpdateKind, PassingThrough};

use core_config::Alphabet;
use core_ports::MulticastPort;
use thiserror::Error;
use tracing::{debug, trace};

/// Post-build consistency failure. Not recoverable: it means a bug in the
/// automaton itself, not bad user input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("arena holds {0} nodes; the three reserved nodes are mandatory")]
    MissingReservedNodes(usize),
    #[error("pre-root edge {slot} points at {found} instead of the root")]
    PreRootEdge { slot: usize, found: NodeIndex },
    #[error("node {node} edge {slot} resolves to {found}, outside the arena")]
    EdgeOutOfRange {
        node: NodeIndex,
        slot: usize,
        found: NodeIndex,
    },
    #[error("node {node} suffix link {found} is outside the arena")]
    SuffixLinkOutOfRange { node: NodeIndex, found: NodeIndex },
    #[error("node {node} compressed suffix link {found} is outside the arena")]
    CompressedLinkOutOfRange { node: NodeIndex, found: NodeIndex },
    #[error("node {node} names pattern {word} but only {patterns} patterns exist")]
    WordOutOfRange {
        node: NodeIndex,
        word: PatternIndex,
        patterns: usize,
    },
    #[error("root links are miswired (suffix {suffix}, compressed {compressed})")]
    RootLinks {
        suffix: NodeIndex,
        compressed: NodeIndex,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Editable,
    Ready,
}

/// Multi-pattern exact substring automaton over a contiguous byte alphabet.
pub struct AcTrie {
    arena: NodeArena,
    pattern_lengths: Vec<u32>,
    alphabet: Alphabet,
    phase: Phase,
    /// Whether the initial-state replay has gone out this epoch; reset
    /// re-arms it.
    preamble_sent: bool,
    updated_nodes: MulticastPort<NodeUpdate>,
    found_substrings: MulticastPort<FoundSubstring>,
    bad_input: MulticastPort<BadPatternByte>,
    passing_through: MulticastPort<PassingThrough>,
}

impl Default for AcTrie {
    fn default() -> Self {
        Self::new(Alphabet::default())
    }
}

impl AcTrie {
    pub fn new(alphabet: Alphabet) -> Self {
        Self {
            arena: NodeArena::new(alphabet.len()),
            pattern_lengths: Vec::new(),
            alphabet,
            phase: Phase::Editable,
            preamble_sent: false,
            updated_nodes: MulticastPort::new(),
            found_substrings: MulticastPort::new(),
            bad_input: MulticastPort::new(),
            passing_through: MulticastPort::new(),
        }
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.pattern_lengths.len()
    }

    /// Length in bytes of an inserted pattern, for recovering match
    /// geometry from a node id.
    pub fn pattern_length(&self, word: PatternIndex) -> Option<usize> {
        self.pattern_lengths.get(word.as_usize()).map(|&l| l as usize)
    }

    /// Read-only view of a node. Indices are trusted, as in the arena.
    pub fn node(&self, index: NodeIndex) -> &Node {
        self.arena.get(index)
    }

    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Insert one pattern.
    ///
    /// On a ready automaton this resets first, so insertion always works on
    /// an editable trie. The whole pattern is validated against the
    /// alphabet before any mutation: the first invalid byte fires
    /// `bad_input` with its offset and value, and the trie is left exactly
    /// as before the call. Empty patterns are rejected the same way, with
    /// `{index: 0, byte: 0}`.
    ///
    /// Inserting a pattern that already ends at an accepting node assigns
    /// that node a fresh pattern id and grows the length table; match
    /// output is unaffected, pattern ids are not stable under
    /// re-insertion.
    pub fn add_pattern(&mut self, pattern: &[u8]) {
        if self.phase == Phase::Ready {
            self.reset();
        }
        if pattern.is_empty() {
            self.bad_input.notify(&BadPatternByte { index: 0, byte: 0 });
            return;
        }
        for (index, &byte) in pattern.iter().enumerate() {
            if !self.alphabet.contains(byte) {
                trace!(target: "actrie", index, byte, "pattern_rejected");
                self.bad_input.notify(&BadPatternByte { index, byte });
                return;
            }
        }

        // Walk the shared prefix that is already in the trie.
        let mut current = NodeIndex::ROOT;
        let mut consumed = 0;
        for &byte in pattern {
            let slot = self
                .alphabet
                .index_of(byte)
                .expect("pattern was validated above");
            let next = self.arena.get(current).edge(slot);
            if next.is_null() {
                break;
            }
            current = next;
            consumed += 1;
        }

        // Extend with fresh nodes where the path diverges.
        for &byte in &pattern[consumed..] {
            let slot = self
                .alphabet
                .index_of(byte)
                .expect("pattern was validated above");
            let node = self.arena.append();
            self.arena.get_mut(current).set_edge(slot, node);
            self.updated_nodes.notify(&NodeUpdate {
                node,
                parent: current,
                edge_symbol: Some(self.alphabet.fold(byte)),
                kind: NodeUpdateKind::Added,
                snapshot: self.arena.get(node).clone(),
            });
            current = node;
        }

        let word = PatternIndex::from_usize(self.pattern_lengths.len());
        self.arena.get_mut(current).word = Some(word);
        self.pattern_lengths.push(pattern.len() as u32);
        debug!(
            target: "actrie",
            pattern_len = pattern.len(),
            nodes = self.arena.len(),
            patterns = self.pattern_lengths.len(),
            "pattern_added"
        );
    }

    /// Compute suffix and compressed-suffix links and totalize the
    /// transition function. No-op on a ready automaton.
    pub fn build(&mut self) {
        if self.phase == Phase::Ready {
            return;
        }
        links::build(&mut self.arena, &self.alphabet, &mut self.updated_nodes);
        self.phase = Phase::Ready;
        #[cfg(debug_assertions)]
        if let Err(violation) = self.verify() {
            panic!("automaton left inconsistent after build: {violation}");
        }
    }

    /// Drop all patterns and nodes and return to the editable state. The
    /// initial-state replay goes out on `updated_nodes` so observers can
    /// rebuild their model of the fresh automaton.
    pub fn reset(&mut self) {
        self.arena.clear_and_reinit();
        self.pattern_lengths.clear();
        self.phase = Phase::Editable;
        debug!(target: "actrie", "reset");
        self.emit_initial_state();
    }

    /// Scan `text`, emitting `passing_through` per consumed byte and
    /// `found_substrings` for every pattern occurrence. Builds first when
    /// the automaton is still editable.
    pub fn scan(&mut self, text: &[u8]) {
        if self.phase == Phase::Editable {
            self.build();
        }
        scan::run(
            &self.arena,
            &self.pattern_lengths,
            &self.alphabet,
            text,
            &mut self.passing_through,
            &mut self.found_substrings,
        );
    }

    /// Whether the exact pattern was inserted, by walking real trie edges.
    ///
    /// Authoritative on an editable automaton. Once built, missing edges
    /// have been patched through suffix links, so the walk follows the
    /// total transition function instead and the answer degrades to
    /// "some inserted pattern ends where this walk ends".
    pub fn contains_pattern(&self, pattern: &[u8]) -> bool {
        let mut current = NodeIndex::ROOT;
        for &byte in pattern {
            let Some(slot) = self.alphabet.index_of(byte) else {
                return false;
            };
            let next = self.arena.get(current).edge(slot);
            if next.is_null() {
                return false;
            }
            current = next;
        }
        self.arena.get(current).is_accepting()
    }

    /// Attach an observer to `updated_nodes`.
    ///
    /// If the automaton has never emitted its initial-state replay this
    /// epoch, the first subscription triggers it, so a late subscriber can
    /// still reconstruct the full model from events alone.
    pub fn subscribe_updated_nodes(
        &mut self,
        handler: impl NotifyHandler<NodeUpdate> + 'static,
    ) -> SubscriptionId {
        let id = self.updated_nodes.subscribe(handler);
        if !self.preamble_sent {
            self.emit_initial_state();
        }
        id
    }

    pub fn subscribe_found_substrings(
        &mut self,
        handler: impl NotifyHandler<FoundSubstring> + 'static,
    ) -> SubscriptionId {
        self.found_substrings.subscribe(handler)
    }

    pub fn subscribe_bad_input(
        &mut self,
        handler: impl NotifyHandler<BadPatternByte> + 'static,
    ) -> SubscriptionId {
        self.bad_input.subscribe(handler)
    }

    pub fn subscribe_passing_through(
        &mut self,
        handler: impl NotifyHandler<PassingThrough> + 'static,
    ) -> SubscriptionId {
        self.passing_through.subscribe(handler)
    }

    pub fn unsubscribe_updated_nodes(&mut self, id: SubscriptionId) -> bool {
        self.updated_nodes.unsubscribe(id)
    }

    pub fn unsubscribe_found_substrings(&mut self, id: SubscriptionId) -> bool {
        self.found_substrings.unsubscribe(id)
    }

    pub fn unsubscribe_bad_input(&mut self, id: SubscriptionId) -> bool {
        self.bad_input.unsubscribe(id)
    }

    pub fn unsubscribe_passing_through(&mut self, id: SubscriptionId) -> bool {
        self.passing_through.unsubscribe(id)
    }

    /// Replay every live node as an `Added` event. Right after construction
    /// or reset that is exactly the three reserved nodes; on a first
    /// subscription later in an epoch it also covers nodes the subscriber
    /// missed.
    fn emit_initial_state(&mut self) {
        for index in self.arena.indices().collect::<Vec<_>>() {
            self.updated_nodes.notify(&NodeUpdate {
                node: index,
                parent: NodeIndex::NULL,
                edge_symbol: None,
                kind: NodeUpdateKind::Added,
                snapshot: self.arena.get(index).clone(),
            });
        }
        self.preamble_sent = true;
    }

    /// Release-mode invariant check. Link and totality conditions apply
    /// only once the automaton is ready.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        let size = self.arena.len();
        if size < NodeArena::RESERVED {
            return Err(InvariantViolation::MissingReservedNodes(size));
        }
        for slot in 0..self.arena.width() {
            let found = self.arena.get(NodeIndex::PRE_ROOT).edge(slot);
            if found != NodeIndex::ROOT {
                return Err(InvariantViolation::PreRootEdge { slot, found });
            }
        }

        let ready = self.phase == Phase::Ready;
        let in_arena = |index: NodeIndex| index.as_usize() < size;
        for node in self.arena.indices().skip(NodeIndex::ROOT.as_usize()) {
            let data = self.arena.get(node);
            for (slot, &found) in data.edges().iter().enumerate() {
                let ok = if ready {
                    found.as_usize() >= NodeIndex::ROOT.as_usize() && in_arena(found)
                } else {
                    found.is_null() || (found.as_usize() >= NodeIndex::PRE_ROOT.as_usize() && in_arena(found))
                };
                if !ok {
                    return Err(InvariantViolation::EdgeOutOfRange { node, slot, found });
                }
            }
            if ready {
                let suffix = data.suffix_link;
                if suffix.is_null() || !in_arena(suffix) {
                    return Err(InvariantViolation::SuffixLinkOutOfRange {
                        node,
                        found: suffix,
                    });
                }
                let compressed = data.compressed_suffix_link;
                if compressed.is_null() || !in_arena(compressed) {
                    return Err(InvariantViolation::CompressedLinkOutOfRange {
                        node,
                        found: compressed,
                    });
                }
            }
            if let Some(word) = data.word
                && word.as_usize() >= self.pattern_lengths.len()
            {
                return Err(InvariantViolation::WordOutOfRange {
                    node,
                    word,
                    patterns: self.pattern_lengths.len(),
                });
            }
        }

        if ready {
            let root = self.arena.get(NodeIndex::ROOT);
            if root.suffix_link != NodeIndex::PRE_ROOT
                || root.compressed_suffix_link != NodeIndex::ROOT
            {
                return Err(InvariantViolation::RootLinks {
                    suffix: root.suffix_link,
                    compressed: root.compressed_suffix_link,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn trie() -> AcTrie {
        AcTrie::default()
    }

    fn collect_found(trie: &mut AcTrie) -> Rc<RefCell<Vec<(Vec<u8>, usize)>>> {
        let found = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&found);
        trie.subscribe_found_substrings(move |f: &FoundSubstring| {
            sink.borrow_mut().push((f.matched.clone(), f.start));
        });
        found
    }

    #[test]
    fn fresh_automaton_is_editable_with_reserved_nodes() {
        let trie = trie();
        assert!(!trie.is_ready());
        assert_eq!(trie.node_count(), NodeArena::RESERVED);
        assert_eq!(trie.pattern_count(), 0);
        assert!(trie.verify().is_ok());
    }

    #[test]
    fn add_pattern_extends_only_past_the_shared_prefix() {
        let mut trie = trie();
        trie.add_pattern(b"abc");
        assert_eq!(trie.node_count(), 3 + 3);
        trie.add_pattern(b"abd");
        // "ab" is shared; only "d" is new.
        assert_eq!(trie.node_count(), 3 + 4);
        assert_eq!(trie.pattern_count(), 2);
        assert!(trie.contains_pattern(b"abc"));
        assert!(trie.contains_pattern(b"abd"));
        assert!(!trie.contains_pattern(b"ab"));
    }

    #[test]
    fn scan_auto_builds_and_ready_add_resets() {
        let mut trie = trie();
        trie.add_pattern(b"ab");
        assert!(!trie.is_ready());
        trie.scan(b"ab");
        assert!(trie.is_ready());

        trie.add_pattern(b"cd");
        assert!(!trie.is_ready(), "insertion into a ready automaton resets");
        assert_eq!(trie.pattern_count(), 1, "previous patterns are gone");
        assert!(trie.contains_pattern(b"cd"));
        assert!(!trie.contains_pattern(b"ab"));
    }

    #[test]
    fn build_is_idempotent() {
        let mut trie = trie();
        trie.add_pattern(b"ab");
        trie.build();
        let events = Rc::new(RefCell::new(0usize));
        let sink = Rc::clone(&events);
        trie.subscribe_updated_nodes(move |_: &NodeUpdate| *sink.borrow_mut() += 1);
        let replay = *events.borrow();
        trie.build();
        assert_eq!(*events.borrow(), replay, "second build must emit nothing");
        assert!(trie.is_ready());
    }

    #[test]
    fn verify_holds_after_build() {
        let mut trie = trie();
        for pattern in [&b"ab"[..], b"ba", b"aa", b"fasb"] {
            trie.add_pattern(pattern);
        }
        trie.build();
        assert!(trie.verify().is_ok());
        // Totalized transition function: every edge of every node real.
        for node in [NodeIndex::ROOT, NodeIndex::from_usize(3)] {
            for &edge in trie.node(node).edges() {
                assert!(edge.as_usize() >= NodeIndex::ROOT.as_usize());
                assert!(edge.as_usize() < trie.node_count());
            }
        }
        // Root links are the fixed point of the suffix chain.
        assert_eq!(trie.node(NodeIndex::ROOT).suffix_link, NodeIndex::PRE_ROOT);
        assert_eq!(
            trie.node(NodeIndex::ROOT).compressed_suffix_link,
            NodeIndex::ROOT
        );
    }

    #[test]
    fn bad_pattern_byte_is_all_or_nothing() {
        let mut trie = trie();
        let rejected = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&rejected);
        trie.subscribe_bad_input(move |b: &BadPatternByte| sink.borrow_mut().push(*b));

        trie.add_pattern(b"ok");
        let nodes_before = trie.node_count();
        trie.add_pattern(b"ab\x01cd");
        assert_eq!(
            *rejected.borrow(),
            vec![BadPatternByte { index: 2, byte: 1 }]
        );
        assert_eq!(trie.node_count(), nodes_before, "no partial insertion");
        assert_eq!(trie.pattern_count(), 1);
    }

    #[test]
    fn empty_pattern_is_rejected() {
        let mut trie = trie();
        let rejected = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&rejected);
        trie.subscribe_bad_input(move |b: &BadPatternByte| sink.borrow_mut().push(*b));
        trie.add_pattern(b"");
        assert_eq!(
            *rejected.borrow(),
            vec![BadPatternByte { index: 0, byte: 0 }]
        );
        assert_eq!(trie.pattern_count(), 0);
        assert_eq!(trie.node_count(), NodeArena::RESERVED);
    }

    #[test]
    fn first_updated_nodes_subscriber_receives_initial_state_once() {
        let mut trie = trie();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        trie.subscribe_updated_nodes(move |u: &NodeUpdate| {
            sink.borrow_mut().push((u.node, u.kind));
        });
        assert_eq!(
            *seen.borrow(),
            vec![
                (NodeIndex::NULL, NodeUpdateKind::Added),
                (NodeIndex::PRE_ROOT, NodeUpdateKind::Added),
                (NodeIndex::ROOT, NodeUpdateKind::Added),
            ]
        );

        // A second subscriber does not retrigger the replay.
        let before = seen.borrow().len();
        trie.subscribe_updated_nodes(|_: &NodeUpdate| {});
        assert_eq!(seen.borrow().len(), before);
    }

    #[test]
    fn late_subscriber_can_reconstruct_existing_nodes() {
        let mut trie = trie();
        trie.add_pattern(b"ab");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        trie.subscribe_updated_nodes(move |u: &NodeUpdate| sink.borrow_mut().push(u.node));
        // Replay covers reserved nodes and both pattern nodes.
        assert_eq!(seen.borrow().len(), 5);
    }

    #[test]
    fn reset_rearms_the_initial_state_replay() {
        let mut trie = trie();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        trie.subscribe_updated_nodes(move |u: &NodeUpdate| {
            sink.borrow_mut().push((u.node, u.kind));
        });
        trie.add_pattern(b"x");
        seen.borrow_mut().clear();
        trie.reset();
        assert_eq!(
            *seen.borrow(),
            vec![
                (NodeIndex::NULL, NodeUpdateKind::Added),
                (NodeIndex::PRE_ROOT, NodeUpdateKind::Added),
                (NodeIndex::ROOT, NodeUpdateKind::Added),
            ]
        );
    }

    #[test]
    fn reinserting_a_pattern_keeps_matches_but_renumbers() {
        let mut trie = trie();
        trie.add_pattern(b"abc");
        trie.add_pattern(b"abc");
        // The length table leaks one slot; match output is unaffected.
        assert_eq!(trie.pattern_count(), 2);
        let found = collect_found(&mut trie);
        trie.scan(b"abc");
        assert_eq!(*found.borrow(), vec![(b"abc".to_vec(), 0)]);
    }

    #[test]
    fn scan_emits_passing_through_for_every_byte() {
        let mut trie = trie();
        trie.add_pattern(b"ab");
        let steps = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&steps);
        trie.subscribe_passing_through(move |p: &PassingThrough| sink.borrow_mut().push(p.node));
        trie.scan(b"a\x01b");
        let steps = steps.borrow();
        assert_eq!(steps.len(), 3);
        // The out-of-alphabet byte drops the scanner back to the root, so
        // the final 'b' starts from scratch.
        assert_eq!(steps[1], NodeIndex::ROOT);
        assert_eq!(steps[2], trie.node(NodeIndex::ROOT).edge(
            trie.alphabet().index_of(b'b').unwrap()
        ));
    }

    #[test]
    fn unsubscribed_observer_stops_receiving() {
        let mut trie = trie();
        let found = Rc::new(RefCell::new(0usize));
        let sink = Rc::clone(&found);
        let id = trie.subscribe_found_substrings(move |_: &FoundSubstring| {
            *sink.borrow_mut() += 1;
        });
        trie.add_pattern(b"a");
        trie.scan(b"a");
        assert_eq!(*found.borrow(), 1);
        assert!(trie.unsubscribe_found_substrings(id));
        trie.scan(b"a");
        assert_eq!(*found.borrow(), 1);
    }

    #[test]
    fn empty_text_scan_emits_no_scan_events() {
        let mut trie = trie();
        trie.add_pattern(b"a");
        let steps = Rc::new(RefCell::new(0usize));
        let sink = Rc::clone(&steps);
        trie.subscribe_passing_through(move |_: &PassingThrough| *sink.borrow_mut() += 1);
        let found = collect_found(&mut trie);
        trie.scan(b"");
        assert_eq!(*steps.borrow(), 0);
        assert!(found.borrow().is_empty());
        assert!(trie.is_ready(), "auto-build still ran");
    }
}
