//! Renderer collaborator: folds the automaton's event stream into a
//! viewable model and paints text frames.
//!
//! The automaton exposes four separately typed ports; this side collapses
//! them into one tagged-sum [`TrieEvent`] queue and consumes them in
//! arrival order, which is exactly emission order because notification is
//! synchronous. The queue is bounded: past capacity the oldest entries are
//! dropped (and counted), favouring liveness of the frame over completeness
//! of history.
//!
//! Rendering is a pure function of the folded model, written to any
//! `io::Write`. ANSI styling via crossterm is opt-in so tests and piped
//! output stay plain.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::rc::Rc;

use core_automaton::{
    AcTrie, BadPatternByte, FoundSubstring, NodeIndex, NodeUpdate, NodeUpdateKind, PassingThrough,
};
use crossterm::style::Stylize;
use tracing::warn;

/// All four port payloads as one queue entry.
#[derive(Debug, Clone)]
pub enum TrieEvent {
    Node(NodeUpdate),
    Found(FoundSubstring),
    BadInput(BadPatternByte),
    Step(PassingThrough),
}

struct EventQueue {
    events: VecDeque<TrieEvent>,
    capacity: usize,
    dropped: u64,
}

impl EventQueue {
    fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    fn push(&mut self, event: TrieEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            if self.dropped == 0 {
                warn!(
                    target: "render",
                    capacity = self.capacity,
                    "event queue overflow, dropping oldest"
                );
            }
            self.dropped += 1;
        }
        self.events.push_back(event);
    }
}

/// Display state of one node, derived from the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Added,
    LinksComputed,
    Matched,
}

/// Event-driven mirror of the automaton, plus frame painting.
pub struct Renderer {
    queue: Rc<RefCell<EventQueue>>,
    node_status: BTreeMap<NodeIndex, NodeStatus>,
    matches: Vec<FoundSubstring>,
    bad_inputs: Vec<BadPatternByte>,
    cursor: Option<NodeIndex>,
    steps: u64,
    ansi: bool,
}

impl Renderer {
    /// Subscribe to all four ports of `trie`. Attaching to a fresh
    /// automaton also delivers the initial-state replay, so the mirror
    /// starts complete.
    pub fn attach(trie: &mut AcTrie, event_capacity: usize, ansi: bool) -> Self {
        let queue = Rc::new(RefCell::new(EventQueue::new(event_capacity)));
        {
            let queue = Rc::clone(&queue);
            trie.subscribe_updated_nodes(move |u: &NodeUpdate| {
                queue.borrow_mut().push(TrieEvent::Node(u.clone()));
            });
        }
        {
            let queue = Rc::clone(&queue);
            trie.subscribe_found_substrings(move |f: &FoundSubstring| {
                queue.borrow_mut().push(TrieEvent::Found(f.clone()));
            });
        }
        {
            let queue = Rc::clone(&queue);
            trie.subscribe_bad_input(move |b: &BadPatternByte| {
                queue.borrow_mut().push(TrieEvent::BadInput(*b));
            });
        }
        {
            let queue = Rc::clone(&queue);
            trie.subscribe_passing_through(move |p: &PassingThrough| {
                queue.borrow_mut().push(TrieEvent::Step(*p));
            });
        }
        Self {
            queue,
            node_status: BTreeMap::new(),
            matches: Vec::new(),
            bad_inputs: Vec::new(),
            cursor: None,
            steps: 0,
            ansi,
        }
    }

    /// Consume everything queued since the last drain. Returns the number
    /// of absorbed events.
    pub fn drain(&mut self) -> usize {
        let mut absorbed = 0;
        loop {
            let event = self.queue.borrow_mut().events.pop_front();
            let Some(event) = event else { break };
            self.absorb(event);
            absorbed += 1;
        }
        absorbed
    }

    fn absorb(&mut self, event: TrieEvent) {
        match event {
            TrieEvent::Node(update) => {
                let status = match update.kind {
                    NodeUpdateKind::Added => NodeStatus::Added,
                    NodeUpdateKind::LinksComputed => NodeStatus::LinksComputed,
                };
                self.node_status.insert(update.node, status);
            }
            TrieEvent::Found(found) => {
                self.node_status.insert(found.node, NodeStatus::Matched);
                self.matches.push(found);
            }
            TrieEvent::BadInput(bad) => self.bad_inputs.push(bad),
            TrieEvent::Step(step) => {
                self.cursor = Some(step.node);
                self.steps += 1;
            }
        }
    }

    /// Forget scan history (matches, bad inputs, cursor) but keep the node
    /// mirror. Called by front-ends between scans.
    pub fn clear_history(&mut self) {
        self.matches.clear();
        self.bad_inputs.clear();
        self.cursor = None;
        self.steps = 0;
    }

    pub fn node_status(&self, node: NodeIndex) -> Option<NodeStatus> {
        self.node_status.get(&node).copied()
    }

    pub fn matches(&self) -> &[FoundSubstring] {
        &self.matches
    }

    pub fn bad_inputs(&self) -> &[BadPatternByte] {
        &self.bad_inputs
    }

    pub fn dropped_events(&self) -> u64 {
        self.queue.borrow().dropped
    }

    /// Paint one frame of the folded model.
    pub fn render_to(&self, out: &mut impl Write) -> io::Result<()> {
        const MATCH_TAIL: usize = 10;

        let linked = self
            .node_status
            .values()
            .filter(|s| matches!(s, NodeStatus::LinksComputed | NodeStatus::Matched))
            .count();
        let header = format!(
            "nodes: {} ({} linked)   matches: {}   steps: {}",
            self.node_status.len(),
            linked,
            self.matches.len(),
            self.steps,
        );
        writeln!(out, "{}", self.paint(&header, Paint::Header))?;

        if let Some(cursor) = self.cursor {
            writeln!(out, "cursor: {cursor}")?;
        }

        if !self.matches.is_empty() {
            writeln!(out, "matches:")?;
            let skipped = self.matches.len().saturating_sub(MATCH_TAIL);
            if skipped > 0 {
                writeln!(out, "  ... {skipped} earlier")?;
            }
            for found in self.matches.iter().skip(skipped) {
                let line = format!(
                    "  {:?} @ {} ({})",
                    found.matched_lossy(),
                    found.start,
                    found.node
                );
                writeln!(out, "{}", self.paint(&line, Paint::Match))?;
            }
        }

        for bad in &self.bad_inputs {
            let line = format!(
                "bad pattern byte 0x{:02x} at offset {}",
                bad.byte, bad.index
            );
            writeln!(out, "{}", self.paint(&line, Paint::Error))?;
        }

        if self.dropped_events() > 0 {
            writeln!(out, "({} events dropped)", self.dropped_events())?;
        }
        Ok(())
    }

    fn paint(&self, line: &str, paint: Paint) -> String {
        if !self.ansi {
            return line.to_string();
        }
        match paint {
            Paint::Header => line.bold().to_string(),
            Paint::Match => line.green().to_string(),
            Paint::Error => line.red().to_string(),
        }
    }
}

#[derive(Clone, Copy)]
enum Paint {
    Header,
    Match,
    Error,
}
