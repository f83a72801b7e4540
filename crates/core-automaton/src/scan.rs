//! Streaming text scan over the totalized transition function.

use core_config::Alphabet;
use core_ports::MulticastPort;
use tracing::trace;

use crate::arena::{NodeArena, NodeIndex};
use crate::events::{FoundSubstring, PassingThrough};

pub(crate) fn run(
    arena: &NodeArena,
    pattern_lengths: &[u32],
    alphabet: &Alphabet,
    text: &[u8],
    passing_through: &mut MulticastPort<PassingThrough>,
    found_substrings: &mut MulticastPort<FoundSubstring>,
) {
    let mut current = NodeIndex::ROOT;
    for (position, &byte) in text.iter().enumerate() {
        let Some(slot) = alphabet.index_of(byte) else {
            // Out-of-alphabet text bytes restart matching at the root;
            // unlike pattern bytes they are not an error.
            current = NodeIndex::ROOT;
            passing_through.notify(&PassingThrough { node: current });
            continue;
        };

        current = arena.get(current).edge(slot);
        debug_assert!(!current.is_null(), "scan walked into the null node");
        passing_through.notify(&PassingThrough { node: current });

        // The match ending exactly here comes first, then every shorter
        // occurrence reachable through the compressed suffix chain. The
        // chain ends at the root and visits accepting states only.
        if arena.get(current).is_accepting() {
            emit(arena, pattern_lengths, text, position, current, found_substrings);
        }
        let mut link = arena.get(current).compressed_suffix_link;
        while link != NodeIndex::ROOT {
            debug_assert!(!link.is_null());
            debug_assert!(arena.get(link).is_accepting());
            emit(arena, pattern_lengths, text, position, link, found_substrings);
            link = arena.get(link).compressed_suffix_link;
        }
    }
}

fn emit(
    arena: &NodeArena,
    pattern_lengths: &[u32],
    text: &[u8],
    position: usize,
    node: NodeIndex,
    found_substrings: &mut MulticastPort<FoundSubstring>,
) {
    let word = arena
        .get(node)
        .word
        .expect("accepting node carries a pattern id");
    let length = pattern_lengths[word.as_usize()] as usize;
    let start = position + 1 - length;
    trace!(target: "actrie.scan", node = %node, start, length, "occurrence");
    found_substrings.notify(&FoundSubstring {
        matched: text[start..=position].to_vec(),
        start,
        node,
    });
}
