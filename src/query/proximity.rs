//! Inverted lists of the synonym and proximity operators.
//!
//! Each function consumes the cursors of already initialized operands and
//! returns the complete list, so the parent node can be iterated like a term.

use crate::index::{DocId, Field, InvertedList, Position};
use crate::query::node::QueryNode;

/// Union of the operands' postings. Positions are merged in ascending order
/// and the term frequency at a document is the sum over the operands.
pub(crate) fn synonym(args: &mut [QueryNode], field: Field) -> InvertedList {
    let mut list = InvertedList::new(field);

    while let Some(doc) = args.iter().filter_map(QueryNode::current).min() {
        let mut positions: Vec<Position> = Vec::new();
        for arg in args.iter_mut() {
            if arg.current() == Some(doc) {
                if let Some(posting) = arg.posting() {
                    positions.extend_from_slice(&posting.positions);
                }
                arg.advance_past(doc);
            }
        }
        positions.sort_unstable();
        list.append_posting(doc, positions);
    }
    list
}

/// Ordered window: operands appear in argument order, each at most
/// `distance` positions after the previous one. The recorded position of a
/// match is the last operand's.
pub(crate) fn near(args: &mut [QueryNode], distance: u32, field: Field) -> InvertedList {
    if let Some(list) = pass_through(args, field) {
        return list;
    }
    let mut list = InvertedList::new(field);

    while let Some(doc) = next_common_doc(args) {
        let mut positions = Vec::new();
        loop {
            match near_chain(args, distance) {
                Some(pos) => {
                    positions.push(pos);
                    for arg in args.iter_mut() {
                        arg.position_advance();
                    }
                }
                None => {
                    args[0].position_advance();
                    let Some(anchor) = args[0].position_current() else {
                        break;
                    };
                    for arg in &mut args[1..] {
                        arg.position_reset();
                        arg.position_advance_past(anchor);
                    }
                }
            }
        }

        if !positions.is_empty() {
            list.append_posting(doc, positions);
        }
        for arg in args.iter_mut() {
            arg.advance_past(doc);
        }
    }
    list
}

/// Try to extend the first operand's current position into a full chain.
fn near_chain(args: &mut [QueryNode], distance: u32) -> Option<Position> {
    let mut last = None;
    for i in 1..args.len() {
        let prev = args[i - 1].position_current()?;
        args[i].position_advance_past(prev);
        let pos = args[i].position_current()?;
        if pos - prev > distance {
            return None;
        }
        last = Some(pos);
    }
    last
}

/// Unordered window: every operand has a position inside a span of fewer
/// than `size` tokens. The recorded position is the rightmost one.
pub(crate) fn window(args: &mut [QueryNode], size: u32, field: Field) -> InvertedList {
    if let Some(list) = pass_through(args, field) {
        return list;
    }
    let mut list = InvertedList::new(field);

    while let Some(doc) = next_common_doc(args) {
        let mut positions = Vec::new();
        'positions: loop {
            let mut left: Option<(usize, Position)> = None;
            let mut right = 0;
            for (i, arg) in args.iter().enumerate() {
                let Some(pos) = arg.position_current() else {
                    break 'positions;
                };
                if left.is_none_or(|(_, l)| pos < l) {
                    left = Some((i, pos));
                }
                right = right.max(pos);
            }
            let Some((leftmost, left_pos)) = left else {
                break;
            };

            // A span over a single position (repeated operand) does not count
            if right > left_pos && right - left_pos < size {
                positions.push(right);
                for arg in args.iter_mut() {
                    arg.position_advance();
                }
            } else {
                args[leftmost].position_advance();
            }
        }

        if !positions.is_empty() {
            list.append_posting(doc, positions);
        }
        for arg in args.iter_mut() {
            arg.advance_past(doc);
        }
    }
    list
}

/// Zero operands give an empty list; a single operand is passed through.
fn pass_through(args: &[QueryNode], field: Field) -> Option<InvertedList> {
    match args {
        [] => Some(InvertedList::new(field)),
        [only] => Some(only.inverted_list().cloned().unwrap_or_else(|| InvertedList::new(field))),
        _ => None,
    }
}

/// Next document present in every operand's list, with all cursors on it.
fn next_common_doc(args: &mut [QueryNode]) -> Option<DocId> {
    let (first, rest) = args.split_first_mut()?;
    'search: loop {
        let doc = first.current()?;
        for arg in rest.iter_mut() {
            arg.advance_to(doc);
            let other = arg.current()?;
            if other != doc {
                first.advance_to(other);
                continue 'search;
            }
        }
        return Some(doc);
    }
}
