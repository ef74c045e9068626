use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::Matcher;

/// Stable index of a state in the compiled [StateGraph].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct StateId(pub(crate) usize);

/// A guarded edge between two states.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Transition {
    pub(crate) matcher: Matcher,
    pub(crate) next: StateId,
    pub(crate) set_crc: bool,
}

impl Transition {
    pub fn new(matcher: Matcher, next: StateId) -> Self {
        Self {
            matcher,
            next,
            set_crc: false,
        }
    }

    /// Creates a transition into a CRC-wait state (last field of a command).
    pub fn into_crc(matcher: Matcher, next: StateId) -> Self {
        Self {
            matcher,
            next,
            set_crc: true,
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn next(&self) -> StateId {
        self.next
    }

    pub fn set_crc(&self) -> bool {
        self.set_crc
    }
}

/// One bound callback argument: where it sits in the frame buffer and how
/// many bytes the parameter reads.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct Argument {
    pub(crate) offset: usize,
    pub(crate) size: usize,
}

impl Argument {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// The callback invocation carried by an operation state.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Operation {
    pub(crate) callback: String,
    pub(crate) args: Vec<Argument>,
}

impl Operation {
    pub fn callback(&self) -> &str {
        self.callback.as_str()
    }

    pub fn args(&self) -> &[Argument] {
        self.args.as_slice()
    }
}

/// One state of the generated byte-at-a-time machine.
///
/// Branch states own transitions; operation states carry the callback
/// invocation and nothing else. `pos` is the count of frame bytes consumed
/// to reach the state.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct State {
    pub(crate) name: String,
    pub(crate) pos: usize,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) op: Option<Operation>,
}

impl State {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn transitions(&self) -> &[Transition] {
        self.transitions.as_slice()
    }

    pub fn operation(&self) -> Option<&Operation> {
        self.op.as_ref()
    }

    pub fn is_operation(&self) -> bool {
        self.op.is_some()
    }
}

/// Arena of compiled states; the root sits at index 0 and transitions hold
/// child indices, so the tree serialises and diffs without cycles.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct StateGraph {
    states: Vec<State>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self { states: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, State> {
        self.states.iter()
    }

    /// Allocates a fresh state, suffixing `_1`, `_2`, ... onto the base name
    /// until it is unique in the graph.
    pub(crate) fn alloc(&mut self, base_name: &str, pos: usize) -> StateId {
        let mut name = base_name.to_string();
        let mut count = 1usize;

        while self.states.iter().any(|state| state.name == name) {
            name = format!("{base_name}_{count}");
            count += 1;
        }

        log::trace!("state {name} at byte {pos}");

        let id = StateId(self.states.len());
        self.states.push(State {
            name,
            pos,
            transitions: Vec::new(),
            op: None,
        });

        id
    }

    pub(crate) fn add_transition(&mut self, from: StateId, transition: Transition) {
        self[from].transitions.push(transition);
    }

    /// Finds an existing transition whose matcher is structurally equal
    /// (prefix merging), returning its target and CRC marking.
    pub(crate) fn find_transition(&self, from: StateId, matcher: &Matcher) -> Option<(StateId, bool)> {
        self[from]
            .transitions
            .iter()
            .find(|t| t.matcher.same_match(matcher))
            .map(|t| (t.next, t.set_crc))
    }
}

impl Index<StateId> for StateGraph {
    type Output = State;

    fn index(&self, id: StateId) -> &Self::Output {
        &self.states[id.0]
    }
}

impl IndexMut<StateId> for StateGraph {
    fn index_mut(&mut self, id: StateId) -> &mut Self::Output {
        &mut self.states[id.0]
    }
}
