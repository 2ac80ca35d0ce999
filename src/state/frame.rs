//! Frame stack
//!
//! One frame per active sub-flow; the top frame is the one executing. A
//! frame whose cursor is `None` has finished its program and is popped on
//! the next loop iteration, discarding its local storage.

use crate::program::{Command, NodeId, ProgramId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One activation record of a sub-flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub program_id: ProgramId,
    /// Cursor within the program; `None` means finished
    pub node_id: Option<NodeId>,
    /// Ephemeral storage destroyed with the frame
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub local: HashMap<String, Value>,
    /// Commands armed while this frame is on the stack
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,
}

impl Frame {
    pub fn new(program_id: impl Into<ProgramId>, node_id: impl Into<NodeId>) -> Self {
        Self {
            program_id: program_id.into(),
            node_id: Some(node_id.into()),
            local: HashMap::new(),
            commands: Vec::new(),
        }
    }

    pub fn with_commands(mut self, commands: Vec<Command>) -> Self {
        self.commands = commands;
        self
    }
}

/// Ordered list of frames; last element is the active one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new(root: Frame) -> Self {
        Self { frames: vec![root] }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Pop the active frame, discarding its local storage
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Frames from bottom (0) to top
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame_mut(&mut self, index: usize) -> Option<&mut Frame> {
        self.frames.get_mut(index)
    }

    /// Drop every frame above `index`, making it the top
    pub fn truncate_above(&mut self, index: usize) {
        self.frames.truncate(index + 1);
    }

    /// Replace the frame at `index` (used by cross-program jumps)
    pub fn replace(&mut self, index: usize, frame: Frame) {
        if index < self.frames.len() {
            self.frames[index] = frame;
        }
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Search innermost -> outermost, yielding `(index, frame)`
    pub fn iter_innermost(&self) -> impl Iterator<Item = (usize, &Frame)> {
        self.frames.iter().enumerate().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_restores_outer_cursor() {
        let mut stack = FrameStack::new(Frame::new("root", "n5"));
        stack.push(Frame::new("sub", "s1"));
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.top().unwrap().program_id, "sub");

        stack.pop();
        let top = stack.top().unwrap();
        assert_eq!(top.program_id, "root");
        assert_eq!(top.node_id.as_deref(), Some("n5"));
    }

    #[test]
    fn test_local_storage_dies_with_frame() {
        let mut stack = FrameStack::new(Frame::new("root", "n1"));
        let mut sub = Frame::new("sub", "s1");
        sub.local.insert("tmp".into(), Value::from(42));
        stack.push(sub);

        let popped = stack.pop().unwrap();
        assert_eq!(popped.local.get("tmp"), Some(&Value::from(42)));
        assert!(stack.top().unwrap().local.is_empty());
    }

    #[test]
    fn test_innermost_iteration_order() {
        let mut stack = FrameStack::new(Frame::new("p0", "a"));
        stack.push(Frame::new("p1", "b"));
        stack.push(Frame::new("p2", "c"));

        let order: Vec<_> = stack
            .iter_innermost()
            .map(|(i, f)| (i, f.program_id.clone()))
            .collect();
        assert_eq!(
            order,
            vec![(2, "p2".to_string()), (1, "p1".to_string()), (0, "p0".to_string())]
        );
    }

    #[test]
    fn test_truncate_above() {
        let mut stack = FrameStack::new(Frame::new("p0", "a"));
        stack.push(Frame::new("p1", "b"));
        stack.push(Frame::new("p2", "c"));

        stack.truncate_above(0);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.top().unwrap().program_id, "p0");
    }

    #[test]
    fn test_serde_round_trip() {
        let mut stack = FrameStack::new(Frame::new("root", "n1"));
        stack.top_mut().unwrap().local.insert("k".into(), Value::from("v"));
        let json = serde_json::to_string(&stack).unwrap();
        let back: FrameStack = serde_json::from_str(&json).unwrap();
        assert_eq!(stack, back);
    }
}
