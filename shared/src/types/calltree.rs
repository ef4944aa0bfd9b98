//! Call tree reconstruction
//!
//! Rebuilds the nested call structure from a flat event sequence. Returns are
//! matched positionally against the most recent open call, so building a tree
//! doubles as a check of the nesting invariant.

use crate::types::events::{Call, Event, Timestamps};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CallTreeError {
    #[error("return at event {index} has no open call")]
    UnmatchedReturn { index: usize },

    #[error("{open} call(s) still open at end of trace")]
    Unclosed { open: usize },
}

/// A completed call with its nested callees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallNode {
    pub class_name: String,
    pub method_name: String,
    pub source_file: Option<String>,
    pub source_line: Option<u32>,
    pub start: Timestamps,
    pub end: Timestamps,
    pub children: Vec<CallNode>,
}

impl CallNode {
    fn open(call: &Call) -> OpenCall {
        OpenCall {
            call: call.clone(),
            children: Vec::new(),
        }
    }

    /// "Class method"
    pub fn label(&self) -> String {
        format!("{} {}", self.class_name, self.method_name)
    }

    pub fn wall_duration(&self) -> f64 {
        self.end.wall_clock - self.start.wall_clock
    }

    pub fn cpu_duration(&self) -> f64 {
        self.end.cpu_clock - self.start.cpu_clock
    }

    fn depth(&self) -> usize {
        1 + self.children.iter().map(CallNode::depth).max().unwrap_or(0)
    }

    fn count(&self) -> usize {
        1 + self.children.iter().map(CallNode::count).sum::<usize>()
    }

    fn stamps_in_order(&self, out: &mut Vec<Timestamps>) {
        out.push(self.start);
        for child in &self.children {
            child.stamps_in_order(out);
        }
        out.push(self.end);
    }
}

struct OpenCall {
    call: Call,
    children: Vec<CallNode>,
}

impl OpenCall {
    fn close(self, end: Timestamps) -> CallNode {
        CallNode {
            start: self.call.timestamps(),
            class_name: self.call.class_name,
            method_name: self.call.method_name,
            source_file: self.call.source_file,
            source_line: self.call.source_line,
            end,
            children: self.children,
        }
    }
}

/// Summary numbers for a call tree
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TreeStats {
    pub calls: usize,
    pub max_depth: usize,
    pub root_wall_time: f64,
    pub root_cpu_time: f64,
}

/// Top-level calls of a trace, in order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CallTree {
    pub roots: Vec<CallNode>,
}

impl CallTree {
    /// Build a tree, failing on a return without an open call or on calls
    /// left open at the end.
    pub fn from_events(events: &[Event]) -> Result<Self, CallTreeError> {
        let mut stack: Vec<OpenCall> = Vec::new();
        let mut roots = Vec::new();

        for (index, event) in events.iter().enumerate() {
            match event {
                Event::Call(call) => stack.push(CallNode::open(call)),
                Event::Return(ret) => {
                    let open = stack
                        .pop()
                        .ok_or(CallTreeError::UnmatchedReturn { index })?;
                    let node = open.close(ret.timestamps());
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => roots.push(node),
                    }
                }
            }
        }

        if !stack.is_empty() {
            return Err(CallTreeError::Unclosed { open: stack.len() });
        }
        Ok(Self { roots })
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Labels in call order with their depth (0 for roots)
    pub fn labels(&self) -> Vec<(usize, String)> {
        fn walk(node: &CallNode, depth: usize, out: &mut Vec<(usize, String)>) {
            out.push((depth, node.label()));
            for child in &node.children {
                walk(child, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        for root in &self.roots {
            walk(root, 0, &mut out);
        }
        out
    }

    /// True when wall and cpu clocks never decrease in event order
    pub fn is_monotonic(&self) -> bool {
        let mut stamps = Vec::new();
        for root in &self.roots {
            root.stamps_in_order(&mut stamps);
        }
        stamps.windows(2).all(|w| w[1].not_before(&w[0]))
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            calls: self.roots.iter().map(CallNode::count).sum(),
            max_depth: self.roots.iter().map(CallNode::depth).max().unwrap_or(0),
            root_wall_time: self.roots.iter().map(CallNode::wall_duration).sum(),
            root_cpu_time: self.roots.iter().map(CallNode::cpu_duration).sum(),
        }
    }

    /// Indented text rendering, one call per line
    pub fn render(&self) -> String {
        fn walk(node: &CallNode, depth: usize, out: &mut String) {
            let _ = write!(out, "{}{}", "    ".repeat(depth), node.label());
            if let (Some(file), Some(line)) = (&node.source_file, node.source_line) {
                let _ = write!(out, " ({}:{})", file, line);
            }
            let _ = writeln!(
                out,
                " wall={:.9}s cpu={:.9}s",
                node.wall_duration(),
                node.cpu_duration()
            );
            for child in &node.children {
                walk(child, depth + 1, out);
            }
        }
        let mut out = String::new();
        for root in &self.roots {
            walk(root, 0, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::events::Return;

    fn call(class: &str, method: &str, t: f64) -> Event {
        Event::Call(Call::new(class, method, None, None, Timestamps::new(t, t / 2.0)))
    }

    fn ret(t: f64) -> Event {
        Event::Return(Return::new(Timestamps::new(t, t / 2.0)))
    }

    #[test]
    fn test_nested_calls_build_tree() {
        let events = vec![
            call("Class", "new", 1.0),
            call("BasicObject", "initialize", 2.0),
            ret(3.0),
            call("Special", "omg", 4.0),
            ret(5.0),
            ret(6.0),
            call("String", "strip", 7.0),
            ret(8.0),
        ];
        let tree = CallTree::from_events(&events).unwrap();
        assert_eq!(
            tree.labels(),
            vec![
                (0, "Class new".to_string()),
                (1, "BasicObject initialize".to_string()),
                (1, "Special omg".to_string()),
                (0, "String strip".to_string()),
            ]
        );
        assert!(tree.is_monotonic());

        let stats = tree.stats();
        assert_eq!(stats.calls, 4);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.root_wall_time, 6.0);
    }

    #[test]
    fn test_unmatched_return_is_rejected() {
        let events = vec![call("A", "a", 1.0), ret(2.0), ret(3.0)];
        assert_eq!(
            CallTree::from_events(&events),
            Err(CallTreeError::UnmatchedReturn { index: 2 })
        );
    }

    #[test]
    fn test_unclosed_call_is_rejected() {
        let events = vec![call("A", "a", 1.0), call("B", "b", 2.0), ret(3.0)];
        assert_eq!(
            CallTree::from_events(&events),
            Err(CallTreeError::Unclosed { open: 1 })
        );
    }

    #[test]
    fn test_empty_trace_is_empty_tree() {
        let tree = CallTree::from_events(&[]).unwrap();
        assert!(tree.is_empty());
        assert!(tree.is_monotonic());
        assert_eq!(tree.stats(), TreeStats::default());
    }

    #[test]
    fn test_clock_going_backwards_is_detected() {
        let events = vec![call("A", "a", 2.0), ret(1.0)];
        let tree = CallTree::from_events(&events).unwrap();
        assert!(!tree.is_monotonic());
    }

    #[test]
    fn test_render_indents_children() {
        let events = vec![call("A", "a", 1.0), call("B", "b", 1.5), ret(2.0), ret(3.0)];
        let rendered = CallTree::from_events(&events).unwrap().render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].starts_with("A a wall="));
        assert!(lines[1].starts_with("    B b wall="));
    }
}
