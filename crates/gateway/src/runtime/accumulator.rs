//! Streaming block accumulator.
//!
//! Blocks arrive as start/delta/stop events keyed by index and may
//! interleave, so assembly state is a map keyed on that index. A block
//! becomes visible only at its stop event, complete.

use std::collections::{BTreeMap, HashMap};

use cl_domain::history::ContentBlock;
use cl_domain::stream::BlockKind;
use serde_json::Value;

#[derive(Debug)]
enum OpenBlock {
    Text(String),
    Reasoning(String),
    ToolUse {
        id: String,
        name: String,
        input_json: String,
    },
}

#[derive(Debug, Default)]
pub struct BlockAccumulator {
    open: HashMap<usize, OpenBlock>,
    completed: BTreeMap<usize, ContentBlock>,
}

impl BlockAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, index: usize, kind: BlockKind) {
        let builder = match kind {
            BlockKind::Text => OpenBlock::Text(String::new()),
            BlockKind::Reasoning => OpenBlock::Reasoning(String::new()),
            BlockKind::ToolUse { id, name } => OpenBlock::ToolUse {
                id,
                name,
                input_json: String::new(),
            },
        };
        if self.open.insert(index, builder).is_some() {
            tracing::warn!(index, "block restarted before stop; discarding previous");
        }
    }

    pub fn delta(&mut self, index: usize, fragment: &str) {
        match self.open.get_mut(&index) {
            Some(OpenBlock::Text(buf))
            | Some(OpenBlock::Reasoning(buf)) => buf.push_str(fragment),
            Some(OpenBlock::ToolUse { input_json, .. }) => input_json.push_str(fragment),
            None => {
                tracing::debug!(index, "delta for unknown block index, ignoring");
            }
        }
    }

    /// Close the block at `index`. Returns the finished block, which is
    /// also recorded for `into_blocks`.
    pub fn stop(&mut self, index: usize) -> Option<ContentBlock> {
        let block = match self.open.remove(&index)? {
            OpenBlock::Text(text) => ContentBlock::Text { text },
            OpenBlock::Reasoning(text) => ContentBlock::Reasoning { text },
            OpenBlock::ToolUse {
                id,
                name,
                input_json,
            } => ContentBlock::ToolUse {
                id,
                name,
                input: parse_tool_input(&input_json),
            },
        };
        self.completed.insert(index, block.clone());
        Some(block)
    }

    /// Finished blocks in index order. Blocks still open when the stream
    /// ended are closed as-is rather than lost.
    pub fn into_blocks(mut self) -> Vec<ContentBlock> {
        let dangling: Vec<usize> = self.open.keys().copied().collect();
        for index in dangling {
            tracing::warn!(index, "stream ended with an open block; closing it");
            self.stop(index);
        }
        self.completed.into_values().collect()
    }
}

/// Accumulated tool input JSON → structured value. Blank input means the
/// tool takes no arguments; anything unparsable degrades to an empty
/// object so a malformed provider fragment cannot poison the turn.
fn parse_tool_input(input_json: &str) -> Value {
    if input_json.trim().is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_str(input_json) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "tool input is not valid JSON; defaulting to empty object");
            Value::Object(Default::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_text_across_deltas() {
        let mut acc = BlockAccumulator::new();
        acc.start(0, BlockKind::Text);
        acc.delta(0, "hel");
        acc.delta(0, "lo");

        let block = acc.stop(0).unwrap();
        match block {
            ContentBlock::Text { text } => assert_eq!(text, "hello"),
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn interleaved_indices_stay_separate() {
        let mut acc = BlockAccumulator::new();
        acc.start(0, BlockKind::Text);
        acc.start(1, BlockKind::Reasoning);
        acc.delta(1, "think");
        acc.delta(0, "say");
        acc.delta(1, "ing");

        acc.stop(1);
        acc.stop(0);

        let blocks = acc.into_blocks();
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[0], ContentBlock::Text { text } if text == "say"));
        assert!(matches!(&blocks[1], ContentBlock::Reasoning { text } if text == "thinking"));
    }

    #[test]
    fn tool_use_input_is_parsed_on_stop() {
        let mut acc = BlockAccumulator::new();
        acc.start(
            0,
            BlockKind::ToolUse {
                id: "t1".into(),
                name: "read".into(),
            },
        );
        acc.delta(0, "{\"path\":");
        acc.delta(0, "\"/etc/hosts\"}");

        match acc.stop(0).unwrap() {
            ContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "t1");
                assert_eq!(name, "read");
                assert_eq!(input["path"], "/etc/hosts");
            }
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn empty_tool_input_becomes_empty_object() {
        let mut acc = BlockAccumulator::new();
        acc.start(
            0,
            BlockKind::ToolUse {
                id: "t1".into(),
                name: "noop".into(),
            },
        );
        match acc.stop(0).unwrap() {
            ContentBlock::ToolUse { input, .. } => {
                assert_eq!(input, serde_json::json!({}));
            }
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn stop_of_unknown_index_is_none() {
        let mut acc = BlockAccumulator::new();
        assert!(acc.stop(7).is_none());
    }

    #[test]
    fn dangling_open_block_is_closed_at_finish() {
        let mut acc = BlockAccumulator::new();
        acc.start(0, BlockKind::Text);
        acc.delta(0, "partial");

        let blocks = acc.into_blocks();
        assert_eq!(blocks.len(), 1);
        assert!(matches!(&blocks[0], ContentBlock::Text { text } if text == "partial"));
    }
}
