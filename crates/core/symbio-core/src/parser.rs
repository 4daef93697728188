//! Reasoning-trace parser: structured tool calls and a final answer
//! extracted from free-text model output

use crate::tools::PlanStep;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Recognized line markers, case-insensitive with flexible whitespace
static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(thought|toolinput|tool|answer)\s*:\s*(.*)$").unwrap());

/// One recoverable problem found while parsing a trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseIssue {
    /// 1-based line number of the offending marker
    pub line: usize,
    /// What was wrong
    pub message: String,
}

/// The structured reading of one reasoning trace
#[derive(Debug, Clone, Default)]
pub struct ParsedTrace {
    /// Tool-call templates in order of appearance
    pub steps: Vec<PlanStep>,
    /// Final answer; empty when no `Answer:` marker appeared
    pub answer: String,
    /// Thought lines, in order
    pub thoughts: Vec<String>,
    /// Recoverable problems; never aborts the parse
    pub issues: Vec<ParseIssue>,
}

impl ParsedTrace {
    /// True when the trace produced no answer marker
    pub fn answer_missing(&self) -> bool {
        self.answer.is_empty()
    }
}

/// Parse a reasoning trace
///
/// A tool call is a consecutive `Tool:` / `ToolInput:` pair. A `Tool:`
/// without its input, or a `ToolInput:` without a preceding `Tool:`, is
/// recorded as an issue and skipped; other calls are still returned. The
/// final answer is everything after the last `Answer:` marker, trimmed.
/// The parse is pure: the same text always yields the same trace.
pub fn parse_trace(text: &str) -> ParsedTrace {
    let lines: Vec<&str> = text.lines().collect();
    let mut trace = ParsedTrace::default();

    let mut pending_tool: Option<(usize, String)> = None;
    let mut last_answer: Option<(usize, String)> = None;

    for (idx, raw_line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let Some(capture) = MARKER_RE.captures(raw_line) else {
            continue;
        };
        let marker = capture[1].to_lowercase();
        let value = capture[2].trim().to_string();

        match marker.as_str() {
            "thought" => {
                trace.thoughts.push(value);
            }
            "tool" => {
                if let Some((tool_line, tool)) = pending_tool.take() {
                    trace.issues.push(ParseIssue {
                        line: tool_line,
                        message: format!("Tool '{}' has no ToolInput", tool),
                    });
                }
                pending_tool = Some((line_no, value));
            }
            "toolinput" => match pending_tool.take() {
                Some((_, tool)) => {
                    let step_id = format!("step_{}", trace.steps.len() + 1);
                    trace.steps.push(PlanStep::new(step_id, tool, value));
                }
                None => {
                    trace.issues.push(ParseIssue {
                        line: line_no,
                        message: "ToolInput without a preceding Tool".to_string(),
                    });
                }
            },
            "answer" => {
                last_answer = Some((idx, value));
            }
            _ => unreachable!("marker regex is exhaustive"),
        }
    }

    if let Some((tool_line, tool)) = pending_tool {
        trace.issues.push(ParseIssue {
            line: tool_line,
            message: format!("Tool '{}' has no ToolInput", tool),
        });
    }

    if let Some((answer_idx, first_line)) = last_answer {
        let mut parts = vec![first_line];
        for line in &lines[answer_idx + 1..] {
            parts.push(line.to_string());
        }
        trace.answer = parts.join("\n").trim().to_string();
    }

    trace
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_trace() {
        let text = "\
Thought: I should solve the equation.
Tool: math
ToolInput: 2x + 3 = 11
Answer: 4";

        let trace = parse_trace(text);
        assert_eq!(trace.steps.len(), 1);
        assert_eq!(trace.steps[0].tool, "math");
        assert_eq!(trace.steps[0].input, "2x + 3 = 11");
        assert_eq!(trace.steps[0].step_id, "step_1");
        assert_eq!(trace.answer, "4");
        assert_eq!(trace.thoughts.len(), 1);
        assert!(trace.issues.is_empty());
    }

    #[test]
    fn test_mixed_case_and_flexible_whitespace() {
        let text = "\
THOUGHT: thinking
TOOL: math
ToolInput : 1 + 1
answer:2";

        let trace = parse_trace(text);
        assert_eq!(trace.steps.len(), 1);
        assert_eq!(trace.steps[0].input, "1 + 1");
        assert_eq!(trace.answer, "2");
    }

    #[test]
    fn test_missing_answer_yields_empty_string() {
        let trace = parse_trace("Tool: math\nToolInput: 1 + 1");
        assert!(trace.answer_missing());
        assert_eq!(trace.steps.len(), 1);
    }

    #[test]
    fn test_tool_without_input_is_issue_not_abort() {
        let text = "\
Tool: math
Tool: python
ToolInput: print(1)
Answer: 1";

        let trace = parse_trace(text);
        assert_eq!(trace.steps.len(), 1);
        assert_eq!(trace.steps[0].tool, "python");
        assert_eq!(trace.issues.len(), 1);
        assert!(trace.issues[0].message.contains("math"));
    }

    #[test]
    fn test_orphan_toolinput_is_issue() {
        let trace = parse_trace("ToolInput: 1 + 1\nAnswer: 2");
        assert!(trace.steps.is_empty());
        assert_eq!(trace.issues.len(), 1);
        assert_eq!(trace.answer, "2");
    }

    #[test]
    fn test_trailing_tool_without_input_is_issue() {
        let trace = parse_trace("Answer: 4\nTool: math");
        assert_eq!(trace.issues.len(), 1);
    }

    #[test]
    fn test_last_answer_wins_and_spans_lines() {
        let text = "\
Answer: first guess
Thought: wait, reconsidering
Answer: line one
line two";

        let trace = parse_trace(text);
        assert_eq!(trace.answer, "line one\nline two");
    }

    #[test]
    fn test_interleaved_thoughts_between_calls() {
        let text = "\
Thought: step one
Tool: math
ToolInput: 1 + 1
Thought: step two
Tool: math
ToolInput: 2 + 2
Answer: done";

        let trace = parse_trace(text);
        assert_eq!(trace.steps.len(), 2);
        assert_eq!(trace.steps[1].step_id, "step_2");
        assert_eq!(trace.thoughts.len(), 2);
    }

    #[test]
    fn test_parse_is_pure() {
        let text = "Tool: math\nToolInput: 3 * 3\nAnswer: 9";
        let first = parse_trace(text);
        let second = parse_trace(text);
        assert_eq!(first.answer, second.answer);
        assert_eq!(first.steps.len(), second.steps.len());
        assert_eq!(first.steps[0].input, second.steps[0].input);
        assert_eq!(first.issues, second.issues);
    }

    #[test]
    fn test_non_marker_lines_are_ignored() {
        let text = "\
Some preamble the model wrote.
Tool: math
ToolInput: 5 - 3
More chatter.
Answer: 2";

        let trace = parse_trace(text);
        assert_eq!(trace.steps.len(), 1);
        assert_eq!(trace.answer, "2");
    }
}
