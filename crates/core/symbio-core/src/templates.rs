//! Template engine for solver and critique prompts

use crate::types::Task;
use crate::{Result, SymbioError};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Reasoning prompt for math tasks
pub const MATH_SOLVER_TEMPLATE: &str = "\
You are a careful problem solver. Solve the task below step by step.

Task: {{{prompt}}}
{{#if constraints}}Constraints: {{{constraints}}}\n{{/if}}\
You may use these tools, one per step:
- math: symbolic simplification and equation solving
- python: short programs; the last printed line is the result

Respond using exactly this format:
Thought: <your reasoning>
Tool: <tool name>
ToolInput: <tool input>
Answer: <final numeric answer only>";

/// Reasoning prompt for logic tasks
pub const LOGIC_SOLVER_TEMPLATE: &str = "\
You are a careful logician. Work through the task below.

Task: {{{prompt}}}
{{#if constraints}}Constraints: {{{constraints}}}\n{{/if}}\
You may use these tools, one per step:
- python: short programs to enumerate cases; the last printed line is the result

Respond using exactly this format:
Thought: <your reasoning>
Tool: <tool name>
ToolInput: <tool input>
Answer: <final answer, a single word or phrase>";

/// Reasoning prompt for code tasks
pub const CODE_SOLVER_TEMPLATE: &str = "\
You are a careful programmer. Implement what the task asks for.

Task: {{{prompt}}}
{{#if constraints}}Constraints: {{{constraints}}}\n{{/if}}\
You may use these tools, one per step:
- python: run your candidate to check it; the last printed line is the result
Reference a previous step's output as {{{substitution_hint}}}.

Respond using exactly this format:
Thought: <your reasoning>
Tool: <tool name>
ToolInput: <tool input>
Answer: <the function source code>";

/// Self-critique prompt used by the uncertainty estimator
pub const CRITIQUE_TEMPLATE: &str = "\
A model was asked:
{{{prompt}}}

It answered:
{{{answer}}}

Rate the probability that the answer is correct as a single number
between 0 and 1. Respond with the number only.";

/// Template engine wrapper
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    /// Create an engine with the solver and critique templates registered
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);

        // Registration of the built-in templates cannot fail
        let _ = handlebars.register_template_string("solver.math", MATH_SOLVER_TEMPLATE);
        let _ = handlebars.register_template_string("solver.logic", LOGIC_SOLVER_TEMPLATE);
        let _ = handlebars.register_template_string("solver.code", CODE_SOLVER_TEMPLATE);
        let _ = handlebars.register_template_string("critique", CRITIQUE_TEMPLATE);

        Self { handlebars }
    }

    /// Render a registered template
    pub fn render_named(
        &self,
        name: &str,
        data: &HashMap<String, serde_json::Value>,
    ) -> Result<String> {
        self.handlebars
            .render(name, data)
            .map_err(|e| SymbioError::template(e.to_string()))
    }

    /// Render an inline template string
    pub fn render(
        &self,
        template: &str,
        data: &HashMap<String, serde_json::Value>,
    ) -> Result<String> {
        self.handlebars
            .render_template(template, data)
            .map_err(|e| SymbioError::template(e.to_string()))
    }

    /// Compose the solver prompt for a task
    pub fn solver_prompt(&self, task: &Task) -> Result<String> {
        let mut data = HashMap::new();
        data.insert(
            "prompt".to_string(),
            serde_json::Value::String(task.prompt.clone()),
        );
        if !task.constraints.is_empty() {
            data.insert(
                "constraints".to_string(),
                serde_json::Value::String(task.constraints.join("; ")),
            );
        }
        data.insert(
            "substitution_hint".to_string(),
            serde_json::Value::String("{{step_1.result}}".to_string()),
        );

        let name = format!("solver.{}", task.domain.as_str());
        self.render_named(&name, &data)
    }

    /// Compose the self-critique prompt for an answer
    pub fn critique_prompt(&self, task_prompt: &str, answer: &str) -> Result<String> {
        let mut data = HashMap::new();
        data.insert(
            "prompt".to_string(),
            serde_json::Value::String(task_prompt.to_string()),
        );
        data.insert(
            "answer".to_string(),
            serde_json::Value::String(answer.to_string()),
        );
        self.render_named("critique", &data)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Domain, Task, VerifierSpec};

    #[test]
    fn test_solver_prompt_substitutes_task_fields() {
        let engine = TemplateEngine::new();
        let task = Task::new(
            "t1",
            Domain::Math,
            0.2,
            "Solve 2x + 3 = 11 for x.",
            VerifierSpec::Numeric {
                expected: 4.0,
                tolerance: 1e-6,
            },
        )
        .with_constraint("answer as a number");

        let prompt = engine.solver_prompt(&task).unwrap();
        assert!(prompt.contains("Solve 2x + 3 = 11 for x."));
        assert!(prompt.contains("answer as a number"));
        assert!(prompt.contains("Thought:"));
        assert!(prompt.contains("Answer:"));
    }

    #[test]
    fn test_code_prompt_keeps_substitution_braces() {
        let engine = TemplateEngine::new();
        let task = Task::new(
            "t2",
            Domain::Code,
            0.8,
            "Write binary_search(arr, target).",
            VerifierSpec::PythonPredicate {
                body: "True".into(),
            },
        );

        let prompt = engine.solver_prompt(&task).unwrap();
        assert!(prompt.contains("{{step_1.result}}"));
    }

    #[test]
    fn test_critique_prompt() {
        let engine = TemplateEngine::new();
        let prompt = engine.critique_prompt("What is 2+2?", "4").unwrap();
        assert!(prompt.contains("What is 2+2?"));
        assert!(prompt.contains("between 0 and 1"));
    }
}

