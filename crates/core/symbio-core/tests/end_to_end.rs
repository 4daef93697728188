//! End-to-end scenarios across the whole co-evolution core

use std::sync::Arc;
use std::time::Duration;
use symbio_core::testing::MockEndpoint;
use symbio_core::*;
use tempfile::TempDir;

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 1,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        multiplier: 2.0,
    }
}

fn coordinator_with(
    dir: &TempDir,
    mut config: SymbioConfig,
    endpoint: Arc<MockEndpoint>,
) -> Coordinator {
    config.tooling.workdir = dir.path().join("work");
    let solver = Solver::new(
        endpoint.clone(),
        config.models.student.clone(),
        config.verification.clone(),
    )
    .with_retry_config(fast_retry());

    Coordinator::new(config, endpoint, dir.path().join("runs"))
        .unwrap()
        .with_solver(solver)
}

fn linear_math_override() -> SignalOverrides {
    SignalOverrides {
        domain: Some(Domain::Math),
        difficulty: Some(0.2),
        next_task_id: Some("t1".to_string()),
        prompt_override: Some(PromptOverride {
            prompt: "Solve 2x + 3 = 11 for x.".to_string(),
            verifier: VerifierSpec::Numeric {
                expected: 4.0,
                tolerance: 1e-6,
            },
        }),
    }
}

// Scenario: code task solved through a two-step plan, where the second
// step consumes the first step's result before executing.
#[tokio::test]
async fn code_task_with_tool_composition() {
    let dir = TempDir::new().unwrap();
    let tooling = ToolingConfig {
        workdir: dir.path().join("work"),
        timeout_seconds: 10,
        ..Default::default()
    };
    let registry = ToolRegistry::from_config(&tooling);

    let candidate = "lambda items, target: items.index(target) if target in items else -1";
    let steps = vec![
        PlanStep::new("step_A", "python", format!("print(\"{}\")", candidate)),
        PlanStep::new(
            "step_B",
            "python",
            "check = {{step_A.result}}\nprint(check([1, 3, 5, 7, 9], 7))",
        )
        .depends_on("step_A"),
    ];

    let plan = PlanComposer::new().execute(&steps, &registry).await.unwrap();
    assert!(plan.ok);
    assert_eq!(plan.calls[0].result, candidate);
    // The substitution happened before step_B executed
    assert!(plan.calls[1].input.contains("check = lambda items"));
    assert_eq!(plan.calls[1].result, "3");

    // The verifier accepts the candidate produced by step_A
    let task = Task::new(
        "t2",
        Domain::Code,
        0.8,
        "Implement search over a sorted list.",
        VerifierSpec::PythonPredicate {
            body: "({{candidate}})([1, 3, 5, 7, 9], 7) == 3 \
                   and ({{candidate}})([1, 3, 5], 2) == -1"
                .to_string(),
        },
    );
    let verdict = Verifier::new(tooling).verify(&task, &plan.calls[0].result).await;
    assert!(verdict.passed());
}

// Scenario: the student first submits dangerous code, which the review
// gate blocks; it then falls back to the math tool and still succeeds.
#[tokio::test]
async fn blocked_code_falls_back_to_math() {
    let dir = TempDir::new().unwrap();
    let endpoint = Arc::new(
        MockEndpoint::new()
            .with_solve_responses(&[
                "Thought: let me script this\n\
                 Tool: python\n\
                 ToolInput: import os; os.system(\"rm -rf /\")\n\
                 Thought: blocked, solve symbolically instead\n\
                 Tool: math\n\
                 ToolInput: 2x + 3 = 11\n\
                 Answer: 4",
            ])
            .with_critique_response("0.6"),
    );

    let mut coordinator = coordinator_with(&dir, SymbioConfig::default(), endpoint);
    let trajectory = coordinator
        .run_once_with(linear_math_override())
        .await
        .unwrap();

    assert!(trajectory.success);
    assert_eq!(trajectory.result, "4");
    assert_eq!(trajectory.tool_calls.len(), 2);
    assert_eq!(trajectory.tool_calls[0].status, ToolStatus::Blocked);
    assert!(trajectory.tool_calls[0].stderr.contains("blocked import: os"));
    assert_eq!(trajectory.tool_calls[1].status, ToolStatus::Ok);

    let events = std::fs::read_to_string(dir.path().join("runs/security_events.jsonl")).unwrap();
    assert!(events.contains("blocked_code"));
}

// Scenario: self-verification disagreement downgrades success even though
// the modal answer was correct.
#[tokio::test]
async fn self_verification_disagreement_downgrades_success() {
    let dir = TempDir::new().unwrap();
    let mut config = SymbioConfig::default();
    config.verification = VerificationConfig {
        enable: true,
        num_samples: 3,
        confidence_threshold: 0.7,
        enable_cot: true,
    };
    let endpoint = Arc::new(
        MockEndpoint::new()
            .with_solve_responses(&["Answer: 42", "Answer: 42", "Answer: 43"])
            .with_critique_response("0.9"),
    );

    let mut overrides = linear_math_override();
    overrides.prompt_override = Some(PromptOverride {
        prompt: "What is the answer?".to_string(),
        verifier: VerifierSpec::ExactString {
            expected: "42".to_string(),
        },
    });

    let mut coordinator = coordinator_with(&dir, config, endpoint);
    let trajectory = coordinator.run_once_with(overrides).await.unwrap();

    assert_eq!(trajectory.result, "42");
    let verification = trajectory.verification.unwrap();
    assert!((verification - 2.0 / 3.0).abs() < 1e-9);
    assert!(!trajectory.success);
    assert_eq!(trajectory.reward.correctness, -0.5);
}

// Invariants over a short run: every line is standalone JSON with a
// unique task id, and every reward total is the weighted component sum.
#[tokio::test]
async fn emitted_trajectories_respect_invariants() {
    let dir = TempDir::new().unwrap();
    let mut config = SymbioConfig::default();
    // Keep this run free of subprocess dependencies
    config.curriculum.domains = vec!["math".to_string(), "logic".to_string()];
    config.tooling.enable_python = false;
    let endpoint = Arc::new(
        MockEndpoint::new()
            .with_solve_responses(&["Thought: try\nTool: math\nToolInput: 1 + 1\nAnswer: 2"])
            .with_critique_response("0.5"),
    );

    let mut coordinator = coordinator_with(&dir, config.clone(), endpoint);
    for _ in 0..8 {
        coordinator.run_once().await;
    }

    let raw = std::fs::read_to_string(dir.path().join("runs/trajectories.jsonl")).unwrap();
    let mut seen_ids = std::collections::HashSet::new();
    let mut lines = 0;
    for line in raw.lines() {
        lines += 1;
        let trajectory: Trajectory = serde_json::from_str(line).unwrap();
        assert!(seen_ids.insert(trajectory.task.task_id.clone()));

        let weights = &config.rewards;
        let expected = weights.weight_uncertainty * trajectory.reward.uncertainty
            + weights.weight_tool_use * trajectory.reward.tool_use
            + weights.weight_novelty * trajectory.reward.novelty
            + weights.weight_correctness * trajectory.reward.correctness;
        assert!((trajectory.reward.total - expected).abs() < 1e-9);
    }
    assert_eq!(lines, 8);

    let state = coordinator.curriculum_state();
    for &difficulty in state.difficulty.values() {
        assert!((MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty));
    }
}

// The verifier round-trip property: a known-correct answer passes every
// spec variant, a known-incorrect one fails.
#[tokio::test]
async fn verifier_round_trip_across_variants() {
    let dir = TempDir::new().unwrap();
    let tooling = ToolingConfig {
        workdir: dir.path().join("work"),
        timeout_seconds: 10,
        ..Default::default()
    };
    let verifier = Verifier::new(tooling);

    let cases: Vec<(VerifierSpec, &str, &str)> = vec![
        (
            VerifierSpec::ExactString {
                expected: "paris".into(),
            },
            "paris",
            "london",
        ),
        (
            VerifierSpec::Numeric {
                expected: 4.0,
                tolerance: 1e-6,
            },
            "4.0",
            "5.0",
        ),
        (
            VerifierSpec::NumericSet {
                expected: vec![-3.0, 2.0],
                tolerance: 1e-6,
            },
            "2, -3",
            "2, 4",
        ),
        (
            VerifierSpec::PythonPredicate {
                body: "{{candidate}} * 2 == 14".into(),
            },
            "7",
            "8",
        ),
        (
            VerifierSpec::PythonAssert {
                body: "assert {{candidate}} > 0".into(),
            },
            "3",
            "-3",
        ),
        (
            VerifierSpec::RegexMatch {
                pattern: r"\d+".into(),
            },
            "123",
            "abc",
        ),
    ];

    for (i, (spec, good, bad)) in cases.into_iter().enumerate() {
        let task = Task::new(format!("t{}", i), Domain::Math, 0.5, "p", spec);
        assert!(
            verifier.verify(&task, good).await.passed(),
            "case {} should pass",
            i
        );
        assert!(
            !verifier.verify(&task, bad).await.passed(),
            "case {} should fail",
            i
        );
    }
}
