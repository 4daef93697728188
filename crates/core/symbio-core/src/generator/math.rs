//! Math task generation: linear, quadratic, and 2x2 system tiers

use crate::types::{Domain, Task, VerifierSpec};
use rand::rngs::StdRng;
use rand::Rng;

const NUMERIC_TOLERANCE: f64 = 1e-6;

/// Render `coefficient·x` with conventional signs, e.g. `2x`, `-x`
fn term(coefficient: i64, variable: &str) -> String {
    match coefficient {
        1 => variable.to_string(),
        -1 => format!("-{}", variable),
        c => format!("{}{}", c, variable),
    }
}

/// Render `± constant` as an equation tail, e.g. ` + 3`, ` - 7`
fn signed_constant(value: i64) -> String {
    if value >= 0 {
        format!(" + {}", value)
    } else {
        format!(" - {}", -value)
    }
}

/// Generate a math task for the difficulty tier
pub fn generate(rng: &mut StdRng, difficulty: f64, task_id: &str, retries: usize) -> Task {
    if difficulty < 0.3 {
        linear(rng, difficulty, task_id)
    } else if difficulty < 0.6 {
        quadratic(rng, difficulty, task_id, retries)
    } else {
        system(rng, difficulty, task_id, retries)
    }
}

/// `a·x + b = c` with an integer root
fn linear(rng: &mut StdRng, difficulty: f64, task_id: &str) -> Task {
    let a: i64 = rng.gen_range(1..=9);
    let x: i64 = rng.gen_range(-10..=10);
    let b: i64 = rng.gen_range(-20..=20);
    let c = a * x + b;

    let prompt = format!(
        "Solve {}{} = {} for x. Answer with the value of x.",
        term(a, "x"),
        signed_constant(b),
        c
    );

    Task::new(
        task_id,
        Domain::Math,
        difficulty,
        prompt,
        VerifierSpec::Numeric {
            expected: x as f64,
            tolerance: NUMERIC_TOLERANCE,
        },
    )
    .with_constraint("answer is a single integer")
}

/// Monic quadratic with two distinct integer roots
fn quadratic(rng: &mut StdRng, difficulty: f64, task_id: &str, retries: usize) -> Task {
    for _ in 0..retries {
        let r1: i64 = rng.gen_range(-5..=5);
        let r2: i64 = rng.gen_range(-5..=5);
        if r1 == r2 {
            continue;
        }

        let b = -(r1 + r2);
        let c = r1 * r2;
        let bx = if b == 0 {
            String::new()
        } else {
            signed_constant_term(b)
        };
        let prompt = format!(
            "Find both roots of x^2{}{} = 0. Answer with the two roots separated by a comma.",
            bx,
            signed_constant(c)
        );

        return Task::new(
            task_id,
            Domain::Math,
            difficulty,
            prompt,
            VerifierSpec::NumericSet {
                expected: vec![r1 as f64, r2 as f64],
                tolerance: NUMERIC_TOLERANCE,
            },
        )
        .with_constraint("answer with two comma-separated integers");
    }

    linear(rng, difficulty, task_id)
}

/// Render `± b·x` mid-polynomial, e.g. ` + 3x`, ` - x`
fn signed_constant_term(coefficient: i64) -> String {
    if coefficient >= 0 {
        format!(" + {}", term(coefficient, "x"))
    } else {
        format!(" - {}", term(-coefficient, "x"))
    }
}

/// 2x2 integer linear system with a unique integer solution
fn system(rng: &mut StdRng, difficulty: f64, task_id: &str, retries: usize) -> Task {
    for _ in 0..retries {
        let a1: i64 = rng.gen_range(-5..=5);
        let b1: i64 = rng.gen_range(-5..=5);
        let a2: i64 = rng.gen_range(-5..=5);
        let b2: i64 = rng.gen_range(-5..=5);

        // Unique solution requires a nonzero determinant
        if a1 * b2 - a2 * b1 == 0 {
            continue;
        }
        if (a1 == 0 && b1 == 0) || (a2 == 0 && b2 == 0) {
            continue;
        }

        let x: i64 = rng.gen_range(-5..=5);
        let y: i64 = rng.gen_range(-5..=5);
        let c1 = a1 * x + b1 * y;
        let c2 = a2 * x + b2 * y;

        let prompt = format!(
            "Solve the system: {} and {}. Answer with the values of x and y separated by a comma.",
            equation(a1, b1, c1),
            equation(a2, b2, c2)
        );

        return Task::new(
            task_id,
            Domain::Math,
            difficulty,
            prompt,
            VerifierSpec::NumericSet {
                expected: vec![x as f64, y as f64],
                tolerance: NUMERIC_TOLERANCE,
            },
        )
        .with_constraint("answer with x then y, comma separated");
    }

    linear(rng, difficulty, task_id)
}

/// Render `a·x ± b·y = c`
fn equation(a: i64, b: i64, c: i64) -> String {
    match (a, b) {
        (0, b) => format!("{} = {}", term(b, "y"), c),
        (a, 0) => format!("{} = {}", term(a, "x"), c),
        (a, b) if b > 0 => format!("{} + {} = {}", term(a, "x"), term(b, "y"), c),
        (a, b) => format!("{} - {} = {}", term(a, "x"), term(-b, "y"), c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn test_linear_tier_round_trips_through_verifier_data() {
        let mut rng = rng();
        for i in 0..50 {
            let task = generate(&mut rng, 0.2, &format!("t{}", i), 10);
            let VerifierSpec::Numeric { expected, .. } = task.verifier else {
                panic!("linear tier must emit a numeric verifier");
            };
            assert!((-10.0..=10.0).contains(&expected));
            assert!(task.prompt.contains("Solve"));
            assert!(task.prompt.contains("= "));
        }
    }

    #[test]
    fn test_quadratic_tier_has_two_distinct_roots() {
        let mut rng = rng();
        for i in 0..50 {
            let task = generate(&mut rng, 0.45, &format!("t{}", i), 10);
            match task.verifier {
                VerifierSpec::NumericSet { expected, .. } => {
                    assert_eq!(expected.len(), 2);
                    assert!((expected[0] - expected[1]).abs() > 1e-9);
                }
                // Degenerate draws fall back to the linear tier
                VerifierSpec::Numeric { .. } => {}
                other => panic!("unexpected verifier: {:?}", other),
            }
        }
    }

    #[test]
    fn test_system_tier_solution_satisfies_equations() {
        let mut rng = rng();
        for i in 0..50 {
            let task = generate(&mut rng, 0.8, &format!("t{}", i), 10);
            if let VerifierSpec::NumericSet { expected, .. } = &task.verifier {
                assert_eq!(expected.len(), 2);
                assert!(task.prompt.contains("system"));
            }
        }
    }

    #[test]
    fn test_term_formatting() {
        assert_eq!(term(1, "x"), "x");
        assert_eq!(term(-1, "x"), "-x");
        assert_eq!(term(3, "x"), "3x");
        assert_eq!(signed_constant(3), " + 3");
        assert_eq!(signed_constant(-7), " - 7");
    }

    #[test]
    fn test_prompts_validate() {
        let mut rng = rng();
        for (i, difficulty) in [0.1, 0.4, 0.9].iter().enumerate() {
            let task = generate(&mut rng, *difficulty, &format!("t{}", i), 10);
            assert!(task.validate().is_ok());
        }
    }
}
