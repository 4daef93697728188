//! Code task generation: function specs verified on fixed inputs

use crate::types::{Domain, Task, VerifierSpec};
use rand::rngs::StdRng;
use rand::Rng;

/// Generate a code task for the difficulty tier
///
/// Candidates are single Python expressions (a lambda is the expected
/// shape) so the predicate can apply them directly to fixed test vectors
/// without needing `exec`, which the review gate rejects.
pub fn generate(rng: &mut StdRng, difficulty: f64, task_id: &str) -> Task {
    if difficulty < 0.3 {
        if rng.gen_bool(0.5) {
            sum_task(rng, difficulty, task_id)
        } else {
            even_task(rng, difficulty, task_id)
        }
    } else if difficulty < 0.6 {
        if rng.gen_bool(0.5) {
            reverse_task(rng, difficulty, task_id)
        } else {
            max_task(rng, difficulty, task_id)
        }
    } else if rng.gen_bool(0.5) {
        binary_search_task(rng, difficulty, task_id)
    } else {
        primes_task(rng, difficulty, task_id)
    }
}

fn expression_task(
    task_id: &str,
    difficulty: f64,
    prompt: String,
    predicate: String,
) -> Task {
    Task::new(
        task_id,
        Domain::Code,
        difficulty,
        prompt,
        VerifierSpec::PythonPredicate { body: predicate },
    )
    .with_constraint("answer with a single Python expression, e.g. a lambda")
}

fn sum_task(rng: &mut StdRng, difficulty: f64, task_id: &str) -> Task {
    let values: Vec<i64> = (0..4).map(|_| rng.gen_range(-9..=9)).collect();
    let total: i64 = values.iter().sum();

    let prompt = format!(
        "Write a Python expression (for example a lambda) that takes a list of \
         integers and returns their sum. It will be tested on inputs such as {:?}.",
        values
    );
    let predicate = format!(
        "({{{{candidate}}}})({:?}) == {} and ({{{{candidate}}}})([]) == 0",
        values, total
    );

    expression_task(task_id, difficulty, prompt, predicate)
}

fn even_task(rng: &mut StdRng, difficulty: f64, task_id: &str) -> Task {
    let even = rng.gen_range(1..=20) * 2;
    let odd = even + 1;

    let prompt = "Write a Python expression (for example a lambda) that takes an \
                  integer and returns True when it is even."
        .to_string();
    let predicate = format!(
        "({{{{candidate}}}})({}) == True and ({{{{candidate}}}})({}) == False",
        even, odd
    );

    expression_task(task_id, difficulty, prompt, predicate)
}

fn reverse_task(rng: &mut StdRng, difficulty: f64, task_id: &str) -> Task {
    let values: Vec<i64> = (0..5).map(|_| rng.gen_range(0..=9)).collect();
    let reversed: Vec<i64> = values.iter().rev().copied().collect();

    let prompt = format!(
        "Write a Python expression (for example a lambda) that takes a list and \
         returns it reversed. It will be tested on inputs such as {:?}.",
        values
    );
    let predicate = format!(
        "({{{{candidate}}}})({:?}) == {:?} and ({{{{candidate}}}})([]) == []",
        values, reversed
    );

    expression_task(task_id, difficulty, prompt, predicate)
}

fn max_task(rng: &mut StdRng, difficulty: f64, task_id: &str) -> Task {
    let mut values: Vec<i64> = (0..5).map(|_| rng.gen_range(-50..=50)).collect();
    // Ensure a strict maximum so any correct implementation agrees
    let maximum = *values.iter().max().unwrap() + 1;
    values[0] = maximum;

    let prompt = format!(
        "Write a Python expression (for example a lambda) that takes a non-empty \
         list of integers and returns the largest one. It will be tested on \
         inputs such as {:?}.",
        values
    );
    let predicate = format!("({{{{candidate}}}})({:?}) == {}", values, maximum);

    expression_task(task_id, difficulty, prompt, predicate)
}

fn binary_search_task(rng: &mut StdRng, difficulty: f64, task_id: &str) -> Task {
    let mut sorted: Vec<i64> = Vec::new();
    let mut next = rng.gen_range(-10..=0);
    for _ in 0..6 {
        sorted.push(next);
        next += rng.gen_range(1..=4);
    }
    let present_index = rng.gen_range(0..sorted.len());
    let present = sorted[present_index];
    let missing = sorted.last().unwrap() + 1;

    let prompt = format!(
        "Write a Python expression (for example a lambda) implementing search \
         over a sorted list: given (items, target) it returns the index of \
         target, or -1 when absent. It will be tested on {:?}.",
        sorted
    );
    let predicate = format!(
        "({{{{candidate}}}})({:?}, {}) == {} and ({{{{candidate}}}})({:?}, {}) == -1 \
         and ({{{{candidate}}}})([], 1) == -1",
        sorted, present, present_index, sorted, missing
    );

    expression_task(task_id, difficulty, prompt, predicate)
}

fn primes_task(rng: &mut StdRng, difficulty: f64, task_id: &str) -> Task {
    const PRIMES: [i64; 6] = [2, 3, 5, 7, 11, 13];
    const COMPOSITES: [i64; 6] = [1, 4, 6, 8, 9, 12];
    let prime = PRIMES[rng.gen_range(0..PRIMES.len())];
    let composite = COMPOSITES[rng.gen_range(0..COMPOSITES.len())];

    let prompt = "Write a Python expression (for example a lambda) that takes an \
                  integer n and returns True exactly when n is prime."
        .to_string();
    let predicate = format!(
        "({{{{candidate}}}})({}) == True and ({{{{candidate}}}})({}) == False \
         and ({{{{candidate}}}})(2) == True and ({{{{candidate}}}})(1) == False",
        prime, composite
    );

    expression_task(task_id, difficulty, prompt, predicate)
}
