//! Logic task generation: deduction, chains, and small puzzles

use crate::types::{Domain, Task, VerifierSpec};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

const NAMES: [&str; 6] = ["Alice", "Bob", "Carol", "Dave", "Erin", "Frank"];
const CATEGORIES: [(&str, &str); 4] = [
    ("birds", "animals"),
    ("roses", "flowers"),
    ("oaks", "trees"),
    ("squares", "rectangles"),
];
const PETS: [&str; 3] = ["cat", "dog", "fish"];

/// Generate a logic task for the difficulty tier
pub fn generate(rng: &mut StdRng, difficulty: f64, task_id: &str) -> Task {
    if difficulty < 0.3 {
        deduction(rng, difficulty, task_id)
    } else if difficulty < 0.6 {
        chain(rng, difficulty, task_id)
    } else {
        puzzle(rng, difficulty, task_id)
    }
}

/// One-step syllogism with a yes/no answer
fn deduction(rng: &mut StdRng, difficulty: f64, task_id: &str) -> Task {
    let (subset, superset) = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
    let negated = rng.gen_bool(0.5);

    let (premise, answer) = if negated {
        (format!("No {} are {}.", subset, superset), "no")
    } else {
        (format!("All {} are {}.", subset, superset), "yes")
    };

    let prompt = format!(
        "{} Robin is one of the {}. Is Robin one of the {}? Answer yes or no.",
        premise, subset, superset
    );

    Task::new(
        task_id,
        Domain::Logic,
        difficulty,
        prompt,
        VerifierSpec::ExactString {
            expected: answer.to_string(),
        },
    )
    .with_constraint("answer exactly yes or no, lowercase")
}

/// Multi-step comparison chain; the tallest person is the answer
fn chain(rng: &mut StdRng, difficulty: f64, task_id: &str) -> Task {
    let count = rng.gen_range(3..=4);
    let mut people: Vec<&str> = NAMES.to_vec();
    people.shuffle(rng);
    let people = &people[..count];

    // people[i] is taller than people[i + 1]; present the facts shuffled
    let mut facts: Vec<String> = people
        .windows(2)
        .map(|pair| format!("{} is taller than {}.", pair[0], pair[1]))
        .collect();
    facts.shuffle(rng);

    let prompt = format!(
        "{} Who is the tallest? Answer with just the name.",
        facts.join(" ")
    );

    Task::new(
        task_id,
        Domain::Logic,
        difficulty,
        prompt,
        VerifierSpec::RegexMatch {
            pattern: format!("(?i){}", people[0]),
        },
    )
    .with_constraint("answer with a single name")
}

/// Small elimination puzzle over three people and three pets
fn puzzle(rng: &mut StdRng, difficulty: f64, task_id: &str) -> Task {
    let mut owners: Vec<&str> = NAMES.to_vec();
    owners.shuffle(rng);
    let owners = &owners[..3];

    let mut pets: Vec<&str> = PETS.to_vec();
    pets.shuffle(rng);

    // owners[i] has pets[i]; ask about owners[0] after two elimination clues
    let target = owners[0];
    let answer = pets[0];

    let clue_direct = format!("{} has the {}.", owners[1], pets[1]);
    let clue_negative = format!("{} does not have the {}.", target, pets[2]);

    let prompt = format!(
        "{}, {} and {} each own a different pet: a {}, a {} and a {}. {} {} Which pet does {} own? Answer with the pet.",
        owners[0],
        owners[1],
        owners[2],
        PETS[0],
        PETS[1],
        PETS[2],
        clue_direct,
        clue_negative,
        target
    );

    Task::new(
        task_id,
        Domain::Logic,
        difficulty,
        prompt,
        VerifierSpec::RegexMatch {
            pattern: format!("(?i)(?:the\\s+)?{}", answer),
        },
    )
    .with_constraint("answer with one pet")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(23)
    }

    #[test]
    fn test_deduction_answer_matches_premise() {
        let mut rng = rng();
        for i in 0..30 {
            let task = deduction(&mut rng, 0.2, &format!("t{}", i));
            let VerifierSpec::ExactString { expected } = &task.verifier else {
                panic!("deduction must use exact_string");
            };
            if task.prompt.starts_with("No ") {
                assert_eq!(expected, "no");
            } else {
                assert_eq!(expected, "yes");
            }
        }
    }

    #[test]
    fn test_chain_answer_is_chain_head() {
        let mut rng = rng();
        for i in 0..30 {
            let task = chain(&mut rng, 0.45, &format!("t{}", i));
            let VerifierSpec::RegexMatch { pattern } = &task.verifier else {
                panic!("chain must use regex_match");
            };
            // The expected name appears on the taller side of some fact
            let name = pattern.trim_start_matches("(?i)");
            assert!(task.prompt.contains(&format!("{} is taller than", name)));
            // And never on the shorter side
            assert!(!task.prompt.contains(&format!("taller than {}.", name)));
        }
    }

    #[test]
    fn test_puzzle_clues_identify_the_answer() {
        let mut rng = rng();
        for i in 0..30 {
            let task = puzzle(&mut rng, 0.8, &format!("t{}", i));
            assert!(task.prompt.contains("each own a different pet"));
            assert!(matches!(task.verifier, VerifierSpec::RegexMatch { .. }));
        }
    }

    #[test]
    fn test_all_tiers_validate() {
        let mut rng = rng();
        for (i, difficulty) in [0.1, 0.5, 0.9].iter().enumerate() {
            let task = generate(&mut rng, *difficulty, &format!("t{}", i));
            assert!(task.validate().is_ok());
        }
    }
}
