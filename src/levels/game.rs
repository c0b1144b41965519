//! Stateless helpers used by the game screens.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default number of answers offered in listen/read mode
pub const DEFAULT_OPTION_COUNT: usize = 4;

/// One selectable tile in write mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterOption {
    pub letter: String,
    /// Unique per occurrence so repeated letters stay independently selectable
    pub id: String,
}

/// New vector with the same elements in uniformly random order.
pub fn shuffle<T: Clone>(items: &[T]) -> Vec<T> {
    shuffle_with(items, &mut rand::thread_rng())
}

pub fn shuffle_with<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut shuffled = items.to_vec();
    shuffled.shuffle(rng);
    shuffled
}

/// Up to `count` answers sampled from `pool`, always including `correct`
/// unless the pool is empty.
pub fn generate_multiple_choice_options(
    correct: &str,
    pool: &[String],
    count: usize,
) -> Vec<String> {
    generate_multiple_choice_options_with(correct, pool, count, &mut rand::thread_rng())
}

pub fn generate_multiple_choice_options_with<R: Rng + ?Sized>(
    correct: &str,
    pool: &[String],
    count: usize,
    rng: &mut R,
) -> Vec<String> {
    if pool.is_empty() {
        return Vec::new();
    }

    let mut options: Vec<String> = pool.choose_multiple(rng, count).cloned().collect();

    if !options.iter().any(|w| w == correct) {
        if options.is_empty() {
            options.push(correct.to_string());
        } else {
            let slot = rng.gen_range(0..options.len());
            options[slot] = correct.to_string();
        }
    }

    options.shuffle(rng);
    options
}

/// One tile per character occurrence, shuffled.
pub fn generate_letter_options(word: &str) -> Vec<LetterOption> {
    generate_letter_options_with(word, &mut rand::thread_rng())
}

pub fn generate_letter_options_with<R: Rng + ?Sized>(word: &str, rng: &mut R) -> Vec<LetterOption> {
    let mut options: Vec<LetterOption> = word
        .chars()
        .enumerate()
        .map(|(index, letter)| LetterOption {
            letter: letter.to_string(),
            id: format!("{}-{}", letter, index),
        })
        .collect();
    options.shuffle(rng);
    options
}

/// Display casing for a word. The pronoun "I" is always capitalized.
pub fn format_word(word: &str, upper: bool) -> String {
    if word.eq_ignore_ascii_case("i") {
        return "I".to_string();
    }
    if upper {
        word.to_uppercase()
    } else {
        word.to_lowercase()
    }
}

pub fn format_letter(letter: &str, upper: bool) -> String {
    if upper {
        letter.to_uppercase()
    } else {
        letter.to_lowercase()
    }
}
