use serde::{Deserialize, Serialize};

use crate::normalize::CanonicalRecord;

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchPolicy {
    pub threshold: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl MatchPolicy {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn is_same_entity(&self, a: &CanonicalRecord, b: &CanonicalRecord) -> bool {
        similarity(a, b) >= self.threshold
    }
}

/// Name similarity of two canonical records, symmetric and bounded to [0, 1].
pub fn similarity(a: &CanonicalRecord, b: &CanonicalRecord) -> f64 {
    name_similarity(a.display_name(), b.display_name())
}

/// Fraction of the shorter name's tokens that are contained in (or contain) a
/// token of the longer name. Equal token counts take the better direction so the
/// score does not depend on argument order.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let left = fold_name(a);
    let right = fold_name(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    if left == right {
        return 1.0;
    }

    let left_tokens = left.split(' ').collect::<Vec<_>>();
    let right_tokens = right.split(' ').collect::<Vec<_>>();

    let score = match left_tokens.len().cmp(&right_tokens.len()) {
        std::cmp::Ordering::Less => containment(&left_tokens, &right_tokens),
        std::cmp::Ordering::Greater => containment(&right_tokens, &left_tokens),
        std::cmp::Ordering::Equal => containment(&left_tokens, &right_tokens)
            .max(containment(&right_tokens, &left_tokens)),
    };
    score.clamp(0.0, 1.0)
}

fn containment(shorter: &[&str], longer: &[&str]) -> f64 {
    let matched = shorter
        .iter()
        .filter(|token| {
            longer
                .iter()
                .any(|other| other.contains(**token) || token.contains(*other))
        })
        .count();
    matched as f64 / shorter.len() as f64
}

/// Lowercases, strips diacritics, drops anything that is not a letter and
/// collapses whitespace to single spaces.
pub fn fold_name(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_whitespace() {
            folded.push(' ');
            continue;
        }
        match fold_diacritic(ch) {
            Some(base) => folded.push_str(base),
            None if ch.is_ascii_lowercase() => folded.push(ch),
            None => {}
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_diacritic(ch: char) -> Option<&'static str> {
    let base = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'ç' | 'ć' | 'č' | 'ĉ' => "c",
        'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' => "e",
        'ğ' => "g",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'ı' => "i",
        'ł' | 'ľ' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'ř' => "r",
        'ś' | 'š' | 'ş' => "s",
        'ť' | 'ţ' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        'ß' => "ss",
        'æ' => "ae",
        'œ' => "oe",
        _ => return None,
    };
    Some(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_strips_accents_and_punctuation() {
        assert_eq!(fold_name("  João   SILVA-Santos "), "joao silvasantos");
        assert_eq!(fold_name("Shaquille O'Neal"), "shaquille oneal");
        assert_eq!(fold_name("123 !!"), "");
    }

    #[test]
    fn identical_names_score_one() {
        assert_eq!(name_similarity("Gabriel Ferreira", "gabriel  ferreira"), 1.0);
    }

    #[test]
    fn empty_names_score_zero() {
        assert_eq!(name_similarity("", "John Smith"), 0.0);
        assert_eq!(name_similarity("42", "John Smith"), 0.0);
    }

    #[test]
    fn shorter_name_drives_fraction() {
        assert_eq!(name_similarity("Pedro Costa", "Pedro Lima Costa"), 1.0);
        assert_eq!(name_similarity("Pedro Souza", "Pedro Lima Costa"), 0.5);
    }

    #[test]
    fn substring_tokens_match() {
        assert_eq!(name_similarity("Gabe Ferreira", "Gabriel Ferreira"), 0.5);
        assert_eq!(name_similarity("Gab Ferreira", "Gabriel Ferreira"), 1.0);
    }

    #[test]
    fn symmetric_for_equal_token_counts() {
        let pairs = [
            ("a ab", "ab c"),
            ("John Smith", "Jon Smithers"),
            ("Lucas Oliveira", "Oliveira Lucas"),
            ("Felipe", "Rafael"),
        ];
        for (a, b) in pairs {
            assert_eq!(name_similarity(a, b), name_similarity(b, a), "{a} / {b}");
        }
    }

    #[test]
    fn policy_clamps_threshold() {
        assert_eq!(MatchPolicy::new(3.0).threshold, 1.0);
        assert_eq!(MatchPolicy::default().threshold, DEFAULT_MATCH_THRESHOLD);
    }
}
