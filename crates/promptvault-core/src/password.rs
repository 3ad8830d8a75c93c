//! Vault password strength estimation
//!
//! A vault password is folded into master key derivation on top of the wallet
//! signature. There is no reset: a forgotten password makes every private
//! record unreadable, and a guessable one adds nothing. This module only
//! grades the password so the caller can warn; it never refuses one.
//!
//! | Level     | Bits   |
//! |-----------|--------|
//! | Dangerous | < 28   |
//! | Weak      | 28–35  |
//! | Fair      | 36–59  |
//! | Strong    | 60–127 |
//! | Excellent | ≥ 128  |

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PasswordStrength {
    Dangerous,
    Weak,
    Fair,
    Strong,
    Excellent,
}

impl PasswordStrength {
    fn from_bits(bits: f64) -> Self {
        match bits {
            b if b < 28.0 => Self::Dangerous,
            b if b < 36.0 => Self::Weak,
            b if b < 60.0 => Self::Fair,
            b if b < 128.0 => Self::Strong,
            _ => Self::Excellent,
        }
    }

    /// `Strong` or better.
    pub fn is_recommended(&self) -> bool {
        *self >= Self::Strong
    }
}

#[derive(Debug, Clone)]
pub struct PasswordAnalysis {
    pub entropy_bits: f64,
    pub strength: PasswordStrength,
    pub warnings: Vec<String>,
}

/// Words that show up in leaked lists or are obvious for this app.
const GUESSABLE: &[&str] = &[
    "password", "123456", "qwerty", "letmein", "iloveyou", "admin", "welcome",
    "prompt", "prompts", "vault", "arweave", "wallet", "secret", "chatgpt",
];

/// Grade a password by character-class entropy with penalties for
/// guessable words, repetition and runs like `abc` / `321`.
pub fn estimate_strength(password: &str) -> PasswordAnalysis {
    if password.is_empty() {
        return PasswordAnalysis {
            entropy_bits: 0.0,
            strength: PasswordStrength::Dangerous,
            warnings: vec!["Password is empty".to_string()],
        };
    }

    let mut warnings = Vec::new();
    let chars: Vec<char> = password.chars().collect();
    let len = chars.len() as f64;

    let pool: f64 = [
        (chars.iter().any(char::is_ascii_lowercase), 26.0),
        (chars.iter().any(char::is_ascii_uppercase), 26.0),
        (chars.iter().any(char::is_ascii_digit), 10.0),
        (chars.iter().any(|c| c.is_ascii_punctuation() || *c == ' '), 33.0),
        (chars.iter().any(|c| !c.is_ascii()), 100.0),
    ]
    .iter()
    .filter(|(present, _)| *present)
    .map(|(_, size)| size)
    .sum();

    let mut bits = len * pool.max(1.0).log2();

    let lower = password.to_lowercase();
    if GUESSABLE.iter().any(|w| lower.contains(w)) {
        bits *= 0.5;
        warnings.push("Contains a common or guessable word".to_string());
    }

    let distinct = chars.iter().collect::<HashSet<_>>().len() as f64;
    if distinct / len < 0.5 {
        bits *= 0.6;
        warnings.push("Too many repeated characters".to_string());
    }

    let runs = chars
        .windows(3)
        .filter(|w| {
            let (a, b, c) = (w[0] as i64, w[1] as i64, w[2] as i64);
            (b - a == 1 && c - b == 1) || (a - b == 1 && b - c == 1)
        })
        .count();
    if runs > 2 {
        bits -= runs as f64 * 2.0;
        warnings.push("Contains sequential runs".to_string());
    }

    // Space-separated passphrases are stronger than their charset suggests
    let words = password.split_whitespace().count();
    if words >= 4 {
        bits += (words as f64 - 3.0) * 3.0;
    }

    if chars.len() < 12 {
        warnings.push("Shorter than 12 characters".to_string());
    }

    let entropy_bits = bits.max(0.0);
    PasswordAnalysis {
        entropy_bits,
        strength: PasswordStrength::from_bits(entropy_bits),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_dangerous() {
        let analysis = estimate_strength("");
        assert_eq!(analysis.entropy_bits, 0.0);
        assert_eq!(analysis.strength, PasswordStrength::Dangerous);
    }

    #[test]
    fn test_guessable_words_flagged() {
        for pw in ["password", "myvault", "Arweave2024"] {
            let analysis = estimate_strength(pw);
            assert!(
                analysis.warnings.iter().any(|w| w.contains("guessable")),
                "{} should be flagged",
                pw
            );
            assert!(!analysis.strength.is_recommended());
        }
    }

    #[test]
    fn test_passphrase_is_recommended() {
        let analysis = estimate_strength("correct horse battery staple");
        assert!(
            analysis.strength.is_recommended(),
            "got {:?} ({:.1} bits)",
            analysis.strength,
            analysis.entropy_bits
        );
    }

    #[test]
    fn test_repetition_and_runs_penalized() {
        let repeated = estimate_strength("aaaaaaaaaaaa");
        assert!(repeated.warnings.iter().any(|w| w.contains("repeated")));

        let runs = estimate_strength("abcdefghij");
        assert!(runs.warnings.iter().any(|w| w.contains("sequential")));

        let scattered = estimate_strength("qxmtpjwrkz");
        assert!(runs.entropy_bits < scattered.entropy_bits);
    }

    #[test]
    fn test_pin_is_weak() {
        assert!(estimate_strength("4821").strength <= PasswordStrength::Weak);
        assert!(estimate_strength("48213907").strength <= PasswordStrength::Weak);
    }

    #[test]
    fn test_unicode_counts() {
        let analysis = estimate_strength("密码是很安全的東西!");
        assert!(analysis.entropy_bits > 40.0);
    }

    #[test]
    fn test_strength_ordering() {
        assert!(PasswordStrength::Dangerous < PasswordStrength::Weak);
        assert!(PasswordStrength::Fair < PasswordStrength::Strong);
        assert!(PasswordStrength::Strong.is_recommended());
        assert!(!PasswordStrength::Fair.is_recommended());
    }
}
