//! Dice expression parsing and evaluation.
//!
//! Grammar: optional die count, `d`, sides, optional signed modifier —
//! `3d6+1`, `d20`, `2D8-2`. Case-insensitive, surrounding whitespace
//! ignored, anything else is invalid. Ranges: count 1–100, sides
//! 1–1000, modifier −999..=999.
//!
//! Evaluation takes the die roll as a closure so tests (and anything
//! else that wants determinism) can inject a fixed source; the
//! convenience path draws from `rand`.

use rand::Rng;

use loretable_protocol::DiceRoll;

/// Largest accepted die count.
pub const MAX_COUNT: u32 = 100;
/// Largest accepted side count.
pub const MAX_SIDES: u32 = 1000;
/// Largest accepted modifier magnitude.
pub const MAX_MODIFIER: i32 = 999;

/// Why an expression failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DiceError {
    /// Not of the form `[count]d<sides>[±modifier]`.
    #[error("malformed dice expression")]
    Malformed,
    /// Count outside 1–100.
    #[error("die count out of range")]
    CountOutOfRange,
    /// Sides outside 1–1000.
    #[error("side count out of range")]
    SidesOutOfRange,
    /// Modifier outside −999..=999.
    #[error("modifier out of range")]
    ModifierOutOfRange,
}

/// A parsed dice expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceExpr {
    /// How many dice to roll (1–100).
    pub count: u32,
    /// Sides per die (1–1000).
    pub sides: u32,
    /// Signed modifier added to the sum.
    pub modifier: i32,
}

impl DiceExpr {
    /// Parses an expression like `"3d6+1"` or `"d20"`.
    pub fn parse(input: &str) -> Result<Self, DiceError> {
        let s = input.trim();
        let d = s
            .bytes()
            .position(|b| b == b'd' || b == b'D')
            .ok_or(DiceError::Malformed)?;
        let (count_part, rest) = (&s[..d], &s[d + 1..]);

        let count = if count_part.is_empty() {
            1
        } else {
            parse_digits(count_part).ok_or(DiceError::Malformed)?
        };

        let (sides_part, modifier) = match rest
            .bytes()
            .position(|b| b == b'+' || b == b'-')
        {
            Some(sign) => {
                let magnitude = parse_digits(&rest[sign + 1..])
                    .ok_or(DiceError::Malformed)?;
                if magnitude > MAX_MODIFIER as u32 {
                    return Err(DiceError::ModifierOutOfRange);
                }
                let magnitude = magnitude as i32;
                let modifier = if rest.as_bytes()[sign] == b'-' {
                    -magnitude
                } else {
                    magnitude
                };
                (&rest[..sign], modifier)
            }
            None => (rest, 0),
        };
        let sides =
            parse_digits(sides_part).ok_or(DiceError::Malformed)?;

        if count == 0 || count > MAX_COUNT {
            return Err(DiceError::CountOutOfRange);
        }
        if sides == 0 || sides > MAX_SIDES {
            return Err(DiceError::SidesOutOfRange);
        }
        Ok(Self {
            count,
            sides,
            modifier,
        })
    }

    /// Evaluates with an injected die: `roll(sides)` must return a
    /// value in `[1, sides]`.
    pub fn eval_with<F>(&self, mut roll: F) -> DiceRoll
    where
        F: FnMut(u32) -> u32,
    {
        let rolls: Vec<u32> =
            (0..self.count).map(|_| roll(self.sides)).collect();
        let total =
            rolls.iter().map(|&r| r as i32).sum::<i32>() + self.modifier;
        DiceRoll {
            expression: self.to_string(),
            rolls,
            modifier: self.modifier,
            total,
        }
    }

    /// Evaluates with uniform random dice.
    pub fn eval(&self) -> DiceRoll {
        let mut rng = rand::rng();
        self.eval_with(|sides| rng.random_range(1..=sides))
    }
}

impl std::fmt::Display for DiceExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{m}"),
            m => write!(f, "{m}"),
        }
    }
}

/// Parses a string of ASCII digits only (no sign, no whitespace).
fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Extracts the dice expression from a roll command.
///
/// Commands are `/roll <expr>` or `/r <expr>`, case-insensitive.
/// Returns `None` when the content is not a roll command at all;
/// returns `Some(Err(..))` when it is one but the expression is
/// invalid (the caller degrades to plain text either way).
pub fn parse_roll_command(
    content: &str,
) -> Option<Result<DiceExpr, DiceError>> {
    let trimmed = content.trim();
    let lower = trimmed.to_ascii_lowercase();
    let rest = ["/roll", "/r"].iter().find_map(|prefix| {
        let tail = lower.strip_prefix(prefix)?;
        // The prefix must be a whole word: "/rolling" is not a command.
        if tail.starts_with(char::is_whitespace) {
            Some(&trimmed[prefix.len()..])
        } else {
            None
        }
    })?;
    Some(DiceExpr::parse(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_expression() {
        let expr = DiceExpr::parse("3d6+1").unwrap();
        assert_eq!(
            expr,
            DiceExpr {
                count: 3,
                sides: 6,
                modifier: 1
            }
        );
    }

    #[test]
    fn test_parse_defaults() {
        let expr = DiceExpr::parse("d20").unwrap();
        assert_eq!(
            expr,
            DiceExpr {
                count: 1,
                sides: 20,
                modifier: 0
            }
        );
    }

    #[test]
    fn test_parse_negative_modifier_and_case() {
        let expr = DiceExpr::parse(" 2D8-2 ").unwrap();
        assert_eq!(
            expr,
            DiceExpr {
                count: 2,
                sides: 8,
                modifier: -2
            }
        );
    }

    #[test]
    fn test_out_of_range_expressions_fail() {
        assert_eq!(
            DiceExpr::parse("101d6"),
            Err(DiceError::CountOutOfRange)
        );
        assert_eq!(
            DiceExpr::parse("1d1001"),
            Err(DiceError::SidesOutOfRange)
        );
        assert_eq!(DiceExpr::parse("0d6"), Err(DiceError::CountOutOfRange));
        assert_eq!(DiceExpr::parse("1d0"), Err(DiceError::SidesOutOfRange));
        assert_eq!(
            DiceExpr::parse("1d6+1000"),
            Err(DiceError::ModifierOutOfRange)
        );
    }

    #[test]
    fn test_malformed_expressions_fail() {
        for bad in ["", "banana", "3x6", "d", "3d", "+1d6", "3d6+", "3d6 + 1", "1.5d6"] {
            assert_eq!(
                DiceExpr::parse(bad),
                Err(DiceError::Malformed),
                "expected {bad:?} to be malformed"
            );
        }
    }

    #[test]
    fn test_eval_with_fixed_maximum_source() {
        let expr = DiceExpr::parse("3d6+1").unwrap();
        let roll = expr.eval_with(|sides| sides);
        assert_eq!(roll.rolls, vec![6, 6, 6]);
        assert_eq!(roll.modifier, 1);
        assert_eq!(roll.total, 19);
        assert_eq!(roll.expression, "3d6+1");
    }

    #[test]
    fn test_eval_random_stays_in_range() {
        let expr = DiceExpr::parse("10d4-1").unwrap();
        for _ in 0..50 {
            let roll = expr.eval();
            assert_eq!(roll.rolls.len(), 10);
            assert!(roll.rolls.iter().all(|&r| (1..=4).contains(&r)));
            assert!((9..=39).contains(&roll.total));
        }
    }

    #[test]
    fn test_display_canonical_forms() {
        assert_eq!(DiceExpr::parse("d20").unwrap().to_string(), "1d20");
        assert_eq!(DiceExpr::parse("3d6+1").unwrap().to_string(), "3d6+1");
        assert_eq!(DiceExpr::parse("2d8-2").unwrap().to_string(), "2d8-2");
    }

    #[test]
    fn test_roll_command_recognition() {
        assert!(matches!(
            parse_roll_command("/roll 1d20+5"),
            Some(Ok(DiceExpr {
                count: 1,
                sides: 20,
                modifier: 5
            }))
        ));
        assert!(matches!(parse_roll_command("/r d6"), Some(Ok(_))));
        assert!(matches!(parse_roll_command("/ROLL 2d10"), Some(Ok(_))));

        // A roll command with a bad expression is still a command.
        assert!(matches!(parse_roll_command("/roll banana"), Some(Err(_))));

        // Not commands at all.
        assert!(parse_roll_command("attack the gnoll").is_none());
        assert!(parse_roll_command("/rolling hills").is_none());
        assert!(parse_roll_command("/roll").is_none());
    }
}
