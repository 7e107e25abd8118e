//! Warns when a delimited key separator is made only of printable
//! characters. Such a separator can occur in business key data, and every
//! row carrying it is rejected at hash time. An empty separator fails: plain
//! concatenation lets `("a", "bc")` and `("ab", "c")` collide.

use crate::guards::{CompileContext, Guard, GuardResult};
use crate::hashing::KeyEncoding;

pub const GUARD_NAME: &str = "Key Delimiter";

pub struct KeyDelimiterGuard;

impl Guard for KeyDelimiterGuard {
    fn name(&self) -> &str {
        GUARD_NAME
    }

    fn description(&self) -> &str {
        "Checks that the key separator is unlikely to occur in data"
    }

    fn check(&self, ctx: &CompileContext<'_>) -> GuardResult {
        match &ctx.config.key_encoding {
            KeyEncoding::LengthPrefixed => {
                GuardResult::pass(self.name(), "Length-prefixed key encoding is unambiguous")
            }
            KeyEncoding::Delimited { separator } if separator.is_empty() => GuardResult::fail(
                self.name(),
                "Key separator is empty; key parts would be concatenated without a boundary",
                "Configure a separator such as \\x1f, or length-prefixed key encoding",
            ),
            KeyEncoding::Delimited { separator } if separator.chars().all(|c| !c.is_control()) => {
                GuardResult::warn(
                    self.name(),
                    format!("Key separator {separator:?} may occur in business key values"),
                    "Use a control character such as \\x1f, or length-prefixed key encoding",
                )
                .with_metadata(vec![("separator", separator.escape_default().to_string())])
            }
            KeyEncoding::Delimited { separator } => GuardResult::pass(
                self.name(),
                format!("Key separator {} contains a control character", separator.escape_default()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;

    fn check(encoding: KeyEncoding) -> GuardResult {
        let config = GenerationConfig {
            key_encoding: encoding,
            ..GenerationConfig::default()
        };
        KeyDelimiterGuard.check(&CompileContext::new(&[], &config))
    }

    #[test]
    fn default_separator_passes() {
        assert!(check(KeyEncoding::default()).is_pass());
    }

    #[test]
    fn printable_separator_warns() {
        let result = check(KeyEncoding::Delimited {
            separator: "||".into(),
        });
        assert!(result.is_warn());
        assert!(result.diagnostic.contains("\"||\""));
    }

    #[test]
    fn empty_separator_fails() {
        let result = check(KeyEncoding::Delimited {
            separator: String::new(),
        });
        assert!(result.is_fail());
    }

    #[test]
    fn length_prefixed_passes() {
        assert!(check(KeyEncoding::LengthPrefixed).is_pass());
    }
}
