//! Password strength rules.

/// Special characters accepted by the last rule.
pub const SPECIAL_CHARS: &[char] = &['!', '@', '#', '$', '%', '^', '&', '(', ')'];

pub const MIN_LEN: usize = 8;

/// Outcome of [`check`]. Only the first failing rule is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    TooShort,
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSpecial,
    Strong,
}

impl Verdict {
    pub fn message(self) -> &'static str {
        match self {
            Verdict::TooShort => {
                "Password is too weak. It must be at least 8 characters long."
            }
            Verdict::MissingUppercase => {
                "Password is too weak. It must include at least one uppercase letter (A-Z)."
            }
            Verdict::MissingLowercase => {
                "Password is too weak. It must include at least one lowercase letter (a-z)."
            }
            Verdict::MissingDigit => {
                "Password is too weak. It must include at least one digit (0-9)."
            }
            Verdict::MissingSpecial => {
                "Password is too weak. It must include at least one special character such as !@#$%^&()."
            }
            Verdict::Strong => "Password is strong. It meets all requirements.",
        }
    }
}

/// Evaluate the rules in order and stop at the first failure.
pub fn check(password: &str) -> Verdict {
    if password.chars().count() < MIN_LEN {
        return Verdict::TooShort;
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Verdict::MissingUppercase;
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Verdict::MissingLowercase;
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Verdict::MissingDigit;
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(&c)) {
        return Verdict::MissingSpecial;
    }
    Verdict::Strong
}
