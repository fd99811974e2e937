use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex")
});

// Local format (0803...) or international (+234803...).
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d{10,14}$").expect("phone regex"));

static ACCOUNT_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{10}$").expect("account number regex"));

static ELEVEN_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{11}$").expect("id number regex"));

pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn validate_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

/// NUBAN account numbers are ten digits.
pub fn validate_account_number(number: &str) -> bool {
    ACCOUNT_NUMBER_RE.is_match(number)
}

/// BVN and NIN are both eleven digits.
pub fn validate_bvn(bvn: &str) -> bool {
    ELEVEN_DIGITS_RE.is_match(bvn)
}

pub fn validate_nin(nin: &str) -> bool {
    ELEVEN_DIGITS_RE.is_match(nin)
}
