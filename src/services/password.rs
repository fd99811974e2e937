use crate::errors::Result;

/// bcrypt work factor.
pub const HASH_COST: u32 = 10;

pub fn hash(plain: &str) -> Result<String> {
    Ok(bcrypt::hash(plain, HASH_COST)?)
}

pub fn verify(plain: &str, hashed: &str) -> Result<bool> {
    if hashed.is_empty() {
        return Ok(false);
    }
    Ok(bcrypt::verify(plain, hashed)?)
}
