use crate::utils::AppResult;

/// bcrypt password hashing with a configurable cost.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> AppResult<String> {
        Ok(bcrypt::hash(password, self.cost)?)
    }

    /// `false` on mismatch and on malformed hashes; never an error.
    pub fn verify(&self, password: &str, password_hash: &str) -> bool {
        bcrypt::verify(password, password_hash).unwrap_or(false)
    }

    /// True when the stored hash was made with a different cost (or is not bcrypt at all).
    pub fn needs_rehash(&self, password_hash: &str) -> bool {
        hash_cost(password_hash) != Some(self.cost)
    }
}

/// Extracts the cost from `$2b$12$...`.
fn hash_cost(password_hash: &str) -> Option<u32> {
    let mut parts = password_hash.split('$');
    if !parts.next()?.is_empty() {
        return None;
    }
    let version = parts.next()?;
    if !matches!(version, "2a" | "2b" | "2x" | "2y") {
        return None;
    }
    parts.next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum bcrypt cost keeps the tests fast.
    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4)
    }

    #[test]
    fn test_hash_then_verify() {
        let hasher = hasher();
        let hash = hasher.hash("securepassword123").unwrap();
        assert_ne!(hash, "securepassword123");
        assert!(hasher.verify("securepassword123", &hash));
        assert!(!hasher.verify("wrongpassword", &hash));
    }

    #[test]
    fn test_malformed_hash_does_not_verify() {
        assert!(!hasher().verify("anything", "not-a-bcrypt-hash"));
    }

    #[test]
    fn test_needs_rehash_when_cost_changes() {
        let hash = hasher().hash("securepassword123").unwrap();
        assert!(!hasher().needs_rehash(&hash));
        assert!(PasswordHasher::new(5).needs_rehash(&hash));
        assert!(hasher().needs_rehash("$argon2id$v=19$m=65536"));
    }
}
