//! Password hashing (argon2id, PHC string format)

use argon2::{
    Argon2,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// `Err(password_hash::Error::Password)` on mismatch
pub fn check_password(password: &str, hashed_password: &str) -> Result<(), password_hash::Error> {
    let parsed = PasswordHash::new(hashed_password)?;
    Argon2::default().verify_password(password.as_bytes(), &parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_check() {
        let hashed = hash_password("secret123").unwrap();
        assert!(hashed.starts_with("$argon2"));
        assert!(check_password("secret123", &hashed).is_ok());
        assert_eq!(
            check_password("wrong-password", &hashed),
            Err(password_hash::Error::Password)
        );
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("secret123").unwrap();
        let b = hash_password("secret123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash() {
        assert!(check_password("secret123", "not-a-phc-string").is_err());
    }
}
