use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Generates a random uppercase alphanumeric code, suitable for humans to
/// read aloud and type
pub fn random_code(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| (rng.sample(Alphanumeric) as char).to_ascii_uppercase())
        .take(length)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_uppercase_alphanumeric() {
        let code = random_code(8);

        assert_eq!(code.len(), 8);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
