use rand::{distributions::Alphanumeric, Rng};

pub fn short_random(n: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(n)
        .map(char::from)
        .collect()
}

/// Generates a human-readable registration number. Uniqueness is enforced
/// by the database; callers retry on collision.
pub fn new_registration_number() -> String {
    format!("MCVU25-{}", short_random(6).to_uppercase())
}

#[cfg(test)]
mod test_registration_numbers {
    use crate::util::new_registration_number;

    #[test]
    fn has_expected_shape() {
        let number = new_registration_number();
        assert!(number.starts_with("MCVU25-"));
        assert_eq!(number.len(), "MCVU25-".len() + 6);
        assert!(number
            .strip_prefix("MCVU25-")
            .unwrap()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_lowercase()));
    }
}
