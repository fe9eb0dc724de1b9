//! Human-readable booking references of the form `SOY3-<base36 ms>-<base36 random>`.

use chrono::Utc;
use rand::Rng;

pub const DEFAULT_PREFIX: &str = "SOY3";

const RANDOM_DIGITS: u32 = 5;
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Render `n` in base 36 using lowercase digits.
pub fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while n > 0 {
        digits.push(ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Generate a fresh reference for the current instant.
pub fn generate(prefix: &str) -> String {
    let now_ms = Utc::now().timestamp_millis().max(0) as u64;
    generate_at(prefix, now_ms, &mut rand::thread_rng())
}

pub fn generate_at<R: Rng + ?Sized>(prefix: &str, now_ms: u64, rng: &mut R) -> String {
    let space = 36u64.pow(RANDOM_DIGITS);
    let random = rng.gen_range(0..space);
    let suffix = format!("{:0>width$}", to_base36(random), width = RANDOM_DIGITS as usize);

    format!("{}-{}-{}", prefix, to_base36(now_ms), suffix).to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn test_reference_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let reference = generate_at(DEFAULT_PREFIX, 1_700_000_000_000, &mut rng);

        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "SOY3");
        assert_eq!(parts[1], "LOYW3V28");
        assert_eq!(parts[2].len(), 5);
        assert_eq!(reference, reference.to_uppercase());
    }

    #[test]
    fn test_generated_references_differ() {
        let a = generate(DEFAULT_PREFIX);
        let b = generate(DEFAULT_PREFIX);
        assert!(a.starts_with("SOY3-"));
        assert_ne!(a, b);
    }
}
