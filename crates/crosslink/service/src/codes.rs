//! Verification-code generation.

use crosslink_types::{VerificationCode, CODE_ALPHABET, CODE_LENGTH};
use rand::Rng;

/// Draw a fresh code from the fixed alphabet.
///
/// `rand::thread_rng` is a CSPRNG, so codes are not guessable from prior
/// observations; collision against the live pending population is handled
/// by the caller's retry on `Conflict`.
pub(crate) fn generate_code<R: Rng>(rng: &mut R) -> VerificationCode {
    let raw: String = (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    VerificationCode::normalized(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    proptest! {
        #[test]
        fn generated_codes_are_well_formed(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let code = generate_code(&mut rng);
            prop_assert!(code.is_well_formed());
        }
    }

    #[test]
    fn generated_codes_vary() {
        let mut rng = rand::thread_rng();
        let first = generate_code(&mut rng);
        let distinct = (0..64).any(|_| generate_code(&mut rng) != first);
        assert!(distinct);
    }
}
