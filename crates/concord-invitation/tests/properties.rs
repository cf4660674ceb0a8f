//! Property coverage for the seed round-trip invariant §8 names: any
//! seed, however it's typed, produces a proof that validates against the
//! invitation `create` derived from the same seed (mod normalization),
//! and never against a different seed's invitation.

use concord_invitation::{create, generate_proof, validate};
use proptest::prelude::*;

proptest! {
    #[test]
    fn matching_seed_always_validates(seed in "[a-zA-Z0-9 ]{1,24}") {
        let created = create(&seed);
        let proof = generate_proof(&seed);
        prop_assert!(validate(&proof, &created.public_key).is_ok());
    }

    #[test]
    fn mismatched_seeds_never_validate(seed_a in "[a-zA-Z0-9]{1,24}", seed_b in "[a-zA-Z0-9]{1,24}") {
        prop_assume!(concord_invitation::normalize(&seed_a) != concord_invitation::normalize(&seed_b));
        let created = create(&seed_a);
        let proof = generate_proof(&seed_b);
        prop_assert!(validate(&proof, &created.public_key).is_err());
    }
}
