//! `Keyring`: the historical sequence of a scope's keysets (glossary),
//! specialized here to the team scope so link bodies stay decryptable
//! after key rotation (§4.1 "Encryption of links").

use concord_crypto::KeysetWithSecrets;
use std::collections::HashMap;

/// Every generation of the team scope's keyset this `Team` has ever held,
/// indexed by generation. Old generations are retained so historic links
/// remain decryptable after a rotation (§4.4 "Keyring history is retained").
#[derive(Debug, Default)]
pub struct TeamKeyring {
    generations: HashMap<u64, KeysetWithSecrets>,
    current: u64,
}

impl TeamKeyring {
    /// Start a keyring from a freshly generated generation-0 team keyset.
    pub fn new(generation_zero: KeysetWithSecrets) -> Self {
        let current = generation_zero.public.generation;
        let mut generations = HashMap::new();
        generations.insert(current, generation_zero);
        Self { generations, current }
    }

    /// The current (highest-known) generation's keyset.
    pub fn current(&self) -> &KeysetWithSecrets {
        self.generations
            .get(&self.current)
            .expect("current generation always present")
    }

    /// The current generation number.
    pub fn current_generation(&self) -> u64 {
        self.current
    }

    /// Look up a specific generation, e.g. to decrypt an old link.
    pub fn get(&self, generation: u64) -> Option<&KeysetWithSecrets> {
        self.generations.get(&generation)
    }

    /// Install a newly rotated generation as current. Older generations
    /// are kept for historic decryption.
    pub fn install(&mut self, keys: KeysetWithSecrets) {
        self.current = keys.public.generation;
        self.generations.insert(self.current, keys);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_crypto::KeyScope;

    #[test]
    fn old_generation_stays_readable_after_rotation() {
        let gen0 = KeysetWithSecrets::generate(KeyScope::team("acme"));
        let mut keyring = TeamKeyring::new(gen0);
        assert_eq!(keyring.current_generation(), 0);

        let gen1 = KeysetWithSecrets::generate_at(KeyScope::team("acme"), 1);
        keyring.install(gen1);

        assert_eq!(keyring.current_generation(), 1);
        assert!(keyring.get(0).is_some());
        assert!(keyring.get(1).is_some());
    }
}
