use sha2::{Digest, Sha256};

/// Content hash over named input texts, in the order given.
///
/// Names are part of the digest so swapping two files changes the hash.
pub fn hash_inputs<'a>(inputs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut hasher = Sha256::new();
    for (name, contents) in inputs {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(contents.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_depends_on_names_and_contents() {
        let base = hash_inputs([("eci.out", "1\n0.1\n")]);
        assert_eq!(base, hash_inputs([("eci.out", "1\n0.1\n")]));
        assert_ne!(base, hash_inputs([("clusmult.out", "1\n0.1\n")]));
        assert_ne!(base, hash_inputs([("eci.out", "1\n0.2\n")]));
        assert_eq!(base.len(), 64);
    }
}
