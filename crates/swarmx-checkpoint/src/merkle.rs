use swarmx_crypto::sha256_hex;

/// Proof that `leaf_hash` at `leaf_index` is part of the tree rooted at
/// `root` (§4.12): the sibling hash at each level on the path to the
/// root, ordered leaf-to-root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub leaf_hash: String,
    pub siblings: Vec<String>,
    pub root: String,
}

fn hash_pair(left: &str, right: &str) -> String {
    sha256_hex(format!("{left}{right}").as_bytes())
}

/// Binary Merkle tree over leaf hashes, duplicating the last leaf at any
/// level with an odd count (§4.12).
#[derive(Clone, Debug)]
pub struct MerkleTree {
    levels: Vec<Vec<String>>,
}

impl MerkleTree {
    /// Builds the tree over pre-hashed leaves (op hashes). An empty input
    /// yields a tree whose root is the hash of the empty string.
    pub fn build(leaf_hashes: &[String]) -> Self {
        if leaf_hashes.is_empty() {
            return Self { levels: vec![vec![sha256_hex(b"")]] };
        }

        let mut levels = vec![leaf_hashes.to_vec()];
        while levels.last().unwrap().len() > 1 {
            let current = levels.last().unwrap();
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            let mut i = 0;
            while i < current.len() {
                let left = &current[i];
                let right = if i + 1 < current.len() { &current[i + 1] } else { left };
                next.push(hash_pair(left, right));
                i += 2;
            }
            levels.push(next);
        }
        Self { levels }
    }

    pub fn root(&self) -> String {
        self.levels.last().unwrap()[0].clone()
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Produces an inclusion proof for the leaf at `index`, or `None` if
    /// out of range.
    pub fn prove(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }

        let leaf_hash = self.levels[0][index].clone();
        let mut siblings = Vec::new();
        let mut idx = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
            let sibling = if sibling_idx < level.len() { level[sibling_idx].clone() } else { level[idx].clone() };
            siblings.push(sibling);
            idx /= 2;
        }

        Some(MerkleProof { leaf_index: index, leaf_hash, siblings, root: self.root() })
    }
}

/// Recomputes the path from `proof.leaf_hash` to the root using
/// `proof.siblings`, and compares against `proof.root` and the supplied
/// `root`. A valid proof for a leaf in the set implies the root.
pub fn verify_proof(proof: &MerkleProof, root: &str) -> bool {
    if proof.root != root {
        return false;
    }

    let mut hash = proof.leaf_hash.clone();
    let mut idx = proof.leaf_index;

    for sibling in &proof.siblings {
        hash = if idx % 2 == 0 { hash_pair(&hash, sibling) } else { hash_pair(sibling, &hash) };
        idx /= 2;
    }

    hash == *root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<String> {
        (0..n).map(|i| sha256_hex(format!("op-{i}").as_bytes())).collect()
    }

    #[test]
    fn proof_round_trips_for_every_leaf_even_count() {
        let tree = MerkleTree::build(&leaves(8));
        for i in 0..8 {
            let proof = tree.prove(i).unwrap();
            assert!(verify_proof(&proof, &tree.root()));
        }
    }

    #[test]
    fn proof_round_trips_with_odd_leaf_count() {
        let tree = MerkleTree::build(&leaves(5));
        for i in 0..5 {
            let proof = tree.prove(i).unwrap();
            assert!(verify_proof(&proof, &tree.root()));
        }
    }

    #[test]
    fn tampered_leaf_fails_verification() {
        let tree = MerkleTree::build(&leaves(4));
        let mut proof = tree.prove(2).unwrap();
        proof.leaf_hash = sha256_hex(b"tampered");
        assert!(!verify_proof(&proof, &tree.root()));
    }

    #[test]
    fn single_leaf_tree_is_its_own_root() {
        let tree = MerkleTree::build(&leaves(1));
        let proof = tree.prove(0).unwrap();
        assert!(proof.siblings.is_empty());
        assert!(verify_proof(&proof, &tree.root()));
    }
}
