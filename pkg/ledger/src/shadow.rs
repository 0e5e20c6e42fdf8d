use crate::{Error, Ledger, Result};
use accumulator::Tree;
use primitives::CryptoHash;
use tracing::info;

/// A local mirror of the canonical on-chain accumulator.
///
/// Built by replaying the ledger's commitment log. Construction fails with
/// [`Error::RootDivergence`] when the recomputed root does not match the
/// ledger-reported one — every witness generated from a diverged mirror
/// would be rejected, so this is a precondition, not a warning.
#[derive(Debug, Clone)]
pub struct ShadowTree {
    tree: Tree,
}

impl ShadowTree {
    /// Rebuild the mirror from the ledger and verify it against the
    /// ledger-reported root.
    pub async fn sync(ledger: &dyn Ledger) -> Result<Self> {
        let log = ledger.commitment_log().await?;

        for (position, entry) in log.iter().enumerate() {
            if entry.index != position as u64 {
                return Err(Error::MalformedLog(format!(
                    "commitment log entry {} claims index {}",
                    position, entry.index
                )));
            }
        }

        let tree = Tree::from_leaves(log.iter().map(|entry| entry.commitment))?;

        let reported = ledger.current_root().await?;
        if tree.root() != reported {
            return Err(Error::RootDivergence {
                local: tree.root(),
                reported,
            });
        }

        info!(
            leaves = tree.leaf_count(),
            root = %tree.root().prefix(),
            "synced shadow tree"
        );

        Ok(Self { tree })
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> CryptoHash {
        self.tree.root()
    }

    pub fn into_tree(self) -> Tree {
        self.tree
    }
}
