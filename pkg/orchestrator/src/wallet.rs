use crate::{Error, Result};
use notes::Utxo;
use primitives::{Address, CryptoHash, SecpSigner, Signature, Signer};
use std::sync::Arc;

/// A wallet as the engine tracks it: identity, signing capability, a tracked
/// balance, and the set of unspent notes.
///
/// The tracked balance and the UTXO set are updated independently on
/// confirmation — the balance by transfer amount, the UTXO set by spent and
/// received notes — which is exactly what lets the balance verifier
/// cross-check one against the other.
#[derive(Clone)]
pub struct Wallet {
    address: Address,
    pubkey_x: [u8; 32],
    signer: Arc<dyn Signer>,
    balance: u64,
    utxos: Vec<Utxo>,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("balance", &self.balance)
            .field("utxos", &self.utxos.len())
            .finish()
    }
}

impl Wallet {
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self {
            address: signer.address(),
            pubkey_x: signer.public_key_x(),
            signer,
            balance: 0,
            utxos: Vec::new(),
        }
    }

    pub fn random() -> Self {
        Self::new(Arc::new(SecpSigner::random()))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The x-only public key notes are addressed to.
    pub fn pubkey(&self) -> [u8; 32] {
        self.pubkey_x
    }

    pub fn sign(&self, msg: &CryptoHash) -> Signature {
        self.signer.sign(msg)
    }

    /// The tracked balance, maintained by transfer bookkeeping.
    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn utxos(&self) -> &[Utxo] {
        &self.utxos
    }

    /// Sum of unspent note amounts; the invariant is `utxo_total() == balance()`.
    pub fn utxo_total(&self) -> u64 {
        self.utxos.iter().map(Utxo::amount).sum()
    }

    /// The most recently received unspent note.
    pub fn newest_utxo(&self) -> Option<&Utxo> {
        self.utxos.iter().max_by_key(|utxo| utxo.index)
    }

    /// Record a received note and credit its amount.
    pub fn receive(&mut self, utxo: Utxo) {
        self.balance += utxo.amount();
        self.utxos.push(utxo);
    }

    /// Record a received note without touching the tracked balance.
    ///
    /// Used when the balance is adjusted separately, e.g. change returning
    /// to the sender of a transfer.
    pub fn receive_untracked(&mut self, utxo: Utxo) {
        self.utxos.push(utxo);
    }

    /// Debit a sent amount from the tracked balance.
    pub fn debit(&mut self, amount: u64) {
        self.balance = self.balance.saturating_sub(amount);
    }

    /// Remove the notes at `indices` from the unspent set.
    pub fn mark_spent(&mut self, indices: &[u64]) {
        self.utxos.retain(|utxo| !indices.contains(&utxo.index));
    }

    /// Pick a covering subset of unspent notes for `amount`, largest first
    /// (fewest inputs).
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] naming the shortfall when the wallet cannot
    /// cover the amount.
    pub fn select_inputs(&self, amount: u64) -> Result<Vec<Utxo>> {
        let mut candidates: Vec<&Utxo> = self.utxos.iter().collect();
        candidates.sort_by(|a, b| b.amount().cmp(&a.amount()).then(a.index.cmp(&b.index)));

        let mut selected = Vec::new();
        let mut covered = 0u64;
        for utxo in candidates {
            if covered >= amount {
                break;
            }
            covered += utxo.amount();
            selected.push(utxo.clone());
        }

        if covered < amount {
            return Err(Error::Validation(format!(
                "wallet {} holds {covered} unspent, cannot cover {amount}",
                self.address.prefix()
            )));
        }

        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notes::Note;

    fn utxo(amount: u64, index: u64) -> Utxo {
        Utxo::new(Note::new(amount, [1; 32], [index as u8; 32]), index)
    }

    fn wallet_with(utxos: &[(u64, u64)]) -> Wallet {
        let mut wallet = Wallet::random();
        for (amount, index) in utxos {
            wallet.receive(utxo(*amount, *index));
        }
        wallet
    }

    #[test]
    fn balance_tracks_received_utxos() {
        let wallet = wallet_with(&[(100, 0), (50, 1)]);
        assert_eq!(wallet.balance(), 150);
        assert_eq!(wallet.utxo_total(), 150);
    }

    #[test]
    fn selection_is_largest_first() {
        let wallet = wallet_with(&[(10, 0), (100, 1), (30, 2)]);

        let selected = wallet.select_inputs(50).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].amount(), 100);

        let selected = wallet.select_inputs(120).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].amount(), 100);
        assert_eq!(selected[1].amount(), 30);
    }

    #[test]
    fn insufficient_funds_is_a_validation_error() {
        let wallet = wallet_with(&[(10, 0)]);
        let err = wallet.select_inputs(50).unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err}");
    }

    #[test]
    fn mark_spent_removes_by_index() {
        let mut wallet = wallet_with(&[(10, 0), (20, 1), (30, 2)]);
        wallet.mark_spent(&[0, 2]);

        assert_eq!(wallet.utxos().len(), 1);
        assert_eq!(wallet.utxo_total(), 20);
    }

    #[test]
    fn newest_utxo_is_highest_index() {
        let wallet = wallet_with(&[(10, 5), (20, 3)]);
        assert_eq!(wallet.newest_utxo().unwrap().index, 5);
    }
}
