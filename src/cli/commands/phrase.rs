//! `phrase {save|clear}`: cache/forget the recovery phrase in the keychain
//! sink so later commands don't need `ENVSYNC_RECOVERY_PHRASE` set (spec.md
//! 6, SPEC_FULL.md B).

use crate::cli::args::PhraseAction;
use crate::core::{crypto, keychain, state};
use crate::error::{CryptoError, Result};

pub fn execute(action: PhraseAction) -> Result<()> {
    match action {
        PhraseAction::Save { phrase } => save(phrase),
        PhraseAction::Clear => clear(),
    }
}

/// Only cache a phrase that actually re-derives the key-check already
/// stored in local state (spec.md 8, testable property 10).
fn save(phrase: Option<String>) -> Result<()> {
    let phrase = match phrase {
        Some(p) => p,
        None => dialoguer::Password::new()
            .with_prompt("Recovery phrase")
            .interact()
            .map_err(|e| crate::error::Error::Other(format!("failed to read phrase: {e}")))?,
    };

    let state = state::load_state()?;
    let salt = state.salt()?;
    let key = crypto::derive_key(&phrase, &salt)?;
    let stored_tag = state.key_check()?;
    if !stored_tag.is_empty() && !crypto::verify_key_check(&key, &stored_tag) {
        return Err(CryptoError::BadPhrase.into());
    }

    keychain::put("phrase", &phrase)?;
    crate::cli::output::success("recovery phrase saved to the keychain");
    Ok(())
}

fn clear() -> Result<()> {
    keychain::clear("phrase")?;
    crate::cli::output::success("recovery phrase cleared from the keychain");
    Ok(())
}
