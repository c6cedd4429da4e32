//! phrase-cache: phrase → result memory for spoken commands
//!
//! Two caches share one matching algorithm: simple intents (`{intent, params}`)
//! and fully compiled execution plans. Both are keyed by normalized text and
//! persisted together with learned aliases in a single phrase-bank document.

mod text;
pub use text::{extract_distance, normalize, numbers, similarity};

mod error;
pub use error::{CacheError, Result};

mod cache;
pub use cache::{CacheConfig, CacheEntry, CacheHit, CachedResult, EntrySource, MatchKind, PhraseCache};

mod bank;
pub use bank::{AliasEntry, BankStats, IntentResult, PhraseBank, PhraseBankDocument, SharedPhraseBank};

/// Initialize the phrase cache system
pub fn init() -> Result<()> {
    tracing::info!("Initializing phrase cache system");
    Ok(())
}
