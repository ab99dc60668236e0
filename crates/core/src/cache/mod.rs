mod error;
mod keys;
mod scripts;
mod traits;

pub use error::{CacheError, Result};
pub use keys::{
    lock_key, quantity_key, sync_lock_key, LOCK_PREFIX, QUANTITY_PREFIX, SYNC_LOCK_PREFIX,
};
pub use scripts::{
    decode_decrement_reply, evaluate_script, CacheScript, DecrementReply, ScriptOutcome,
    ScriptWrite, MIRROR_INSUFFICIENT, MIRROR_MISSING,
};
pub use traits::Cache;
