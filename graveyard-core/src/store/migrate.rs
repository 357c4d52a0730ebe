//! Backend-to-backend migration.
//!
//! Reads every record out of one engine and bulk-inserts it into another.
//! Runs on whole backends, outside the live [`crate::store::Store`] facade
//! and its write queue; intended for one-off conversions at startup or
//! from an admin tool.

use tracing::info;

use crate::error::Result;
use crate::store::StoreBackend;

/// Copy all graveyards and discoveries from `source` into `dest`.
///
/// Returns `(graveyards, discoveries)` copied. Storage identities are
/// reassigned by the destination engine; search keys and discovery pairs
/// carry over verbatim.
///
/// # Errors
/// Propagates the first backend error from either side; a partial copy
/// is possible on failure and the caller should discard the destination.
pub fn copy_between(
    source: &dyn StoreBackend,
    dest: &mut dyn StoreBackend,
) -> Result<(usize, usize)> {
    let graveyards = source.select_all()?;
    let graveyard_count = dest.insert_batch(&graveyards)?;

    let mut discovery_count = 0_usize;
    for actor in source.select_actors_with_discoveries()? {
        for key in source.select_discovered_keys(actor)? {
            dest.insert_discovery(&crate::types::Discovery::new(key, actor))?;
            discovery_count += 1;
        }
    }

    info!(
        graveyards = graveyard_count,
        discoveries = discovery_count,
        "store migration completed"
    );
    Ok((graveyard_count, discovery_count))
}
