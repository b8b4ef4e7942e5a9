//! Writing closed groups to the store.

use crate::error::Result;
use crate::models::{Draft, DraftGroup, ImportedGroup};
use crate::store::ObservationStore;
use tracing::{debug, info};

/// Create each non-empty group and save its rows, in order.
///
/// The first failure is returned as is. Groups committed before it stay in
/// the store; removing them is up to the caller.
pub fn commit_groups<S>(groups: Vec<DraftGroup>, store: &mut S) -> Result<Vec<ImportedGroup>>
where
    S: ObservationStore + ?Sized,
{
    let mut imported = Vec::with_capacity(groups.len());

    for group in groups {
        if group.is_empty() {
            continue;
        }

        let id = store.create_group(group.kind, &group.name)?;
        debug!("Created group {} '{}' ({})", id, group.name, group.kind);

        for draft in &group.drafts {
            match draft {
                Draft::Point(point) => {
                    store.save_point(id, point)?;
                }
                Draft::Terrestrial(observation) => {
                    store.save_terrestrial_observation(id, observation)?;
                }
                Draft::Gnss(baseline) => {
                    store.save_gnss_observation(id, baseline)?;
                }
            }
        }

        info!(
            "Committed {} '{}' with {} records",
            group.kind,
            group.name,
            group.len()
        );
        imported.push(ImportedGroup {
            kind: group.kind,
            id,
            name: group.name,
        });
    }

    Ok(imported)
}
