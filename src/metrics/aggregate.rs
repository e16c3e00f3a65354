use crate::types::{PvcStats, VolumeRecord};

/// Keep the volumes that are backed by a PVC and report a positive capacity.
/// Everything else (ephemeral volumes, projected tokens, empty stats) is skipped.
pub fn aggregate(records: &[VolumeRecord]) -> Vec<PvcStats> {
    records.iter().filter_map(pvc_stats_from).collect()
}

fn pvc_stats_from(record: &VolumeRecord) -> Option<PvcStats> {
    let pvc = record.pvc_ref.as_ref()?;
    // Written this way so NaN capacity is rejected as well
    if !(record.capacity_bytes > 0.0) {
        return None;
    }
    Some(PvcStats {
        name: pvc.name.clone(),
        namespace: pvc.namespace.clone(),
        available_bytes: record.available_bytes,
        capacity_bytes: record.capacity_bytes,
        used_bytes: record.used_bytes,
    })
}
