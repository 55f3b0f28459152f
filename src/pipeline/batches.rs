use std::collections::HashSet;
use std::ops::Range;

use tracing::{debug, warn};

use crate::core::types::{PhotoAnalysis, PhotoCluster};
use crate::pipeline::clusters::{derive_clusters, max_cluster_id, offset_cluster};

/// Contiguous photo ranges of at most `batch_size` photos each.
pub fn plan_batches(photo_count: usize, batch_size: usize) -> Vec<Range<usize>> {
    let batch_size = batch_size.max(1);
    (0..photo_count)
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(photo_count))
        .collect()
}

/// What one analysis call returned, still in batch-local numbering.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchAnalysis {
    pub range: Range<usize>,
    pub analyses: Vec<PhotoAnalysis>,
    pub clusters: Vec<PhotoCluster>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedAnalysis {
    pub analyses: Vec<PhotoAnalysis>,
    pub clusters: Vec<PhotoCluster>,
}

/// Re-offsets every batch into global numbering and concatenates them.
///
/// Cluster ids of later batches are shifted past the largest id already in
/// use. A batch's declared clusters win over clusters derived from its
/// analyses. The result holds exactly one analysis per photo index in
/// `0..photo_count`, with placeholders for indices no batch reported.
pub fn merge_batches(photo_count: usize, batches: Vec<BatchAnalysis>) -> MergedAnalysis {
    let mut merged = MergedAnalysis::default();
    let mut next_cluster_id = 0u32;

    for batch in batches {
        let offset = batch.range.start as u32;
        let batch_len = batch.range.len() as u32;
        let mut seen = HashSet::new();
        let mut analyses: Vec<PhotoAnalysis> = batch
            .analyses
            .into_iter()
            .filter(|analysis| analysis.photo_index < batch_len)
            .filter(|analysis| seen.insert(analysis.photo_index))
            .collect();

        let batch_max = max_cluster_id(&analyses, &batch.clusters);
        for analysis in &mut analyses {
            analysis.photo_index += offset;
            if let Some(cluster_id) = analysis.cluster_id.as_mut() {
                *cluster_id = cluster_id.saturating_add(next_cluster_id);
            }
        }

        let clusters = if batch.clusters.is_empty() {
            derive_clusters(&analyses)
        } else {
            debug!(
                batch_start = offset,
                clusters = batch.clusters.len(),
                "using model-declared clusters"
            );
            batch
                .clusters
                .into_iter()
                .map(|cluster| offset_cluster(cluster, offset, next_cluster_id))
                .collect()
        };

        if let Some(batch_max) = batch_max {
            next_cluster_id = next_cluster_id.saturating_add(batch_max).saturating_add(1);
        }
        merged.analyses.extend(analyses);
        merged.clusters.extend(clusters);
    }

    merged.analyses = pad_analyses(photo_count, merged.analyses);
    merged
}

/// Sorts by index and fills gaps so index `i` sits at position `i`.
pub fn pad_analyses(photo_count: usize, mut analyses: Vec<PhotoAnalysis>) -> Vec<PhotoAnalysis> {
    analyses.retain(|analysis| (analysis.photo_index as usize) < photo_count);
    analyses.sort_by_key(|analysis| analysis.photo_index);
    analyses.dedup_by_key(|analysis| analysis.photo_index);

    let missing = photo_count - analyses.len();
    if missing == 0 {
        return analyses;
    }
    warn!(missing, photo_count, "padding photo analyses with placeholders");

    let mut reported = analyses.into_iter().peekable();
    (0..photo_count as u32)
        .map(|index| match reported.next_if(|analysis| analysis.photo_index == index) {
            Some(analysis) => analysis,
            None => PhotoAnalysis::placeholder(index),
        })
        .collect()
}
