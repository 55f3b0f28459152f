use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::core::types::{PhotoAnalysis, PhotoCluster};

pub const DERIVED_CLUSTER_LABEL: &str = "unknown";

/// Groups analyses by cluster id, ascending. Members keep encounter order and
/// analyses without an id belong to no cluster.
pub fn derive_clusters(analyses: &[PhotoAnalysis]) -> Vec<PhotoCluster> {
    let mut groups: BTreeMap<u32, Vec<&PhotoAnalysis>> = BTreeMap::new();
    for analysis in analyses {
        if let Some(cluster_id) = analysis.cluster_id {
            groups.entry(cluster_id).or_default().push(analysis);
        }
    }

    groups
        .into_iter()
        .map(|(cluster_id, members)| PhotoCluster {
            cluster_id: cluster_id.to_string(),
            label_guess: DERIVED_CLUSTER_LABEL.to_string(),
            label_confidence: 0.0,
            time_range: Value::Object(Map::new()),
            image_ids: members.iter().map(|member| member.photo_index).collect(),
            hero_candidates: members
                .iter()
                .filter(|member| member.hero_candidate)
                .map(|member| member.photo_index)
                .collect(),
            cohesion_score: 0.0,
            notes: String::new(),
        })
        .collect()
}

/// Moves a model-declared cluster from batch-local to global numbering.
/// Numeric ids are shifted by `id_shift`; other ids are kept as written.
pub fn offset_cluster(mut cluster: PhotoCluster, photo_offset: u32, id_shift: u32) -> PhotoCluster {
    if let Ok(local_id) = cluster.cluster_id.trim().parse::<u32>() {
        cluster.cluster_id = local_id.saturating_add(id_shift).to_string();
    }
    for index in cluster
        .image_ids
        .iter_mut()
        .chain(cluster.hero_candidates.iter_mut())
    {
        *index = index.saturating_add(photo_offset);
    }
    cluster
}

/// Largest numeric id among analyses and clusters.
pub fn max_cluster_id(analyses: &[PhotoAnalysis], clusters: &[PhotoCluster]) -> Option<u32> {
    analyses
        .iter()
        .filter_map(|analysis| analysis.cluster_id)
        .chain(
            clusters
                .iter()
                .filter_map(|cluster| cluster.cluster_id.trim().parse::<u32>().ok()),
        )
        .max()
}

#[cfg(test)]
mod tests {
    use super::{max_cluster_id, offset_cluster};
    use crate::core::types::PhotoCluster;
    use serde_json::json;

    fn cluster(id: &str, image_ids: Vec<u32>) -> PhotoCluster {
        PhotoCluster {
            cluster_id: id.to_string(),
            label_guess: "Paris".to_string(),
            label_confidence: 0.9,
            time_range: json!({}),
            hero_candidates: image_ids.first().copied().into_iter().collect(),
            image_ids,
            cohesion_score: 0.5,
            notes: String::new(),
        }
    }

    #[test]
    fn offsetting_shifts_ids_and_members() {
        let shifted = offset_cluster(cluster("1", vec![0, 2]), 10, 4);
        assert_eq!(shifted.cluster_id, "5");
        assert_eq!(shifted.image_ids, vec![10, 12]);
        assert_eq!(shifted.hero_candidates, vec![10]);
        assert_eq!(shifted.label_guess, "Paris");

        let named = offset_cluster(cluster("beach", vec![1]), 10, 4);
        assert_eq!(named.cluster_id, "beach");
    }

    #[test]
    fn max_id_spans_analyses_and_declared_clusters() {
        assert_eq!(max_cluster_id(&[], &[cluster("7", vec![])]), Some(7));
        assert_eq!(max_cluster_id(&[], &[cluster("x", vec![])]), None);
    }
}
