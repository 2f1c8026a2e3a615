//! Cross-partition label reconciliation.
//!
//! Points in a halo overlap are clustered independently by every partition
//! holding a copy, so one physical cluster can carry several ids. This pass
//! unions every pair of cluster ids that share a point id and maps each
//! group to its smallest id. It only reads partition labels; the
//! partition-local results stay as they are.

use gridscan_core::{Label, LabeledPoint};
use rayon::prelude::*;
use std::collections::HashMap;

/// Union-Find over dense label indices.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Returns true if two distinct sets were joined.
    fn union(&mut self, x: usize, y: usize) -> bool {
        let px = self.find(x);
        let py = self.find(y);

        if px == py {
            return false;
        }

        match self.rank[px].cmp(&self.rank[py]) {
            std::cmp::Ordering::Less => self.parent[px] = py,
            std::cmp::Ordering::Greater => self.parent[py] = px,
            std::cmp::Ordering::Equal => {
                self.parent[py] = px;
                self.rank[px] += 1;
            }
        }
        true
    }
}

/// Global labels after reconciling partitions.
#[derive(Debug, Clone, Default)]
pub struct LabelMerge {
    canonical: HashMap<i64, i64>,
    point_labels: HashMap<u64, Label>,
    /// Distinct clusters after merging.
    pub cluster_count: usize,
    /// Partition-local cluster ids folded into another id.
    pub merged_labels: usize,
}

impl LabelMerge {
    /// Global label for a partition-local label. Noise and unknown ids map to
    /// themselves.
    #[must_use]
    pub fn resolve(&self, label: Label) -> Label {
        label
            .cluster_id()
            .and_then(|id| self.canonical.get(&id))
            .map_or(label, |&id| Label::cluster(id))
    }

    /// Global label of a point. A point clustered in any partition takes that
    /// cluster; otherwise it keeps the noise label.
    #[must_use]
    pub fn point_label(&self, id: u64) -> Option<Label> {
        self.point_labels.get(&id).copied()
    }

    /// Number of distinct points seen.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.point_labels.len()
    }

    /// Points labeled noise in every partition that holds them.
    #[must_use]
    pub fn noise_count(&self) -> usize {
        self.point_labels.values().filter(|l| l.is_noise()).count()
    }
}

/// Reconciles cluster ids across partitions sharing point copies.
#[must_use]
pub fn merge_labels(partitions: &[&[LabeledPoint]]) -> LabelMerge {
    let mut pairs: Vec<(u64, Label)> = partitions
        .par_iter()
        .flat_map_iter(|points| points.iter().map(|p| (p.id, p.label)))
        .filter(|(_, label)| !label.is_unclassified())
        .collect();
    pairs.par_sort_unstable();

    let mut dense: HashMap<i64, usize> = HashMap::new();
    let mut ids: Vec<i64> = Vec::new();
    for (_, label) in &pairs {
        if let Some(id) = label.cluster_id() {
            dense.entry(id).or_insert_with(|| {
                ids.push(id);
                ids.len() - 1
            });
        }
    }

    let mut uf = UnionFind::new(ids.len());
    let mut merged_labels = 0;
    for group in pairs.chunk_by(|a, b| a.0 == b.0) {
        let mut clusters = group.iter().filter_map(|(_, l)| l.cluster_id());
        if let Some(first) = clusters.next() {
            for other in clusters {
                if uf.union(dense[&first], dense[&other]) {
                    merged_labels += 1;
                }
            }
        }
    }

    let mut smallest: HashMap<usize, i64> = HashMap::new();
    for (k, &id) in ids.iter().enumerate() {
        let root = uf.find(k);
        smallest
            .entry(root)
            .and_modify(|m| *m = (*m).min(id))
            .or_insert(id);
    }
    let canonical: HashMap<i64, i64> = ids
        .iter()
        .enumerate()
        .map(|(k, &id)| (id, smallest[&uf.find(k)]))
        .collect();

    // Pairs are sorted by (id, label), so a clustered copy sorts after noise.
    let point_labels: HashMap<u64, Label> = pairs
        .chunk_by(|a, b| a.0 == b.0)
        .map(|group| {
            let (id, label) = group[group.len() - 1];
            let global = label
                .cluster_id()
                .map_or(label, |cluster| Label::cluster(canonical[&cluster]));
            (id, global)
        })
        .collect();

    LabelMerge {
        cluster_count: smallest.len(),
        canonical,
        point_labels,
        merged_labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(id: u64, label: i64) -> LabeledPoint {
        let mut p = LabeledPoint::new(id, 0.0, 0.0);
        p.label = Label(label);
        p
    }

    #[test]
    fn test_union_find() {
        let mut uf = UnionFind::new(4);
        assert!(uf.union(0, 1));
        assert!(uf.union(2, 3));
        assert!(!uf.union(1, 0));
        assert_ne!(uf.find(0), uf.find(2));
        assert!(uf.union(1, 3));
        assert_eq!(uf.find(0), uf.find(2));
    }

    #[test]
    fn test_shared_point_merges_clusters() {
        let left = vec![labeled(1, 1), labeled(2, 1), labeled(3, 1)];
        let right = vec![labeled(3, 1_000_001), labeled(4, 1_000_001)];
        let merge = merge_labels(&[left.as_slice(), right.as_slice()]);

        assert_eq!(merge.cluster_count, 1);
        assert_eq!(merge.merged_labels, 1);
        assert_eq!(merge.resolve(Label(1_000_001)), Label(1));
        assert_eq!(merge.point_label(4), Some(Label(1)));
        assert_eq!(merge.point_count(), 4);
    }

    #[test]
    fn test_disjoint_clusters_stay_apart() {
        let left = vec![labeled(1, 1), labeled(2, 2)];
        let right = vec![labeled(3, 1_000_001)];
        let merge = merge_labels(&[left.as_slice(), right.as_slice()]);

        assert_eq!(merge.cluster_count, 3);
        assert_eq!(merge.merged_labels, 0);
        assert_eq!(merge.resolve(Label(2)), Label(2));
    }

    #[test]
    fn test_noise_copy_defers_to_cluster() {
        // Point 5 is noise in one partition and a border point in the other.
        let left = vec![labeled(5, -1), labeled(6, -1)];
        let right = vec![labeled(5, 1_000_001)];
        let merge = merge_labels(&[left.as_slice(), right.as_slice()]);

        assert_eq!(merge.point_label(5), Some(Label(1_000_001)));
        assert_eq!(merge.point_label(6), Some(Label::NOISE));
        assert_eq!(merge.noise_count(), 1);
        assert_eq!(merge.resolve(Label::NOISE), Label::NOISE);
    }

    #[test]
    fn test_transitive_chain() {
        let a = vec![labeled(1, 10), labeled(2, 10)];
        let b = vec![labeled(2, 20), labeled(3, 20)];
        let c = vec![labeled(3, 30), labeled(4, 30)];
        let merge = merge_labels(&[a.as_slice(), b.as_slice(), c.as_slice()]);

        assert_eq!(merge.cluster_count, 1);
        assert_eq!(merge.merged_labels, 2);
        for label in [10, 20, 30] {
            assert_eq!(merge.resolve(Label(label)), Label(10));
        }
    }
}
