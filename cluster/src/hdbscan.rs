//! Density-based hierarchical clustering (HDBSCAN) over 2D points.
//!
//! Steps:
//!
//! 1. Core distance of each point: distance to its `min_samples`-th nearest
//!    neighbour.
//! 2. Minimum spanning tree over the mutual reachability distance
//!    `max(core(a), core(b), d(a, b))` (Prim, dense, O(n) memory).
//! 3. Single-linkage dendrogram from the sorted tree edges.
//! 4. Condensed tree: splits where both sides keep at least
//!    `min_cluster_size` points create new clusters, smaller sides fall out
//!    as noise at that density.
//! 5. Excess-of-mass selection of the most stable non-overlapping clusters.
//!    The root is never selected, so a single dense blob is labelled noise
//!    unless it splits.

use std::collections::VecDeque;

use crate::math::{dist_sq2, Point2};

/// Label assigned to points outside every selected cluster.
pub const NOISE: i32 = -1;

/// Labels each point with a cluster id (`0..`) or [`NOISE`].
///
/// Cluster ids are dense and ordered by discovery in the condensed tree,
/// which is deterministic for a given input order.
pub(crate) fn hdbscan(points: &[Point2], min_cluster_size: usize, min_samples: usize) -> Vec<i32> {
    let n = points.len();
    if n < 2 {
        return vec![NOISE; n];
    }
    let min_cluster_size = min_cluster_size.max(2);

    let core = core_distances(points, min_samples.clamp(1, n - 1));
    let mst = prim_mst(points, &core);
    let dendrogram = single_linkage(n, mst);
    let condensed = condense(n, &dendrogram, min_cluster_size);
    let selected = select_clusters(n, &condensed);
    label_points(n, &condensed, &selected)
}

fn dist(a: Point2, b: Point2) -> f64 {
    (dist_sq2(a, b) as f64).sqrt()
}

fn core_distances(points: &[Point2], k: usize) -> Vec<f64> {
    let mut buf = Vec::with_capacity(points.len());
    points
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            buf.clear();
            buf.extend(
                points
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(_, &q)| dist(p, q)),
            );
            let (_, kth, _) = buf.select_nth_unstable_by(k - 1, |a, b| a.total_cmp(b));
            *kth
        })
        .collect()
}

/// Returns the n-1 tree edges as (a, b, weight).
fn prim_mst(points: &[Point2], core: &[f64]) -> Vec<(usize, usize, f64)> {
    let n = points.len();
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut from = vec![0usize; n];
    let mut edges = Vec::with_capacity(n - 1);

    let mut current = 0;
    in_tree[0] = true;
    for _ in 1..n {
        let mut next = usize::MAX;
        let mut next_w = f64::INFINITY;
        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            let reach = dist(points[current], points[j]).max(core[current]).max(core[j]);
            if reach < best[j] {
                best[j] = reach;
                from[j] = current;
            }
            if best[j] < next_w || next == usize::MAX {
                next_w = best[j];
                next = j;
            }
        }
        in_tree[next] = true;
        edges.push((from[next], next, next_w));
        current = next;
    }
    edges
}

/// A merge in the single-linkage dendrogram. Node ids below `n` are points,
/// `n + i` is the i-th merge.
struct Merge {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

fn single_linkage(n: usize, mut edges: Vec<(usize, usize, f64)>) -> Vec<Merge> {
    edges.sort_by(|a, b| a.2.total_cmp(&b.2));

    // Union-find over dendrogram node ids.
    let mut parent: Vec<usize> = (0..2 * n - 1).collect();
    let mut size = vec![1usize; 2 * n - 1];
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    let mut merges = Vec::with_capacity(n - 1);
    for (a, b, w) in edges {
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        let node = n + merges.len();
        parent[ra] = node;
        parent[rb] = node;
        size[node] = size[ra] + size[rb];
        merges.push(Merge {
            left: ra,
            right: rb,
            distance: w,
            size: size[node],
        });
    }
    merges
}

/// Condensed cluster tree. Cluster ids start at `n` (the root).
struct Condensed {
    /// Cluster each point last belonged to before falling out.
    point_parent: Vec<usize>,
    /// Per cluster (indexed by id - n): parent cluster, birth density,
    /// children, accumulated stability.
    cluster_parent: Vec<Option<usize>>,
    birth: Vec<f64>,
    children: Vec<Vec<usize>>,
    stability: Vec<f64>,
}

fn lambda_of(distance: f64) -> f64 {
    1.0 / distance.max(1e-12)
}

fn condense(n: usize, merges: &[Merge], min_cluster_size: usize) -> Condensed {
    let root_node = 2 * n - 2;
    let mut c = Condensed {
        point_parent: vec![n; n],
        cluster_parent: vec![None],
        birth: vec![0.0],
        children: vec![Vec::new()],
        stability: vec![0.0],
    };

    let node_size = |node: usize| if node < n { 1 } else { merges[node - n].size };

    // Leaves under a dendrogram node fall out of `cluster` at `lambda`.
    let fall_out = |c: &mut Condensed, node: usize, cluster: usize, lambda: f64| {
        let mut stack = vec![node];
        while let Some(x) = stack.pop() {
            if x < n {
                c.point_parent[x] = cluster;
                c.stability[cluster - n] += lambda - c.birth[cluster - n];
            } else {
                let m = &merges[x - n];
                stack.push(m.right);
                stack.push(m.left);
            }
        }
    };

    let mut queue = VecDeque::new();
    queue.push_back((root_node, n));
    while let Some((node, cluster)) = queue.pop_front() {
        if node < n {
            // A single point still attached when its cluster shrinks to it.
            let birth = c.birth[cluster - n];
            fall_out(&mut c, node, cluster, birth);
            continue;
        }
        let m = &merges[node - n];
        let lambda = lambda_of(m.distance);
        let left_big = node_size(m.left) >= min_cluster_size;
        let right_big = node_size(m.right) >= min_cluster_size;

        match (left_big, right_big) {
            (true, true) => {
                // Points stay in `cluster` until the split.
                let birth = c.birth[cluster - n];
                c.stability[cluster - n] += (lambda - birth) * m.size as f64;
                for child in [m.left, m.right] {
                    let id = n + c.birth.len();
                    c.cluster_parent.push(Some(cluster));
                    c.birth.push(lambda);
                    c.children.push(Vec::new());
                    c.stability.push(0.0);
                    c.children[cluster - n].push(id);
                    queue.push_back((child, id));
                }
            }
            (true, false) => {
                fall_out(&mut c, m.right, cluster, lambda);
                queue.push_back((m.left, cluster));
            }
            (false, true) => {
                fall_out(&mut c, m.left, cluster, lambda);
                queue.push_back((m.right, cluster));
            }
            (false, false) => {
                fall_out(&mut c, m.left, cluster, lambda);
                fall_out(&mut c, m.right, cluster, lambda);
            }
        }
    }
    c
}

/// Excess of mass: keep a cluster unless its children are together more
/// stable. Returns the selection flag per cluster (indexed by id - n).
fn select_clusters(n: usize, c: &Condensed) -> Vec<bool> {
    let count = c.birth.len();
    let mut selected = vec![true; count];
    selected[0] = false;
    let mut stability = c.stability.clone();

    for idx in (1..count).rev() {
        let children = &c.children[idx];
        if children.is_empty() {
            continue;
        }
        let child_sum: f64 = children.iter().map(|&ch| stability[ch - n]).sum();
        if child_sum > stability[idx] {
            selected[idx] = false;
            stability[idx] = child_sum;
        } else {
            let mut stack: Vec<usize> = children.clone();
            while let Some(ch) = stack.pop() {
                selected[ch - n] = false;
                stack.extend(c.children[ch - n].iter().copied());
            }
        }
    }

    // The root is never a cluster, but when it does not split every point is
    // noise anyway. When it does split, its direct children remain eligible.
    selected
}

fn label_points(n: usize, c: &Condensed, selected: &[bool]) -> Vec<i32> {
    let mut label_of = vec![NOISE; selected.len()];
    let mut next = 0;
    for (idx, &sel) in selected.iter().enumerate() {
        if sel {
            label_of[idx] = next;
            next += 1;
        }
    }

    (0..n)
        .map(|p| {
            let mut cluster = c.point_parent[p];
            loop {
                let idx = cluster - n;
                if selected[idx] {
                    return label_of[idx];
                }
                match c.cluster_parent[idx] {
                    Some(parent) => cluster = parent,
                    None => return NOISE,
                }
            }
        })
        .collect()
}
