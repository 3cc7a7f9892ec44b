//! 孤立森林异常检测模型
//!
//! 随机划分树集成：异常点更容易被孤立，平均路径更短，分数更接近 1。
//! 随机性只存在于 `fit`；森林建好之后只读，`score` 对同一森林是确定的。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::validate_contamination;
use super::errors::{AnomalyDetectionError, Result};
use super::features::FeatureVector;

/// Euler–Mascheroni 常数，用于调和数近似
pub const EULER_GAMMA: f64 = 0.577_215_664_9;

/// `c(ψ) == 0`（ψ = 1）时没有可比较的路径长度，返回中性分数
const UNINFORMATIVE_SCORE: f64 = 0.5;

/// 单个样本的二分类结果，对应 `-1` / `1` 约定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    Anomaly,
    Normal,
}

impl Prediction {
    pub fn is_anomaly(self) -> bool {
        self == Prediction::Anomaly
    }

    /// `-1` 为异常，`1` 为正常
    pub fn as_i8(self) -> i8 {
        match self {
            Prediction::Anomaly => -1,
            Prediction::Normal => 1,
        }
    }
}

impl TryFrom<i8> for Prediction {
    type Error = AnomalyDetectionError;

    fn try_from(value: i8) -> Result<Self> {
        match value {
            -1 => Ok(Prediction::Anomaly),
            1 => Ok(Prediction::Normal),
            other => Err(AnomalyDetectionError::invalid(format!(
                "prediction must be -1 or 1, got {}",
                other
            ))),
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` nodes.
///
/// `c(n) = 2·H(n−1) − 2(n−1)/n` with `H(i) ≈ ln(i) + γ`; `c(0) = c(1) = 0`.
pub fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
}

/// 树高上限 `ceil(log2(ψ))`
pub fn height_limit(subsample_size: usize) -> usize {
    if subsample_size <= 1 {
        return 0;
    }
    (subsample_size as f64).log2().ceil() as usize
}

/// 孤立森林
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    subsample_size: usize,
    dimension: usize,
    /// `c(subsample_size)`
    normalizer: f64,
}

impl IsolationForest {
    /// 在一批样本上训练森林
    ///
    /// `subsample_size` 大于样本数时截断为样本数。每棵树的种子在构建前
    /// 统一从 `rng` 中抽取，树与树之间不共享可变状态。
    pub fn fit<R: Rng + ?Sized>(
        samples: &[FeatureVector],
        num_trees: usize,
        subsample_size: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if samples.is_empty() {
            return Err(AnomalyDetectionError::invalid("samples must not be empty"));
        }
        if num_trees == 0 {
            return Err(AnomalyDetectionError::invalid("num_trees must be at least 1"));
        }
        if subsample_size == 0 {
            return Err(AnomalyDetectionError::invalid(
                "subsample_size must be at least 1",
            ));
        }
        let dimension = validate_samples(samples, None)?;

        let subsample_size = subsample_size.min(samples.len());
        let max_depth = height_limit(subsample_size);
        let seeds: Vec<u64> = (0..num_trees).map(|_| rng.gen()).collect();

        debug!(
            num_trees,
            subsample_size,
            max_depth,
            samples = samples.len(),
            "fitting isolation forest"
        );

        let trees = seeds
            .into_iter()
            .map(|seed| IsolationTree::from_seed(samples, dimension, subsample_size, seed))
            .collect();

        Ok(Self {
            trees,
            subsample_size,
            dimension,
            normalizer: average_path_length(subsample_size),
        })
    }

    /// 单个样本的异常分数，范围 `(0, 1]`
    ///
    /// 越接近 1 越可疑，0.5 左右或更低视为正常。维度不符或含非有限值时返回
    /// `InvalidArgument`。
    pub fn score(&self, sample: &[f64]) -> Result<f64> {
        check_sample(0, sample, self.dimension)?;
        Ok(self.score_unchecked(sample))
    }

    fn score_unchecked(&self, sample: &[f64]) -> f64 {
        if self.normalizer <= 0.0 {
            return UNINFORMATIVE_SCORE;
        }
        2f64.powf(-self.average_path(sample) / self.normalizer)
    }

    /// 样本在所有树上的平均路径长度
    pub fn average_path(&self, sample: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.path_length(sample)).sum();
        total / self.trees.len() as f64
    }

    /// 批量评分，校验维度与有限性
    pub fn score_samples(&self, samples: &[FeatureVector]) -> Result<Vec<f64>> {
        validate_samples(samples, Some(self.dimension))?;
        Ok(samples.iter().map(|s| self.score_unchecked(s)).collect())
    }

    /// 按 contamination 比例给出 `-1` / `1` 判定
    pub fn predict(&self, samples: &[FeatureVector], contamination: f64) -> Result<Vec<Prediction>> {
        validate_contamination(contamination)?;
        let scores = self.score_samples(samples)?;
        Ok(label_by_contamination(&scores, contamination))
    }

    pub fn trees(&self) -> &[IsolationTree] {
        &self.trees
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn subsample_size(&self) -> usize {
        self.subsample_size
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn normalizer(&self) -> f64 {
        self.normalizer
    }
}

/// 分数降序（稳定排序，平分按输入顺序），前 `round(contamination·n)` 个标记为异常
///
/// 分数等于本批最低分的样本不会被标记：它和主体无法区分。
/// 因此全相同的批次和单元素批次不会产生异常。
pub fn label_by_contamination(scores: &[f64], contamination: f64) -> Vec<Prediction> {
    let n = scores.len();
    let mut labels = vec![Prediction::Normal; n];
    if n == 0 {
        return labels;
    }

    let cutoff = ((contamination * n as f64).round() as usize).min(n);
    let floor = scores.iter().copied().fold(f64::INFINITY, f64::min);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for &i in order.iter().take(cutoff) {
        if scores[i] > floor {
            labels[i] = Prediction::Anomaly;
        }
    }
    labels
}

/// 校验样本非空、维度一致且全部有限，返回维度
fn validate_samples(samples: &[FeatureVector], expected: Option<usize>) -> Result<usize> {
    let dimension = match (expected, samples.first()) {
        (Some(d), _) => d,
        (None, Some(first)) => first.len(),
        (None, None) => return Err(AnomalyDetectionError::invalid("samples must not be empty")),
    };
    if dimension == 0 {
        return Err(AnomalyDetectionError::invalid(
            "feature vectors must have at least one feature",
        ));
    }
    for (i, sample) in samples.iter().enumerate() {
        check_sample(i, sample, dimension)?;
    }
    Ok(dimension)
}

fn check_sample(index: usize, sample: &[f64], dimension: usize) -> Result<()> {
    if sample.len() != dimension {
        return Err(AnomalyDetectionError::invalid(format!(
            "sample #{} has {} features, expected {}",
            index,
            sample.len(),
            dimension
        )));
    }
    if let Some(bad) = sample.iter().find(|v| !v.is_finite()) {
        return Err(AnomalyDetectionError::invalid(format!(
            "sample #{} contains non-finite value {}",
            index, bad
        )));
    }
    Ok(())
}

/// 单棵孤立树
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    root: IsolationNode,
    height_limit: usize,
}

/// 孤立树节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IsolationNode {
    Internal {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    Leaf {
        /// 到达该叶子的子样本数
        size: usize,
        depth: usize,
    },
}

impl IsolationTree {
    /// 用单棵树自己的种子完成子采样与划分，结果与其他树的构建顺序无关
    pub(crate) fn from_seed(
        samples: &[FeatureVector],
        dimension: usize,
        subsample_size: usize,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let subsample: Vec<&[f64]> =
            rand::seq::index::sample(&mut rng, samples.len(), subsample_size)
                .into_iter()
                .map(|i| samples[i].as_slice())
                .collect();
        let height_limit = height_limit(subsample_size);
        Self {
            root: build_node(&subsample, dimension, 0, height_limit, &mut rng),
            height_limit,
        }
    }

    /// `depth + c(leaf.size)`
    pub fn path_length(&self, sample: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;
        loop {
            match node {
                IsolationNode::Leaf { size, .. } => {
                    return depth as f64 + average_path_length(*size);
                }
                IsolationNode::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    // Missing features are rejected before traversal; NaN goes right.
                    let value = sample.get(*feature).copied().unwrap_or(f64::NAN);
                    node = if value < *threshold { &**left } else { &**right };
                    depth += 1;
                }
            }
        }
    }

    pub fn root(&self) -> &IsolationNode {
        &self.root
    }

    pub fn height_limit(&self) -> usize {
        self.height_limit
    }

    /// 最深叶子的深度
    pub fn depth(&self) -> usize {
        fn walk(node: &IsolationNode) -> usize {
            match node {
                IsolationNode::Leaf { depth, .. } => *depth,
                IsolationNode::Internal { left, right, .. } => walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }

    /// 所有叶子记录的样本数之和（等于子采样大小）
    pub fn leaf_population(&self) -> usize {
        fn walk(node: &IsolationNode) -> usize {
            match node {
                IsolationNode::Leaf { size, .. } => *size,
                IsolationNode::Internal { left, right, .. } => walk(left) + walk(right),
            }
        }
        walk(&self.root)
    }
}

fn build_node<R: Rng + ?Sized>(
    points: &[&[f64]],
    dimension: usize,
    depth: usize,
    height_limit: usize,
    rng: &mut R,
) -> IsolationNode {
    let leaf = IsolationNode::Leaf {
        size: points.len(),
        depth,
    };
    if points.len() <= 1 || depth >= height_limit {
        return leaf;
    }

    // Only features with spread can separate anything; none left means all points are identical.
    let spreads: Vec<(usize, f64, f64)> = (0..dimension)
        .filter_map(|feature| {
            let (lo, hi) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[feature]), hi.max(p[feature]))
            });
            (lo < hi).then_some((feature, lo, hi))
        })
        .collect();
    if spreads.is_empty() {
        return leaf;
    }

    let (feature, lo, hi) = if spreads.len() == 1 {
        spreads[0]
    } else {
        spreads[rng.gen_range(0..spreads.len())]
    };
    // Interpolate instead of sampling a range: `hi - lo` overflows for spans near f64::MAX.
    let u: f64 = rng.gen();
    let threshold = (lo * (1.0 - u) + hi * u).clamp(lo, hi);

    let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
        points.iter().copied().partition(|p| p[feature] < threshold);

    IsolationNode::Internal {
        feature,
        threshold,
        left: Box::new(build_node(&left, dimension, depth + 1, height_limit, rng)),
        right: Box::new(build_node(&right, dimension, depth + 1, height_limit, rng)),
    }
}
