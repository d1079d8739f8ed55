use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{DisplayPoint, Sample, ScaleRange};

/// 速率码不在表中时使用的抽取因子
pub const DEFAULT_DECIMATION_FACTOR: usize = 5;

/// 按设备速率码决定多少个原始样本平均成一个显示点
///
/// 速率越高平均的样本越多，使绘图点的速率大致恒定
pub fn decimation_factor(rate_code: u16) -> usize {
    match rate_code {
        1 | 2 | 4 => 1,
        8 => 2,
        16 => 3,
        32 => 5,
        64 => 10,
        128 => 20,
        256 => 40,
        512 => 80,
        1024 => 160,
        2048 => 320,
        _ => DEFAULT_DECIMATION_FACTOR,
    }
}

/// 超出 ±量程的样本在进入显示前的处理方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    /// 任一轴超出量程的样本不显示
    #[default]
    Drop,
    /// 各轴截断到量程内
    Clamp,
    PassThrough,
}

impl RangePolicy {
    pub fn apply(&self, sample: Sample, limit: f64) -> Option<Sample> {
        let within = |v: f64| (-limit..=limit).contains(&v);
        match self {
            RangePolicy::PassThrough => Some(sample),
            RangePolicy::Drop => {
                if within(sample.x) && within(sample.y) && within(sample.z) {
                    Some(sample)
                } else {
                    None
                }
            }
            RangePolicy::Clamp => Some(Sample::new(
                sample.capture_time,
                sample.x.clamp(-limit, limit),
                sample.y.clamp(-limit, limit),
                sample.z.clamp(-limit, limit),
            )),
        }
    }
}

/// 时间窗口内的抽取点，最旧的在前
#[derive(Debug, Clone)]
pub struct DisplayWindow {
    points: VecDeque<DisplayPoint>,
    horizon: Duration,
}

impl DisplayWindow {
    pub fn new(horizon: Duration) -> Self {
        Self {
            points: VecDeque::new(),
            horizon,
        }
    }

    pub fn push(&mut self, point: DisplayPoint) {
        self.points.push_back(point);
    }

    /// 从头部移除早于 `now - horizon` 的点
    pub fn prune(&mut self, now: Duration) {
        let threshold = now.as_secs_f64() - self.horizon.as_secs_f64();
        while self.points.front().is_some_and(|p| p.time < threshold) {
            self.points.pop_front();
        }
    }

    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisplayPoint> {
        self.points.iter()
    }

    pub fn last(&self) -> Option<&DisplayPoint> {
        self.points.back()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

/// 把原始样本按固定大小分组求平均，并维护显示窗口
#[derive(Debug)]
pub struct DecimationAggregator {
    raw: VecDeque<Sample>,
    window: DisplayWindow,
    factor: usize,
    scale: ScaleRange,
    policy: RangePolicy,
    rejected: u64,
}

impl DecimationAggregator {
    pub fn new(rate_code: u16, scale: ScaleRange, horizon: Duration, policy: RangePolicy) -> Self {
        let factor = decimation_factor(rate_code);
        Self {
            raw: VecDeque::with_capacity(factor * 2),
            window: DisplayWindow::new(horizon),
            factor,
            scale,
            policy,
            rejected: 0,
        }
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    pub fn pending(&self) -> usize {
        self.raw.len()
    }

    /// 被量程策略剔除的样本数
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn window(&self) -> &DisplayWindow {
        &self.window
    }

    /// 供绘图使用的整体快照
    pub fn snapshot(&self) -> Vec<DisplayPoint> {
        self.window.iter().copied().collect()
    }

    /// 一次聚合，`now` 为相对会话开始的时间
    ///
    /// 返回本次新增的显示点数
    pub fn tick<I>(&mut self, now: Duration, incoming: I) -> usize
    where
        I: IntoIterator<Item = Sample>,
    {
        let limit = self.scale.limit();
        for sample in incoming {
            match self.policy.apply(sample, limit) {
                Some(sample) => self.raw.push_back(sample),
                None => self.rejected += 1,
            }
        }

        let mut emitted = 0;
        while self.raw.len() >= self.factor {
            let group: Vec<Sample> = self.raw.drain(..self.factor).collect();
            if let Some(point) = DisplayPoint::mean_of(&group) {
                self.window.push(point);
                emitted += 1;
            }
        }

        self.window.prune(now);
        emitted
    }

    pub fn clear(&mut self) {
        self.raw.clear();
        self.window.clear();
        self.rejected = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(ms: u64, x: f64) -> Sample {
        Sample::new(Duration::from_millis(ms), x, 0.0, 1.0)
    }

    #[test]
    fn test_factor_table_and_default() {
        assert_eq!(decimation_factor(1), 1);
        assert_eq!(decimation_factor(8), 2);
        assert_eq!(decimation_factor(64), 10);
        assert_eq!(decimation_factor(2048), 320);
        assert_eq!(decimation_factor(3), DEFAULT_DECIMATION_FACTOR);
        assert_eq!(decimation_factor(0), DEFAULT_DECIMATION_FACTOR);
    }

    #[test]
    fn test_group_of_five_averages_to_middle() {
        // 速率码 32 对应因子 5
        let mut agg = DecimationAggregator::new(32, ScaleRange::G8, Duration::from_secs(5), RangePolicy::Drop);
        let samples = (1..=5).map(|i| sample(i * 10, i as f64));

        assert_eq!(agg.tick(Duration::from_millis(200), samples), 1);
        let points = agg.snapshot();
        assert_eq!(points.len(), 1);
        assert_relative_eq!(points[0].x, 3.0);
        assert_relative_eq!(points[0].time, 0.03);
        assert_eq!(agg.pending(), 0);
    }

    #[test]
    fn test_partial_group_waits_for_next_tick() {
        let mut agg = DecimationAggregator::new(32, ScaleRange::G8, Duration::from_secs(5), RangePolicy::Drop);

        assert_eq!(agg.tick(Duration::from_millis(200), (1..=3).map(|i| sample(i, 1.0))), 0);
        assert_eq!(agg.pending(), 3);
        assert!(agg.window().is_empty());

        assert_eq!(agg.tick(Duration::from_millis(400), (4..=8).map(|i| sample(i, 1.0))), 1);
        assert_eq!(agg.pending(), 3);
    }

    #[test]
    fn test_groups_are_oldest_first() {
        let mut agg = DecimationAggregator::new(8, ScaleRange::G8, Duration::from_secs(5), RangePolicy::PassThrough);
        let samples = [sample(1, 1.0), sample(2, 3.0), sample(3, 10.0), sample(4, 20.0), sample(5, 7.0)];

        assert_eq!(agg.tick(Duration::from_millis(10), samples), 2);
        let points = agg.snapshot();
        assert_relative_eq!(points[0].x, 2.0);
        assert_relative_eq!(points[1].x, 15.0);
        assert_eq!(agg.pending(), 1);
    }

    #[test]
    fn test_unmapped_rate_uses_default_factor() {
        let mut agg = DecimationAggregator::new(999, ScaleRange::G2, Duration::from_secs(5), RangePolicy::Drop);
        assert_eq!(agg.factor(), DEFAULT_DECIMATION_FACTOR);
        assert_eq!(agg.tick(Duration::ZERO, (0..4).map(|i| sample(i, 0.0))), 0);
    }

    #[test]
    fn test_window_never_exceeds_horizon() {
        let horizon = Duration::from_secs(5);
        let mut agg = DecimationAggregator::new(1, ScaleRange::G8, horizon, RangePolicy::Drop);

        // 20 秒内每 100 ms 一个样本，每 200 ms 聚合一次
        let mut t = 0u64;
        for tick in 1..=100u64 {
            let now = Duration::from_millis(tick * 200);
            let mut batch = Vec::new();
            while t < tick * 200 {
                batch.push(sample(t, 0.5));
                t += 100;
            }
            agg.tick(now, batch);

            let oldest_allowed = now.as_secs_f64() - horizon.as_secs_f64();
            assert!(agg.window().iter().all(|p| p.time >= oldest_allowed));
        }
        assert!(agg.window().len() <= 51);
    }

    #[test]
    fn test_prune_without_new_samples() {
        let mut agg = DecimationAggregator::new(1, ScaleRange::G8, Duration::from_secs(5), RangePolicy::Drop);
        agg.tick(Duration::from_secs(1), [sample(900, 1.0)]);
        assert_eq!(agg.window().len(), 1);
        agg.tick(Duration::from_secs(6), []);
        assert!(agg.window().is_empty());
    }

    #[test]
    fn test_range_policy_drop() {
        let mut agg = DecimationAggregator::new(1, ScaleRange::G2, Duration::from_secs(5), RangePolicy::Drop);
        agg.tick(Duration::from_secs(1), [sample(100, 1.5), sample(200, 2.5), sample(300, -2.0)]);
        assert_eq!(agg.window().len(), 2);
        assert_eq!(agg.rejected(), 1);
    }

    #[test]
    fn test_range_policy_clamp() {
        let mut agg = DecimationAggregator::new(1, ScaleRange::G2, Duration::from_secs(5), RangePolicy::Clamp);
        agg.tick(Duration::from_secs(1), [sample(100, 7.0), sample(200, -9.0)]);
        let points = agg.snapshot();
        assert_relative_eq!(points[0].x, 2.0);
        assert_relative_eq!(points[1].x, -2.0);
        assert_eq!(agg.rejected(), 0);
    }

    #[test]
    fn test_range_policy_pass_through() {
        let mut agg = DecimationAggregator::new(1, ScaleRange::G2, Duration::from_secs(5), RangePolicy::PassThrough);
        agg.tick(Duration::from_secs(1), [sample(100, 7.0)]);
        assert_relative_eq!(agg.snapshot()[0].x, 7.0);
    }

    #[test]
    fn test_clear_empties_buffers() {
        let mut agg = DecimationAggregator::new(32, ScaleRange::G8, Duration::from_secs(5), RangePolicy::Drop);
        agg.tick(Duration::from_secs(1), (0..7).map(|i| sample(i, 0.0)));
        agg.clear();
        assert_eq!(agg.pending(), 0);
        assert!(agg.window().is_empty());
    }
}
