use std::time::Duration;

/// 一行解析后的遥测数据，由采集线程创建后不再修改
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub capture_time: Duration,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Sample {
    pub fn new(capture_time: Duration, x: f64, y: f64, z: f64) -> Self {
        Self { capture_time, x, y, z }
    }
}

/// 显示窗口中的抽取点，时间为相对会话开始的秒数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayPoint {
    pub time: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl DisplayPoint {
    /// 一组原始样本的算术平均，空组返回 `None`
    pub fn mean_of(group: &[Sample]) -> Option<Self> {
        if group.is_empty() {
            return None;
        }
        let n = group.len() as f64;
        let (t, x, y, z) = group.iter().fold((0.0, 0.0, 0.0, 0.0), |acc, s| {
            (
                acc.0 + s.capture_time.as_secs_f64(),
                acc.1 + s.x,
                acc.2 + s.y,
                acc.3 + s.z,
            )
        });
        Some(Self {
            time: t / n,
            x: x / n,
            y: y / n,
            z: z / n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_of_group() {
        let group: Vec<Sample> = (1..=5)
            .map(|i| Sample::new(Duration::from_millis(i * 100), i as f64, -(i as f64), 0.5))
            .collect();
        let point = DisplayPoint::mean_of(&group).unwrap();
        assert_relative_eq!(point.time, 0.3);
        assert_relative_eq!(point.x, 3.0);
        assert_relative_eq!(point.y, -3.0);
        assert_relative_eq!(point.z, 0.5);
    }

    #[test]
    fn test_mean_of_empty_group() {
        assert!(DisplayPoint::mean_of(&[]).is_none());
    }
}
