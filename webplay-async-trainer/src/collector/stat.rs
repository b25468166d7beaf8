use std::time::Duration;

/// Stats of one call to [`RolloutCollector::gather`](super::RolloutCollector::gather).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectorStat {
    /// Number of episodes collected.
    pub episodes: usize,

    /// Number of environment steps taken.
    pub env_steps: usize,

    /// Wall-clock time of the gather.
    pub duration: Duration,
}

/// Returns a formatted string of a set of [`CollectorStat`]s for reporting.
pub fn collector_stats_fmt(stats: &[CollectorStat]) -> String {
    let mut s = "batch, episodes, steps, duration [sec], steps per sec\n".to_string();
    for (i, stat) in stats.iter().enumerate() {
        let d = stat.duration.as_secs_f32();
        let p = stat.env_steps as f32 / d.max(f32::EPSILON);
        s += format!("{}, {}, {}, {}, {}\n", i, stat.episodes, stat.env_steps, d, p).as_str();
    }
    s
}
