use std::fmt;
use std::time::Duration;

/// Counters collected by a strategy run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub queries: usize,
    pub matches: usize,
    /// Queries that were not evaluated (shared-memory snapshot failure)
    pub skipped: usize,
}

/// Trailing section of the output stream; starts with a "Timing summary" line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimingSummary {
    Sequential { elapsed: Duration },
    SharedMemory { threads: usize, elapsed: Duration },
    Distributed { participants: usize, elapsed: Duration },
}

impl fmt::Display for TimingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential { elapsed } => {
                writeln!(f, "\nTiming summary (sequential):")?;
                writeln!(f, "  Total time: {:.6} seconds", elapsed.as_secs_f64())
            }
            Self::SharedMemory { threads, elapsed } => {
                writeln!(f, "\nTiming summary (shared memory):")?;
                writeln!(f, "  Number of threads: {threads}")?;
                writeln!(f, "  Parallel time: {:.6} seconds", elapsed.as_secs_f64())
            }
            Self::Distributed {
                participants,
                elapsed,
            } => {
                writeln!(f, "\nTiming summary (distributed):")?;
                writeln!(f, "  Total time: {:.6} seconds", elapsed.as_secs_f64())?;
                writeln!(f, "  Number of participants: {participants}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_starts_with_marker() {
        let summary = TimingSummary::SharedMemory {
            threads: 4,
            elapsed: Duration::from_millis(1500),
        }
        .to_string();
        let first = summary.lines().find(|l| !l.is_empty()).unwrap();
        assert!(first.to_lowercase().starts_with("timing summary"));
        assert!(summary.contains("Number of threads: 4"));
        assert!(summary.contains("1.500000 seconds"));
    }
}
