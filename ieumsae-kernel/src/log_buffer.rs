/**
 * DETECTION LOG BUFFER - Simulated object-recognition feed per camera
 *
 * ROLE: Bounded newest-first ring of `DetectionLog` entries, one per camera,
 * plus the generator that fabricates one entry per tick.
 *
 * The generator is a stand-in for a detection backend; a real feed only has
 * to call `LogBuffer::push` the same way.
 */

use crate::models::DetectionLog;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;
use time::OffsetDateTime;

pub const DEFAULT_CAPACITY: usize = 30;

/// Labels kept from the shuffled label set for each simulated detection.
pub const SAMPLE_SIZE: usize = 2;

#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<DetectionLog>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::with_capacity(capacity), capacity }
    }

    /// Prepends `log` and evicts the oldest entries beyond capacity.
    pub fn push(&mut self, log: DetectionLog) {
        self.entries.push_front(log);
        self.entries.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn newest(&self) -> Option<&DetectionLog> {
        self.entries.front()
    }

    pub fn to_vec(&self) -> Vec<DetectionLog> {
        self.entries.iter().cloned().collect()
    }
}

/// Shuffle-then-slice: shuffles the whole label set and keeps the first two.
pub fn sample_objects<R: Rng + ?Sized>(labels: &[String], rng: &mut R) -> Vec<String> {
    let mut pool = labels.to_vec();
    pool.shuffle(rng);
    pool.truncate(SAMPLE_SIZE);
    pool
}

pub fn simulate_detection(camera_id: &str, labels: &[String]) -> DetectionLog {
    let objects = sample_objects(labels, &mut rand::thread_rng());
    DetectionLog {
        timestamp: OffsetDateTime::now_utc(),
        camera_id: camera_id.to_string(),
        objects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn labels() -> Vec<String> {
        ["person", "car", "truck", "bicycle", "bus"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_buffer_never_exceeds_capacity() {
        let mut buffer = LogBuffer::default();
        for i in 0..100 {
            buffer.push(simulate_detection("camera1", &labels()));
            assert!(buffer.len() <= DEFAULT_CAPACITY, "overflow at push {i}");
        }
        assert_eq!(buffer.len(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_newest_entry_first() {
        let mut buffer = LogBuffer::new(3);
        for label in ["a", "b", "c", "d"] {
            buffer.push(DetectionLog {
                timestamp: OffsetDateTime::now_utc(),
                camera_id: "cam".into(),
                objects: vec![label.into()],
            });
        }
        let objects: Vec<_> = buffer.to_vec().into_iter().map(|l| l.objects[0].clone()).collect();
        assert_eq!(objects, vec!["d", "c", "b"]);
        assert_eq!(buffer.newest().unwrap().objects, vec!["d".to_string()]);
    }

    #[test]
    fn test_timestamps_non_increasing() {
        let mut buffer = LogBuffer::default();
        for _ in 0..45 {
            buffer.push(simulate_detection("camera2", &labels()));
        }
        let logs = buffer.to_vec();
        for pair in logs.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[test]
    fn test_sample_draws_without_replacement() {
        let mut rng = StdRng::seed_from_u64(7);
        let labels = labels();
        for _ in 0..50 {
            let objects = sample_objects(&labels, &mut rng);
            assert_eq!(objects.len(), SAMPLE_SIZE);
            let distinct: HashSet<_> = objects.iter().collect();
            assert_eq!(distinct.len(), objects.len());
            assert!(objects.iter().all(|o| labels.contains(o)));
        }
    }

    #[test]
    fn test_sample_from_small_label_sets() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_objects(&[], &mut rng).is_empty());
        assert_eq!(sample_objects(&["bus".to_string()], &mut rng), vec!["bus".to_string()]);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut buffer = LogBuffer::new(0);
        buffer.push(simulate_detection("cam", &labels()));
        buffer.push(simulate_detection("cam", &labels()));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.len(), 1);
    }
}
