//! # Difficulty Mode
//!
//! Reconciles a day's (or the live window's) difficulty samples into one
//! value: the most frequent sample, the largest one on a tie.

/// Most frequent sample; the largest wins a tie. None for no samples.
///
/// Samples compare by bit pattern, so `0.1 + 0.2` and `0.3` are distinct.
pub fn difficulty_mode(samples: &[f64]) -> Option<f64> {
    // Count occurrences of each distinct sample
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for &sample in samples {
        match counts
            .iter_mut()
            .find(|(seen, _)| seen.to_bits() == sample.to_bits())
        {
            Some((_, count)) => *count += 1,
            None => counts.push((sample, 1)),
        }
    }

    counts
        .into_iter()
        .max_by(|(a, count_a), (b, count_b)| count_a.cmp(count_b).then(a.total_cmp(b)))
        .map(|(value, _)| value)
}

/// Mode or 0 for an empty day.
pub fn difficulty_mode_or_zero(samples: &[f64]) -> f64 {
    difficulty_mode(samples).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_frequent_wins() {
        assert_eq!(difficulty_mode(&[10.0, 10.0, 12.0]), Some(10.0));
        assert_eq!(difficulty_mode(&[3.5, 1.0, 3.5, 2.0, 1.0, 3.5]), Some(3.5));
    }

    #[test]
    fn test_tie_goes_to_largest() {
        assert_eq!(difficulty_mode(&[10.0, 12.0]), Some(12.0));
        assert_eq!(difficulty_mode(&[12.0, 10.0]), Some(12.0));
        assert_eq!(difficulty_mode(&[1.0, 7.0, 7.0, 1.0, 3.0]), Some(7.0));
    }

    #[test]
    fn test_empty() {
        assert_eq!(difficulty_mode(&[]), None);
        assert_eq!(difficulty_mode_or_zero(&[]), 0.0);
    }

    #[test]
    fn test_single_sample() {
        assert_eq!(difficulty_mode(&[0.00024414]), Some(0.00024414));
    }
}
