//! Score comparison between the two pipelines.

use crate::judge::{Criterion, Evaluation};
use crate::llm::MAX_JUDGE_CHUNKS;
use serde::{Deserialize, Serialize};

/// Which pipeline scored higher on a criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Manual,
    FileSearch,
    Tie,
}

/// Scores for one criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionDelta {
    pub criterion: Criterion,
    pub manual_score: u8,
    pub file_search_score: u8,
    /// `file_search_score - manual_score`; positive favours file search.
    pub difference: i8,
}

impl CriterionDelta {
    /// Strictly greater wins; equal scores tie.
    pub fn winner(&self) -> Winner {
        match self.difference {
            d if d > 0 => Winner::FileSearch,
            d if d < 0 => Winner::Manual,
            _ => Winner::Tie,
        }
    }
}

/// Win/loss/tie counts across criteria.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub manual_wins: usize,
    pub file_search_wins: usize,
    pub ties: usize,
}

/// Per-criterion comparison of two successful evaluations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComparison {
    pub deltas: Vec<CriterionDelta>,
}

impl ScoreComparison {
    pub fn tally(&self) -> Tally {
        self.deltas
            .iter()
            .fold(Tally::default(), |mut tally, delta| {
                match delta.winner() {
                    Winner::Manual => tally.manual_wins += 1,
                    Winner::FileSearch => tally.file_search_wins += 1,
                    Winner::Tie => tally.ties += 1,
                }
                tally
            })
    }
}

/// Compare two evaluations criterion by criterion.
///
/// Returns `None` when either side is a failure record: its zero scores
/// mark a failed call, not a grade.
pub fn compare(manual: &Evaluation, file_search: &Evaluation) -> Option<ScoreComparison> {
    let manual = manual.scorecard()?;
    let file_search = file_search.scorecard()?;

    let deltas = Criterion::ALL
        .into_iter()
        .map(|criterion| {
            let manual_score = manual.get(criterion).score;
            let file_search_score = file_search.get(criterion).score;
            CriterionDelta {
                criterion,
                manual_score,
                file_search_score,
                difference: file_search_score as i8 - manual_score as i8,
            }
        })
        .collect();

    Some(ScoreComparison { deltas })
}

/// Size of the chunk set one pipeline submitted to the judge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkVolume {
    pub chunks: usize,
    pub total_chars: usize,
}

impl ChunkVolume {
    /// Measure the first [`MAX_JUDGE_CHUNKS`] chunks, counting characters.
    pub fn of<S: AsRef<str>>(context: &[S]) -> Self {
        let submitted = &context[..context.len().min(MAX_JUDGE_CHUNKS)];
        Self {
            chunks: submitted.len(),
            total_chars: submitted.iter().map(|c| c.as_ref().chars().count()).sum(),
        }
    }

    /// Integer average characters per chunk (0 for an empty set).
    pub fn average_chars(&self) -> usize {
        self.total_chars / self.chunks.max(1)
    }
}

/// Chunk-volume diagnostic between the two pipelines.
///
/// The pipelines retrieve independently (top-k versus provider-selected
/// grounding), so a difference is informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkVolumeCheck {
    pub manual: ChunkVolume,
    pub file_search: ChunkVolume,
}

impl ChunkVolumeCheck {
    pub fn new<S: AsRef<str>>(manual: &[S], file_search: &[S]) -> Self {
        Self {
            manual: ChunkVolume::of(manual),
            file_search: ChunkVolume::of(file_search),
        }
    }

    pub fn chunk_delta(&self) -> i64 {
        self.file_search.chunks as i64 - self.manual.chunks as i64
    }

    pub fn char_delta(&self) -> i64 {
        self.file_search.total_chars as i64 - self.manual.total_chars as i64
    }

    /// Same chunk count on both sides.
    pub fn counts_match(&self) -> bool {
        self.chunk_delta() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::{CriterionScore, FailureReason, Scorecard};

    fn uniform(score: u8) -> Evaluation {
        Evaluation::Success {
            scores: Scorecard::from_fn(|_| CriterionScore::new(score, "")).unwrap(),
            overall_assessment: None,
        }
    }

    fn varied(scores: [u8; 5]) -> Evaluation {
        let mut iter = scores.into_iter();
        Evaluation::Success {
            scores: Scorecard::from_fn(|_| CriterionScore::new(iter.next().unwrap(), "")).unwrap(),
            overall_assessment: None,
        }
    }

    #[test]
    fn test_all_fours_vs_all_fives() {
        let comparison = compare(&uniform(4), &uniform(5)).unwrap();

        assert_eq!(comparison.deltas.len(), 5);
        assert!(comparison.deltas.iter().all(|d| d.difference == 1));
        assert_eq!(
            comparison.tally(),
            Tally {
                manual_wins: 0,
                file_search_wins: 5,
                ties: 0
            }
        );
    }

    #[test]
    fn test_signed_differences_and_mixed_tally() {
        let comparison = compare(&varied([5, 3, 4, 1, 2]), &varied([2, 3, 5, 4, 2])).unwrap();

        let diffs: Vec<i8> = comparison.deltas.iter().map(|d| d.difference).collect();
        assert_eq!(diffs, vec![-3, 0, 1, 3, 0]);
        assert_eq!(comparison.deltas[0].winner(), Winner::Manual);
        assert_eq!(comparison.deltas[1].winner(), Winner::Tie);
        assert_eq!(
            comparison.tally(),
            Tally {
                manual_wins: 1,
                file_search_wins: 2,
                ties: 2
            }
        );
    }

    #[test]
    fn test_failures_are_not_compared() {
        let failed = Evaluation::failure(FailureReason::InvalidJson, Some("x".into()));
        assert!(compare(&failed, &uniform(5)).is_none());
        assert!(compare(&uniform(5), &failed).is_none());
    }

    #[test]
    fn test_chunk_volume_check() {
        let manual: Vec<String> = vec!["abcd".into(), "ef".into()];
        let file_search: Vec<String> = vec!["abcdefgh".into(), "ij".into(), "k".into()];
        let check = ChunkVolumeCheck::new(&manual, &file_search);

        assert_eq!(check.manual.total_chars, 6);
        assert_eq!(check.manual.average_chars(), 3);
        assert_eq!(check.file_search.average_chars(), 3);
        assert_eq!(check.chunk_delta(), 1);
        assert_eq!(check.char_delta(), 5);
        assert!(!check.counts_match());

        let empty: Vec<String> = Vec::new();
        assert_eq!(ChunkVolume::of(&empty).average_chars(), 0);
    }

    #[test]
    fn test_chunk_volume_counts_only_submitted_chunks() {
        let many: Vec<String> = (0..8).map(|_| "xx".to_string()).collect();
        let volume = ChunkVolume::of(&many);
        assert_eq!(volume.chunks, 5);
        assert_eq!(volume.total_chars, 10);
    }
}
