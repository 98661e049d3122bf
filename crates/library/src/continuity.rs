//! Gapless track/disc renumbering.
//!
//! Given the `(disc, track)` positions of one batch, decide whether every disc
//! and the disc set itself form a run `1..=n`, and if so assign one running
//! track counter across all discs.

use std::collections::BTreeMap;

/// Observed position of one file. `None` means the tag was absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
    pub disc: Option<u32>,
    pub track: Option<u32>,
}

impl Position {
    pub fn new(disc: Option<u32>, track: Option<u32>) -> Self {
        Self { disc, track }
    }
}

/// New numbering for one file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub track: u32,
    pub total_tracks: u32,
    pub total_discs: u32,
}

/// Range of new track numbers given to one disc.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiscSpan {
    pub disc: u32,
    pub first: u32,
    pub last: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Renumbering {
    /// Indexed like the input positions.
    pub assignments: Vec<Assignment>,
    pub spans: Vec<DiscSpan>,
    pub total_tracks: u32,
    pub total_discs: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Infeasible {
    Empty,
    DiscNumbers,
    TrackNumbers { disc: Option<u32> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Continuity {
    Feasible(Renumbering),
    Infeasible(Infeasible),
}

impl Continuity {
    pub fn is_feasible(&self) -> bool {
        matches!(self, Continuity::Feasible(_))
    }
}

/// No nulls, min 1, max == count and sorted values == `1..=count`.
pub fn is_continuous(values: &[Option<u32>]) -> bool {
    if values.is_empty() {
        return false;
    }
    let mut sorted = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Some(value) => sorted.push(*value),
            None => return false,
        }
    }
    sorted.sort_unstable();
    sorted
        .iter()
        .enumerate()
        .all(|(idx, value)| u64::from(*value) == idx as u64 + 1)
}

pub fn resolve_continuity(positions: &[Position]) -> Continuity {
    if positions.is_empty() {
        return Continuity::Infeasible(Infeasible::Empty);
    }

    // `None` sorts first, which keeps a null disc group easy to spot.
    let mut by_disc: BTreeMap<Option<u32>, Vec<Option<u32>>> = BTreeMap::new();
    for position in positions {
        by_disc.entry(position.disc).or_default().push(position.track);
    }

    let discs: Vec<Option<u32>> = by_disc.keys().copied().collect();
    if !is_continuous(&discs) {
        return Continuity::Infeasible(Infeasible::DiscNumbers);
    }
    for (disc, tracks) in &by_disc {
        if !is_continuous(tracks) {
            return Continuity::Infeasible(Infeasible::TrackNumbers { disc: *disc });
        }
    }

    let total_tracks = by_disc.values().map(|tracks| tracks.len() as u32).sum();
    let total_discs = discs.iter().flatten().copied().max().unwrap_or(0);

    let mut assignments: Vec<Option<Assignment>> = vec![None; positions.len()];
    let mut spans = Vec::with_capacity(by_disc.len());
    let mut counter = 1u32;
    for (disc, tracks) in &by_disc {
        let first = counter;
        let mut sorted = tracks.clone();
        sorted.sort_unstable();
        for track in sorted {
            // Every file sharing this position gets the same number.
            for (idx, position) in positions.iter().enumerate() {
                if position.disc == *disc && position.track == track {
                    assignments[idx] = Some(Assignment {
                        track: counter,
                        total_tracks,
                        total_discs,
                    });
                }
            }
            counter += 1;
        }
        spans.push(DiscSpan {
            disc: disc.unwrap_or(0),
            first,
            last: counter - 1,
        });
    }

    Continuity::Feasible(Renumbering {
        assignments: assignments.into_iter().flatten().collect(),
        spans,
        total_tracks,
        total_discs,
    })
}

/// True when at least two files claim the same track number.
pub fn has_duplicate_tracks(positions: &[Position]) -> bool {
    let mut seen = BTreeMap::new();
    for position in positions {
        let count = seen.entry(position.track).or_insert(0usize);
        *count += 1;
        if *count > 1 {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::{
        has_duplicate_tracks, is_continuous, resolve_continuity, Assignment, Continuity,
        DiscSpan, Infeasible, Position,
    };

    fn pos(disc: u32, track: u32) -> Position {
        Position::new(Some(disc), Some(track))
    }

    #[test]
    fn continuous_sets() {
        assert!(is_continuous(&[Some(2), Some(1), Some(3)]));
        assert!(is_continuous(&[Some(1)]));
        assert!(!is_continuous(&[]));
        assert!(!is_continuous(&[Some(1), None]));
        assert!(!is_continuous(&[Some(2), Some(3)]));
        assert!(!is_continuous(&[Some(1), Some(3)]));
        assert!(!is_continuous(&[Some(1), Some(1), Some(3)]));
        assert!(!is_continuous(&[Some(1), Some(1)]));
    }

    #[test]
    fn two_discs_renumber_across() {
        let positions = vec![pos(1, 1), pos(1, 2), pos(2, 1), pos(2, 2), pos(2, 3)];
        let renumbering = match resolve_continuity(&positions) {
            Continuity::Feasible(renumbering) => renumbering,
            other => panic!("expected feasible, got {:?}", other),
        };
        assert_eq!(renumbering.total_discs, 2);
        assert_eq!(renumbering.total_tracks, 5);
        assert_eq!(
            renumbering.assignments[3],
            Assignment {
                track: 4,
                total_tracks: 5,
                total_discs: 2,
            }
        );
        let tracks: Vec<u32> = renumbering.assignments.iter().map(|a| a.track).collect();
        assert_eq!(tracks, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            renumbering.spans,
            vec![
                DiscSpan { disc: 1, first: 1, last: 2 },
                DiscSpan { disc: 2, first: 3, last: 5 },
            ]
        );
    }

    #[test]
    fn assignments_follow_input_order() {
        let positions = vec![pos(2, 2), pos(1, 1), pos(2, 1)];
        let Continuity::Feasible(renumbering) = resolve_continuity(&positions) else {
            panic!("expected feasible");
        };
        let tracks: Vec<u32> = renumbering.assignments.iter().map(|a| a.track).collect();
        assert_eq!(tracks, vec![3, 1, 2]);
    }

    #[test]
    fn duplicate_track_on_single_disc_is_infeasible() {
        let positions = vec![pos(1, 1), pos(1, 1), pos(1, 3)];
        assert!(has_duplicate_tracks(&positions));
        assert_eq!(
            resolve_continuity(&positions),
            Continuity::Infeasible(Infeasible::TrackNumbers { disc: Some(1) })
        );
    }

    #[test]
    fn missing_disc_numbers_are_infeasible() {
        let positions = vec![
            Position::new(None, Some(1)),
            Position::new(None, Some(2)),
        ];
        assert_eq!(
            resolve_continuity(&positions),
            Continuity::Infeasible(Infeasible::DiscNumbers)
        );
    }

    #[test]
    fn disc_gap_is_infeasible() {
        let positions = vec![pos(1, 1), pos(3, 1)];
        assert_eq!(
            resolve_continuity(&positions),
            Continuity::Infeasible(Infeasible::DiscNumbers)
        );
    }

    #[test]
    fn feasibility_matches_per_group_continuity() {
        let cases: Vec<Vec<Position>> = vec![
            vec![pos(1, 1)],
            vec![pos(1, 2)],
            vec![pos(1, 1), pos(2, 2)],
            vec![pos(1, 2), pos(1, 1), pos(2, 1)],
            vec![pos(2, 1), pos(2, 2)],
            vec![pos(1, 1), pos(1, 2), pos(1, 4)],
            vec![Position::new(Some(1), None)],
        ];
        for positions in cases {
            let mut discs: Vec<Option<u32>> = positions.iter().map(|p| p.disc).collect();
            discs.sort();
            discs.dedup();
            let expected = is_continuous(&discs)
                && discs.iter().all(|disc| {
                    let tracks: Vec<Option<u32>> = positions
                        .iter()
                        .filter(|p| p.disc == *disc)
                        .map(|p| p.track)
                        .collect();
                    is_continuous(&tracks)
                });
            assert_eq!(
                resolve_continuity(&positions).is_feasible(),
                expected,
                "{:?}",
                positions
            );
        }
    }

    #[test]
    fn empty_batch_is_infeasible() {
        assert_eq!(
            resolve_continuity(&[]),
            Continuity::Infeasible(Infeasible::Empty)
        );
    }
}
