use crate::types::{LogIndex, LogTerm};
use std::cmp;

/// ParticipantAck is what the leader knows about one participant's copy of the log.
#[derive(Clone, Debug)]
pub(crate) struct ParticipantAck {
    pub(crate) failed: bool,
    // (term, index) of the last entry the participant acknowledged.
    pub(crate) last_acked: Option<(LogTerm, LogIndex)>,
}

/// calculate_commit_index returns the highest index acknowledged by at least `write_concern`
/// participants, never less than `current_commit_index`.
///
/// Only healthy participants whose last acknowledged entry is from the term of the `spearhead`
/// (the leader's last entry) count towards the quorum. Entries of previous terms therefore only
/// become committed once an entry of the current term is acknowledged on top of them.
pub(crate) fn calculate_commit_index(
    participants: &[ParticipantAck],
    write_concern: usize,
    current_commit_index: LogIndex,
    spearhead: (LogTerm, LogIndex),
) -> LogIndex {
    let (spearhead_term, spearhead_index) = spearhead;

    let mut eligible: Vec<LogIndex> = participants
        .iter()
        .filter(|p| !p.failed)
        .filter_map(|p| p.last_acked)
        .filter(|(term, _)| *term == spearhead_term)
        .map(|(_, index)| cmp::min(index, spearhead_index))
        .collect();

    if write_concern == 0 || write_concern > eligible.len() {
        return current_commit_index;
    }

    // Highest first. The `write_concern`th highest index is replicated on at least that many.
    eligible.sort_by(|a, b| b.cmp(a));
    let quorum_index = eligible[write_concern - 1];

    cmp::max(current_commit_index, quorum_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack(term: u64, index: u64) -> ParticipantAck {
        ParticipantAck {
            failed: false,
            last_acked: Some((LogTerm::new(term), LogIndex::new(index))),
        }
    }

    fn failed(term: u64, index: u64) -> ParticipantAck {
        ParticipantAck {
            failed: true,
            ..ack(term, index)
        }
    }

    fn none() -> ParticipantAck {
        ParticipantAck {
            failed: false,
            last_acked: None,
        }
    }

    fn run(expected: u64, participants: Vec<ParticipantAck>, write_concern: usize, current: u64) {
        let spearhead = (LogTerm::new(2), LogIndex::new(9));
        assert_eq!(
            LogIndex::new(expected),
            calculate_commit_index(&participants, write_concern, LogIndex::new(current), spearhead),
            "participants={:?} wc={} current={}",
            participants,
            write_concern,
            current,
        );
    }

    #[test]
    fn test_commit_index_logic() {
        // 3 participants, majority
        run(9, vec![ack(2, 9), ack(2, 9), ack(2, 9)], 2, 0);
        run(8, vec![ack(2, 9), ack(2, 8), ack(2, 3)], 2, 0);
        run(3, vec![ack(2, 9), ack(2, 3), none()], 2, 0);
        run(0, vec![ack(2, 9), none(), none()], 2, 0);

        // Write concern of everybody
        run(3, vec![ack(2, 9), ack(2, 8), ack(2, 3)], 3, 0);
        // Write concern of 1 follows the spearhead
        run(9, vec![ack(2, 9), none(), none()], 1, 0);

        // Failed participants don't count
        run(3, vec![ack(2, 9), failed(2, 9), ack(2, 3)], 2, 0);
        run(0, vec![ack(2, 9), failed(2, 9), failed(2, 9)], 2, 0);

        // Participants still on an older term don't count
        run(0, vec![ack(2, 9), ack(1, 8), ack(1, 8)], 2, 0);
        run(7, vec![ack(2, 9), ack(1, 8), ack(2, 7)], 2, 0);

        // Never goes backwards
        run(5, vec![ack(2, 9), none(), none()], 2, 5);
        run(6, vec![ack(2, 9), ack(2, 4), none()], 2, 6);

        // Write concern larger than the cluster commits nothing new
        run(4, vec![ack(2, 9), ack(2, 9)], 3, 4);

        // Ordering doesn't matter
        run(8, vec![ack(2, 3), ack(2, 8), ack(2, 9)], 2, 0);
        run(8, vec![none(), ack(2, 8), ack(2, 9), failed(2, 9), ack(2, 1)], 2, 0);
    }
}
