use crate::config::MatcherConfig;
use crate::core::matcher::verify;
use tracing::debug;

/// One enrolled template offered to the 1-to-N scan. `identity_active`
/// reflects the owning identity, not the enrollment record; inactive
/// identities are skipped even when they score highest.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub user: String,
    pub template: String,
    pub identity_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub user: String,
    pub confidence: u8,
}

/// Find the best verified match for a live scan among enrolled candidates.
///
/// Every candidate is scored; there is no early exit on a perfect match.
/// The strict greater-than keeps the first candidate seen on exact ties.
/// `None` means "not recognized", which is distinct from a parse failure.
pub fn identify(live_payload: &str, candidates: &[Candidate], config: &MatcherConfig) -> Option<Match> {
    let mut best: Option<Match> = None;
    let mut best_confidence = 0u8;

    for candidate in candidates {
        let outcome = verify(live_payload, &candidate.template, config);
        debug!(
            user = %candidate.user,
            confidence = outcome.confidence,
            verified = outcome.verified,
            "scored enrollment candidate"
        );

        if outcome.verified && outcome.confidence > best_confidence && candidate.identity_active {
            best_confidence = outcome.confidence;
            best = Some(Match {
                user: candidate.user.clone(),
                confidence: outcome.confidence,
            });
        }
    }

    best
}
