//! Offer classification and selection
//!
//! Selection runs only after every solicitation has completed or timed out,
//! so the cheapest offer wins regardless of how fast it arrived.

use upa_core::JobOffer;

/// Outcome of soliciting one Transporter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The Transporter quoted a price
    Offer(JobOffer),
    /// The Transporter answered but did not quote (declined, or a business fault)
    Declined { transporter: String },
    /// Timeout, unreachable, or an unauthenticated response
    Silent { transporter: String },
}

impl Reply {
    pub fn transporter(&self) -> &str {
        match self {
            Reply::Offer(offer) => &offer.transporter,
            Reply::Declined { transporter } | Reply::Silent { transporter } => transporter,
        }
    }
}

/// Result of choosing among the replies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Cheapest qualifying offer, plus every other offer received
    Chosen { winner: JobOffer, losers: Vec<JobOffer> },
    /// No offer fits under the ceiling. `offers` still have to be declined.
    NoneQualified { replied: bool, offers: Vec<JobOffer> },
}

/// Pick the cheapest offer priced at or under `ceiling`.
///
/// Equal prices are broken by Transporter name, smallest first.
pub fn select(replies: Vec<Reply>, ceiling: i64) -> Selection {
    let replied = replies.iter().any(|r| !matches!(r, Reply::Silent { .. }));

    let mut offers: Vec<JobOffer> = replies
        .into_iter()
        .filter_map(|r| match r {
            Reply::Offer(offer) => Some(offer),
            _ => None,
        })
        .collect();

    let best = offers
        .iter()
        .enumerate()
        .filter(|(_, o)| o.price <= ceiling)
        .min_by(|(_, a), (_, b)| {
            a.price
                .cmp(&b.price)
                .then_with(|| a.transporter.cmp(&b.transporter))
        })
        .map(|(i, _)| i);

    match best {
        Some(i) => {
            let winner = offers.swap_remove(i);
            Selection::Chosen {
                winner,
                losers: offers,
            }
        }
        None => Selection::NoneQualified { replied, offers },
    }
}
