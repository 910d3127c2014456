//! PM scorecards and the leaderboard built from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{classify::RiskLevel, stage::RenewalStage, view::RenewalView};

/// Renewal performance of one property manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmScorecard {
  /// 1-based position on the leaderboard.
  pub rank:           usize,
  pub manager:        String,
  pub renewals:       usize,
  pub completed:      usize,
  pub failed:         usize,
  /// Open renewals currently at red risk.
  pub at_risk:        usize,
  pub total_points:   i64,
  pub average_points: f64,
}

/// Aggregate views per manager and rank them by average points, then
/// completed renewals, then name.
pub fn leaderboard<'a>(views: impl IntoIterator<Item = &'a RenewalView>) -> Vec<PmScorecard> {
  let mut by_manager: BTreeMap<&str, PmScorecard> = BTreeMap::new();

  for view in views {
    let manager = view.record.property.manager.as_str();
    let card = by_manager.entry(manager).or_insert_with(|| PmScorecard {
      rank:           0,
      manager:        manager.to_owned(),
      renewals:       0,
      completed:      0,
      failed:         0,
      at_risk:        0,
      total_points:   0,
      average_points: 0.0,
    });

    card.renewals += 1;
    card.total_points += i64::from(view.status.score.current_points);
    match view.record.stage {
      RenewalStage::RenewalCompleted => card.completed += 1,
      RenewalStage::RenewalFailed => card.failed += 1,
      _ if view.status.risk == RiskLevel::Red => card.at_risk += 1,
      _ => {}
    }
  }

  let mut cards: Vec<PmScorecard> = by_manager
    .into_values()
    .map(|mut c| {
      c.average_points = c.total_points as f64 / c.renewals as f64;
      c
    })
    .collect();

  cards.sort_by(|a, b| {
    b.average_points
      .total_cmp(&a.average_points)
      .then_with(|| b.completed.cmp(&a.completed))
      .then_with(|| a.manager.cmp(&b.manager))
  });
  for (i, card) in cards.iter_mut().enumerate() {
    card.rank = i + 1;
  }
  cards
}
