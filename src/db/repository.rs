//! Durable, append-mostly store of pipeline snapshots (§4.8). Uses
//! `sqlx::query`/`query_as` against a `SqlitePool` rather than the
//! compile-time-checked `query!`/`query_as!` macros the backend this
//! engine grew out of relies on — those require a live database reachable
//! at *build* time, which this crate's sqlite-backed, no-external-services
//! test story deliberately avoids (see DESIGN.md).

use serde_json::json;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::model::condition::MarketCondition;
use crate::model::features::FeatureVector;
use crate::model::plan::{FilterResult, PlanAction, TradePlan};
use crate::model::prediction::Prediction;
use crate::model::quality::SetupQuality;
use crate::model::snapshot::{Outcome, Snapshot};
use crate::utils::errors::RepoError;

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct RepoStats {
    pub win_rate: f64,
    pub total: i64,
    pub wins: i64,
    pub losses: i64,
    pub total_pl: f64,
    pub avg_win_duration_secs: f64,
    pub best_hour: Option<u32>,
}

#[derive(Clone)]
pub struct MetricsRepository {
    pool: SqlitePool,
}

impl MetricsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id TEXT PRIMARY KEY,
                ts INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                condition TEXT NOT NULL,
                quality TEXT NOT NULL,
                direction TEXT,
                confidence REAL,
                entry REAL,
                target REAL,
                sl REAL,
                rr REAL,
                position_lots INTEGER,
                strike REAL,
                option_type TEXT,
                features_blob TEXT NOT NULL,
                filters_blob TEXT NOT NULL,
                plan_blob TEXT,
                action TEXT NOT NULL,
                outcome TEXT NOT NULL,
                realized_pl REAL,
                outcome_ts INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS config_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_snapshots_symbol_ts ON snapshots(symbol, ts)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_snapshots_outcome ON snapshots(outcome)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn put(&self, snapshot: &Snapshot) -> Result<Uuid, RepoError> {
        let features_blob = serde_json::to_string(&snapshot.feature_vector).unwrap_or_default();
        let filters_blob = serde_json::to_string(&snapshot.filter_results).unwrap_or_default();
        let plan_blob = snapshot.plan.as_ref().map(|p| serde_json::to_string(p).unwrap_or_default());

        let (direction, confidence) = match &snapshot.prediction {
            Some(p) => (Some(json!(p.direction).as_str().unwrap_or("").to_string()), Some(p.confidence)),
            None => (None, None),
        };
        let (entry, target, sl, rr, lots, strike, option_type) = match &snapshot.plan {
            Some(p) => (
                Some(p.entry),
                Some(p.target),
                Some(p.stoploss),
                Some(p.risk_reward),
                Some(p.position_size_lots as i64),
                Some(p.strike),
                Some(json!(p.option_type).as_str().unwrap_or("").to_string()),
            ),
            None => (None, None, None, None, None, None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO snapshots (
                id, ts, symbol, condition, quality, direction, confidence,
                entry, target, sl, rr, position_lots, strike, option_type,
                features_blob, filters_blob, plan_blob, action, outcome, realized_pl, outcome_ts
            ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,NULL)
            "#,
        )
        .bind(snapshot.id.to_string())
        .bind(snapshot.timestamp)
        .bind(&snapshot.symbol)
        .bind(format!("{:?}", snapshot.market_condition))
        .bind(format!("{:?}", snapshot.setup_quality))
        .bind(direction)
        .bind(confidence)
        .bind(entry)
        .bind(target)
        .bind(sl)
        .bind(rr)
        .bind(lots)
        .bind(strike)
        .bind(option_type)
        .bind(features_blob)
        .bind(filters_blob)
        .bind(plan_blob)
        .bind(format!("{:?}", snapshot.action))
        .bind(format!("{:?}", snapshot.outcome))
        .bind(snapshot.realized_pl)
        .execute(&self.pool)
        .await?;

        Ok(snapshot.id)
    }

    pub async fn recent(&self, symbol: &str, n: i64) -> Result<Vec<Snapshot>, RepoError> {
        let rows = sqlx::query(
            "SELECT * FROM snapshots WHERE symbol = ? ORDER BY ts DESC LIMIT ?",
        )
        .bind(symbol)
        .bind(n)
        .fetch_all(&self.pool)
        .await?;

        let mut snapshots: Vec<Snapshot> = rows.iter().map(row_to_snapshot).collect();
        snapshots.reverse();
        Ok(snapshots)
    }

    pub async fn update_outcome(&self, id: Uuid, outcome: Outcome, realized_pl: Option<f64>, now_ts: i64) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE snapshots SET outcome = ?, realized_pl = ?, outcome_ts = ? WHERE id = ? AND outcome_ts IS NULL",
        )
        .bind(format!("{:?}", outcome))
        .bind(realized_pl)
        .bind(now_ts)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    pub async fn stats(&self, window_days: i64, now_ts: i64) -> Result<RepoStats, RepoError> {
        let cutoff = now_ts - window_days * 86_400;
        let rows = sqlx::query(
            "SELECT outcome, realized_pl, ts, outcome_ts FROM snapshots WHERE ts >= ? AND outcome != 'Wait' AND outcome != 'Pending'",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut wins = 0i64;
        let mut losses = 0i64;
        let mut total_pl = 0.0;
        let mut win_durations = Vec::new();
        let mut hour_wins: std::collections::HashMap<u32, (i64, i64)> = std::collections::HashMap::new();

        for row in &rows {
            let outcome: String = row.try_get("outcome").unwrap_or_default();
            let pl: Option<f64> = row.try_get("realized_pl").ok();
            let ts: i64 = row.try_get("ts").unwrap_or(0);
            let outcome_ts: Option<i64> = row.try_get("outcome_ts").ok();
            let hour = ((ts % 86_400) / 3600) as u32;
            let entry = hour_wins.entry(hour).or_insert((0, 0));
            entry.1 += 1;

            if outcome == "Win" {
                wins += 1;
                entry.0 += 1;
                if let Some(p) = pl {
                    total_pl += p;
                }
                if let Some(ots) = outcome_ts {
                    win_durations.push((ots - ts) as f64);
                }
            } else if outcome == "Loss" {
                losses += 1;
                if let Some(p) = pl {
                    total_pl += p;
                }
            }
        }

        let total = wins + losses;
        let win_rate = if total > 0 { wins as f64 / total as f64 } else { 0.0 };
        let avg_win_duration_secs = if win_durations.is_empty() {
            0.0
        } else {
            win_durations.iter().sum::<f64>() / win_durations.len() as f64
        };
        let best_hour = hour_wins
            .into_iter()
            .filter(|(_, (_, total))| *total > 0)
            .max_by(|a, b| {
                let ra = a.1 .0 as f64 / a.1 .1 as f64;
                let rb = b.1 .0 as f64 / b.1 .1 as f64;
                ra.partial_cmp(&rb).unwrap()
            })
            .map(|(hour, _)| hour);

        Ok(RepoStats { win_rate, total, wins, losses, total_pl, avg_win_duration_secs, best_hour })
    }

    /// Retention enforcement: deletes rows older than `older_than_days`.
    pub async fn purge(&self, older_than_days: i64, now_ts: i64) -> Result<u64, RepoError> {
        let cutoff = now_ts - older_than_days * 86_400;
        let result = sqlx::query("DELETE FROM snapshots WHERE ts < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_config(&self, key: &str, value: &str) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO config_kv (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_config(&self, key: &str) -> Result<Option<String>, RepoError> {
        let row = sqlx::query("SELECT value FROM config_kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }
}

fn row_to_snapshot(row: &sqlx::sqlite::SqliteRow) -> Snapshot {
    let id_str: String = row.try_get("id").unwrap_or_default();
    let features_blob: String = row.try_get("features_blob").unwrap_or_default();
    let filters_blob: String = row.try_get("filters_blob").unwrap_or_default();
    let plan_blob: Option<String> = row.try_get("plan_blob").ok();
    let action_str: String = row.try_get("action").unwrap_or_default();
    let outcome_str: String = row.try_get("outcome").unwrap_or_default();
    let condition_str: String = row.try_get("condition").unwrap_or_default();
    let quality_str: String = row.try_get("quality").unwrap_or_default();

    Snapshot {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        timestamp: row.try_get("ts").unwrap_or(0),
        symbol: row.try_get("symbol").unwrap_or_default(),
        feature_vector: serde_json::from_str::<FeatureVector>(&features_blob)
            .unwrap_or_else(|_| FeatureVector::default_zeroed()),
        market_condition: parse_condition(&condition_str),
        setup_quality: parse_quality(&quality_str),
        prediction: row
            .try_get::<Option<f64>, _>("confidence")
            .ok()
            .flatten()
            .map(|c| Prediction::from_probs(c / 100.0, 1.0 - c / 100.0)),
        plan: plan_blob.and_then(|b| serde_json::from_str::<TradePlan>(&b).ok()),
        filter_results: serde_json::from_str::<Vec<FilterResult>>(&filters_blob).unwrap_or_default(),
        action: parse_action(&action_str),
        outcome: parse_outcome(&outcome_str),
        realized_pl: row.try_get("realized_pl").ok(),
    }
}

fn parse_condition(s: &str) -> MarketCondition {
    match s {
        "Quiet" => MarketCondition::Quiet,
        "High" => MarketCondition::High,
        "Extreme" => MarketCondition::Extreme,
        _ => MarketCondition::Normal,
    }
}

fn parse_quality(s: &str) -> SetupQuality {
    match s {
        "Moderate" => SetupQuality::Moderate,
        "Strong" => SetupQuality::Strong,
        "Excellent" => SetupQuality::Excellent,
        _ => SetupQuality::Weak,
    }
}

fn parse_action(s: &str) -> PlanAction {
    match s {
        "Trade" => PlanAction::Trade,
        "Hold" => PlanAction::Hold,
        _ => PlanAction::Wait,
    }
}

fn parse_outcome(s: &str) -> Outcome {
    match s {
        "Win" => Outcome::Win,
        "Loss" => Outcome::Loss,
        "Expired" => Outcome::Expired,
        "Pending" => Outcome::Pending,
        _ => Outcome::Wait,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::plan::{FilterStatus, OptionType};
    use std::collections::BTreeMap;

    async fn in_memory_repo() -> MetricsRepository {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let repo = MetricsRepository::new(pool);
        repo.migrate().await.unwrap();
        repo
    }

    fn sample_snapshot(symbol: &str, ts: i64, outcome: Outcome) -> Snapshot {
        Snapshot {
            id: Uuid::new_v4(),
            timestamp: ts,
            symbol: symbol.to_string(),
            feature_vector: FeatureVector::default_zeroed(),
            market_condition: MarketCondition::Normal,
            setup_quality: SetupQuality::Strong,
            prediction: Some(Prediction::from_probs(0.7, 0.3)),
            plan: Some(TradePlan {
                symbol: symbol.to_string(),
                direction: crate::model::Direction::Buy,
                entry: 100.0,
                target: 140.0,
                target2: 170.0,
                stoploss: 86.0,
                risk_reward: 2.0,
                position_size_lots: 1,
                strike: 22500.0,
                option_type: OptionType::Ce,
                premium_entry: 50.0,
                premium_target: 70.0,
                premium_sl: 40.0,
                projected_pl: 1300.0,
                filters_status: BTreeMap::from([("confidence_threshold".to_string(), FilterStatus::Pass)]),
                rationale: "test".into(),
            }),
            filter_results: vec![],
            action: PlanAction::Trade,
            outcome,
            realized_pl: None,
        }
    }

    #[tokio::test]
    async fn put_then_recent_round_trips() {
        let repo = in_memory_repo().await;
        let snap = sample_snapshot("NIFTY", 1000, Outcome::Pending);
        repo.put(&snap).await.unwrap();
        let recent = repo.recent("NIFTY", 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, snap.id);
        assert_eq!(recent[0].plan.as_ref().unwrap().entry, 100.0);
    }

    #[tokio::test]
    async fn update_outcome_is_at_most_once() {
        let repo = in_memory_repo().await;
        let snap = sample_snapshot("NIFTY", 1000, Outcome::Pending);
        repo.put(&snap).await.unwrap();
        repo.update_outcome(snap.id, Outcome::Win, Some(1300.0), 1500).await.unwrap();
        let second = repo.update_outcome(snap.id, Outcome::Loss, Some(-500.0), 1600).await;
        assert!(second.is_err());

        let recent = repo.recent("NIFTY", 1).await.unwrap();
        assert_eq!(recent[0].outcome, Outcome::Win);
    }

    #[tokio::test]
    async fn stats_computes_win_rate() {
        let repo = in_memory_repo().await;
        let mut win = sample_snapshot("NIFTY", 1000, Outcome::Pending);
        win.action = PlanAction::Trade;
        repo.put(&win).await.unwrap();
        repo.update_outcome(win.id, Outcome::Win, Some(1000.0), 1100).await.unwrap();

        let mut loss = sample_snapshot("NIFTY", 2000, Outcome::Pending);
        loss.id = Uuid::new_v4();
        repo.put(&loss).await.unwrap();
        repo.update_outcome(loss.id, Outcome::Loss, Some(-500.0), 2100).await.unwrap();

        let stats = repo.stats(30, 5000).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert!((stats.win_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.total_pl, 500.0);
    }

    #[tokio::test]
    async fn config_kv_round_trips() {
        let repo = in_memory_repo().await;
        repo.set_config("adaptive_threshold", "66.0").await.unwrap();
        assert_eq!(repo.get_config("adaptive_threshold").await.unwrap(), Some("66.0".to_string()));
    }
}
