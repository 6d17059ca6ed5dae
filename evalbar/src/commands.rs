//! Non-interactive subcommands.

use chess::{side_to_move, Evaluation};
use engine::{
    select_candidates, CandidateSet, Capabilities, EngineSettings, EngineSupervisor, EvalSession,
    EvalSnapshot, SessionOptions,
};
use serde::Serialize;

/// One evaluated position, as printed by `evalbar eval`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub fen: String,
    pub side_to_move: Option<&'static str>,
    pub evaluation: Option<Evaluation>,
    pub label: String,
    pub fraction: f64,
    pub depth: Option<u8>,
    pub available: bool,
}

impl EvalReport {
    pub fn new(fen: &str, snapshot: &EvalSnapshot) -> Self {
        Self {
            fen: fen.to_string(),
            side_to_move: side_to_move(fen).ok().map(|side| side.as_str()),
            evaluation: snapshot.evaluation,
            label: snapshot
                .evaluation
                .map(|e| e.label())
                .unwrap_or_else(|| "--".to_string()),
            fraction: snapshot.evaluation.map_or(0.5, |e| e.fraction()),
            depth: snapshot.depth,
            available: snapshot.available,
        }
    }

    /// `label  fraction  depth  fen`
    pub fn to_line(&self) -> String {
        let depth = self
            .depth
            .map(|d| format!("d{}", d))
            .unwrap_or_else(|| "-".to_string());
        format!("{:>6}  {:.3}  {:>3}  {}", self.label, self.fraction, depth, self.fen)
    }
}

/// Evaluate `fens` one after another through a single shared engine.
pub async fn run_eval(settings: &EngineSettings, fens: &[String], json: bool) -> anyhow::Result<()> {
    let supervisor = EngineSupervisor::from_settings(settings);
    let mut session = EvalSession::mount(&supervisor, SessionOptions::from_settings(settings));

    let mut reports = Vec::with_capacity(fens.len());
    for (revision, fen) in (1u64..).zip(fens) {
        session.observe(Some(fen.as_str()), 0).await?;
        let snapshot = session.settled(revision).await;
        tracing::debug!(fen = %fen, ?snapshot, "Position settled");
        reports.push(EvalReport::new(fen, &snapshot));
    }

    session.unmount().await;
    supervisor.shutdown().await;

    for report in &reports {
        if json {
            println!("{}", serde_json::to_string(report)?);
        } else {
            println!("{}", report.to_line());
        }
    }

    if reports.iter().all(|r| !r.available) {
        anyhow::bail!("no engine candidate could be started ({})", supervisor.status());
    }
    Ok(())
}

pub fn print_candidates(settings: &EngineSettings) {
    let caps = Capabilities::from_settings(settings);
    let candidates = select_candidates(&CandidateSet::from_settings(settings), caps);

    println!("shared memory: {}", if caps.shared_memory { "yes" } else { "no" });
    if candidates.is_empty() {
        println!("no engine candidates configured");
    }
    for (index, candidate) in candidates.iter().enumerate() {
        let threads = candidate
            .threads
            .map(|n| format!("{} threads", n))
            .unwrap_or_else(|| "single thread".to_string());
        println!("{:>2}. {} [{}] {}", index, candidate.label, threads, candidate.program.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";

    #[test]
    fn test_report_with_evaluation() {
        let snapshot = EvalSnapshot {
            evaluation: Some(Evaluation::Centipawns(-134)),
            depth: Some(14),
            revision: 1,
            ..EvalSnapshot::default()
        };
        let report = EvalReport::new(AFTER_E4, &snapshot);

        assert_eq!(report.side_to_move, Some("black"));
        assert_eq!(report.label, "-1.3");
        assert!(report.fraction < 0.5);
        assert!(report.to_line().starts_with("  -1.3  0."));
        assert!(report.to_line().ends_with(AFTER_E4));
    }

    #[test]
    fn test_report_without_evaluation() {
        let snapshot = EvalSnapshot {
            available: false,
            ..EvalSnapshot::default()
        };
        let report = EvalReport::new("garbage", &snapshot);

        assert_eq!(report.label, "--");
        assert_eq!(report.fraction, 0.5);
        assert_eq!(report.side_to_move, None);
        assert!(!report.available);
    }

    #[test]
    fn test_report_json_shape() {
        let snapshot = EvalSnapshot {
            evaluation: Some(Evaluation::Mate(3)),
            ..EvalSnapshot::default()
        };
        let json = serde_json::to_value(EvalReport::new(AFTER_E4, &snapshot)).unwrap();

        assert_eq!(json["evaluation"], serde_json::json!({"type": "mate", "value": 3}));
        assert_eq!(json["label"], "M3");
        assert_eq!(json["fraction"], 0.99);
        assert_eq!(json["available"], true);
    }
}
