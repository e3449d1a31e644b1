//! Single-run entry point: config -> engine -> report.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, info_span};

use barreplay_core::domain::SignalMatrix;
use barreplay_core::engine::{run_simulation, DecisionFunction, EngineError, MarketData, SimulationResult};

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::report::PerformanceReport;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub run_id: RunId,
    pub config: BacktestConfig,
    pub simulation: SimulationResult,
    pub report: PerformanceReport,
}

impl BacktestResult {
    /// CAGR of the primary (no-dividend) variant.
    pub fn cagr(&self) -> f64 {
        self.report.without_dividend.summary.cagr
    }

    pub fn final_equity(&self) -> Option<f64> {
        self.simulation.without_dividend.final_equity()
    }
}

/// Validate `config`, run the engine over the supplied inputs and build the report.
pub fn run_backtest<D>(
    config: &BacktestConfig,
    signals: &SignalMatrix,
    market: &MarketData,
    decision: &mut D,
) -> Result<BacktestResult, RunError>
where
    D: DecisionFunction + ?Sized,
{
    config.validate()?;
    let run_id = config.run_id()?;
    let span = info_span!("backtest", run_id = %run_id);
    let _guard = span.enter();
    let engine_config = config.to_engine_config();

    let simulation = run_simulation(signals, market, &engine_config, decision)?;
    let report = PerformanceReport::generate(&simulation, &config.cost_model());

    info!(
        cagr = report.without_dividend.summary.cagr,
        trades = report.without_dividend.trade_stats.all_trades,
        "backtest complete"
    );

    Ok(BacktestResult {
        run_id,
        config: config.clone(),
        simulation,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::{Arc, Mutex};

    use barreplay_core::domain::{Bar, SignalValue};
    use barreplay_core::engine::OrderIntent;
    use chrono::NaiveDate;
    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id};
    use tracing::Subscriber;
    use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Records `(span name, run_id field)` for every span opened.
    #[derive(Clone, Default)]
    struct SpanLog(Arc<Mutex<Vec<(String, Option<String>)>>>);

    struct RunIdField(Option<String>);

    impl Visit for RunIdField {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "run_id" {
                self.0 = Some(format!("{value:?}"));
            }
        }
    }

    impl<S: Subscriber> Layer<S> for SpanLog {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: LayerContext<'_, S>) {
            let mut field = RunIdField(None);
            attrs.record(&mut field);
            self.0
                .lock()
                .unwrap()
                .push((attrs.metadata().name().to_string(), field.0));
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn run_is_wrapped_in_a_span_carrying_its_run_id() {
        let signals =
            SignalMatrix::filled((2..=4).map(d).collect(), vec!["AAA".into()], SignalValue::Missing)
                .unwrap();
        let market = MarketData::new().with_bars(
            "AAA",
            (2..=4).map(|day| Bar::new(d(day), 10.0, 10.0, 10.0, 10.0, 100.0)).collect(),
        );
        let config = BacktestConfig::new(d(2), d(4), 1_000.0);

        let log = SpanLog::default();
        let subscriber = tracing_subscriber::registry().with(log.clone());
        let result = tracing::subscriber::with_default(subscriber, || {
            let mut decide = barreplay_core::engine::decision_fn(|_| Ok(OrderIntent::None));
            run_backtest(&config, &signals, &market, &mut decide)
        })
        .unwrap();

        let spans = log.0.lock().unwrap();
        let backtest = spans.iter().find(|(name, _)| name == "backtest");
        assert_eq!(backtest.and_then(|(_, id)| id.clone()), Some(result.run_id.clone()));
        assert!(spans.iter().any(|(name, _)| name == "simulation"));
    }
}
