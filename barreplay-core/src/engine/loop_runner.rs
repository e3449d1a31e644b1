//! Bar-by-bar simulation loop.
//!
//! Per calendar bar:
//! 1. Dividends: fix entitlements on ex-date bars, book cash on pay bars
//! 2. Decisions: build a context per symbol and ask the decision function
//! 3. Settlement: match and apply fills in the primary ledger, then replay
//!    them in the with-dividend ledger
//! 4. Post-bar: record one snapshot per ledger

use std::collections::BTreeMap;

use tracing::{debug, info, info_span};

use crate::domain::{Bar, DividendRecord, Fill, Order, OrderSide, SignalMatrix};

use super::context::{Context, DecisionFunction};
use super::execution::{Availability, OrderMatcher};
use super::ledger::AccountLedger;
use super::market::{align, AlignedMarket, MarketData, ScheduledDividend};
use super::state::{EngineConfig, EngineError, OrderSequencing, SimulationResult, VariantResult};

/// One ledger plus the history it produces.
struct Track {
    name: &'static str,
    ledger: AccountLedger,
    out: VariantResult,
    bar_commission: f64,
    bar_dividend: f64,
    /// Dividends entitled but not yet paid, by pay-bar index.
    pending: BTreeMap<usize, Vec<DividendRecord>>,
}

impl Track {
    fn new(name: &'static str, initial_cash: f64) -> Self {
        Self {
            name,
            ledger: AccountLedger::new(initial_cash),
            out: VariantResult::default(),
            bar_commission: 0.0,
            bar_dividend: 0.0,
            pending: BTreeMap::new(),
        }
    }

    /// Fix the amount owed on the volume held going into the ex-date bar.
    fn entitle(&mut self, symbol: &str, div: &ScheduledDividend) {
        let amount = self.ledger.dividend_entitlement(symbol, div.dividend_per_share);
        if amount == 0.0 {
            return;
        }
        self.pending.entry(div.pay_index).or_default().push(DividendRecord {
            symbol: symbol.to_string(),
            ex_date: div.event.ex_date,
            pay_date: div.event.pay_date,
            volume: self.ledger.volume(symbol),
            dividend_per_share: div.dividend_per_share,
            amount,
        });
    }

    fn pay_dividends(&mut self, bar_index: usize) {
        for record in self.pending.remove(&bar_index).unwrap_or_default() {
            self.ledger.credit_dividend(record.amount);
            self.bar_dividend += record.amount;
            self.out.dividends.push(record);
        }
    }

    fn settle(
        &mut self,
        matcher: &OrderMatcher<'_>,
        order: &Order,
        bar: &Bar,
        bar_index: usize,
        lot_size: i64,
    ) -> Result<Option<Fill>, EngineError> {
        let symbol = order.symbol.as_str();
        let avail = Availability {
            cash: self.ledger.cash(),
            held_volume: self.ledger.volume(symbol),
            lot_size,
        };
        let Some(fill) = matcher
            .match_order(order.requested_quantity, bar, avail)
            .into_fill(symbol, bar, bar_index)
        else {
            return Ok(None);
        };
        self.book(&fill)?;
        Ok(Some(fill))
    }

    /// Apply an already matched fill.
    fn book(&mut self, fill: &Fill) -> Result<(), EngineError> {
        let trade = self
            .ledger
            .apply_fill(fill)
            .map_err(|source| EngineError::Ledger {
                variant: self.name,
                source,
            })?;
        debug!(
            variant = self.name,
            symbol = %fill.symbol,
            date = %fill.date,
            quantity = fill.quantity,
            price = fill.price,
            commission = fill.commission,
            "fill"
        );

        self.bar_commission += fill.commission;
        self.out.fills.push(fill.clone());
        if let Some(trade) = trade {
            self.out.trades.push(trade);
        }
        Ok(())
    }

    fn close_bar(&mut self, date: chrono::NaiveDate, prices: &BTreeMap<String, f64>) {
        let snapshot = self
            .ledger
            .snapshot(date, prices, self.bar_commission, self.bar_dividend);
        self.out.snapshots.push(snapshot);
        self.bar_commission = 0.0;
        self.bar_dividend = 0.0;
    }

    fn finish(mut self) -> VariantResult {
        self.out.final_cash = self.ledger.cash();
        self.out.total_commission = self.ledger.total_commission();
        self.out.open_positions = self.ledger.positions().values().cloned().collect();
        self.out
    }
}

/// Run one simulation.
///
/// Symbols are processed in the signal matrix's lexicographic order, so two
/// runs over identical inputs produce identical results. The decision
/// function is called once per symbol per bar against the primary
/// (without-dividend) ledger. The with-dividend ledger replays the primary's
/// fills, so the two hold identical positions and differ only by dividend
/// cash, which stays uninvested.
pub fn run_simulation<D>(
    signals: &SignalMatrix,
    market: &MarketData,
    config: &EngineConfig,
    decision: &mut D,
) -> Result<SimulationResult, EngineError>
where
    D: DecisionFunction + ?Sized,
{
    config.validate()?;
    let span = info_span!(
        "simulation",
        start = %config.start_date,
        end = %config.end_date,
        symbols = signals.symbols().len()
    );
    let _guard = span.enter();

    let aligned = align(signals, market, config)?;
    let symbols = signals.symbols();
    let lot_sizes: Vec<i64> = symbols.iter().map(|s| config.lot_size(s)).collect();
    let matcher = OrderMatcher::new(&config.execution);

    let mut primary = Track::new("without_dividend", config.initial_cash);
    let mut dividend_track = config
        .dividends
        .then(|| Track::new("with_dividend", config.initial_cash));

    // Last valid close per symbol, seeded with the bar before the window.
    let mut last_close: BTreeMap<String, f64> = symbols
        .iter()
        .zip(&aligned.prior_close)
        .filter_map(|(s, c)| c.map(|c| (s.clone(), c)))
        .collect();

    info!(
        bars = aligned.calendar.len(),
        initial_cash = config.initial_cash,
        "simulation started"
    );

    for (bar_index, &(row, date)) in aligned.calendar.iter().enumerate() {
        // ─── Phase 1: Dividends ───
        if let Some(track) = dividend_track.as_mut() {
            for div in aligned.dividends.get(&bar_index).into_iter().flatten() {
                track.entitle(&symbols[div.symbol_index], div);
            }
            track.pay_dividends(bar_index);
        }

        let reference: Vec<f64> = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| {
                last_close
                    .get(s)
                    .copied()
                    .unwrap_or(aligned.bars[i][bar_index].open)
            })
            .collect();
        let reference_prices: BTreeMap<String, f64> =
            symbols.iter().cloned().zip(reference.iter().copied()).collect();

        // ─── Phase 2 & 3: Decisions and settlement ───
        let cycle = BarCycle {
            aligned: &aligned,
            signals,
            config,
            row,
            bar_index,
            reference: &reference,
            reference_prices: &reference_prices,
        };
        match config.sequencing {
            OrderSequencing::SellsFirst => {
                let mut orders = Vec::with_capacity(symbols.len());
                for symbol_index in 0..symbols.len() {
                    orders.push(cycle.decide(decision, &primary.ledger, symbol_index)?);
                }
                let sells = orders
                    .iter()
                    .enumerate()
                    .filter(|(_, order)| order.side() == Some(OrderSide::Sell));
                let buys = orders
                    .iter()
                    .enumerate()
                    .filter(|(_, order)| order.side() == Some(OrderSide::Buy));
                for (symbol_index, order) in sells.chain(buys) {
                    let bar = &aligned.bars[symbol_index][bar_index];
                    let lot = lot_sizes[symbol_index];
                    let fill = primary.settle(&matcher, order, bar, bar_index, lot)?;
                    if let (Some(track), Some(fill)) = (dividend_track.as_mut(), fill) {
                        track.book(&fill)?;
                    }
                }
            }
            OrderSequencing::Sequential => {
                for symbol_index in 0..symbols.len() {
                    let order = cycle.decide(decision, &primary.ledger, symbol_index)?;
                    if order.side().is_none() {
                        continue;
                    }
                    let bar = &aligned.bars[symbol_index][bar_index];
                    let lot = lot_sizes[symbol_index];
                    let fill = primary.settle(&matcher, &order, bar, bar_index, lot)?;
                    if let (Some(track), Some(fill)) = (dividend_track.as_mut(), fill) {
                        track.book(&fill)?;
                    }
                }
            }
        }

        // ─── Phase 4: Post-bar ───
        for (symbol_index, symbol) in symbols.iter().enumerate() {
            let close = aligned.bars[symbol_index][bar_index].close;
            if close.is_finite() && close > 0.0 {
                last_close.insert(symbol.clone(), close);
            }
        }
        primary.close_bar(date, &last_close);
        if let Some(track) = dividend_track.as_mut() {
            track.close_bar(date, &last_close);
        }
    }

    let without_dividend = primary.finish();
    let with_dividend = dividend_track.map(Track::finish);

    info!(
        final_equity = without_dividend.final_equity().unwrap_or(config.initial_cash),
        final_equity_with_dividend = with_dividend
            .as_ref()
            .and_then(VariantResult::final_equity)
            .unwrap_or(f64::NAN),
        trades = without_dividend.trades.len(),
        "simulation finished"
    );

    Ok(SimulationResult {
        start_date: config.start_date,
        end_date: config.end_date,
        initial_cash: config.initial_cash,
        calendar: aligned.calendar.iter().map(|(_, d)| *d).collect(),
        symbols: symbols.to_vec(),
        without_dividend,
        with_dividend,
        last_close,
    })
}

/// Per-bar inputs shared by every decision on that bar.
struct BarCycle<'a> {
    aligned: &'a AlignedMarket,
    signals: &'a SignalMatrix,
    config: &'a EngineConfig,
    row: usize,
    bar_index: usize,
    reference: &'a [f64],
    reference_prices: &'a BTreeMap<String, f64>,
}

impl BarCycle<'_> {
    fn decide<D>(
        &self,
        decision: &mut D,
        ledger: &AccountLedger,
        symbol_index: usize,
    ) -> Result<Order, EngineError>
    where
        D: DecisionFunction + ?Sized,
    {
        let symbol = &self.signals.symbols()[symbol_index];
        let date = self.aligned.calendar[self.bar_index].1;
        let valuation = ledger.mark_to_market(self.reference_prices);
        let ctx = Context {
            symbol: symbol.clone(),
            timestamp: date,
            bar_index: self.bar_index,
            signal: self
                .signals
                .delayed(self.row, symbol_index, self.config.signal_delay),
            cash: ledger.cash(),
            volume: ledger.volume(symbol),
            cost_price: ledger.cost_price(symbol),
            close_price: self.reference[symbol_index],
            total_market_value: valuation.market_value,
            total_cost_value: valuation.cost_value,
            port_value: ledger.cash() + valuation.market_value,
        };
        let intent = decision
            .decide(&ctx)
            .map_err(|source| EngineError::Decision {
                symbol: symbol.clone(),
                date,
                source,
            })?;
        Ok(Order {
            requested_quantity: intent.resolve(&ctx),
            symbol: ctx.symbol,
            date,
        })
    }
}
