use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{AccountWatch, MonitorConfig};
use crate::evaluator::ThresholdEvaluator;
use crate::models::{six_places, CycleReport};
use crate::notifier::AlertSink;
use crate::rpc::BalanceReader;
use crate::scheduler::Scheduler;

/// The poll loop: read every wallet, compare, alert, wait, repeat.
pub struct Monitor<R, N> {
    wallets: Vec<AccountWatch>,
    evaluator: ThresholdEvaluator,
    reader: R,
    notifier: N,
}

enum WalletOutcome {
    Healthy,
    Alerted { delivered: bool },
    Failed,
}

impl<R, N> Monitor<R, N>
where
    R: BalanceReader,
    N: AlertSink,
{
    pub fn new(cfg: &MonitorConfig, reader: R, notifier: N) -> Self {
        Self {
            wallets: cfg.wallets.clone(),
            evaluator: ThresholdEvaluator::from_config(cfg),
            reader,
            notifier,
        }
    }

    /// One pass over all wallets, in config order. Errors never end the pass.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        for wallet in &self.wallets {
            let span = info_span!("wallet", name = %wallet.name, address = %wallet.address);
            let outcome = self.check_wallet(wallet).instrument(span).await;

            report.checked += 1;
            match outcome {
                WalletOutcome::Healthy => {}
                WalletOutcome::Alerted { delivered } => {
                    report.below_threshold += 1;
                    if delivered {
                        report.alerts_delivered += 1;
                    } else {
                        report.failures += 1;
                    }
                }
                WalletOutcome::Failed => report.failures += 1,
            }
        }

        info!(
            "Cycle complete: {} checked, {} below threshold, {} alerts delivered, {} failures",
            report.checked, report.below_threshold, report.alerts_delivered, report.failures
        );
        report
    }

    async fn check_wallet(&self, wallet: &AccountWatch) -> WalletOutcome {
        let raw = match self.reader.balance_of(&wallet.address).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to get balance for wallet {}: {}", wallet.name, e);
                return WalletOutcome::Failed;
            }
        };

        let evaluation = match self.evaluator.evaluate(wallet, raw) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                warn!("Failed to convert balance for wallet {}: {}", wallet.name, e);
                return WalletOutcome::Failed;
            }
        };

        debug!(
            "Raw balance of {}: {}",
            evaluation.sample.address, evaluation.sample.raw
        );
        let unit = &self.evaluator.unit().symbol;
        info!(
            "Wallet Name: {}, Address: {}, Balance: {} {}, Threshold: {} {}",
            wallet.name,
            wallet.address,
            six_places(evaluation.sample.converted),
            unit,
            six_places(wallet.threshold_in_eth),
            unit
        );

        let Some(alert) = evaluation.alert else {
            return WalletOutcome::Healthy;
        };

        warn!("{}", alert.message());
        let delivered = match self.notifier.deliver(&alert).await {
            Ok(()) => true,
            Err(e) => {
                error!("{}", e);
                false
            }
        };
        WalletOutcome::Alerted { delivered }
    }

    /// Run cycles on the scheduler until `shutdown` is cancelled.
    pub async fn run(&self, scheduler: &Scheduler) {
        scheduler
            .run(move || async move {
                self.run_cycle().await;
            })
            .await;
    }
}

/// Build a monitor from `cfg` and poll until `shutdown` is cancelled.
pub async fn run_until_cancelled<R, N>(
    cfg: &MonitorConfig,
    reader: R,
    notifier: N,
    shutdown: CancellationToken,
) where
    R: BalanceReader,
    N: AlertSink,
{
    let monitor = Monitor::new(cfg, reader, notifier);
    let scheduler = Scheduler::new(cfg.interval(), shutdown);
    info!(
        "Monitoring {} wallets every {}s",
        cfg.wallets.len(),
        cfg.interval_in_secs
    );
    monitor.run(&scheduler).await;
}
