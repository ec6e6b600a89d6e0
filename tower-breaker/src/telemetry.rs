use std::ops::ControlFlow;

use opentelemetry::global;
use opentelemetry::metrics::Counter;
use opentelemetry::metrics::Meter;

use shot_breaker::Breaker;
use shot_breaker::Outcome;
use shot_breaker::Reason;

#[derive(Clone, Debug)]
struct BreakerInstruments {
    success: Counter<u64>,
    drop: Counter<u64>,
    failure: Counter<u64>,
}

/// Wraps a breaker and counts what happens to the calls it sees.
///
/// * `breaker.success` - admitted calls that succeeded
/// * `breaker.drop` - calls shed by the breaker
/// * `breaker.failure` - admitted calls that failed
///
/// Drops are counted in `accept`.
#[derive(Debug)]
pub struct TelemetryBreaker<B> {
    breaker: B,
    instruments: BreakerInstruments,
}

impl<B> TelemetryBreaker<B>
where
    B: Breaker,
{
    /// Counts on the global `shot_breaker` meter.
    pub fn new(breaker: B) -> Self {
        Self::with_meter(breaker, &global::meter("shot_breaker"))
    }

    pub fn with_meter(breaker: B, meter: &Meter) -> Self {
        let instruments = BreakerInstruments {
            success: meter
                .u64_counter("breaker.success")
                .with_description("Calls admitted by the breaker that succeeded")
                .build(),
            drop: meter
                .u64_counter("breaker.drop")
                .with_description("Calls shed by the breaker")
                .build(),
            failure: meter
                .u64_counter("breaker.failure")
                .with_description("Calls admitted by the breaker that failed")
                .build(),
        };

        Self {
            breaker,
            instruments,
        }
    }

    pub fn inner(&self) -> &B {
        &self.breaker
    }
}

impl<B> Breaker for TelemetryBreaker<B>
where
    B: Breaker,
{
    fn accept(&self) -> ControlFlow<Reason> {
        let decision = self.breaker.accept();
        if decision.is_break() {
            self.instruments.drop.add(1, &[]);
        }
        decision
    }

    fn record(&self, outcome: Outcome) {
        self.breaker.record(outcome);
        match outcome {
            Outcome::Success => self.instruments.success.add(1, &[]),
            Outcome::Failure => self.instruments.failure.add(1, &[]),
        }
    }
}
