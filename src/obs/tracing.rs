// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind, FlowOutcome},
	session::SessionState,
};

/// Future returned by [`FlowSpan::instrument`]; a plain passthrough without `tracing`.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; a plain passthrough without `tracing`.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// One `idp_session.flow` span plus its metric bookkeeping.
///
/// The span opens with `flow` and `stage` set and `user`, `state`, and `outcome` empty; the
/// flow fills those in as it learns them. [`FlowSpan::start`] counts the attempt and
/// [`FlowSpan::finish`] counts the outcome, so every flow reports both exactly once.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	kind: FlowKind,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens the span for `kind` at `stage` (call site or evaluation action) and records an
	/// attempt.
	pub fn start(kind: FlowKind, stage: &'static str) -> Self {
		obs::record_flow_outcome(kind, FlowOutcome::Attempt);

		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"idp_session.flow",
				flow = kind.as_str(),
				stage,
				user = tracing::field::Empty,
				state = tracing::field::Empty,
				outcome = tracing::field::Empty,
			);

			Self { kind, span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self { kind }
		}
	}

	/// Tags the span with the username the flow acts for.
	pub fn with_user(self, user: &str) -> Self {
		#[cfg(feature = "tracing")]
		self.span.record("user", user);
		#[cfg(not(feature = "tracing"))]
		let _ = user;

		self
	}

	/// Records the session state the flow ended in.
	pub fn record_state(&self, state: SessionState) {
		#[cfg(feature = "tracing")]
		self.span.record("state", state.as_str());
		#[cfg(not(feature = "tracing"))]
		let _ = state;
	}

	/// Records the final outcome on the span and the flow counter.
	pub fn finish(&self, outcome: FlowOutcome) {
		obs::record_flow_outcome(self.kind, outcome);

		#[cfg(feature = "tracing")]
		{
			self.span.record("outcome", outcome.as_str());

			tracing::debug!(parent: &self.span, "Flow finished.");
		}
	}

	/// Runs `fut` inside the span without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrumented_flows_keep_their_output() {
		let span = FlowSpan::start(FlowKind::Evaluate, "reuse").with_user("front-desk");
		let value = span.instrument(async { 42 }).await;

		span.record_state(SessionState::Valid);
		span.finish(FlowOutcome::Success);

		assert_eq!(value, 42);
	}

	#[test]
	fn spans_remember_their_flow_kind() {
		let span = FlowSpan::start(FlowKind::Login, "authenticate");

		assert_eq!(span.kind, FlowKind::Login);
	}
}
