// perp-settlement: position settlement and accumulation for a perpetual market.
// orders queue against oracle versions; each version accumulates funding, interest,
// pnl and fees per unit of position so any account settles in constant time.
// all computation is deterministic; collaborators are reached only through traits.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AccountId, Side, Quote, Timestamp
//   2.x  order.rs: pending order deltas and intent guarantees
//   3.x  margin.rs: margin / maintenance math, order validation chain
//   4.x  position.rs: maker/long/short position, socialized sizes
//   5.x  funding.rs: funding rate controller and side split
//   5.1  interest.rs: utilization curve, maker interest
//   5.2  spread.rs: cubic price impact curve
//   5.3  version.rs: per-timestamp accumulator snapshots
//   5.4  accumulator.rs: one market-wide accumulation step
//   6.x  liquidation.rs: protection rules, liquidation fee, shortfall queue
//   7.x  config.rs: risk, market, protocol parameters, env presets
//   8.x  engine/: market facade: settle, update, intents, fees, admin
//   9.x  oracle.rs: price oracle trait + mock
//   9.1  registry.rs: parameters and authorization trait + mock
//   9.2  custody.rs: collateral transfer trait + in-memory wallets
//   9.3  verifier.rs: intent signature trait + mock
//   10.x account.rs: per-account ledger head
//   10.1 pending.rs: pending order queue, invalid-version carries
//   10.2 checkpoint.rs: per-order local settlement and checkpoints
//   11.x events.rs: state transition events for audit
//   12.x market.rs: global ledger head and fee pools
//   13.x intent.rs: signed fixed-price intents

// value types
pub mod order;
pub mod position;
pub mod types;

// accumulation
pub mod accumulator;
pub mod funding;
pub mod interest;
pub mod spread;
pub mod version;

// ledgers
pub mod account;
pub mod checkpoint;
pub mod market;
pub mod pending;

// risk
pub mod liquidation;
pub mod margin;

// facade and collaborators
pub mod config;
pub mod custody;
pub mod engine;
pub mod events;
pub mod intent;
pub mod oracle;
pub mod registry;
pub mod verifier;

// re exports for convenience
pub use account::{AccountState, Local};
pub use accumulator::{accumulate, Accumulation, AccumulationInput, AccumulationResult};
pub use checkpoint::{Checkpoint, CheckpointError, CheckpointLog, Credit, CreditKind};
pub use config::{
    ConfigError, EfficiencyMode, Environment, MarketConfig, MarketParameter, ProtocolParameter, RiskParameter,
};
pub use custody::{transfer_delta, CollateralTransfer, InMemoryCustody, TransferError};
pub use engine::*;
pub use events::*;
pub use funding::FundingController;
pub use intent::{Intent, IntentCommon, IntentError, IntentFill};
pub use interest::UtilizationCurve;
pub use liquidation::{LiquidationFee, Shortfall};
pub use margin::{InvariantError, Projection};
pub use market::{Global, MarketState};
pub use oracle::{MockOracle, Oracle, OracleError, OracleStatus, OracleVersion};
pub use order::*;
pub use pending::{PendingEntry, PendingQueue};
pub use position::*;
pub use registry::{Authorization, MockRegistry, Registry};
pub use spread::SpreadCurve;
pub use types::*;
pub use verifier::{MockVerifier, Verifier, VerifierError};
pub use version::{Version, VersionError, VersionLog};
