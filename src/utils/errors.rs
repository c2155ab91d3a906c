use thiserror::Error;

/// `SimulationError` enumerates all possible errors returned by flowsim
#[derive(Error, Debug)]
pub enum SimulationError {
    /// Represents a schedule configured with no phases
    #[error("A schedule was configured with an empty phase cycle")]
    EmptySchedule,

    /// Represents a schedule phase with a non-positive or non-finite duration
    #[error("A schedule phase was configured with an invalid duration")]
    InvalidScheduleDuration,

    /// Represents a schedule phase with an invalid value
    #[error("A schedule phase was configured with an invalid value")]
    InvalidScheduleValue,

    /// Represents a batcher configured or sampled with a batch size of zero
    #[error("A batch size of zero was configured or sampled")]
    InvalidBatchSize,

    /// Represents a collator arrival that violates the recorded child count
    #[error("A token arrived at a collator without a matching awaited parent")]
    CollationMismatch,

    /// Represents a store registered with more than one consuming station
    #[error("A store was registered with a second consuming station")]
    StoreAlreadyConsumed,

    /// Represents an operation requested on a store that does not exist
    #[error("A specified store cannot be found in the simulation")]
    StoreNotFound,

    /// Represents an operation requested on a resource that does not exist
    #[error("A specified resource cannot be found in the simulation")]
    ResourceNotFound,

    /// Represents an operation requested on a token that does not exist
    #[error("A specified token cannot be found in the simulation")]
    TokenNotFound,

    /// Represents an operation requested on a script activation that does not exist
    #[error("A specified script activation cannot be found in the simulation")]
    ActivationNotFound,

    /// Represents an invalid station state
    #[error("An invalid station state was encountered")]
    InvalidStationState,

    /// Transparent serde_json errors
    #[error(transparent)]
    JSONError(#[from] serde_json::error::Error),

    /// Transparent Beta distribution errors
    #[error(transparent)]
    BetaError(#[from] rand_distr::BetaError),

    /// Transparent Exponential distribution errors
    #[error(transparent)]
    ExpError(#[from] rand_distr::ExpError),

    /// Transparent Normal distribution errors
    #[error(transparent)]
    NormalError(#[from] rand_distr::NormalError),

    /// Transparent Triangular distribution errors
    #[error(transparent)]
    TriangularError(#[from] rand_distr::TriangularError),

    /// Transparent Poisson distribution errors
    #[error(transparent)]
    PoissonError(#[from] rand_distr::PoissonError),

    /// Transparent Bernoulli distribution errors
    #[error(transparent)]
    BernoulliError(#[from] rand_distr::BernoulliError),

    /// Transparent Weighted Index distribution errors
    #[error(transparent)]
    WeightedError(#[from] rand_distr::WeightedError),
}
