//! Training collaborator for the bed-making classifier.
//!
//! Nothing here links an ML framework. A framework binding implements
//! [`Classifier`] and [`ClassifierFactory`]; this crate owns the explicit
//! configuration and the multi-epoch train/valid loop.

pub mod config;
pub mod util;

pub use config::{Backbone, LoaderPlan, TrainArgs, TrainingConfig};
pub use util::{
    run_epochs, train, BatchOutcome, Classifier, ClassifierFactory, EpochData, EpochReport,
    PhaseReport, StepLr, TrainingReport,
};
