//! Botlift: joint bot detection and treatment-aware outcome scoring on
//! user interaction graphs.
//!
//! A dual-branch graph convolutional network scores every node twice: how
//! bot-like it is, and how likely it is to convert. Both scores are trained
//! with a deviation loss, binarized at a quantile threshold and reported as
//! classification metrics; outcome predictions are additionally split by
//! treatment for uplift and causal-effect evaluation.
//!
//! # Quick Start
//!
//! ```
//! use botlift::prelude::*;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(101);
//! let snapshot = Snapshot::synthetic(&SyntheticConfig::with_nodes(80), &mut rng).unwrap();
//! let sample = GraphSample::from_snapshot(&snapshot, 0.8, &mut rng).unwrap();
//!
//! let mut config = PipelineConfig::default();
//! config.training.epochs = 5;
//! config.training.degeneracy = botlift::config::DegeneracyPolicy::Neutral;
//!
//! let mut trainer = Trainer::new(sample, config).unwrap();
//! trainer.fit().unwrap();
//! let report = trainer.evaluate().unwrap();
//! assert_eq!(report.bot.mask, MaskKind::Test);
//! ```
//!
//! # Modules
//!
//! - [`autograd`]: Tape-based reverse-mode automatic differentiation
//! - [`nn`]: Module trait, dropout, initialization and the Adam optimizer
//! - [`gnn`]: Symmetric-normalized graph convolution
//! - [`data`]: Snapshots, node labels and train/test masks
//! - [`model`]: Dual-score GCN and the edge relevance encoder
//! - [`loss`]: Deviation loss
//! - [`threshold`]: Quantile thresholding
//! - [`metrics`]: Classification reports
//! - [`causal`]: Treatment splits and eATE / ePEHE
//! - [`train`]: Training and evaluation loops
//! - [`config`]: TOML pipeline configuration

pub mod autograd;
pub mod causal;
pub mod config;
pub mod data;
pub mod error;
pub mod gnn;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod nn;
pub mod prelude;
pub mod threshold;
pub mod train;

pub use error::{BotliftError, ErrorCategory, Result};
