//! Neural network building blocks.
//!
//! The layers used by the scoring models are organized around the [`Module`]
//! trait, which exposes trainable parameters and the train/eval mode switch:
//!
//! - **Initialization**: [`xavier_uniform`], [`zeros`]
//! - **Regularization**: [`Dropout`]
//! - **Optimization**: [`Optimizer`], [`Adam`]
//!
//! Graph convolution lives in [`crate::gnn`].
//!
//! # References
//!
//! - Paszke, A., et al. (2019). `PyTorch`: An imperative style, high-performance
//!   deep learning library. `NeurIPS`.
//! - Glorot, X., & Bengio, Y. (2010). Understanding the difficulty of training
//!   deep feedforward neural networks. AISTATS.

mod dropout;
mod init;
mod module;
pub mod optim;

pub use dropout::Dropout;
pub use init::{xavier_uniform, zeros};
pub use module::Module;
pub use optim::{Adam, Optimizer};
