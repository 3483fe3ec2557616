//! # mbnas-core
//!
//! Tensor primitives for the mbnas block runtime.
//!
//! This crate provides:
//! - [`Tensor`] — n-dimensional array handle over backend storage
//! - [`Shape`] / [`Layout`] — shape, strides and offset
//! - [`DType`] — element types (F32, F64)
//! - [`Backend`] trait — abstraction over the device holding tensor data
//! - [`Error`] / [`Result`] — the runtime's error type
//!
//! Grouped convolution and per-channel statistics live on [`Tensor`] so that
//! the layers in `mbnas-nn` stay thin.

pub mod backend;
pub mod dtype;
pub mod error;
pub mod layout;
pub mod shape;
pub mod tensor;

pub use backend::{Backend, BackendDevice, BackendStorage};
pub use dtype::DType;
pub use error::{Error, Result};
pub use layout::Layout;
pub use shape::Shape;
pub use tensor::Tensor;
